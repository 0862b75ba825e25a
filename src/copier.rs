//! Factory that pairs a remote index directory with its local cache directory.

use crate::config::{CopierConfig, IndexDefinition};
use crate::copy_on_read::CopyOnReadDirectory;
use crate::error::{DirectoryError, DirectoryResult};
use crate::executor::Executor;
use crate::stats::{CopyStats, CopyStatsSnapshot};
use crate::storage::{Directory, FsDirectory};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::Arc;

/// Cache directory name for a logical index path: lowercase hex SHA-256 of its UTF-8 bytes.
///
/// Stable across processes, so a restart finds the files it copied last time.
pub fn local_dir_name(index_path: &str) -> String {
    hex::encode(Sha256::digest(index_path.as_bytes()))
}

/// Wraps remote index directories in [`CopyOnReadDirectory`]s backed by per-index cache
/// directories under one root.
pub struct IndexCopier {
    executor: Arc<dyn Executor>,
    config: CopierConfig,
    stats: Arc<CopyStats>,
}

impl IndexCopier {
    /// Create a copier; fails on an invalid config.
    pub fn new(executor: Arc<dyn Executor>, config: CopierConfig) -> DirectoryResult<Self> {
        config.validate()?;
        Ok(Self {
            executor,
            config,
            stats: Arc::new(CopyStats::new()),
        })
    }

    /// The config this copier was built with.
    pub fn config(&self) -> &CopierConfig {
        &self.config
    }

    /// Counters aggregated over every directory this copier wrapped.
    pub fn stats(&self) -> CopyStatsSnapshot {
        self.stats.snapshot()
    }

    /// Where the cache for `index_path` lives.
    pub fn local_dir_path(&self, index_path: &str) -> PathBuf {
        self.config.index_root_dir.join(local_dir_name(index_path))
    }

    /// Build a caching directory for the index at `index_path` over `remote`.
    ///
    /// The local directory is created if needed; failing to create it is fatal and returned
    /// as [`DirectoryError::CacheDir`]. Every call returns a fresh instance with an empty
    /// reference table, even for a path wrapped before.
    pub fn wrap(
        &self,
        index_path: &str,
        definition: &IndexDefinition,
        remote: Arc<dyn Directory>,
    ) -> DirectoryResult<CopyOnReadDirectory> {
        let local = self.create_local_dir(index_path)?;
        let remote_only = self
            .config
            .remote_only_files
            .iter()
            .chain(definition.remote_only_files.iter())
            .cloned();

        Ok(
            CopyOnReadDirectory::new(remote, Arc::new(local), Arc::clone(&self.executor))
                .with_remote_only(remote_only)
                .with_stats(Arc::clone(&self.stats)),
        )
    }

    // TODO: a reindex should get a fresh directory instead of reusing the old hash.
    fn create_local_dir(&self, index_path: &str) -> DirectoryResult<FsDirectory> {
        let path = self.local_dir_path(index_path);
        if !path.is_dir() {
            std::fs::create_dir_all(&path).map_err(|source| DirectoryError::CacheDir {
                path: path.clone(),
                source,
            })?;
        }
        FsDirectory::new(path)
    }
}

impl std::fmt::Debug for IndexCopier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexCopier")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::InlineExecutor;
    use crate::storage::MemoryDirectory;

    #[test]
    fn local_dir_name_is_sha256_hex() {
        assert_eq!(
            local_dir_name("/oak:index/lucene"),
            "e5a943cdec3000bd8ce54924fd2070ab5d1d35b9ecf530963a3583d43bf28293"
        );
        assert_eq!(
            local_dir_name(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_ne!(local_dir_name("/a"), local_dir_name("/b"));
    }

    #[test]
    fn wrap_merges_remote_only_names() {
        let tmp = tempfile::tempdir().unwrap();
        let copier =
            IndexCopier::new(Arc::new(InlineExecutor), CopierConfig::new(tmp.path())).unwrap();
        let def = IndexDefinition::new().with_remote_only_file("write.lock");

        let dir = copier
            .wrap("/idx", &def, Arc::new(MemoryDirectory::new()))
            .unwrap();
        assert!(dir.remote_only().contains("segments.gen"));
        assert!(dir.remote_only().contains("write.lock"));
        assert!(copier.local_dir_path("/idx").is_dir());
    }

    #[test]
    fn new_rejects_invalid_config() {
        let res = IndexCopier::new(Arc::new(InlineExecutor), CopierConfig::new(""));
        assert!(matches!(res, Err(DirectoryError::InvalidConfig(_))));
    }
}
