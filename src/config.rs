//! Copier configuration.
//!
//! Both types deserialize with `serde`, so they can be embedded in whatever configuration
//! format the host application uses.

use crate::copy_on_read::DEFAULT_REMOTE_ONLY_FILES;
use crate::error::{DirectoryError, DirectoryResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

fn default_remote_only_files() -> BTreeSet<String> {
    DEFAULT_REMOTE_ONLY_FILES
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Settings shared by every index an [`crate::IndexCopier`] wraps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CopierConfig {
    /// Root under which one cache directory per index path is created.
    pub index_root_dir: PathBuf,
    /// File names always read from remote, for every index.
    #[serde(default = "default_remote_only_files")]
    pub remote_only_files: BTreeSet<String>,
}

impl CopierConfig {
    /// Config rooted at `index_root_dir` with the default remote-only names.
    pub fn new(index_root_dir: impl Into<PathBuf>) -> Self {
        Self {
            index_root_dir: index_root_dir.into(),
            remote_only_files: default_remote_only_files(),
        }
    }

    /// Check the config before any directory is touched.
    pub fn validate(&self) -> DirectoryResult<()> {
        if self.index_root_dir.as_os_str().is_empty() {
            return Err(DirectoryError::InvalidConfig(
                "index_root_dir must not be empty".into(),
            ));
        }
        if let Some(bad) = self.remote_only_files.iter().find(|n| n.is_empty()) {
            return Err(DirectoryError::InvalidConfig(format!(
                "remote_only_files contains an empty name: {bad:?}"
            )));
        }
        Ok(())
    }
}

/// Per-index settings passed to [`crate::IndexCopier::wrap`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IndexDefinition {
    /// Extra names read from remote for this index only, on top of the copier's set.
    pub remote_only_files: BTreeSet<String>,
}

impl IndexDefinition {
    /// A definition with no extra remote-only names.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a name that must always be read from remote for this index.
    pub fn with_remote_only_file(mut self, name: impl Into<String>) -> Self {
        self.remote_only_files.insert(name.into());
        self
    }
}
