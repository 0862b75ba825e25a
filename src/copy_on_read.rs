//! Read-through directory that copies index files to a local cache on first use.
//!
//! [`CopyOnReadDirectory`] wraps an authoritative *remote* [`Directory`] and a fast *local*
//! one. Reads go to local once a file's local copy is known good, otherwise to remote; the
//! copy itself happens in the background on an [`Executor`] and no reader ever waits for it.
//!
//! ## Contract
//!
//! - **Single flight**: per directory instance and file name at most one background copy is
//!   ever scheduled. The first open that inserts the name into the reference table schedules
//!   it; everyone else reads from remote until the copy publishes the file as valid.
//! - **No retry**: a failed copy, or a pre-existing local file whose length differs from the
//!   remote one, leaves the name served from remote for the rest of this instance's life.
//! - **Length-only check**: a pre-existing local file of the same length as the remote file
//!   is trusted without comparing content. Segment files are written once, so this is
//!   normally enough; an equal-length content mismatch goes undetected.
//! - **Read-only**: `create_file`/`delete`/`atomic_rename` fail with `NotSupported`. Metadata (`list_all`,
//!   `exists`, `file_length`) always comes from remote.
//!
//! ## Close and shared cache directories
//!
//! Several instances (one per index snapshot) may share the same physical local directory.
//! Closing an instance deletes every local file that the remote no longer lists. That is
//! only safe if the **caller** opens the instance for the newer snapshot (and its readers)
//! *before* closing the older one; otherwise the older close can remove files the newer
//! instance is about to serve. This ordering cannot be checked here.
//!
//! Instances sharing a directory may both copy the same name. Copies land through a temporary
//! file and a rename, so a file another instance already validated is replaced whole, never
//! truncated, and a failed copy leaves it untouched. Leftover temporary files are not listed
//! by any remote and go away with the next close.

use crate::error::{DirectoryError, DirectoryResult};
use crate::executor::Executor;
use crate::reference::{FileReference, ReferenceTable};
use crate::stats::CopyStats;
use crate::storage::{Directory, FileInput};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Names that are rewritten in place on the remote and therefore never cached.
pub const DEFAULT_REMOTE_ONLY_FILES: &[&str] = &["segments.gen"];

/// Copy-on-read caching directory. See the [module docs](self).
pub struct CopyOnReadDirectory {
    remote: Arc<dyn Directory>,
    local: Arc<dyn Directory>,
    executor: Arc<dyn Executor>,
    files: ReferenceTable,
    remote_only: BTreeSet<String>,
    stats: Arc<CopyStats>,
    closed: AtomicBool,
}

impl CopyOnReadDirectory {
    /// Wrap `remote` with `local` as cache, running copies and cleanup on `executor`.
    ///
    /// Uses [`DEFAULT_REMOTE_ONLY_FILES`] and private stats counters.
    pub fn new(
        remote: Arc<dyn Directory>,
        local: Arc<dyn Directory>,
        executor: Arc<dyn Executor>,
    ) -> Self {
        Self {
            remote,
            local,
            executor,
            files: ReferenceTable::new(),
            remote_only: DEFAULT_REMOTE_ONLY_FILES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            stats: Arc::new(CopyStats::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Replace the set of names always read from remote.
    pub fn with_remote_only<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.remote_only = names.into_iter().map(Into::into).collect();
        self
    }

    /// Report into `stats` instead of private counters.
    pub fn with_stats(mut self, stats: Arc<CopyStats>) -> Self {
        self.stats = stats;
        self
    }

    /// The authoritative directory.
    pub fn remote(&self) -> &Arc<dyn Directory> {
        &self.remote
    }

    /// The local cache directory.
    pub fn local(&self) -> &Arc<dyn Directory> {
        &self.local
    }

    /// Counters this directory reports into.
    pub fn stats(&self) -> &Arc<CopyStats> {
        &self.stats
    }

    /// Names that bypass the cache.
    pub fn remote_only(&self) -> &BTreeSet<String> {
        &self.remote_only
    }

    /// The reference for `name`, if it went through the caching path.
    pub fn reference(&self, name: &str) -> Option<Arc<FileReference>> {
        self.files.get(name)
    }

    /// Number of file references created so far.
    pub fn tracked_files(&self) -> usize {
        self.files.len()
    }

    /// Whether `close` was called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn open_input(&self, name: &str) -> DirectoryResult<Box<dyn FileInput>> {
        if self.remote_only.contains(name) {
            return self.open_remote(name);
        }

        if let Some(reference) = self.files.get(name) {
            return if reference.is_local_valid() {
                self.open_local(name)
            } else {
                self.open_remote(name)
            };
        }

        let (reference, inserted) = self.files.insert_if_absent(name);
        if inserted {
            self.schedule_copy(Arc::clone(&reference));
        }

        // Only an inline executor can have finished the copy by now.
        if reference.is_local_valid() {
            self.open_local(name)
        } else {
            self.open_remote(name)
        }
    }

    fn open_local(&self, name: &str) -> DirectoryResult<Box<dyn FileInput>> {
        let input = self.local.open_file(name)?;
        self.stats.record_local_read();
        Ok(input)
    }

    fn open_remote(&self, name: &str) -> DirectoryResult<Box<dyn FileInput>> {
        let input = self.remote.open_file(name)?;
        self.stats.record_remote_read();
        Ok(input)
    }

    fn schedule_copy(&self, reference: Arc<FileReference>) {
        let remote = Arc::clone(&self.remote);
        let local = Arc::clone(&self.local);
        let stats = Arc::clone(&self.stats);
        debug!(file = reference.name(), "scheduling local copy");
        self.executor.execute(Box::new(move || {
            populate_local(&*remote, &*local, &reference, &stats);
        }));
    }
}

/// Materialize or validate the local copy of `reference`, then publish it as valid.
fn populate_local(
    remote: &dyn Directory,
    local: &dyn Directory,
    reference: &FileReference,
    stats: &CopyStats,
) {
    let name = reference.name();

    if !local.exists(name) {
        match remote.copy_to(local, name, name) {
            Ok(bytes) => {
                stats.record_copy(bytes);
                reference.mark_valid();
                debug!(file = name, bytes, "copied file to local cache");
            }
            Err(err) => {
                // Not retried: this instance keeps reading the file from remote.
                stats.record_copy_failure();
                warn!(file = name, ?remote, ?local, %err, "error occurred while copying file");
            }
        }
        return;
    }

    let lengths = local
        .file_length(name)
        .and_then(|l| remote.file_length(name).map(|r| (l, r)));
    match lengths {
        Ok((local_len, remote_len)) if local_len == remote_len => {
            stats.record_reuse();
            reference.mark_valid();
            debug!(file = name, len = local_len, "reusing existing local copy");
        }
        Ok((local_len, remote_len)) => {
            stats.record_length_mismatch();
            warn!(
                file = name,
                ?local,
                local_len,
                remote_len,
                "local copy differs in size from remote; content will be read from remote only"
            );
        }
        Err(err) => {
            stats.record_copy_failure();
            warn!(file = name, ?remote, ?local, %err, "cannot compare local copy with remote");
        }
    }
}

/// Names listed in `local` but not in `remote`.
fn stale_files(local: &dyn Directory, remote: &dyn Directory) -> DirectoryResult<Vec<String>> {
    let in_remote: HashSet<String> = remote.list_all()?.into_iter().collect();
    Ok(local
        .list_all()?
        .into_iter()
        .filter(|name| !in_remote.contains(name))
        .collect())
}

fn remove_deleted_files(local: &dyn Directory, remote: &dyn Directory, stats: &CopyStats) {
    let stale = match stale_files(local, remote) {
        Ok(stale) => stale,
        Err(err) => {
            warn!(?local, ?remote, %err, "error occurred while listing files for cleanup");
            return;
        }
    };

    let mut removed = Vec::with_capacity(stale.len());
    for name in stale {
        match local.delete(&name) {
            Ok(()) => removed.push(name),
            Err(err) => {
                warn!(file = %name, ?local, %err, "error occurred while removing stale file");
            }
        }
    }

    stats.record_removed(removed.len() as u64);
    if !removed.is_empty() {
        debug!(?local, ?removed, "removed files no longer present in remote");
    }
}

impl Directory for CopyOnReadDirectory {
    fn list_all(&self) -> DirectoryResult<Vec<String>> {
        self.remote.list_all()
    }

    fn exists(&self, name: &str) -> bool {
        self.remote.exists(name)
    }

    fn file_length(&self, name: &str) -> DirectoryResult<u64> {
        self.remote.file_length(name)
    }

    fn open_file(&self, name: &str) -> DirectoryResult<Box<dyn FileInput>> {
        self.open_input(name)
    }

    fn create_file(&self, _name: &str) -> DirectoryResult<Box<dyn Write + Send>> {
        Err(DirectoryError::NotSupported(
            "cannot write in a read-only directory".into(),
        ))
    }

    fn delete(&self, _name: &str) -> DirectoryResult<()> {
        Err(DirectoryError::NotSupported(
            "cannot delete in a read-only directory".into(),
        ))
    }

    fn atomic_rename(&self, _from: &str, _to: &str) -> DirectoryResult<()> {
        Err(DirectoryError::NotSupported(
            "cannot rename in a read-only directory".into(),
        ))
    }

    fn sync(&self, names: &[String]) -> DirectoryResult<()> {
        self.remote.sync(names)
    }

    /// Schedule cleanup and release of both directories; returns without waiting.
    ///
    /// The scheduled task removes local files absent from remote, then closes local and
    /// remote. Failures are logged, and a failed step does not stop the next one.
    /// Calling `close` again schedules nothing.
    fn close(&self) -> DirectoryResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            debug!(remote = ?self.remote, "directory already closed");
            return Ok(());
        }

        let remote = Arc::clone(&self.remote);
        let local = Arc::clone(&self.local);
        let stats = Arc::clone(&self.stats);
        self.executor.execute(Box::new(move || {
            remove_deleted_files(&*local, &*remote, &stats);

            if let Err(err) = local.close() {
                warn!(?local, %err, "error occurred while closing local directory");
            }
            if let Err(err) = remote.close() {
                warn!(?remote, %err, "error occurred while closing remote directory");
            }
        }));
        Ok(())
    }
}

impl fmt::Debug for CopyOnReadDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CopyOnReadDirectory")
            .field("remote", &self.remote)
            .field("local", &self.local)
            .field("files", &self.files)
            .field("closed", &self.is_closed())
            .finish()
    }
}
