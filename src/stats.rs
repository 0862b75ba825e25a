//! Copy-on-read counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters updated by caching directories.
///
/// One instance is shared by every directory an [`crate::IndexCopier`] wraps, so the numbers
/// describe the whole cache root rather than one snapshot.
#[derive(Debug, Default)]
pub struct CopyStats {
    local_reads: AtomicU64,
    remote_reads: AtomicU64,
    files_copied: AtomicU64,
    bytes_copied: AtomicU64,
    files_reused: AtomicU64,
    copy_failures: AtomicU64,
    length_mismatches: AtomicU64,
    files_removed: AtomicU64,
}

/// Point-in-time copy of [`CopyStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CopyStatsSnapshot {
    /// Opens served from the local cache.
    pub local_reads: u64,
    /// Opens served from the remote directory (including remote-only names).
    pub remote_reads: u64,
    /// Files copied from remote to local.
    pub files_copied: u64,
    /// Total bytes copied.
    pub bytes_copied: u64,
    /// Pre-existing local files accepted by the length check.
    pub files_reused: u64,
    /// Copies (or length lookups) that failed with an error.
    pub copy_failures: u64,
    /// Pre-existing local files rejected by the length check.
    pub length_mismatches: u64,
    /// Stale local files deleted at close.
    pub files_removed: u64,
}

impl CopyStats {
    /// Fresh counters, all zero.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_local_read(&self) {
        self.local_reads.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_remote_read(&self) {
        self.remote_reads.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_copy(&self, bytes: u64) {
        self.files_copied.fetch_add(1, Ordering::Relaxed);
        self.bytes_copied.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_reuse(&self) {
        self.files_reused.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_copy_failure(&self) {
        self.copy_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_length_mismatch(&self) {
        self.length_mismatches.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_removed(&self, n: u64) {
        self.files_removed.fetch_add(n, Ordering::Relaxed);
    }

    /// Read all counters. Individual fields are consistent; the set as a whole is not atomic.
    pub fn snapshot(&self) -> CopyStatsSnapshot {
        CopyStatsSnapshot {
            local_reads: self.local_reads.load(Ordering::Relaxed),
            remote_reads: self.remote_reads.load(Ordering::Relaxed),
            files_copied: self.files_copied.load(Ordering::Relaxed),
            bytes_copied: self.bytes_copied.load(Ordering::Relaxed),
            files_reused: self.files_reused.load(Ordering::Relaxed),
            copy_failures: self.copy_failures.load(Ordering::Relaxed),
            length_mismatches: self.length_mismatches.load(Ordering::Relaxed),
            files_removed: self.files_removed.load(Ordering::Relaxed),
        }
    }
}
