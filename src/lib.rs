//! `index-copier`: copy-on-read local caching for segment-based index directories.
//!
//! Scope:
//! - directory abstraction (`Directory`) with filesystem and in-memory backends (`storage`)
//! - fire-and-forget background work (`executor`)
//! - the caching directory itself (`copy_on_read`)
//! - a factory mapping logical index paths to cache directories (`copier`)
//!
//! Non-goal: index formats, merging, or query execution. Files are opaque byte blobs here.
//!
//! ## Contract (what you can rely on)
//!
//! - **Reads never wait for copies.** `open_file` performs exactly one open, on local or
//!   remote, and returns.
//! - **Fail open to remote.** Copy failures and stale local files are logged and contained;
//!   the affected names are simply read from remote for the rest of the instance's life.
//! - **At most one copy per file per instance**, whatever the executor's concurrency.
//! - **Copies land whole.** A local file appears only once fully written (temporary file plus
//!   rename), so instances sharing a cache directory never see or serve a partial copy.
//! - **Read-only.** The caching directory rejects `create_file`/`delete`; it never mutates
//!   the remote.
//!
//! And what you cannot:
//!
//! - No freshness beyond "remote as seen when the file was first opened".
//! - Pre-existing local files are validated by length only.
//! - Closing an instance deletes local files the remote no longer lists. Callers sharing one
//!   cache directory between snapshots must open the newer instance before closing the
//!   older one.

pub mod config;
pub mod copier;
pub mod copy_on_read;
pub mod error;
pub mod executor;
pub mod reference;
pub mod stats;
pub mod storage;

pub use config::{CopierConfig, IndexDefinition};
pub use copier::{local_dir_name, IndexCopier};
pub use copy_on_read::{CopyOnReadDirectory, DEFAULT_REMOTE_ONLY_FILES};
pub use error::{DirectoryError, DirectoryResult};
pub use executor::{Executor, InlineExecutor, Task, ThreadPerTaskExecutor};
pub use stats::{CopyStats, CopyStatsSnapshot};
pub use storage::{Directory, FileInput, FsDirectory, MemoryDirectory};
