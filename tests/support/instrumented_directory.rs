//! `Directory` wrapper with call counters and targeted fault injection.
//!
//! Important: this file lives under `tests/support/` so it is **not** compiled as a standalone
//! integration test target.

use index_copier::storage::{write_atomically, Directory, FileInput};
use index_copier::DirectoryResult;
use std::collections::{HashMap, HashSet};
use std::io::{self, Read};
use std::sync::{Arc, Mutex};

/// Ordered record of `close` calls across several directories.
pub type Journal = Arc<Mutex<Vec<String>>>;

/// Fault-injection configuration and counters.
#[derive(Default)]
pub struct FaultConfig {
    /// Fail `copy_to` calls made on this directory (as copy source).
    pub fail_copy: bool,
    /// Let `copy_to` stream this many bytes, then fail.
    pub fail_copy_after: Option<usize>,
    /// Report these names as absent from `exists`, as a check racing another writer saw them.
    pub report_absent: HashSet<String>,
    /// Fail `delete` for these names.
    pub fail_delete: HashSet<String>,
    /// Fail `list_all`.
    pub fail_list: bool,
    /// Fail `close`.
    pub fail_close: bool,
    /// `open_file` calls per name.
    pub opens: HashMap<String, usize>,
    /// `copy_to` calls per source name.
    pub copies: HashMap<String, usize>,
    /// Names passed to `delete`, in call order.
    pub deletes: Vec<String>,
    /// Number of `sync` calls.
    pub sync_calls: usize,
    /// Number of `close` calls.
    pub close_calls: usize,
}

impl FaultConfig {
    /// `open_file` calls for `name`.
    pub fn opens_of(&self, name: &str) -> usize {
        self.opens.get(name).copied().unwrap_or(0)
    }

    /// `copy_to` calls for `name`.
    pub fn copies_of(&self, name: &str) -> usize {
        self.copies.get(name).copied().unwrap_or(0)
    }
}

/// A `Directory` wrapper that counts calls and injects failures.
pub struct InstrumentedDirectory {
    label: String,
    inner: Arc<dyn Directory>,
    cfg: Arc<Mutex<FaultConfig>>,
    journal: Option<Journal>,
}

impl InstrumentedDirectory {
    /// Wrap `inner`; `label` shows up in `Debug` output and the journal.
    pub fn new(label: &str, inner: impl Directory + 'static) -> Self {
        Self {
            label: label.to_string(),
            inner: Arc::new(inner),
            cfg: Arc::new(Mutex::new(FaultConfig::default())),
            journal: None,
        }
    }

    /// Record `close` calls into `journal`.
    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Access the shared fault config (for toggling failpoints and reading counters).
    pub fn cfg(&self) -> Arc<Mutex<FaultConfig>> {
        self.cfg.clone()
    }

    fn injected(what: &str) -> index_copier::DirectoryError {
        io::Error::other(format!("injected {what} failure")).into()
    }
}

impl std::fmt::Debug for InstrumentedDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InstrumentedDirectory({})", self.label)
    }
}

impl Directory for InstrumentedDirectory {
    fn list_all(&self) -> DirectoryResult<Vec<String>> {
        if self.cfg.lock().unwrap().fail_list {
            return Err(Self::injected("list"));
        }
        self.inner.list_all()
    }

    fn exists(&self, name: &str) -> bool {
        if self.cfg.lock().unwrap().report_absent.contains(name) {
            return false;
        }
        self.inner.exists(name)
    }

    fn file_length(&self, name: &str) -> DirectoryResult<u64> {
        self.inner.file_length(name)
    }

    fn open_file(&self, name: &str) -> DirectoryResult<Box<dyn FileInput>> {
        *self
            .cfg
            .lock()
            .unwrap()
            .opens
            .entry(name.to_string())
            .or_default() += 1;
        self.inner.open_file(name)
    }

    fn create_file(&self, name: &str) -> DirectoryResult<Box<dyn io::Write + Send>> {
        self.inner.create_file(name)
    }

    fn delete(&self, name: &str) -> DirectoryResult<()> {
        let mut cfg = self.cfg.lock().unwrap();
        cfg.deletes.push(name.to_string());
        if cfg.fail_delete.contains(name) {
            return Err(Self::injected("delete"));
        }
        drop(cfg);
        self.inner.delete(name)
    }

    fn copy_to(&self, dest: &dyn Directory, src: &str, dst: &str) -> DirectoryResult<u64> {
        let mut cfg = self.cfg.lock().unwrap();
        *cfg.copies.entry(src.to_string()).or_default() += 1;
        if cfg.fail_copy {
            return Err(Self::injected("copy"));
        }
        let fail_after = cfg.fail_copy_after;
        drop(cfg);
        match fail_after {
            Some(limit) => {
                let input = self.inner.open_file(src)?;
                write_atomically(dest, dst, &mut TruncatedInput { input, left: limit })
            }
            None => self.inner.copy_to(dest, src, dst),
        }
    }

    fn atomic_rename(&self, from: &str, to: &str) -> DirectoryResult<()> {
        self.inner.atomic_rename(from, to)
    }

    fn sync(&self, names: &[String]) -> DirectoryResult<()> {
        self.cfg.lock().unwrap().sync_calls += 1;
        self.inner.sync(names)
    }

    fn close(&self) -> DirectoryResult<()> {
        let mut cfg = self.cfg.lock().unwrap();
        cfg.close_calls += 1;
        if let Some(journal) = &self.journal {
            journal.lock().unwrap().push(format!("{}:close", self.label));
        }
        if cfg.fail_close {
            return Err(Self::injected("close"));
        }
        drop(cfg);
        self.inner.close()
    }

    fn file_path(&self, name: &str) -> Option<std::path::PathBuf> {
        self.inner.file_path(name)
    }
}

/// Yields at most `left` bytes of `input`, then errors like a dropped connection.
struct TruncatedInput {
    input: Box<dyn FileInput>,
    left: usize,
}

impl Read for TruncatedInput {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.left == 0 {
            return Err(io::Error::other("injected copy failure mid-stream"));
        }
        let max = self.left.min(buf.len());
        let n = self.input.read(&mut buf[..max])?;
        self.left -= n;
        Ok(n)
    }
}
