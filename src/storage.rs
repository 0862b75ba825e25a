//! Storage abstraction for index files.
//!
//! A [`Directory`] is a flat, named collection of byte files: the unit the cache copies is one
//! whole file. Both the authoritative remote store and the local on-disk cache implement it,
//! and so does the caching wrapper itself (see [`crate::copy_on_read`]).
//!
//! Vocabulary note:
//! - `sync` is the stable-storage barrier (`fsync`); `Write::flush()` is only an IO boundary.
//! - `close` releases backend resources. Readers already handed out stay usable where the
//!   backend allows it (open OS file handles do).

use crate::error::{DirectoryError, DirectoryResult};
use std::fmt;
use std::io::{Read, Seek, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

/// Readable, seekable handle over one file's bytes.
pub trait FileInput: Read + Seek + Send {}

impl<T: Read + Seek + Send> FileInput for T {}

/// Attempt to `fsync`/`sync_all` the file `name` in `dir`.
///
/// Notes:
/// - This requires a `Directory` backend that exposes `file_path()`. For backends that do not
///   map to the OS filesystem, this returns `NotSupported`.
/// - This does **not** sync the parent directory.
pub fn sync_file<D: Directory + ?Sized>(dir: &D, name: &str) -> DirectoryResult<()> {
    let Some(p) = dir.file_path(name) else {
        return Err(DirectoryError::NotSupported(
            "sync_file requires Directory::file_path()".into(),
        ));
    };
    let f = std::fs::OpenOptions::new().read(true).open(&p)?;
    f.sync_all()?;
    Ok(())
}

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Scratch name next to `name`, unique per process and call.
fn temp_name(name: &str) -> String {
    let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{name}.{}-{seq}.tmp", std::process::id())
}

/// Stream `input` into `dst` in `dest` via a temporary file and [`Directory::atomic_rename`].
///
/// Readers that already opened `dst` keep the bytes they opened. On failure only the
/// temporary file is removed (best effort); an existing `dst` is never touched.
pub fn write_atomically(
    dest: &dyn Directory,
    dst: &str,
    input: &mut dyn Read,
) -> DirectoryResult<u64> {
    let tmp = temp_name(dst);
    let res = (|| -> DirectoryResult<u64> {
        let mut out = dest.create_file(&tmp)?;
        let n = std::io::copy(input, &mut out)?;
        out.flush()?;
        drop(out);
        dest.atomic_rename(&tmp, dst)?;
        Ok(n)
    })();
    if res.is_err() {
        let _ = dest.delete(&tmp);
    }
    res
}

/// Trait for directory-like storage backends.
pub trait Directory: Send + Sync + fmt::Debug {
    /// List the names of all files in this directory, sorted.
    fn list_all(&self) -> DirectoryResult<Vec<String>>;
    /// Return whether a file exists.
    fn exists(&self, name: &str) -> bool;
    /// Byte length of an existing file.
    fn file_length(&self, name: &str) -> DirectoryResult<u64>;
    /// Open an existing file for reading.
    fn open_file(&self, name: &str) -> DirectoryResult<Box<dyn FileInput>>;
    /// Create a new file for writing (overwriting if it exists).
    fn create_file(&self, name: &str) -> DirectoryResult<Box<dyn Write + Send>>;
    /// Delete a file. Deleting a missing file is not an error.
    fn delete(&self, name: &str) -> DirectoryResult<()>;
    /// Atomically rename a file, replacing `to` if it exists.
    fn atomic_rename(&self, from: &str, to: &str) -> DirectoryResult<()>;

    /// Copy the full contents of `src` in this directory to `dst` in `dest`.
    ///
    /// Returns the number of bytes copied. `dst` only ever appears complete: see
    /// [`write_atomically`].
    fn copy_to(&self, dest: &dyn Directory, src: &str, dst: &str) -> DirectoryResult<u64> {
        let mut input = self.open_file(src)?;
        write_atomically(dest, dst, &mut input)
    }

    /// Make the named files durable on stable storage.
    ///
    /// Default: no-op, for backends without a stable-storage story.
    fn sync(&self, _names: &[String]) -> DirectoryResult<()> {
        Ok(())
    }

    /// Release backend resources.
    fn close(&self) -> DirectoryResult<()> {
        Ok(())
    }

    /// Optional filesystem path for backends that support it.
    fn file_path(&self, _name: &str) -> Option<PathBuf> {
        None
    }
}

/// Filesystem-backed `Directory` over the regular files directly under `root`.
#[derive(Debug)]
pub struct FsDirectory {
    root: PathBuf,
}

impl FsDirectory {
    /// Create (or open) a filesystem directory backend rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> DirectoryResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// The directory this backend is rooted at.
    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    fn resolve_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

impl Directory for FsDirectory {
    fn list_all(&self) -> DirectoryResult<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            // A non-UTF-8 name cannot be addressed through this API.
            if let Ok(name) = entry.file_name().into_string() {
                out.push(name);
            }
        }
        out.sort();
        Ok(out)
    }

    fn exists(&self, name: &str) -> bool {
        self.resolve_path(name).is_file()
    }

    fn file_length(&self, name: &str) -> DirectoryResult<u64> {
        let full_path = self.resolve_path(name);
        match std::fs::metadata(&full_path) {
            Ok(m) => Ok(m.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(DirectoryError::MissingPath(full_path))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn open_file(&self, name: &str) -> DirectoryResult<Box<dyn FileInput>> {
        let full_path = self.resolve_path(name);
        if !full_path.exists() {
            return Err(DirectoryError::MissingPath(full_path));
        }
        Ok(Box::new(std::fs::File::open(full_path)?))
    }

    fn create_file(&self, name: &str) -> DirectoryResult<Box<dyn Write + Send>> {
        let full_path = self.resolve_path(name);
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Box::new(std::fs::File::create(full_path)?))
    }

    fn delete(&self, name: &str) -> DirectoryResult<()> {
        match std::fs::remove_file(self.resolve_path(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn atomic_rename(&self, from: &str, to: &str) -> DirectoryResult<()> {
        std::fs::rename(self.resolve_path(from), self.resolve_path(to))?;
        Ok(())
    }

    fn sync(&self, names: &[String]) -> DirectoryResult<()> {
        for name in names {
            sync_file(self, name)?;
        }
        Ok(())
    }

    fn file_path(&self, name: &str) -> Option<PathBuf> {
        Some(self.resolve_path(name))
    }
}

type MemoryFiles = std::sync::Arc<std::sync::RwLock<std::collections::HashMap<String, Vec<u8>>>>;

/// In-memory `Directory` used for tests and benchmarks.
///
/// Clones share the same files, which lets a test keep a handle on a directory it has handed
/// to a wrapper.
#[derive(Clone, Default)]
pub struct MemoryDirectory {
    files: MemoryFiles,
}

impl MemoryDirectory {
    /// Create an empty in-memory directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a directory pre-populated with `(name, bytes)` pairs.
    pub fn with_files<'a>(files: impl IntoIterator<Item = (&'a str, &'a [u8])>) -> Self {
        let dir = Self::new();
        if let Ok(mut map) = dir.files.write() {
            for (name, data) in files {
                map.insert(name.to_string(), data.to_vec());
            }
        }
        dir
    }

    /// Replace the content of `name` in one step.
    pub fn put(&self, name: &str, data: &[u8]) -> DirectoryResult<()> {
        self.files
            .write()
            .map_err(|_| lock_poisoned())?
            .insert(name.to_string(), data.to_vec());
        Ok(())
    }
}

fn lock_poisoned() -> DirectoryError {
    DirectoryError::LockFailed {
        resource: "memory directory".to_string(),
        reason: "lock poisoned".to_string(),
    }
}

impl fmt::Debug for MemoryDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let files = self.files.read().map(|m| m.len()).unwrap_or(0);
        f.debug_struct("MemoryDirectory")
            .field("files", &files)
            .finish()
    }
}

impl Directory for MemoryDirectory {
    fn list_all(&self) -> DirectoryResult<Vec<String>> {
        let files = self.files.read().map_err(|_| lock_poisoned())?;
        let mut out: Vec<String> = files.keys().cloned().collect();
        out.sort();
        Ok(out)
    }

    fn exists(&self, name: &str) -> bool {
        self.files
            .read()
            .map(|f| f.contains_key(name))
            .unwrap_or(false)
    }

    fn file_length(&self, name: &str) -> DirectoryResult<u64> {
        let files = self.files.read().map_err(|_| lock_poisoned())?;
        files
            .get(name)
            .map(|d| d.len() as u64)
            .ok_or_else(|| DirectoryError::NotFound(name.to_string()))
    }

    fn open_file(&self, name: &str) -> DirectoryResult<Box<dyn FileInput>> {
        let files = self.files.read().map_err(|_| lock_poisoned())?;
        let data = files
            .get(name)
            .ok_or_else(|| DirectoryError::NotFound(name.to_string()))?
            .clone();
        Ok(Box::new(std::io::Cursor::new(data)))
    }

    fn create_file(&self, name: &str) -> DirectoryResult<Box<dyn Write + Send>> {
        // Overwrite semantics: clear the file eagerly, then append in-place.
        self.files
            .write()
            .map_err(|_| lock_poisoned())?
            .insert(name.to_string(), Vec::new());

        Ok(Box::new(MemoryInPlaceWriter {
            files: self.files.clone(),
            name: name.to_string(),
        }))
    }

    fn delete(&self, name: &str) -> DirectoryResult<()> {
        self.files
            .write()
            .map_err(|_| lock_poisoned())?
            .remove(name);
        Ok(())
    }

    fn atomic_rename(&self, from: &str, to: &str) -> DirectoryResult<()> {
        let mut files = self.files.write().map_err(|_| lock_poisoned())?;
        let data = files
            .remove(from)
            .ok_or_else(|| DirectoryError::NotFound(from.to_string()))?;
        files.insert(to.to_string(), data);
        Ok(())
    }
}

struct MemoryInPlaceWriter {
    files: MemoryFiles,
    name: String,
}

impl Write for MemoryInPlaceWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut files = self
            .files
            .write()
            .map_err(|_| std::io::Error::other("lock poisoned"))?;
        let entry = files.entry(self.name.clone()).or_default();
        entry.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
