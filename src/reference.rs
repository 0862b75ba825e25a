//! Per-file cache-validity tokens and the table that hands them out.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Tracks whether the local copy of one named file is safe to read.
///
/// `valid` only ever goes from `false` to `true`.
pub struct FileReference {
    name: String,
    valid: AtomicBool,
}

impl FileReference {
    /// A fresh, not-yet-valid reference for `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            valid: AtomicBool::new(false),
        }
    }

    /// File name within the index.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether reads for this file may be served from the local copy.
    pub fn is_local_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    /// Publish the local copy as readable.
    pub fn mark_valid(&self) {
        self.valid.store(true, Ordering::Release);
    }
}

impl fmt::Debug for FileReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileReference")
            .field("name", &self.name)
            .field("valid", &self.is_local_valid())
            .finish()
    }
}

/// Concurrent name -> [`FileReference`] map owned by one caching directory.
///
/// Insertion is insert-if-absent: for any name exactly one caller ever wins, which is what
/// makes background copies single-flight. Entries are never removed.
#[derive(Default)]
pub struct ReferenceTable {
    files: scc::HashMap<String, Arc<FileReference>>,
}

impl ReferenceTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// The reference for `name`, if one was ever inserted.
    pub fn get(&self, name: &str) -> Option<Arc<FileReference>> {
        self.files.read_sync(name, |_, r| Arc::clone(r))
    }

    /// Insert a fresh reference for `name` unless one exists.
    ///
    /// Returns the reference now in the table and whether this call inserted it.
    pub fn insert_if_absent(&self, name: &str) -> (Arc<FileReference>, bool) {
        match self.files.entry_sync(name.to_string()) {
            scc::hash_map::Entry::Occupied(occ) => (Arc::clone(occ.get()), false),
            scc::hash_map::Entry::Vacant(vac) => {
                let reference = Arc::new(FileReference::new(name));
                vac.insert_entry(Arc::clone(&reference));
                (reference, true)
            }
        }
    }

    /// Number of names ever looked up through the caching path.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether no reference was created yet.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl fmt::Debug for ReferenceTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferenceTable")
            .field("len", &self.len())
            .finish()
    }
}
