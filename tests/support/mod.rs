//! Shared helpers for integration tests.
#![allow(dead_code)]

mod instrumented_directory;
mod manual_executor;

pub use instrumented_directory::{FaultConfig, InstrumentedDirectory, Journal};
pub use manual_executor::ManualExecutor;

use index_copier::Directory;
use std::io::Read;

/// Read a whole file through `dir`.
pub fn read_all(dir: &dyn Directory, name: &str) -> Vec<u8> {
    let mut r = dir.open_file(name).unwrap();
    let mut buf = Vec::new();
    r.read_to_end(&mut buf).unwrap();
    buf
}

/// Write `data` to `name` in `dir`.
pub fn write_file(dir: &dyn Directory, name: &str, data: &[u8]) {
    let mut w = dir.create_file(name).unwrap();
    std::io::Write::write_all(&mut w, data).unwrap();
    std::io::Write::flush(&mut w).unwrap();
}
