//! File System Access
//!
//! The storage layer is an external collaborator that is not safe under
//! concurrent entry. Every call into it goes through the [`FsGate`], a
//! single kernel-wide lock that owns the [`FileSystem`] so it cannot be
//! reached any other way.
//!
//! # Design
//! - `FileSystem` covers name-level operations (create, remove, open)
//! - `File` covers operations on an open file; dropping it closes it
//! - Per-process descriptor tables live in [`fdtable`]

pub mod fdtable;

use alloc::boxed::Box;
use spin::Mutex;

pub use fdtable::{Fd, FdError, FdTable};

/// An open file at the storage level.
///
/// Dropping the file closes it. Callers drop files while inside the gate.
pub trait File: Send {
    /// Read up to `buf.len()` bytes at the current position.
    fn read(&mut self, buf: &mut [u8]) -> usize;

    /// Write up to `buf.len()` bytes at the current position.
    fn write(&mut self, buf: &[u8]) -> usize;

    /// Move the position to `pos` bytes from the start.
    fn seek(&mut self, pos: u32);

    /// Current position.
    fn tell(&self) -> u32;

    /// File size in bytes.
    fn length(&self) -> u32;
}

/// Name-level storage operations.
pub trait FileSystem: Send {
    /// Create a file of `initial_size` bytes.
    fn create(&self, name: &str, initial_size: u32) -> bool;

    /// Delete a file.
    fn remove(&self, name: &str) -> bool;

    /// Open a file, `None` if it does not exist or cannot be opened.
    fn open(&self, name: &str) -> Option<Box<dyn File>>;
}

/// The file system serialization gate.
///
/// Held only for the duration of a single storage call, released on every
/// exit path when the closure returns. Never held across console input.
pub struct FsGate {
    fs: Mutex<Box<dyn FileSystem>>,
}

impl FsGate {
    /// Wrap the storage collaborator.
    pub fn new(fs: Box<dyn FileSystem>) -> Self {
        Self { fs: Mutex::new(fs) }
    }

    /// Run a name-level operation inside the gate.
    pub fn with<R>(&self, f: impl FnOnce(&dyn FileSystem) -> R) -> R {
        let fs = self.fs.lock();
        f(fs.as_ref())
    }

    /// Run an operation on an already open file inside the gate.
    pub fn enter<R>(&self, f: impl FnOnce() -> R) -> R {
        let _fs = self.fs.lock();
        f()
    }

    /// Close a file inside the gate.
    pub fn close(&self, file: Box<dyn File>) {
        self.enter(move || drop(file));
    }
}
