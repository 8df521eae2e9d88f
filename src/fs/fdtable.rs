//! File Descriptor Table
//!
//! Per-process mapping from small integer handles to open files.
//!
//! # Design
//! - Handles 0 and 1 are the console and are never table entries
//! - Handles are allocated from a counter and never reused in a process
//! - Removing an entry hands the file back; dropping it closes it

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use core::fmt;

use super::File;

/// A file descriptor as seen by user code.
///
/// Newtype so an arbitrary integer is not mistaken for a table key.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
#[repr(transparent)]
pub struct Fd(i32);

impl Fd {
    /// Console input.
    pub const STDIN: Self = Self(0);

    /// Console output.
    pub const STDOUT: Self = Self(1);

    /// First handle handed out by `open`.
    pub const FIRST_USER: Self = Self(2);

    /// Wrap a raw descriptor value from user code.
    #[inline]
    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    /// Get the raw value.
    #[inline]
    pub const fn as_raw(self) -> i32 {
        self.0
    }

    /// Check if this is one of the fixed console handles.
    #[inline]
    pub const fn is_console(self) -> bool {
        self.0 == Self::STDIN.0 || self.0 == Self::STDOUT.0
    }
}

impl fmt::Display for Fd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error type for descriptor table operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FdError {
    /// The handle is a console handle.
    Reserved,
    /// No open file has this handle.
    NotOpen,
    /// The process has used up every handle value.
    Exhausted,
}

impl fmt::Display for FdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reserved => write!(f, "reserved console descriptor"),
            Self::NotOpen => write!(f, "descriptor not open"),
            Self::Exhausted => write!(f, "descriptor values exhausted"),
        }
    }
}

/// Open files of one process.
pub struct FdTable {
    files: BTreeMap<Fd, Box<dyn File>>,
    next: i32,
}

impl FdTable {
    /// Create an empty table.
    pub const fn new() -> Self {
        Self {
            files: BTreeMap::new(),
            next: Fd::FIRST_USER.0,
        }
    }

    /// Install an open file under a fresh handle.
    ///
    /// On exhaustion the file is handed back so the caller can close it.
    pub fn insert(&mut self, file: Box<dyn File>) -> Result<Fd, (FdError, Box<dyn File>)> {
        if self.next == i32::MAX {
            return Err((FdError::Exhausted, file));
        }
        let fd = Fd(self.next);
        self.next += 1;
        self.files.insert(fd, file);
        Ok(fd)
    }

    /// Look up the open file behind a handle.
    pub fn get_mut(&mut self, fd: Fd) -> Result<&mut (dyn File + 'static), FdError> {
        if fd.is_console() {
            return Err(FdError::Reserved);
        }
        self.files
            .get_mut(&fd)
            .map(|file| &mut **file)
            .ok_or(FdError::NotOpen)
    }

    /// Remove a handle, returning its file.
    pub fn remove(&mut self, fd: Fd) -> Result<Box<dyn File>, FdError> {
        if fd.is_console() {
            return Err(FdError::Reserved);
        }
        self.files.remove(&fd).ok_or(FdError::NotOpen)
    }

    /// Remove every entry, returning the files in handle order.
    pub fn drain(&mut self) -> Vec<Box<dyn File>> {
        core::mem::take(&mut self.files).into_values().collect()
    }

    /// Number of open files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check for a table with no open files.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Check whether a handle is open.
    pub fn contains(&self, fd: Fd) -> bool {
        self.files.contains_key(&fd)
    }

    #[cfg(test)]
    pub(crate) fn set_next(&mut self, next: i32) {
        self.next = next;
    }
}

impl Default for FdTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FdTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FdTable")
            .field("open", &self.files.keys().collect::<Vec<_>>())
            .field("next", &self.next)
            .finish()
    }
}
