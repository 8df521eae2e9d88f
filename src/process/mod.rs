//! Process Records
//!
//! The per-process state the system call layer manages.
//!
//! # Design
//! - Each process owns its descriptor table and its child records
//! - Both sit behind their own lock, so several threads of one process
//!   could enter the kernel at once without corrupting them
//! - The exit status is a write-once cell shared with the parent's record
//!   for this process; publishing it is what wakes a waiting parent

pub mod children;
pub mod rendezvous;

use alloc::string::{String, ToString};
use alloc::sync::Arc;
use core::fmt;
use core::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use spin::{Mutex, MutexGuard};

use crate::fs::FdTable;
use crate::kernel::Scheduler;

pub use children::{ChildRecord, Children};
pub use rendezvous::Rendezvous;

/// Process identifier.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[repr(transparent)]
pub struct Pid(i32);

impl Pid {
    /// Value returned to user code when a spawn fails.
    pub const ERROR: i32 = -1;

    /// Wrap a raw pid from user code.
    #[inline]
    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    /// Get the raw value.
    #[inline]
    pub const fn as_raw(self) -> i32 {
        self.0
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hands out pids. Values are never reused.
pub struct PidAllocator {
    next: AtomicI32,
}

impl PidAllocator {
    /// Start allocating at 1.
    pub const fn new() -> Self {
        Self {
            next: AtomicI32::new(1),
        }
    }

    /// Allocate the next pid.
    pub fn allocate(&self) -> Pid {
        Pid(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for PidAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of loading a program image, reported by the new process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadResult {
    Loaded,
    Failed,
}

/// A running user program.
pub struct Process {
    pid: Pid,
    name: String,
    files: Mutex<FdTable>,
    children: Mutex<Children>,
    exiting: AtomicBool,
    exit: Arc<Rendezvous<i32>>,
    load: Rendezvous<LoadResult>,
}

impl Process {
    /// Exit status reported for a process that has not terminated.
    pub const RUNNING: i32 = -1;

    /// Create a process record. The name is the first word of `cmdline`.
    pub fn new(pid: Pid, cmdline: &str) -> Self {
        let name = cmdline.split_whitespace().next().unwrap_or("");
        Self {
            pid,
            name: name.to_string(),
            files: Mutex::new(FdTable::new()),
            children: Mutex::new(Children::new()),
            exiting: AtomicBool::new(false),
            exit: Arc::new(Rendezvous::new()),
            load: Rendezvous::new(),
        }
    }

    /// Process id.
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Program name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lock the descriptor table.
    pub fn files(&self) -> MutexGuard<'_, FdTable> {
        self.files.lock()
    }

    /// Lock the child records.
    pub fn children(&self) -> MutexGuard<'_, Children> {
        self.children.lock()
    }

    /// Exit status, or [`Process::RUNNING`] while still alive.
    pub fn exit_status(&self) -> i32 {
        self.exit.get().unwrap_or(Self::RUNNING)
    }

    /// Whether the process has terminated.
    pub fn has_exited(&self) -> bool {
        self.exit.is_set()
    }

    /// Shared exit cell, for the parent's child record.
    pub(crate) fn exit_cell(&self) -> Arc<Rendezvous<i32>> {
        self.exit.clone()
    }

    /// Claim the right to tear the process down. True for the first caller only.
    pub(crate) fn begin_exit(&self) -> bool {
        !self.exiting.swap(true, Ordering::AcqRel)
    }

    /// Publish the exit status. Only the first call has any effect.
    pub(crate) fn publish_exit(&self, status: i32) -> bool {
        self.exit.publish(status)
    }

    /// Record the load result. Only the first report counts.
    pub(crate) fn report_load(&self, result: LoadResult) -> bool {
        self.load.publish(result)
    }

    /// Load result so far, `None` while pending.
    pub fn load_result(&self) -> Option<LoadResult> {
        self.load.get()
    }

    /// Block until the process reports its load result.
    pub fn wait_load(&self, scheduler: &dyn Scheduler) -> LoadResult {
        self.load.wait(scheduler)
    }
}

impl fmt::Debug for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Process")
            .field("pid", &self.pid)
            .field("name", &self.name)
            .field("exit", &self.exit.get())
            .field("load", &self.load.get())
            .finish()
    }
}
