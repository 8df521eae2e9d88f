//! Kernel Wiring and Process Lifecycle
//!
//! [`Kernel`] holds the collaborators the system call layer depends on and
//! implements the parts of the process lifecycle that involve more than one
//! process: spawning with the load handshake, waiting, and termination.
//!
//! # Lifecycle
//! ```text
//! exec:  allocate pid -> child record in parent -> Loader::spawn
//!        -> block until the child reports its load result
//! exit:  print "name: exit(status)" -> close files -> drop own child
//!        records -> publish status (wakes a waiting parent)
//! wait:  claim the single wait -> block on the child's status -> drop record
//! ```

use alloc::boxed::Box;
use alloc::sync::Arc;
use core::fmt;

use log::{debug, info, warn};

use crate::drivers::console::{self, Console};
use crate::fs::{FileSystem, FsGate};
use crate::process::{ChildRecord, LoadResult, Pid, PidAllocator, Process};
use crate::syscall::SyscallError;

/// Scheduler primitive used while a thread waits on a rendezvous.
pub trait Scheduler: Send + Sync {
    /// Give up the CPU so other threads can run.
    fn yield_now(&self);
}

/// Machine control.
pub trait Machine: Send + Sync {
    /// Power the machine down.
    fn power_off(&self);
}

/// Error reported by a [`Loader`] that could not create a new context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnError {
    /// No thread could be created for the new process.
    NoThread,
    /// Kernel memory for the new context ran out.
    OutOfMemory,
}

impl fmt::Display for SpawnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoThread => write!(f, "cannot create thread"),
            Self::OutOfMemory => write!(f, "out of memory"),
        }
    }
}

/// Turns a command line into a running process image.
pub trait Loader: Send + Sync {
    /// Create an execution context that loads and runs `cmdline` as
    /// `child`.
    ///
    /// The new context must call [`Kernel::report_load`] exactly once,
    /// after the image has loaded or failed to load.
    fn spawn(
        &self,
        kernel: &Arc<Kernel>,
        child: Arc<Process>,
        cmdline: &str,
    ) -> Result<(), SpawnError>;
}

/// Everything the kernel consumes from outside this crate.
pub struct Collaborators {
    pub fs: Box<dyn FileSystem>,
    pub console: Box<dyn Console>,
    pub loader: Box<dyn Loader>,
    pub machine: Box<dyn Machine>,
    pub scheduler: Box<dyn Scheduler>,
}

/// The system call layer's view of the kernel.
pub struct Kernel {
    gate: FsGate,
    console: Box<dyn Console>,
    loader: Box<dyn Loader>,
    machine: Box<dyn Machine>,
    scheduler: Box<dyn Scheduler>,
    pids: PidAllocator,
}

impl Kernel {
    /// Wire up the collaborators.
    pub fn new(parts: Collaborators) -> Arc<Self> {
        Arc::new(Self {
            gate: FsGate::new(parts.fs),
            console: parts.console,
            loader: parts.loader,
            machine: parts.machine,
            scheduler: parts.scheduler,
            pids: PidAllocator::new(),
        })
    }

    /// The file system serialization gate.
    pub fn gate(&self) -> &FsGate {
        &self.gate
    }

    /// The console device.
    pub fn console(&self) -> &dyn Console {
        self.console.as_ref()
    }

    /// Machine control.
    pub fn machine(&self) -> &dyn Machine {
        self.machine.as_ref()
    }

    /// Scheduler primitive.
    pub fn scheduler(&self) -> &dyn Scheduler {
        self.scheduler.as_ref()
    }

    /// Create a process without a parent, such as the first user program.
    pub fn create_process(&self, cmdline: &str) -> Arc<Process> {
        let process = Arc::new(Process::new(self.pids.allocate(), cmdline));
        info!("[PROCESS] created {} (pid {})", process.name(), process.pid());
        process
    }

    /// Spawn `cmdline` as a child of `parent` and wait for it to load.
    ///
    /// Returns the child's pid once its image has loaded. On any failure
    /// the child record is discarded and the child never runs.
    pub fn exec(self: &Arc<Self>, parent: &Arc<Process>, cmdline: &str) -> Result<Pid, SyscallError> {
        if cmdline.split_whitespace().next().is_none() {
            return Err(SyscallError::LoadFailed);
        }

        let child = Arc::new(Process::new(self.pids.allocate(), cmdline));
        let pid = child.pid();
        parent
            .children()
            .insert(ChildRecord::new(pid, child.exit_cell()));

        if let Err(e) = self.loader.spawn(self, child.clone(), cmdline) {
            warn!("[PROCESS] exec {:?}: {}", cmdline, e);
            parent.children().remove(pid);
            return Err(SyscallError::LoadFailed);
        }

        match child.wait_load(self.scheduler()) {
            LoadResult::Loaded => {
                debug!("[PROCESS] {} spawned {} (pid {})", parent.pid(), child.name(), pid);
                Ok(pid)
            }
            LoadResult::Failed => {
                debug!("[PROCESS] exec {:?}: load failed", cmdline);
                parent.children().remove(pid);
                Err(SyscallError::LoadFailed)
            }
        }
    }

    /// Report the outcome of loading `child`'s image.
    ///
    /// Called once from the new context. A failed load terminates the
    /// child with status -1 before the spawner is released; the caller
    /// must not run it afterwards.
    pub fn report_load(&self, child: &Process, loaded: bool) {
        if loaded {
            child.report_load(LoadResult::Loaded);
        } else {
            self.terminate(child, -1);
            child.report_load(LoadResult::Failed);
        }
    }

    /// Wait for child `pid` of `parent` to exit and return its status.
    ///
    /// Fails immediately for a pid that is not a child of `parent` and for
    /// a child that was already waited on.
    pub fn wait(&self, parent: &Process, pid: Pid) -> Result<i32, SyscallError> {
        let status = parent.children().claim_wait(pid)?;
        let code = status.wait(self.scheduler());
        parent.children().remove(pid);
        Ok(code)
    }

    /// Terminate `process` with `status`.
    ///
    /// Every descriptor still open is closed and the process's own child
    /// records are discarded; children that exit later have nobody to
    /// notify. The status is published last, so a parent woken by it sees
    /// the process fully torn down. Later calls for the same process are
    /// ignored.
    pub fn terminate(&self, process: &Process, status: i32) {
        if !process.begin_exit() {
            debug!("[PROCESS] {} already exiting", process.pid());
            return;
        }

        console::print_exit(self.console(), process.name(), status);

        let files = process.files().drain();
        for file in files {
            self.gate.close(file);
        }
        process.children().clear();

        process.publish_exit(status);
        info!("[PROCESS] {} (pid {}) exited with status {}", process.name(), process.pid(), status);
    }
}
