//! System Call Handler
//!
//! Dispatches system calls to their handlers.
//!
//! # Security Considerations
//! - The call header on the user stack is validated before it is read
//! - Each handler validates the memory its pointer arguments refer to
//! - Unknown call numbers are reported and otherwise ignored
//! - Invalid user memory terminates the caller with status -1

use alloc::sync::Arc;
use core::fmt;

use log::{debug, info, warn};

use crate::fs::FdError;
use crate::kernel::Kernel;
use crate::mm::{AddressSpace, VirtAddr};
use crate::process::Process;

use super::args::ArgCursor;
use super::{file, process};

/// System call numbers
pub mod numbers {
    pub const SYS_HALT: u32 = 0;
    pub const SYS_EXIT: u32 = 1;
    pub const SYS_EXEC: u32 = 2;
    pub const SYS_WAIT: u32 = 3;
    pub const SYS_CREATE: u32 = 4;
    pub const SYS_REMOVE: u32 = 5;
    pub const SYS_OPEN: u32 = 6;
    pub const SYS_FILESIZE: u32 = 7;
    pub const SYS_READ: u32 = 8;
    pub const SYS_WRITE: u32 = 9;
    pub const SYS_SEEK: u32 = 10;
    pub const SYS_TELL: u32 = 11;
    pub const SYS_CLOSE: u32 = 12;
}

/// System call error kinds
///
/// Only `BadAddress` is fatal to the caller; everything else reaches user
/// code as the `-1` sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallError {
    /// Null, kernel or unmapped user memory
    BadAddress,
    /// Descriptor not open in this process
    BadFd,
    /// File does not exist or cannot be opened
    NotFound,
    /// Pid is not a child of the caller
    NoSuchChild,
    /// Child was already waited on
    AlreadyWaited,
    /// Program could not be spawned or loaded
    LoadFailed,
    /// Out of descriptor values
    Exhausted,
}

impl SyscallError {
    /// Value written to the return register for non-fatal errors.
    pub const SENTINEL: u32 = -1i32 as u32;

    /// Whether the error terminates the calling process.
    #[inline]
    pub const fn is_fatal(self) -> bool {
        matches!(self, Self::BadAddress)
    }
}

impl fmt::Display for SyscallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadAddress => write!(f, "invalid user memory"),
            Self::BadFd => write!(f, "bad file descriptor"),
            Self::NotFound => write!(f, "no such file"),
            Self::NoSuchChild => write!(f, "no such child process"),
            Self::AlreadyWaited => write!(f, "child already waited on"),
            Self::LoadFailed => write!(f, "program failed to load"),
            Self::Exhausted => write!(f, "out of descriptors"),
        }
    }
}

impl From<FdError> for SyscallError {
    fn from(e: FdError) -> Self {
        match e {
            FdError::Reserved | FdError::NotOpen => Self::BadFd,
            FdError::Exhausted => Self::Exhausted,
        }
    }
}

/// What a call leaves behind for the trap entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Store this value in the return register.
    Value(u32),
    /// Resume without touching the return register.
    Void,
    /// The caller terminated with this status.
    Exit(i32),
    /// The machine was powered off.
    Halt,
}

pub(super) type SyscallResult = Result<Completion, SyscallError>;

/// The caller of a system call.
pub struct SyscallContext<'a> {
    pub kernel: &'a Arc<Kernel>,
    pub process: &'a Arc<Process>,
    pub space: &'a dyn AddressSpace,
}

/// Dispatch the system call whose frame starts at `esp`.
///
/// # Returns
/// How the trap entry should complete the call. Non-fatal errors come back
/// as `Value(SENTINEL)`; a fatal error has already terminated the caller.
pub fn dispatch(
    kernel: &Arc<Kernel>,
    process: &Arc<Process>,
    space: &dyn AddressSpace,
    esp: VirtAddr,
) -> Completion {
    let cx = SyscallContext {
        kernel,
        process,
        space,
    };

    match ArgCursor::new(space, esp).and_then(|mut args| call(&cx, &mut args)) {
        Ok(completion) => completion,
        Err(e) if e.is_fatal() => {
            info!("[SYSCALL] {} (pid {}): {}, terminating", process.name(), process.pid(), e);
            kernel.terminate(process, -1);
            Completion::Exit(-1)
        }
        Err(e) => {
            debug!("[SYSCALL] {} (pid {}): {}", process.name(), process.pid(), e);
            Completion::Value(SyscallError::SENTINEL)
        }
    }
}

fn call(cx: &SyscallContext<'_>, args: &mut ArgCursor<'_>) -> SyscallResult {
    use numbers::*;

    let nr = args.next_word()?;
    match nr {
        SYS_HALT => process::sys_halt(cx),
        SYS_EXIT => process::sys_exit(cx, args.next_i32()?),
        SYS_EXEC => process::sys_exec(cx, args.next_ptr()?),
        SYS_WAIT => process::sys_wait(cx, args.next_i32()?),
        SYS_CREATE => {
            let name = args.next_ptr()?;
            file::sys_create(cx, name, args.next_word()?)
        }
        SYS_REMOVE => file::sys_remove(cx, args.next_ptr()?),
        SYS_OPEN => file::sys_open(cx, args.next_ptr()?),
        SYS_FILESIZE => file::sys_filesize(cx, args.next_i32()?),
        SYS_READ => {
            let fd = args.next_i32()?;
            let buf = args.next_ptr()?;
            file::sys_read(cx, fd, buf, args.next_usize()?)
        }
        SYS_WRITE => {
            let fd = args.next_i32()?;
            let buf = args.next_ptr()?;
            file::sys_write(cx, fd, buf, args.next_usize()?)
        }
        SYS_SEEK => {
            let fd = args.next_i32()?;
            file::sys_seek(cx, fd, args.next_word()?)
        }
        SYS_TELL => file::sys_tell(cx, args.next_i32()?),
        SYS_CLOSE => file::sys_close(cx, args.next_i32()?),
        _ => {
            warn!("[SYSCALL] Unknown syscall: {}", nr);
            Ok(Completion::Void)
        }
    }
}
