//! usergate - User Program System Call Boundary
//!
//! The layer of the kernel that receives a trap from unprivileged user code,
//! validates everything that comes from user memory, dispatches to the
//! matching kernel operation and manages the per-process state those
//! operations need (open files, child processes, exit/wait hand-off).
//!
//! # Security Model
//! - Every user pointer is validated before the kernel touches it
//! - A bad pointer kills the calling process, never the kernel
//! - Non-fatal failures are reported to user code as sentinel values
//!
//! # Collaborators
//! Storage, console, loader, page tables and the scheduler are consumed
//! through the traits in [`fs`], [`drivers::console`], [`kernel`] and [`mm`].

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]

extern crate alloc;

pub mod drivers;
pub mod fs;
pub mod kernel;
pub mod mm;
pub mod process;
pub mod syscall;
pub mod trap;

#[cfg(test)]
mod testing;

pub use kernel::{Collaborators, Kernel, Loader, Machine, Scheduler, SpawnError};
pub use process::{Pid, Process};
pub use syscall::SyscallError;
pub use trap::{handle_trap, Outcome, TrapFrame};
