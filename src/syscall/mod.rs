//! System Call Interface
//!
//! The boundary between user programs and the kernel.
//!
//! # Security Model
//! - Whitelist approach: only the calls in `handler::numbers` do anything
//! - All user memory is validated before use
//! - Invalid user memory terminates the caller, never the kernel
//! - Other failures return -1 (or false) to the caller
//!
//! # Syscalls
//! - 0: halt()
//! - 1: exit(status)
//! - 2: exec(cmdline) -> pid
//! - 3: wait(pid) -> status
//! - 4: create(name, size) -> bool
//! - 5: remove(name) -> bool
//! - 6: open(name) -> fd
//! - 7: filesize(fd) -> size
//! - 8: read(fd, buf, size) -> bytes read
//! - 9: write(fd, buf, size) -> bytes written
//! - 10: seek(fd, position)
//! - 11: tell(fd) -> position
//! - 12: close(fd)

pub mod args;
mod file;
mod handler;
mod process;
pub mod validate;

pub use handler::{dispatch, numbers, Completion, SyscallContext, SyscallError};
