//! Memory management view needed by the system call layer
//!
//! Provides:
//! - Virtual address type and the user/kernel split
//! - The page-table lookup contract of a process address space
//!
//! # Security Principles
//! - Kernel addresses are never considered user memory
//! - Only validated addresses reach the byte accessors

mod address;
mod space;

pub use address::{VirtAddr, PAGE_MASK, PAGE_SHIFT, PAGE_SIZE, PHYS_BASE};
pub use space::{AddressSpace, PageFlags};
