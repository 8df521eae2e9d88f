//! Process Address Space Contract
//!
//! The page-table subsystem is outside this crate. The system call layer
//! only needs to ask "is this page mapped, and how" and, once an address
//! has passed validation, to move single bytes in and out of it.

use bitflags::bitflags;

use super::address::VirtAddr;

bitflags! {
    /// Attributes of a mapped user page.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PageFlags: u32 {
        /// Page is present in the page table.
        const PRESENT = 1 << 0;
        /// Page may be written.
        const WRITABLE = 1 << 1;
        /// Page is accessible from user mode.
        const USER = 1 << 2;

        /// Ordinary read-only user page (code, rodata).
        const USER_RO = Self::PRESENT.bits() | Self::USER.bits();
        /// Ordinary read/write user page (data, stack).
        const USER_RW = Self::USER_RO.bits() | Self::WRITABLE.bits();
    }
}

/// The calling process's address space as seen from the kernel.
///
/// `load` and `store` are only ever called for addresses whose page was
/// reported by `lookup` with the required flags. A real kernel implements
/// them as a volatile access through its direct map.
pub trait AddressSpace: Send + Sync {
    /// Page-table lookup for `va`, `None` if nothing is mapped there.
    fn lookup(&self, va: VirtAddr) -> Option<PageFlags>;

    /// Read one byte at a validated address.
    fn load(&self, va: VirtAddr) -> u8;

    /// Write one byte at a validated, writable address.
    fn store(&self, va: VirtAddr, byte: u8);
}
