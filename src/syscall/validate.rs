//! System Call Input Validation
//!
//! Provides validation for every pointer a user program hands to the kernel.
//!
//! # Security Principles
//! - Validate ALL user memory before use
//! - Fail-secure: any missing condition rejects the address
//! - Never dereference an address that failed a check
//! - Copy into kernel memory once validated (no TOCTOU on user bytes)
//!
//! A byte is valid user memory when it is non-null, strictly below
//! `PHYS_BASE`, and its page is mapped present and user-accessible in the
//! calling process's address space.

use alloc::vec::Vec;

use crate::mm::{AddressSpace, PageFlags, VirtAddr, PAGE_SIZE};

use super::handler::SyscallError;

/// Check a single user address.
pub fn check_addr(space: &dyn AddressSpace, va: VirtAddr) -> bool {
    check_with(space, va, PageFlags::USER_RO)
}

fn check_with(space: &dyn AddressSpace, va: VirtAddr, required: PageFlags) -> bool {
    if va.is_null() || !va.is_user() {
        return false;
    }
    match space.lookup(va) {
        Some(flags) => flags.contains(required),
        None => false,
    }
}

/// Check every byte of `[va, va + size)`.
///
/// A zero-length buffer is trivially valid. Mappings are page granular,
/// so one probe per touched page covers every byte in it.
pub fn check_buffer(space: &dyn AddressSpace, va: VirtAddr, size: usize) -> bool {
    check_range(space, va, size, PageFlags::USER_RO)
}

/// Like [`check_buffer`], but the kernel is going to write into the range.
pub fn check_buffer_writable(space: &dyn AddressSpace, va: VirtAddr, size: usize) -> bool {
    check_range(space, va, size, PageFlags::USER_RW)
}

fn check_range(space: &dyn AddressSpace, va: VirtAddr, size: usize, required: PageFlags) -> bool {
    if size == 0 {
        return true;
    }
    let last = match va.checked_add(size - 1) {
        Some(last) => last,
        None => return false,
    };

    let mut probe = va;
    loop {
        if !check_with(space, probe, required) {
            return false;
        }
        // Next page start, or done once it passes the last byte.
        match probe.align_down().checked_add(PAGE_SIZE) {
            Some(next) if next <= last => probe = next,
            _ => return true,
        }
    }
}

/// Length of the NUL-terminated user string at `va`, excluding the
/// terminator, or `None` if an invalid byte comes before it.
pub fn user_str_len(space: &dyn AddressSpace, va: VirtAddr) -> Option<usize> {
    let mut len = 0;
    loop {
        let addr = va.checked_add(len)?;
        if !check_addr(space, addr) {
            return None;
        }
        if space.load(addr) == 0 {
            return Some(len);
        }
        len += 1;
    }
}

/// Check a NUL-terminated user string.
pub fn check_str(space: &dyn AddressSpace, va: VirtAddr) -> bool {
    user_str_len(space, va).is_some()
}

/// A validated user buffer the kernel reads from.
pub struct UserBuffer<'a> {
    space: &'a dyn AddressSpace,
    addr: VirtAddr,
    len: usize,
}

impl UserBuffer<'_> {
    /// Buffer length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check for an empty buffer.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Copy the buffer into kernel memory.
    pub fn copy_in(&self) -> Vec<u8> {
        (0..self.len)
            .map(|i| self.space.load(VirtAddr::new(self.addr.as_usize() + i)))
            .collect()
    }
}

/// A validated, writable user buffer the kernel writes into.
pub struct UserBufferMut<'a> {
    space: &'a dyn AddressSpace,
    addr: VirtAddr,
    len: usize,
}

impl UserBufferMut<'_> {
    /// Buffer length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check for an empty buffer.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Store one byte at `offset` within the buffer.
    ///
    /// Offsets past the end are ignored.
    pub fn put(&mut self, offset: usize, byte: u8) {
        if offset < self.len {
            self.space.store(VirtAddr::new(self.addr.as_usize() + offset), byte);
        }
    }

    /// Copy kernel bytes out to the buffer, returning how many were stored.
    pub fn copy_out(&mut self, src: &[u8]) -> usize {
        let n = src.len().min(self.len);
        for (i, &byte) in src[..n].iter().enumerate() {
            self.put(i, byte);
        }
        n
    }
}

/// Validate a user-space read buffer.
///
/// # Security Checks
/// 1. Length does not overflow the address space
/// 2. Every touched page is non-null, below `PHYS_BASE`, present and user
pub fn validate_user_read(
    space: &dyn AddressSpace,
    ptr: VirtAddr,
    len: usize,
) -> Result<UserBuffer<'_>, SyscallError> {
    if !check_buffer(space, ptr, len) {
        return Err(SyscallError::BadAddress);
    }
    Ok(UserBuffer {
        space,
        addr: ptr,
        len,
    })
}

/// Validate a user-space write buffer.
///
/// Same as read validation, plus every page must be writable.
pub fn validate_user_write(
    space: &dyn AddressSpace,
    ptr: VirtAddr,
    len: usize,
) -> Result<UserBufferMut<'_>, SyscallError> {
    if !check_buffer_writable(space, ptr, len) {
        return Err(SyscallError::BadAddress);
    }
    Ok(UserBufferMut {
        space,
        addr: ptr,
        len,
    })
}

/// Validate a NUL-terminated user string and copy it into the kernel.
pub fn validate_user_str(space: &dyn AddressSpace, ptr: VirtAddr) -> Result<Vec<u8>, SyscallError> {
    let len = user_str_len(space, ptr).ok_or(SyscallError::BadAddress)?;
    Ok((0..len)
        .map(|i| space.load(VirtAddr::new(ptr.as_usize() + i)))
        .collect())
}
