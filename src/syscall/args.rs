//! System Call Argument Extraction
//!
//! User code pushes its arguments and then the call number, so at trap
//! time the saved stack pointer addresses the call number and the
//! arguments follow it one word apart:
//!
//! ```text
//! esp + 12 -> arg 2
//! esp +  8 -> arg 1
//! esp +  4 -> arg 0
//! esp      -> call number
//! ```
//!
//! The whole header (call number plus `MAX_ARGS` words) is validated once
//! before the first word is read.

use crate::mm::{AddressSpace, VirtAddr};

use super::handler::SyscallError;
use super::validate;

/// Width of one stack slot in the user ABI.
pub const WORD_SIZE: usize = 4;

/// Largest number of arguments any call takes.
pub const MAX_ARGS: usize = 3;

/// Words covered by the header check.
pub const HEADER_WORDS: usize = 1 + MAX_ARGS;

/// Cursor over the call frame on the user stack.
///
/// The cursor owns a copy of the stack pointer; the trap frame's own
/// `esp` is never advanced, so user execution resumes from it unchanged.
pub struct ArgCursor<'a> {
    space: &'a dyn AddressSpace,
    base: VirtAddr,
    index: usize,
}

impl<'a> ArgCursor<'a> {
    /// Validate the call header at `esp` and position the cursor on the
    /// call number.
    pub fn new(space: &'a dyn AddressSpace, esp: VirtAddr) -> Result<Self, SyscallError> {
        if !validate::check_buffer(space, esp, HEADER_WORDS * WORD_SIZE) {
            return Err(SyscallError::BadAddress);
        }
        Ok(Self {
            space,
            base: esp,
            index: 0,
        })
    }

    /// Read the next word and advance by one slot.
    ///
    /// Words inside the header were validated up front; anything beyond
    /// it is validated on its own before being read.
    pub fn next_word(&mut self) -> Result<u32, SyscallError> {
        let addr = self
            .index
            .checked_mul(WORD_SIZE)
            .and_then(|off| self.base.checked_add(off))
            .ok_or(SyscallError::BadAddress)?;
        if self.index >= HEADER_WORDS && !validate::check_buffer(self.space, addr, WORD_SIZE) {
            return Err(SyscallError::BadAddress);
        }

        let mut bytes = [0u8; WORD_SIZE];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = self.space.load(VirtAddr::new(addr.as_usize() + i));
        }
        self.index += 1;
        Ok(u32::from_le_bytes(bytes))
    }

    /// Next word as a signed integer (status, pid, descriptor).
    pub fn next_i32(&mut self) -> Result<i32, SyscallError> {
        self.next_word().map(|w| w as i32)
    }

    /// Next word as a user pointer.
    pub fn next_ptr(&mut self) -> Result<VirtAddr, SyscallError> {
        self.next_word().map(VirtAddr::from)
    }

    /// Next word as an unsigned size or position.
    pub fn next_usize(&mut self) -> Result<usize, SyscallError> {
        self.next_word().map(|w| w as usize)
    }
}
