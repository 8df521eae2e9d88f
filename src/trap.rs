//! Trap Entry from User Mode
//!
//! Classifies a trap taken from a user program and completes it.
//!
//! # Trap Kinds
//! - System call (`int $0x30`): dispatched, return value stored in `eax`
//! - Page fault: the program touched memory it does not own and dies
//!   with status -1
//! - Anything else: reported and resumed
//!
//! # Security Considerations
//! - The saved user stack pointer is only read, never advanced, so the
//!   program resumes from exactly the frame it trapped with
//! - The kernel never faults on behalf of user memory

use alloc::sync::Arc;

use log::{info, warn};

use crate::kernel::Kernel;
use crate::mm::{AddressSpace, VirtAddr};
use crate::process::Process;
use crate::syscall::{self, Completion};

/// Interrupt vector user programs use for system calls.
pub const SYSCALL_VECTOR: u32 = 0x30;

/// Page fault exception vector.
pub const PAGE_FAULT_VECTOR: u32 = 14;

/// Register state saved when user execution was interrupted.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrapFrame {
    /// Return value register
    pub eax: u32,
    /// Interrupt vector number
    pub vec_no: u32,
    /// Faulting address for page faults (CR2)
    pub cr2: u32,
    /// User instruction pointer
    pub eip: u32,
    /// User stack pointer
    pub esp: u32,
}

/// Trap kind decoded from the vector number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrapKind {
    Syscall,
    PageFault,
    Other(u32),
}

impl From<u32> for TrapKind {
    fn from(vec_no: u32) -> Self {
        match vec_no {
            SYSCALL_VECTOR => TrapKind::Syscall,
            PAGE_FAULT_VECTOR => TrapKind::PageFault,
            other => TrapKind::Other(other),
        }
    }
}

/// What the caller of the trap entry must do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Return to user mode with the (possibly updated) frame.
    Resume,
    /// The process terminated; its thread must be torn down.
    Exit(i32),
    /// The machine was powered off.
    Halt,
}

/// Handle a trap from `process` running in `space`.
pub fn handle_trap(
    kernel: &Arc<Kernel>,
    process: &Arc<Process>,
    space: &dyn AddressSpace,
    frame: &mut TrapFrame,
) -> Outcome {
    match TrapKind::from(frame.vec_no) {
        TrapKind::Syscall => {
            match syscall::dispatch(kernel, process, space, VirtAddr::from(frame.esp)) {
                Completion::Value(ret) => {
                    frame.eax = ret;
                    Outcome::Resume
                }
                Completion::Void => Outcome::Resume,
                Completion::Exit(status) => Outcome::Exit(status),
                Completion::Halt => Outcome::Halt,
            }
        }
        TrapKind::PageFault => {
            info!(
                "[TRAP] {} (pid {}): page fault at {:#010x}, eip {:#010x}",
                process.name(),
                process.pid(),
                frame.cr2,
                frame.eip
            );
            kernel.terminate(process, -1);
            Outcome::Exit(-1)
        }
        TrapKind::Other(vec_no) => {
            warn!("[TRAP] Unhandled vector {:#x} from user mode", vec_no);
            Outcome::Resume
        }
    }
}
