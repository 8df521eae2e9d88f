//! Process control calls: halt, exit, exec, wait.

use log::info;

use crate::mm::VirtAddr;
use crate::process::Pid;

use super::handler::{Completion, SyscallContext, SyscallError, SyscallResult};
use super::validate;

/// Power the machine off.
pub(super) fn sys_halt(cx: &SyscallContext<'_>) -> SyscallResult {
    info!("[SYSCALL] halt from {} (pid {})", cx.process.name(), cx.process.pid());
    cx.kernel.machine().power_off();
    Ok(Completion::Halt)
}

/// Terminate the caller with `status`.
pub(super) fn sys_exit(cx: &SyscallContext<'_>, status: i32) -> SyscallResult {
    cx.kernel.terminate(cx.process, status);
    Ok(Completion::Exit(status))
}

/// Spawn the program named by the command line at `cmdline`.
///
/// # Returns
/// The child's pid, or -1 if it could not be spawned or loaded.
pub(super) fn sys_exec(cx: &SyscallContext<'_>, cmdline: VirtAddr) -> SyscallResult {
    let bytes = validate::validate_user_str(cx.space, cmdline)?;
    let cmdline = core::str::from_utf8(&bytes).map_err(|_| SyscallError::LoadFailed)?;
    let pid = cx.kernel.exec(cx.process, cmdline)?;
    Ok(Completion::Value(pid.as_raw() as u32))
}

/// Wait for child `pid` and return its exit status.
pub(super) fn sys_wait(cx: &SyscallContext<'_>, pid: i32) -> SyscallResult {
    let status = cx.kernel.wait(cx.process, Pid::from_raw(pid))?;
    Ok(Completion::Value(status as u32))
}
