//! File calls: create, remove, open, filesize, read, write, seek, tell, close.
//!
//! Every storage call runs inside the file system gate. Console input on
//! descriptor 0 is read without it, one blocking character at a time.

use alloc::vec;

use log::debug;

use crate::fs::Fd;
use crate::mm::VirtAddr;

use super::handler::{Completion, SyscallContext, SyscallError, SyscallResult};
use super::validate;

/// Create a file of `initial_size` bytes.
///
/// # Returns
/// 1 on success, 0 on failure. A name that is not UTF-8 cannot exist.
pub(super) fn sys_create(cx: &SyscallContext<'_>, name: VirtAddr, initial_size: u32) -> SyscallResult {
    let name = validate::validate_user_str(cx.space, name)?;
    let created = match core::str::from_utf8(&name) {
        Ok(name) => cx.kernel.gate().with(|fs| fs.create(name, initial_size)),
        Err(_) => false,
    };
    Ok(Completion::Value(created as u32))
}

/// Delete a file.
pub(super) fn sys_remove(cx: &SyscallContext<'_>, name: VirtAddr) -> SyscallResult {
    let name = validate::validate_user_str(cx.space, name)?;
    let removed = match core::str::from_utf8(&name) {
        Ok(name) => cx.kernel.gate().with(|fs| fs.remove(name)),
        Err(_) => false,
    };
    Ok(Completion::Value(removed as u32))
}

/// Open a file and install it in the caller's descriptor table.
///
/// # Returns
/// The new descriptor, or -1 if the file cannot be opened. No descriptor
/// value is consumed by a failed open.
pub(super) fn sys_open(cx: &SyscallContext<'_>, name: VirtAddr) -> SyscallResult {
    let name = validate::validate_user_str(cx.space, name)?;
    let name = core::str::from_utf8(&name).map_err(|_| SyscallError::NotFound)?;
    let file = cx
        .kernel
        .gate()
        .with(|fs| fs.open(name))
        .ok_or(SyscallError::NotFound)?;

    let inserted = cx.process.files().insert(file);
    match inserted {
        Ok(fd) => {
            debug!("[SYSCALL] open({:?}) = {}", name, fd);
            Ok(Completion::Value(fd.as_raw() as u32))
        }
        Err((e, file)) => {
            cx.kernel.gate().close(file);
            Err(e.into())
        }
    }
}

/// Size of the file open as `fd`.
pub(super) fn sys_filesize(cx: &SyscallContext<'_>, fd: i32) -> SyscallResult {
    let mut files = cx.process.files();
    let file = files.get_mut(Fd::from_raw(fd))?;
    let len = cx.kernel.gate().enter(|| file.length());
    Ok(Completion::Value(len))
}

/// Read up to `size` bytes from `fd` into the user buffer at `buf`.
///
/// # Returns
/// Bytes read, or -1 for a descriptor that is not open for reading.
/// Console input always produces exactly `size` bytes.
pub(super) fn sys_read(cx: &SyscallContext<'_>, fd: i32, buf: VirtAddr, size: usize) -> SyscallResult {
    let mut dst = validate::validate_user_write(cx.space, buf, size)?;
    let fd = Fd::from_raw(fd);

    if fd == Fd::STDIN {
        let console = cx.kernel.console();
        for i in 0..size {
            dst.put(i, console.getc());
        }
        return Ok(Completion::Value(size as u32));
    }

    let mut data = vec![0u8; size];
    let n = {
        let mut files = cx.process.files();
        let file = files.get_mut(fd)?;
        cx.kernel.gate().enter(|| file.read(&mut data))
    };
    let n = dst.copy_out(&data[..n.min(size)]);
    Ok(Completion::Value(n as u32))
}

/// Write `size` bytes from the user buffer at `buf` to `fd`.
///
/// # Returns
/// Bytes written, or -1 for a descriptor that is not open for writing.
/// Console output goes to the device in one call.
pub(super) fn sys_write(cx: &SyscallContext<'_>, fd: i32, buf: VirtAddr, size: usize) -> SyscallResult {
    let src = validate::validate_user_read(cx.space, buf, size)?;
    let data = src.copy_in();
    let fd = Fd::from_raw(fd);

    if fd == Fd::STDOUT {
        cx.kernel.console().putbuf(&data);
        return Ok(Completion::Value(data.len() as u32));
    }

    let mut files = cx.process.files();
    let file = files.get_mut(fd)?;
    let n = cx.kernel.gate().enter(|| file.write(&data));
    Ok(Completion::Value(n as u32))
}

/// Move the position of `fd` to `position`. Unknown descriptors are ignored.
pub(super) fn sys_seek(cx: &SyscallContext<'_>, fd: i32, position: u32) -> SyscallResult {
    let mut files = cx.process.files();
    match files.get_mut(Fd::from_raw(fd)) {
        Ok(file) => cx.kernel.gate().enter(|| file.seek(position)),
        Err(e) => debug!("[SYSCALL] seek({}): {}", fd, e),
    }
    Ok(Completion::Void)
}

/// Position of `fd`.
pub(super) fn sys_tell(cx: &SyscallContext<'_>, fd: i32) -> SyscallResult {
    let mut files = cx.process.files();
    let file = files.get_mut(Fd::from_raw(fd))?;
    let pos = cx.kernel.gate().enter(|| file.tell());
    Ok(Completion::Value(pos))
}

/// Close `fd`. Closing a descriptor that is not open does nothing.
pub(super) fn sys_close(cx: &SyscallContext<'_>, fd: i32) -> SyscallResult {
    let removed = cx.process.files().remove(Fd::from_raw(fd));
    match removed {
        Ok(file) => cx.kernel.gate().close(file),
        Err(e) => debug!("[SYSCALL] close({}): {}", fd, e),
    }
    Ok(Completion::Void)
}
