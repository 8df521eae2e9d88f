//! Console Device
//!
//! Console input backs descriptor 0 and console output backs descriptor 1.
//! The device itself lives outside this crate.

use alloc::format;

/// The console device.
pub trait Console: Send + Sync {
    /// Read one character, blocking until input is available.
    fn getc(&self) -> u8;

    /// Write a buffer in one call.
    fn putbuf(&self, buf: &[u8]);
}

/// Print the termination line for a process.
pub fn print_exit(console: &dyn Console, name: &str, status: i32) {
    // One putbuf per line.
    let line = format!("{}: exit({})\n", name, status);
    console.putbuf(line.as_bytes());
}
