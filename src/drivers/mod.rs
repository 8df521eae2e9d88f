//! Device contracts used by the system call layer
//!
//! All drivers follow these principles:
//! - Output paths never fail from the caller's point of view
//! - Input paths may block; callers must not hold kernel locks across them

pub mod console;
