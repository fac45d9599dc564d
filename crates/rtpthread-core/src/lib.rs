//! # rtpthread-core
//!
//! Safe Rust logic for a POSIX-threads shim layered on top of a generic
//! pre-emptive real-time task kernel.
//!
//! This crate never touches kernel primitives directly: every capability it
//! needs from the underlying RTOS (task spawn/delete, semaphores, recursive
//! mutexes, critical sections) is named once, in [`kernel::Kernel`], and
//! every other module is generic over an implementation of that trait. No
//! `unsafe` is permitted at the crate level; the registry, thread-lifecycle,
//! and mutex modules, which manage pointer-identity handles and the
//! static-mutex sentinel cell, are the sole exceptions.

#![no_std]
#![deny(unsafe_code)]
#[cfg(test)]
extern crate std;

extern crate alloc;

pub mod cond;
pub mod errno;
#[cfg(test)]
mod fake_kernel;
pub mod kernel;
#[allow(unsafe_code)]
pub mod registry;
#[allow(unsafe_code)]
pub mod thread;
#[allow(unsafe_code)]
pub mod mutex;

pub use kernel::{Kernel, Timeout};
pub use mutex::{Mutex, MutexAttr, MutexCell};
pub use thread::{ThreadAttr, ThreadHandle};
