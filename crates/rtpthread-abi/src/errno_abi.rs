//! Thread-local ambient error storage.
//!
//! A small subset of this shim's API — `pthread_self`, `pthread_detach`, and
//! `pthread_join` — reports its error both as a return code and through this
//! ambient cell, the same dual channel glibc's own `errno` convention uses.
//! Static-mutex promotion is not among them: a promotion failure is never
//! reported directly, only surfaced indirectly via the subsequent lock
//! attempt's own return code.

use std::cell::Cell;

use libc::c_int;

thread_local! {
    static ERRNO: Cell<c_int> = const { Cell::new(0) };
}

/// Set the calling thread's ambient error value.
pub fn set_errno(value: c_int) {
    ERRNO.with(|cell| cell.set(value));
}

/// Read the calling thread's ambient error value.
pub fn errno() -> c_int {
    ERRNO.with(Cell::get)
}

/// POSIX `__errno_location`: address of the calling thread's errno cell.
#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn __errno_location() -> *mut c_int {
    ERRNO.with(|cell| cell.as_ptr())
}
