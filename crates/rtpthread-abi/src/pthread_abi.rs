//! `extern "C"` `pthread_*` surface, instantiated over [`SimKernel`].
//!
//! This is the symbol boundary a C/C++ runtime links against — the thread
//! registry lives in a single process-wide `static`, every function
//! validates its raw-pointer arguments before delegating to
//! `rtpthread_core`, and the handful of calls that also write the ambient
//! error variable do so via [`crate::errno_abi`].
//!
//! Validate-then-delegate throughout: null-check raw pointers, then call
//! straight into the safe core. Simplified for a target that owns its own
//! `pthread.h` (no glibc symbol interposition, no futex-backed mutex word —
//! the kernel adapter already supplies a real mutex primitive).

use libc::c_int;
use std::ffi::c_void;

use rtpthread_core::mutex::{self, MutexAttr, MutexCell};
use rtpthread_core::registry::Registry;
use rtpthread_core::thread::{self, StartRoutine, ThreadAttr, ThreadHandle};
use rtpthread_core::{cond, errno};

use crate::errno_abi::set_errno;
use crate::sim_kernel::SimKernel;

/// Opaque thread identifier: the address of a [`ThreadHandle`].
pub type pthread_t = usize;

/// Placeholder for attribute objects this shim rejects outright: any
/// non-null `pthread_attr_t*` makes `create` fail with `ENOSYS`.
#[repr(C)]
pub struct pthread_attr_t {
    _private: (),
}

/// `pthread_mutex_t` equivalent: a [`MutexCell`] over [`SimKernel`]. Declare
/// static mutexes with [`PTHREAD_MUTEX_INITIALIZER`].
pub type pthread_mutex_t = MutexCell<SimKernel>;

/// `pthread_mutexattr_t` equivalent.
pub type pthread_mutexattr_t = MutexAttr;

/// Condition-variable placeholder type. `pthread_cond_wait`/`_signal` are
/// no-op stubs; this type exists only so the ABI surface has a
/// pointer to accept.
#[repr(C)]
pub struct pthread_cond_t {
    _private: (),
}

pub const PTHREAD_MUTEX_NORMAL: c_int = mutex::MUTEX_NORMAL;
pub const PTHREAD_MUTEX_RECURSIVE: c_int = mutex::MUTEX_RECURSIVE;

/// `const fn` equivalent of the `PTHREAD_MUTEX_INITIALIZER` macro: a static
/// mutex cell holding the [`mutex::STATIC_INIT`] sentinel.
pub const fn pthread_mutex_initializer() -> pthread_mutex_t {
    MutexCell::new_static()
}

/// The single process-wide thread registry backing both this `extern "C"`
/// surface and [`crate::safe`]'s convenience wrappers.
pub(crate) static REGISTRY: Registry<SimKernel> = Registry::new();

unsafe fn handle_from_raw(raw: pthread_t) -> Option<ThreadHandle<SimKernel>> {
    if raw == 0 {
        return None;
    }
    // SAFETY: non-null, and every caller of this helper re-validates
    // registry membership before touching the pointee.
    Some(unsafe { ThreadHandle::from_raw(raw) })
}

/// POSIX `pthread_create`.
#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn pthread_create(
    thread_out: *mut pthread_t,
    attr: *const pthread_attr_t,
    start_routine: Option<StartRoutine>,
    arg: *mut c_void,
) -> c_int {
    if thread_out.is_null() || start_routine.is_none() {
        return errno::EINVAL;
    }
    let attr_ref: Option<&ThreadAttr> = if attr.is_null() {
        None
    } else {
        // A non-null attribute object is rejected with `ENOSYS` regardless
        // of contents; the core never dereferences it.
        Some(&ThreadAttr)
    };
    let entry = start_routine.unwrap_or_else(|| unreachable!("checked non-None above"));
    match thread::create(&REGISTRY, attr_ref, entry, arg) {
        Ok(handle) => {
            // SAFETY: `thread_out` is non-null, checked above.
            unsafe { *thread_out = handle.as_raw() };
            0
        }
        Err(e) => e,
    }
}

/// POSIX `pthread_join`.
#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn pthread_join(thread: pthread_t, retval: *mut *mut c_void) -> c_int {
    // SAFETY: `handle_from_raw` only constructs the handle; `thread::join`
    // re-validates registry membership before any dereference.
    let Some(handle) = (unsafe { handle_from_raw(thread) }) else {
        return errno::ESRCH;
    };
    let mut out = core::ptr::null_mut();
    let code = if retval.is_null() {
        thread::join(&REGISTRY, handle, None)
    } else {
        thread::join(&REGISTRY, handle, Some(&mut out))
    };
    if !retval.is_null() {
        // SAFETY: caller-provided non-null out slot.
        unsafe { *retval = out };
    }
    if code != 0 {
        set_errno(code);
    }
    code
}

/// POSIX `pthread_detach`.
#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn pthread_detach(thread: pthread_t) -> c_int {
    // SAFETY: see `pthread_join`.
    let Some(handle) = (unsafe { handle_from_raw(thread) }) else {
        set_errno(errno::ESRCH);
        return errno::ESRCH;
    };
    let code = thread::detach(&REGISTRY, handle);
    if code != 0 {
        set_errno(code);
    }
    code
}

/// POSIX `pthread_self`. Returns `0` (an invalid handle) and sets the
/// ambient error on failure, rather than returning an integer error code
/// cast to a handle.
#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn pthread_self() -> pthread_t {
    match thread::current(&REGISTRY) {
        Ok(handle) => handle.as_raw(),
        Err(e) => {
            set_errno(e);
            0
        }
    }
}

/// POSIX `pthread_equal`.
#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn pthread_equal(a: pthread_t, b: pthread_t) -> c_int {
    c_int::from(a == b)
}

/// POSIX `pthread_yield`/`sched_yield`.
#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn pthread_yield() -> c_int {
    thread::yield_now::<SimKernel>()
}

/// POSIX `sched_yield`, an alias for [`pthread_yield`] on this target.
#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn sched_yield() -> c_int {
    thread::yield_now::<SimKernel>()
}

/// Unimplemented: thread cancellation is out of scope for this shim.
#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn pthread_cancel(thread: pthread_t) -> c_int {
    let _ = thread;
    errno::ENOSYS
}

// ===========================================================================
// Mutex attribute operations
// ===========================================================================

/// POSIX `pthread_mutexattr_init`.
#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn pthread_mutexattr_init(attr: *mut pthread_mutexattr_t) -> c_int {
    if attr.is_null() {
        return errno::EINVAL;
    }
    // SAFETY: non-null, caller-owned storage.
    unsafe { *attr = MutexAttr::init() };
    0
}

/// POSIX `pthread_mutexattr_destroy`.
#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn pthread_mutexattr_destroy(attr: *mut pthread_mutexattr_t) -> c_int {
    if attr.is_null() {
        return errno::EINVAL;
    }
    // SAFETY: non-null, caller-owned storage.
    unsafe { (*attr).destroy() }
}

/// POSIX `pthread_mutexattr_settype`.
#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn pthread_mutexattr_settype(
    attr: *mut pthread_mutexattr_t,
    ty: c_int,
) -> c_int {
    if attr.is_null() {
        return errno::EINVAL;
    }
    // SAFETY: non-null, caller-owned storage.
    unsafe { (*attr).settype(ty) }
}

/// POSIX `pthread_mutexattr_gettype`. Unimplemented.
#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn pthread_mutexattr_gettype(
    attr: *const pthread_mutexattr_t,
    _out_type: *mut c_int,
) -> c_int {
    if attr.is_null() {
        return errno::EINVAL;
    }
    // SAFETY: non-null, caller-owned storage.
    unsafe { (*attr).gettype() }
}

// ===========================================================================
// Mutex operations
// ===========================================================================

/// POSIX `pthread_mutex_init`.
#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn pthread_mutex_init(
    cell: *mut pthread_mutex_t,
    attr: *const pthread_mutexattr_t,
) -> c_int {
    if cell.is_null() {
        return errno::EINVAL;
    }
    let attr_ref = if attr.is_null() {
        None
    } else {
        // SAFETY: non-null, caller-owned storage that outlives this call.
        Some(unsafe { &*attr })
    };
    // SAFETY: non-null, caller-owned storage.
    mutex::init(unsafe { &*cell }, attr_ref)
}

/// POSIX `pthread_mutex_destroy`.
#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn pthread_mutex_destroy(cell: *mut pthread_mutex_t) -> c_int {
    if cell.is_null() {
        return errno::EINVAL;
    }
    // SAFETY: non-null, caller-owned storage.
    mutex::destroy(unsafe { &*cell })
}

/// POSIX `pthread_mutex_lock`.
#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn pthread_mutex_lock(cell: *mut pthread_mutex_t) -> c_int {
    if cell.is_null() {
        return errno::EINVAL;
    }
    // SAFETY: non-null, caller-owned storage.
    mutex::lock(unsafe { &*cell })
}

/// POSIX `pthread_mutex_trylock`.
#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn pthread_mutex_trylock(cell: *mut pthread_mutex_t) -> c_int {
    if cell.is_null() {
        return errno::EINVAL;
    }
    // SAFETY: non-null, caller-owned storage.
    mutex::trylock(unsafe { &*cell })
}

/// POSIX `pthread_mutex_unlock`.
#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn pthread_mutex_unlock(cell: *mut pthread_mutex_t) -> c_int {
    if cell.is_null() {
        return errno::EINVAL;
    }
    // SAFETY: non-null, caller-owned storage.
    mutex::unlock(unsafe { &*cell })
}

// ===========================================================================
// Condition-variable stubs
// ===========================================================================

/// POSIX `pthread_cond_wait`. No-op stub.
#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn pthread_cond_wait(
    _cond: *mut pthread_cond_t,
    _mutex: *mut pthread_mutex_t,
) -> c_int {
    cond::cond_wait()
}

/// POSIX `pthread_cond_signal`. No-op stub.
#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn pthread_cond_signal(_cond: *mut pthread_cond_t) -> c_int {
    cond::cond_signal()
}
