//! Ergonomic Rust convenience API over [`crate::pthread_abi`].
//!
//! Additive sugar, not a new protocol: every function here is a thin
//! `Result`-returning wrapper around the raw `extern "C"` boundary,
//! instantiated over [`SimKernel`].

use core::ffi::c_void;

use rtpthread_core::kernel::Kernel;
use rtpthread_core::mutex::{MUTEX_NORMAL, MUTEX_RECURSIVE, MutexAttr, MutexCell};
use rtpthread_core::registry::Registry;
use rtpthread_core::thread::{self, StartRoutine, ThreadHandle};
use rtpthread_core::{cond, errno};
use thiserror::Error;

use crate::sim_kernel::SimKernel;

/// Mirrors the POSIX error codes this shim can return, for callers who would
/// rather match on an enum than a bare `i32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PthreadError {
    #[error("no such thread")]
    NoSuchThread,
    #[error("operation would deadlock")]
    WouldDeadlock,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("resource temporarily unavailable")]
    WouldBlock,
    #[error("resource exhausted")]
    ResourceExhausted,
    #[error("mutex is busy")]
    Busy,
    #[error("operation not supported")]
    Unsupported,
    #[error("registry mutex reacquire failed after wake")]
    Internal,
    #[error("unrecognized error code {0}")]
    Other(i32),
}

impl PthreadError {
    fn from_code(code: i32) -> Self {
        match code {
            errno::ESRCH => PthreadError::NoSuchThread,
            errno::EDEADLK => PthreadError::WouldDeadlock,
            errno::EINVAL => PthreadError::InvalidArgument,
            errno::EAGAIN => PthreadError::WouldBlock,
            errno::ENOMEM => PthreadError::ResourceExhausted,
            errno::EBUSY => PthreadError::Busy,
            errno::ENOSYS => PthreadError::Unsupported,
            errno::ENOMSG => PthreadError::Internal,
            other => PthreadError::Other(other),
        }
    }
}

fn result_of(code: i32) -> Result<(), PthreadError> {
    if code == 0 {
        Ok(())
    } else {
        Err(PthreadError::from_code(code))
    }
}

fn registry() -> &'static Registry<SimKernel> {
    &crate::pthread_abi::REGISTRY
}

/// Spawn a new thread running `entry(arg)`. See [`thread::create`]; this
/// wrapper only accepts `attr == None` — attribute objects are
/// unsupported.
pub fn spawn(
    entry: StartRoutine,
    arg: *mut c_void,
) -> Result<ThreadHandle<SimKernel>, PthreadError> {
    thread::create(registry(), None, entry, arg).map_err(PthreadError::from_code)
}

/// Block until `handle`'s thread finishes. The shim never propagates a
/// return value, so this always yields `()` on success.
pub fn join(handle: ThreadHandle<SimKernel>) -> Result<(), PthreadError> {
    result_of(thread::join(registry(), handle, None))
}

/// Mark `handle` as detached.
pub fn detach(handle: ThreadHandle<SimKernel>) -> Result<(), PthreadError> {
    result_of(thread::detach(registry(), handle))
}

/// The calling thread's own handle.
pub fn current() -> Result<ThreadHandle<SimKernel>, PthreadError> {
    thread::current(registry()).map_err(PthreadError::from_code)
}

/// Bitwise handle equality.
pub fn equal(a: ThreadHandle<SimKernel>, b: ThreadHandle<SimKernel>) -> bool {
    thread::equal(a, b)
}

/// Request a rescheduling hint from the kernel.
pub fn yield_now() {
    let _ = thread::yield_now::<SimKernel>();
}

/// A statically or dynamically initialized mutex, generic over the
/// configured kernel. The `SimKernel`-backed alias below is what most
/// callers of this convenience API want.
pub type Mutex = MutexCell<SimKernel>;

/// `const fn` equivalent of `PTHREAD_MUTEX_INITIALIZER` for callers of this
/// module rather than the raw ABI.
pub const fn new_static_mutex() -> Mutex {
    MutexCell::new_static()
}

/// Mutex flavor, mirroring [`MUTEX_NORMAL`]/[`MUTEX_RECURSIVE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutexKind {
    Normal,
    Recursive,
}

/// Initialize `mutex` with the given kind (bypassing `pthread_mutexattr_t`
/// plumbing — this convenience layer builds the attribute object for you).
pub fn init_mutex(mutex: &Mutex, kind: MutexKind) -> Result<(), PthreadError> {
    let mut attr = MutexAttr::init();
    let ty = match kind {
        MutexKind::Normal => MUTEX_NORMAL,
        MutexKind::Recursive => MUTEX_RECURSIVE,
    };
    result_of(attr.settype(ty))?;
    result_of(rtpthread_core::mutex::init(mutex, Some(&attr)))
}

/// Lock `mutex`, blocking forever.
pub fn lock(mutex: &Mutex) -> Result<(), PthreadError> {
    result_of(rtpthread_core::mutex::lock(mutex))
}

/// Try to lock `mutex` without blocking.
pub fn trylock(mutex: &Mutex) -> Result<(), PthreadError> {
    result_of(rtpthread_core::mutex::trylock(mutex))
}

/// Unlock `mutex`.
pub fn unlock(mutex: &Mutex) -> Result<(), PthreadError> {
    result_of(rtpthread_core::mutex::unlock(mutex))
}

/// Destroy `mutex`. Fails with [`PthreadError::Busy`] if currently held.
pub fn destroy_mutex(mutex: &Mutex) -> Result<(), PthreadError> {
    result_of(rtpthread_core::mutex::destroy(mutex))
}

/// No-op stub: condition variables are not implemented.
pub fn cond_wait() {
    let _ = cond::cond_wait();
}

/// No-op stub: condition variables are not implemented.
pub fn cond_signal() {
    let _ = cond::cond_signal();
}
