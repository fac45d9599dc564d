//! Thread creation, the creation/exit/join rendezvous, detach, and identity.
//!
//! Every function here takes a `&'static Registry<K>` explicitly: a `no_std`
//! generic crate cannot declare `static REGISTRY: Registry<ConcreteKernel>`
//! for an unknown `K`, so the one process-wide registry is owned by whatever
//! application or ABI crate picks a concrete `Kernel`, encapsulating the
//! registry behind a single record with explicit init, with the record's
//! `static` placement pushed out to the instantiation site. The trampoline
//! recovers that same registry reference by carrying it inside the
//! trampoline argument it is spawned with.

use core::ffi::c_void;
use core::ptr::NonNull;

use alloc::boxed::Box;

use crate::errno;
use crate::kernel::Kernel;
use crate::registry::{self, Registry, ThreadDescriptor, ThreadStateInternal};

/// Default priority and stack size used for every spawned thread.
pub const DEFAULT_PRIORITY: u8 = 8;
pub const DEFAULT_STACK_BYTES: usize = 0x2000;

/// User entry point signature: POSIX `void *(*)(void *)`, return value
/// discarded — this shim never propagates it through `join`.
pub type StartRoutine = extern "C" fn(*mut c_void) -> *mut c_void;

/// Placeholder for `pthread_attr_t`. The shim accepts only `None`; any
/// concrete attribute object makes `create` fail with `ENOSYS`.
pub struct ThreadAttr;

/// Opaque thread handle: the address of its [`ThreadDescriptor`].
pub struct ThreadHandle<K: Kernel>(NonNull<ThreadDescriptor<K>>);

impl<K: Kernel> Clone for ThreadHandle<K> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<K: Kernel> Copy for ThreadHandle<K> {}
impl<K: Kernel> PartialEq for ThreadHandle<K> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
impl<K: Kernel> Eq for ThreadHandle<K> {}

// SAFETY: a `ThreadHandle` is pure pointer identity, exactly like a POSIX
// `pthread_t`; every access to the pointee goes through a registry-mutex-
// guarded operation in this module, so the handle value itself is sound to
// pass between threads — which any realistic caller does constantly (a
// parent handing a child's handle to a third task for joining).
unsafe impl<K: Kernel> Send for ThreadHandle<K> {}
unsafe impl<K: Kernel> Sync for ThreadHandle<K> {}

impl<K: Kernel> ThreadHandle<K> {
    /// The handle's pointer identity as a bare integer, for ABI boundaries
    /// that need a `pthread_t`-shaped opaque scalar: the opaque thread
    /// handle exposed to callers is the address of its descriptor.
    pub fn as_raw(self) -> usize {
        self.0.as_ptr() as usize
    }

    /// Reconstruct a handle from a value previously returned by
    /// [`ThreadHandle::as_raw`].
    ///
    /// # Safety
    ///
    /// `raw` must be a non-zero value produced by `as_raw` on a handle whose
    /// descriptor has not since been freed (the registry, not this function,
    /// is the source of truth for whether that descriptor is still live —
    /// every lookup in this module re-validates membership under the
    /// registry mutex before dereferencing).
    pub unsafe fn from_raw(raw: usize) -> Self {
        // SAFETY: caller contract above.
        ThreadHandle(unsafe { NonNull::new_unchecked(raw as *mut ThreadDescriptor<K>) })
    }
}

struct TrampolineArg<K: Kernel> {
    entry: StartRoutine,
    user_arg: *mut c_void,
    registry: &'static Registry<K>,
}

/// Create a new thread running `entry(arg)`.
///
/// `attr` must be `None` — a non-null attribute object is rejected with
/// `ENOSYS`; scheduling-policy attributes are out of scope for this shim.
pub fn create<K: Kernel>(
    registry: &'static Registry<K>,
    attr: Option<&ThreadAttr>,
    entry: StartRoutine,
    arg: *mut c_void,
) -> Result<ThreadHandle<K>, i32> {
    if attr.is_some() {
        return Err(errno::ENOSYS);
    }

    let targ_ptr = Box::into_raw(Box::new(TrampolineArg::<K> {
        entry,
        user_arg: arg,
        registry,
    }));

    let task = match K::spawn(
        trampoline::<K>,
        targ_ptr.cast::<u8>(),
        DEFAULT_PRIORITY,
        DEFAULT_STACK_BYTES,
        "pthread",
    ) {
        Some(task) => task,
        None => {
            // SAFETY: `targ_ptr` was just allocated above and has not been
            // handed to any other owner.
            unsafe { drop(Box::from_raw(targ_ptr)) };
            return Err(errno::EAGAIN);
        }
    };

    let desc_ptr = Box::into_raw(Box::new(ThreadDescriptor::<K> {
        kernel_task: task,
        state: ThreadStateInternal::Run,
        detached: false,
        joiner_task: None,
    }));
    // SAFETY: just allocated via `Box::into_raw`, never null.
    let desc = unsafe { NonNull::new_unchecked(desc_ptr) };

    let insert_result = registry.with_registry_locked(|entries| {
        registry::insert(entries, desc);
    });
    if let Err(e) = insert_result {
        // SAFETY: neither allocation has been published anywhere else.
        unsafe {
            drop(Box::from_raw(desc_ptr));
            drop(Box::from_raw(targ_ptr));
        }
        K::delete(Some(task));
        return Err(e);
    }

    // The child's trampoline blocks in `notify_wait` until this point, so
    // `self()`/`join()` can never race against its own insertion.
    K::notify(task);

    Ok(ThreadHandle(desc))
}

/// The kernel-task entry point this shim installs for every created thread.
extern "C" fn trampoline<K: Kernel>(raw_arg: *mut u8) {
    let targ_ptr = raw_arg.cast::<TrampolineArg<K>>();

    // Step 1: wait for the creator's notification. The registry already
    // contains our descriptor by the time this returns.
    K::notify_wait(true);

    // SAFETY: `targ_ptr` is the allocation `create` made via
    // `Box::into_raw`; it is read here and freed below, exactly once.
    let (entry, user_arg, registry) =
        unsafe { ((*targ_ptr).entry, (*targ_ptr).user_arg, (*targ_ptr).registry) };

    // Step 2: run user code. Return value discarded.
    let _ = entry(user_arg);

    // Step 3: free the trampoline argument.
    // SAFETY: no other reference to this allocation exists or ever will.
    unsafe { drop(Box::from_raw(targ_ptr)) };

    // Step 4: publish our fate under the registry mutex.
    let current = K::current();
    let _ = registry.with_registry_locked(|entries| {
        let Some(desc) = registry::find_descriptor_by_task(entries, current) else {
            // Our own descriptor vanished — cannot happen under the
            // invariants this shim maintains, but there is nothing more
            // defensive to do than proceed to self-delete.
            return;
        };
        // SAFETY: `desc` was just found live in the registry, so it is
        // still a valid, exclusively-held-by-us-under-the-mutex allocation.
        let detached = unsafe { desc.as_ref().detached };
        let joiner = unsafe { desc.as_ref().joiner_task };
        if detached {
            registry::unlink_and_free(entries, desc);
        } else if let Some(joiner_task) = joiner {
            K::notify(joiner_task);
        } else {
            // SAFETY: exclusive access under the registry mutex.
            unsafe {
                (*desc.as_ptr()).state = ThreadStateInternal::Exited;
            }
        }
    });

    // Step 5: delete self. Must be the last action — no memory access after
    // this, since a joiner may free our descriptor concurrently with us
    // reaching this point.
    K::delete(None);
}

/// Wait for `handle` to finish. Always writes a null pointer into
/// `*out_retval` if provided — this shim never propagates a return value.
pub fn join<K: Kernel>(
    registry: &'static Registry<K>,
    handle: ThreadHandle<K>,
    out_retval: Option<&mut *mut c_void>,
) -> i32 {
    enum Action<K: Kernel> {
        Done(i32),
        Wait(ThreadHandle<K>),
    }

    let current = K::current();
    let action = registry.with_registry_locked(|entries| {
        let Some(_) = entries.iter().find(|p| **p == handle.0) else {
            return Action::Done(errno::ESRCH);
        };
        // SAFETY: descriptor found live in the registry under the mutex.
        let target = unsafe { handle.0.as_ref() };
        if target.joiner_task.is_some() {
            return Action::Done(errno::EINVAL);
        }
        if target.kernel_task == current {
            return Action::Done(errno::EDEADLK);
        }
        if let Some(caller_desc) = registry::find_descriptor_by_task(entries, current) {
            // SAFETY: same as above.
            let caller = unsafe { caller_desc.as_ref() };
            if caller.joiner_task == Some(target.kernel_task) {
                return Action::Done(errno::EDEADLK);
            }
        }
        let state = target.state;
        match state {
            ThreadStateInternal::Run => {
                // SAFETY: exclusive access under the registry mutex; the
                // shared reference `target` above was last used to read
                // `state` just before this write.
                unsafe {
                    (*handle.0.as_ptr()).joiner_task = Some(current);
                }
                Action::Wait(handle)
            }
            ThreadStateInternal::Exited => {
                registry::unlink_and_free(entries, handle.0);
                Action::Done(0)
            }
        }
    });

    let write_null = |out_retval: Option<&mut *mut c_void>| {
        if let Some(slot) = out_retval {
            *slot = core::ptr::null_mut();
        }
    };

    match action {
        Ok(Action::Done(code)) => {
            write_null(out_retval);
            code
        }
        Ok(Action::Wait(handle)) => {
            K::notify_wait(true);
            let reacquired = registry.with_registry_locked(|entries| {
                registry::unlink_and_free(entries, handle.0);
            });
            write_null(out_retval);
            match reacquired {
                Ok(()) => 0,
                Err(_) => errno::ENOMSG,
            }
        }
        Err(e) => e,
    }
}

/// Mark `handle` as detached. Legal in any state; if the thread has already
/// exited without a joiner, the descriptor is reclaimed immediately here
/// rather than leaked, closing the latent leak a naive flip-the-flag
/// implementation would have.
pub fn detach<K: Kernel>(registry: &'static Registry<K>, handle: ThreadHandle<K>) -> i32 {
    let result = registry.with_registry_locked(|entries| {
        if entries.iter().find(|p| **p == handle.0).is_none() {
            return errno::ESRCH;
        }
        // SAFETY: exclusive access under the registry mutex.
        let already_exited = unsafe {
            (*handle.0.as_ptr()).detached = true;
            (*handle.0.as_ptr()).state == ThreadStateInternal::Exited
        };
        if already_exited {
            registry::unlink_and_free(entries, handle.0);
        }
        0
    });
    match result {
        Ok(code) => code,
        Err(e) => e,
    }
}

/// The calling thread's own handle, or `Err` if it has none (never created
/// via [`create`]) or the registry mutex could not be taken.
pub fn current<K: Kernel>(registry: &'static Registry<K>) -> Result<ThreadHandle<K>, i32> {
    let current = K::current();
    let found = registry.with_registry_locked(|entries| {
        registry::find_descriptor_by_task(entries, current)
    })?;
    found.map(ThreadHandle).ok_or(errno::EINVAL)
}

/// Bitwise handle equality.
pub fn equal<K: Kernel>(a: ThreadHandle<K>, b: ThreadHandle<K>) -> bool {
    a == b
}

/// Request a rescheduling hint from the kernel. Always succeeds.
pub fn yield_now<K: Kernel>() -> i32 {
    K::delay(0);
    0
}

/// Unimplemented: thread cancellation is out of scope for this shim.
pub fn cancel<K: Kernel>(_handle: ThreadHandle<K>) -> i32 {
    errno::ENOSYS
}

/// Unimplemented.
pub fn once() -> i32 {
    errno::ENOSYS
}
