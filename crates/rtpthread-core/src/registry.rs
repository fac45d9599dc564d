//! Process-wide registry of live thread descriptors.
//!
//! One registry mutex guards the whole collection; every read or write of a
//! descriptor field that can change after insertion happens with that mutex
//! held ([`with_registry_locked`]). The registry itself is lazily created on
//! first use under a critical section so that concurrent first-callers race
//! to initialize it exactly once — closing the race a naive implementation
//! would hit by calling its `init()` unconditionally from every
//! `pthread_create`.

use core::cell::UnsafeCell;
use core::mem::MaybeUninit;
use core::ptr::NonNull;

use alloc::vec::Vec;

use crate::errno;
use crate::kernel::{Kernel, Timeout};

/// One entry per live thread. Its address is the opaque thread handle
/// ([`crate::thread::ThreadHandle`]).
pub struct ThreadDescriptor<K: Kernel> {
    pub kernel_task: K::Task,
    pub state: ThreadStateInternal,
    pub detached: bool,
    pub joiner_task: Option<K::Task>,
}

/// Internal mirror of [`crate::thread::ThreadState`], kept here so the
/// registry module does not depend on the thread module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadStateInternal {
    Run,
    Exited,
}

/// A one-shot, critical-section-guarded lazy cell. Used to create the
/// registry's own mutex before any heap exists, with exactly one winner
/// under concurrent first access.
struct InitCell<T> {
    initialized: UnsafeCell<bool>,
    value: UnsafeCell<MaybeUninit<T>>,
}

// SAFETY: access to `value` is only ever performed while holding
// `K::critical_section` (for the write) or after observing `initialized ==
// true` (for reads), which on a single-CPU pre-emptive kernel is a valid
// happens-before edge; multi-core kernels must implement `critical_section`
// with the appropriate cross-core fence.
unsafe impl<T: Send> Sync for InitCell<T> {}

impl<T> InitCell<T> {
    const fn new() -> Self {
        InitCell {
            initialized: UnsafeCell::new(false),
            value: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    fn get_or_init<K: Kernel>(&self, f: impl FnOnce() -> T) -> &T {
        K::critical_section(|| {
            // SAFETY: exclusive access while pre-emption is blocked.
            unsafe {
                if !*self.initialized.get() {
                    (*self.value.get()).write(f());
                    *self.initialized.get() = true;
                }
            }
        });
        // SAFETY: the critical section above guarantees initialization
        // completed before this point, on this or any other CPU, for any
        // caller that reaches here (it either performed the write itself or
        // observed `initialized == true` inside its own critical section).
        unsafe { (*self.value.get()).assume_init_ref() }
    }
}

struct RegistryState<K: Kernel> {
    mutex: K::Sem,
    entries: UnsafeCell<Vec<NonNull<ThreadDescriptor<K>>>>,
}

// SAFETY: `entries` is only ever touched while `mutex` is held.
unsafe impl<K: Kernel> Sync for RegistryState<K> {}
// SAFETY: `NonNull` opts out of `Send` by default, but these pointers are
// never aliased outside of `mutex`-guarded access and carry no thread
// affinity of their own (a descriptor is no more thread-bound than the
// kernel task it names); needed so `InitCell<RegistryState<K>>` (which
// requires its payload to be `Send` before it grants `Sync`) can back a
// `static Registry<K>`.
unsafe impl<K: Kernel> Send for RegistryState<K> {}

/// The process-wide thread registry. Applications declare exactly one
/// `static REGISTRY: Registry<ConcreteKernel> = Registry::new();` — the
/// `static` itself is the statically provided storage buffer the registry
/// mutex lives in.
pub struct Registry<K: Kernel> {
    storage: K::StaticStorage,
    cell: InitCell<RegistryState<K>>,
}

impl<K: Kernel> Registry<K> {
    pub const fn new() -> Self {
        Registry {
            storage: K::STATIC_STORAGE_INIT,
            cell: InitCell::new(),
        }
    }

    fn state(&'static self) -> &'static RegistryState<K> {
        self.cell.get_or_init::<K>(|| {
            // The registry mutex must exist before any joiner/creator can
            // touch the entries list; on exhaustion there is no recovery
            // path available to a `const`-context caller, so this mirrors
            // the kernel's own "mutex creation cannot fail" assumption for
            // statically-backed primitives.
            let mutex = K::binary_mutex_create_static(&self.storage)
                .expect("kernel failed to create the registry's static mutex");
            RegistryState {
                mutex,
                entries: UnsafeCell::new(Vec::new()),
            }
        })
    }

    /// Acquire the registry mutex for the duration of `f`. Fails with
    /// `EAGAIN` if the underlying take fails.
    pub fn with_registry_locked<R>(
        &'static self,
        f: impl FnOnce(&mut Vec<NonNull<ThreadDescriptor<K>>>) -> R,
    ) -> Result<R, i32> {
        let state = self.state();
        if !K::sem_take(state.mutex, Timeout::Forever) {
            return Err(errno::EAGAIN);
        }
        // SAFETY: exclusive access while the registry mutex is held.
        let entries = unsafe { &mut *state.entries.get() };
        let result = f(entries);
        K::sem_give(state.mutex);
        Ok(result)
    }
}

impl<K: Kernel> Default for Registry<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Linear scan for the descriptor's kernel task handle. Must be called with
/// the registry mutex held.
pub fn find_task_by_descriptor<K: Kernel>(
    entries: &[NonNull<ThreadDescriptor<K>>],
    desc: NonNull<ThreadDescriptor<K>>,
) -> Option<K::Task> {
    entries.iter().find(|p| **p == desc).map(|p| {
        // SAFETY: pointers in `entries` are always valid descriptor
        // allocations while the registry mutex is held.
        unsafe { p.as_ref().kernel_task }
    })
}

/// Linear scan for the descriptor owning a given kernel task handle. Must be
/// called with the registry mutex held.
pub fn find_descriptor_by_task<K: Kernel>(
    entries: &[NonNull<ThreadDescriptor<K>>],
    task: K::Task,
) -> Option<NonNull<ThreadDescriptor<K>>> {
    entries
        .iter()
        .copied()
        // SAFETY: see above.
        .find(|p| unsafe { p.as_ref().kernel_task } == task)
}

/// Insert a freshly allocated descriptor. Must be called with the registry
/// mutex held.
pub fn insert<K: Kernel>(
    entries: &mut Vec<NonNull<ThreadDescriptor<K>>>,
    desc: NonNull<ThreadDescriptor<K>>,
) {
    entries.push(desc);
}

/// Remove a descriptor from the registry and free its allocation. Must be
/// called with the registry mutex held; panics if `desc` is not present —
/// every call site has already located `desc` in the same locked section.
pub fn unlink_and_free<K: Kernel>(
    entries: &mut Vec<NonNull<ThreadDescriptor<K>>>,
    desc: NonNull<ThreadDescriptor<K>>,
) {
    let idx = entries
        .iter()
        .position(|p| *p == desc)
        .expect("unlink_and_free: descriptor not present in registry");
    entries.swap_remove(idx);
    // SAFETY: `desc` was allocated via `alloc::boxed::Box::into_raw` in
    // `thread::create` and is removed from the registry in exactly one
    // place before being freed here — descriptor deletion is performed by
    // exactly one party.
    unsafe {
        drop(alloc::boxed::Box::from_raw(desc.as_ptr()));
    }
}
