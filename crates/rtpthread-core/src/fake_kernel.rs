//! Minimal single-threaded [`Kernel`] mock used only by this crate's own
//! in-module unit tests (registry/thread/mutex `mod tests`).
//!
//! There is no real concurrency here: `spawn` defers running the trampoline
//! until the matching `notify` call, exactly mirroring the creation
//! handshake's real ordering (insert-then-notify), so the child observes the
//! registry exactly as it would under a real kernel — but everything still
//! happens on one OS thread, synchronously, which is enough to exercise every
//! code path that does not itself require genuine contention (double-join,
//! static-mutex racing, cross-thread recursive-mutex exclusion — those live
//! in `tests/lifecycle.rs` / `tests/mutex.rs` against a real multi-threaded
//! mock instead).

extern crate std;

use std::cell::Cell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::kernel::{Kernel, Timeout};

pub struct FakeKernel;

struct Pending {
    entry: extern "C" fn(*mut u8),
    arg: usize,
}

struct SemState {
    recursive: bool,
    held: bool,
    depth: u32,
    owner: u64,
}

fn pending_tasks() -> &'static Mutex<HashMap<u64, Pending>> {
    static CELL: std::sync::OnceLock<Mutex<HashMap<u64, Pending>>> = std::sync::OnceLock::new();
    CELL.get_or_init(|| Mutex::new(HashMap::new()))
}

fn sems() -> &'static Mutex<HashMap<u64, SemState>> {
    static CELL: std::sync::OnceLock<Mutex<HashMap<u64, SemState>>> = std::sync::OnceLock::new();
    CELL.get_or_init(|| Mutex::new(HashMap::new()))
}

static NEXT_TASK: AtomicU64 = AtomicU64::new(1);
static NEXT_SEM: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CURRENT: Cell<u64> = const { Cell::new(0) };
}

/// Pretend the calling (test) thread is task `id` for the duration of a
/// manually-staged "other thread" scenario (e.g. trylock contention). Returns
/// the previous value so the caller can restore it.
pub fn set_current(id: u64) -> u64 {
    CURRENT.with(|c| c.replace(id))
}

impl Kernel for FakeKernel {
    type Task = u64;
    type Sem = u64;
    type StaticStorage = ();

    const STATIC_STORAGE_INIT: Self::StaticStorage = ();

    fn spawn(
        entry: extern "C" fn(*mut u8),
        arg: *mut u8,
        _priority: u8,
        _stack_bytes: usize,
        _name: &str,
    ) -> Option<Self::Task> {
        let id = NEXT_TASK.fetch_add(1, Ordering::Relaxed);
        pending_tasks().lock().unwrap().insert(
            id,
            Pending {
                entry,
                arg: arg as usize,
            },
        );
        Some(id)
    }

    fn delete(_task: Option<Self::Task>) {}

    fn current() -> Self::Task {
        CURRENT.with(Cell::get)
    }

    fn notify(target: Self::Task) {
        let task = pending_tasks().lock().unwrap().remove(&target);
        if let Some(Pending { entry, arg }) = task {
            let prev = set_current(target);
            entry(arg as *mut u8);
            set_current(prev);
        }
        // Not a pending spawn (e.g. waking a joiner): nothing to run here,
        // the joiner's own `notify_wait` below is a trivial immediate return.
    }

    fn notify_wait(_forever: bool) -> bool {
        true
    }

    fn binary_mutex_create_static(_storage: &'static Self::StaticStorage) -> Option<Self::Sem> {
        Self::mutex_create()
    }

    fn mutex_create() -> Option<Self::Sem> {
        Some(new_sem(false))
    }

    fn recursive_mutex_create() -> Option<Self::Sem> {
        Some(new_sem(true))
    }

    fn sem_take(sem: Self::Sem, timeout: Timeout) -> bool {
        take(sem, timeout, false)
    }

    fn sem_give(sem: Self::Sem) {
        give(sem);
    }

    fn recursive_take(sem: Self::Sem, timeout: Timeout) -> bool {
        take(sem, timeout, true)
    }

    fn recursive_give(sem: Self::Sem) {
        give(sem);
    }

    fn sem_delete(sem: Self::Sem) {
        sems().lock().unwrap().remove(&sem);
    }

    fn critical_section<R>(f: impl FnOnce() -> R) -> R {
        f()
    }

    fn delay(_ticks: u32) {}
}

fn new_sem(recursive: bool) -> u64 {
    let id = NEXT_SEM.fetch_add(1, Ordering::Relaxed);
    sems().lock().unwrap().insert(
        id,
        SemState {
            recursive,
            held: false,
            depth: 0,
            owner: 0,
        },
    );
    id
}

fn take(sem: u64, timeout: Timeout, recursive_caller: bool) -> bool {
    let me = FakeKernel::current();
    let mut map = sems().lock().unwrap();
    let Some(s) = map.get_mut(&sem) else {
        return false;
    };
    let is_recursive = s.recursive || recursive_caller;
    if !s.held {
        s.held = true;
        s.depth = 1;
        s.owner = me;
        true
    } else if s.owner == me && is_recursive {
        s.depth += 1;
        true
    } else {
        // No second OS thread exists to ever release the mutex in this
        // single-threaded mock, so a `Forever` wait on contention would hang
        // the test process; every unit test built on this mock stages
        // contention only through `trylock`-shaped (`Timeout::POLL`) probes.
        let _ = timeout;
        false
    }
}

fn give(sem: u64) {
    let mut map = sems().lock().unwrap();
    let Some(s) = map.get_mut(&sem) else { return };
    if s.depth > 1 {
        s.depth -= 1;
        return;
    }
    s.held = false;
    s.depth = 0;
}
