//! A simulated kernel over OS threads, for development and testing off real
//! RTOS hardware.
//!
//! Tasks become OS threads, semaphores become condition-variable-guarded
//! state machines, and scheduler-relevant events are logged via the `log`
//! crate rather than driving a real timer/interrupt-backed scheduler. A real
//! target replaces this module with a binding to the actual RTOS; nothing
//! above `rtpthread_core::kernel::Kernel` needs to change.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, OnceLock};
use std::thread;

use rtpthread_core::kernel::{Kernel, Timeout};

/// Task identity in the simulation: a monotonically increasing id, distinct
/// from `std::thread::ThreadId` so it is `Copy` + trivially comparable and
/// so the main (non-pthread) thread can be assigned id `0` on first use.
pub type SimTask = u64;

/// Semaphore identity in the simulation: an index into a process-wide table
/// of semaphore objects.
pub type SimSem = u64;

#[derive(Default)]
struct NotifyCell {
    signalled: bool,
}

struct SimState {
    notify_cells: Mutex<HashMap<SimTask, std::sync::Arc<(Mutex<NotifyCell>, Condvar)>>>,
    sems: Mutex<HashMap<SimSem, std::sync::Arc<SemObject>>>,
}

enum SemKind {
    Binary,
    Recursive,
}

struct SemObject {
    kind: SemKind,
    // `held_by` is `Some(owner)` while taken; `depth` counts nested
    // recursive acquisitions by the same owner.
    inner: Mutex<SemInner>,
    cv: Condvar,
}

struct SemInner {
    held_by: Option<SimTask>,
    depth: u32,
}

fn state() -> &'static SimState {
    static STATE: OnceLock<SimState> = OnceLock::new();
    STATE.get_or_init(|| SimState {
        notify_cells: Mutex::new(HashMap::new()),
        sems: Mutex::new(HashMap::new()),
    })
}

fn notify_cell_for(task: SimTask) -> std::sync::Arc<(Mutex<NotifyCell>, Condvar)> {
    let mut cells = state().notify_cells.lock().unwrap();
    cells
        .entry(task)
        .or_insert_with(|| std::sync::Arc::new((Mutex::new(NotifyCell::default()), Condvar::new())))
        .clone()
}

thread_local! {
    static MY_TASK: std::cell::Cell<Option<SimTask>> = const { std::cell::Cell::new(None) };
}

static NEXT_TASK: AtomicU64 = AtomicU64::new(1);
static NEXT_SEM: AtomicU64 = AtomicU64::new(1);

fn assign_task_id() -> SimTask {
    let id = NEXT_TASK.fetch_add(1, Ordering::Relaxed);
    MY_TASK.with(|c| c.set(Some(id)));
    id
}

/// Kernel backed by `std::thread`/`std::sync`, used by [`crate::pthread_abi`]
/// in tests and by any non-embedded host of this crate.
pub struct SimKernel;

impl Kernel for SimKernel {
    type Task = SimTask;
    type Sem = SimSem;
    /// The simulation has no pre-heap phase, so static storage for the
    /// registry mutex is simply unused padding.
    type StaticStorage = ();

    const STATIC_STORAGE_INIT: Self::StaticStorage = ();

    fn spawn(
        entry: extern "C" fn(*mut u8),
        arg: *mut u8,
        _priority: u8,
        _stack_bytes: usize,
        name: &str,
    ) -> Option<Self::Task> {
        let arg_addr = arg as usize;
        let name = name.to_string();
        let (tx, rx) = std::sync::mpsc::channel::<SimTask>();
        let builder = thread::Builder::new().name(name.clone());
        let spawned = builder.spawn(move || {
            let id = assign_task_id();
            log::trace!("sim_kernel: task {id} ({name}) started");
            tx.send(id).expect("parent dropped spawn handshake channel");
            // SAFETY: `arg_addr` round-trips the pointer `rtpthread_core`
            // handed to `spawn`; it is passed straight through unchanged.
            entry(arg_addr as *mut u8);
        });
        match spawned {
            Ok(handle) => {
                let id = rx.recv().ok()?;
                // The `JoinHandle` is intentionally dropped: this shim's own
                // join/detach protocol (not `std::thread`'s) governs
                // lifecycle, matching a real RTOS task handle's semantics.
                drop(handle);
                Some(id)
            }
            Err(e) => {
                log::warn!("sim_kernel: spawn failed: {e}");
                None
            }
        }
    }

    fn delete(task: Option<Self::Task>) {
        match task {
            None => log::trace!("sim_kernel: task {:?} self-deleting", current_or_unassigned()),
            Some(t) => log::trace!("sim_kernel: delete requested for task {t} (no-op: the OS thread governs its own lifetime)"),
        }
        // A real kernel frees the task control block and stack here. The
        // simulated kernel's "task" is just an OS thread; for `None` (self
        // delete) this function returning lets the thread closure fall off
        // the end and the OS reclaims it. There is nothing to do for
        // deleting another (already-exited) task's handle.
    }

    fn current() -> Self::Task {
        MY_TASK.with(|c| match c.get() {
            Some(id) => id,
            None => {
                // First call on a thread rtpthread never spawned (e.g. the
                // process's main thread acting as a pthread caller).
                let id = assign_task_id();
                id
            }
        })
    }

    fn notify(target: Self::Task) {
        let cell = notify_cell_for(target);
        let (lock, cv) = &*cell;
        let mut guard = lock.lock().unwrap();
        guard.signalled = true;
        cv.notify_all();
    }

    fn notify_wait(forever: bool) -> bool {
        let me = Self::current();
        let cell = notify_cell_for(me);
        let (lock, cv) = &*cell;
        let mut guard = lock.lock().unwrap();
        if !forever {
            // This shim never requests a bounded notify_wait; treat it as an
            // immediate poll for completeness of the adapter surface.
            let signalled = guard.signalled;
            guard.signalled = false;
            return signalled;
        }
        while !guard.signalled {
            guard = cv.wait(guard).unwrap();
        }
        guard.signalled = false;
        true
    }

    fn binary_mutex_create_static(_storage: &'static Self::StaticStorage) -> Option<Self::Sem> {
        Self::mutex_create()
    }

    fn mutex_create() -> Option<Self::Sem> {
        create_sem(SemKind::Binary)
    }

    fn recursive_mutex_create() -> Option<Self::Sem> {
        create_sem(SemKind::Recursive)
    }

    fn sem_take(sem: Self::Sem, timeout: Timeout) -> bool {
        take_sem(sem, timeout, false)
    }

    fn sem_give(sem: Self::Sem) {
        give_sem(sem);
    }

    fn recursive_take(sem: Self::Sem, timeout: Timeout) -> bool {
        take_sem(sem, timeout, true)
    }

    fn recursive_give(sem: Self::Sem) {
        give_sem(sem);
    }

    fn sem_delete(sem: Self::Sem) {
        state().sems.lock().unwrap().remove(&sem);
    }

    fn critical_section<R>(f: impl FnOnce() -> R) -> R {
        // Single-process simulation: one process-wide lock stands in for
        // "block all pre-emption on this CPU."
        static GLOBAL: Mutex<()> = Mutex::new(());
        let _guard = GLOBAL.lock().unwrap();
        f()
    }

    fn delay(ticks: u32) {
        if ticks == 0 {
            thread::yield_now();
        } else {
            thread::sleep(std::time::Duration::from_millis(u64::from(ticks)));
        }
    }
}

fn current_or_unassigned() -> Option<SimTask> {
    MY_TASK.with(|c| c.get())
}

fn create_sem(kind: SemKind) -> Option<SimSem> {
    let id = NEXT_SEM.fetch_add(1, Ordering::Relaxed);
    let obj = std::sync::Arc::new(SemObject {
        kind,
        inner: Mutex::new(SemInner {
            held_by: None,
            depth: 0,
        }),
        cv: Condvar::new(),
    });
    state().sems.lock().unwrap().insert(id, obj);
    Some(id)
}

fn sem_object(sem: SimSem) -> Option<std::sync::Arc<SemObject>> {
    state().sems.lock().unwrap().get(&sem).cloned()
}

fn take_sem(sem: SimSem, timeout: Timeout, recursive_caller: bool) -> bool {
    let Some(obj) = sem_object(sem) else {
        return false;
    };
    let is_recursive = matches!(obj.kind, SemKind::Recursive) || recursive_caller;
    let me = SimKernel::current();
    let mut guard = obj.inner.lock().unwrap();
    loop {
        match guard.held_by {
            None => {
                guard.held_by = Some(me);
                guard.depth = 1;
                return true;
            }
            Some(owner) if owner == me && is_recursive => {
                guard.depth += 1;
                return true;
            }
            _ => {
                match timeout {
                    Timeout::Ticks(0) => return false,
                    Timeout::Forever => {
                        guard = obj.cv.wait(guard).unwrap();
                    }
                    Timeout::Ticks(ms) => {
                        let (g, result) = obj
                            .cv
                            .wait_timeout(guard, std::time::Duration::from_millis(u64::from(ms)))
                            .unwrap();
                        guard = g;
                        if result.timed_out() && guard.held_by.is_some() {
                            return false;
                        }
                    }
                }
            }
        }
    }
}

fn give_sem(sem: SimSem) {
    let Some(obj) = sem_object(sem) else { return };
    let mut guard = obj.inner.lock().unwrap();
    if guard.depth > 1 {
        guard.depth -= 1;
        return;
    }
    guard.held_by = None;
    guard.depth = 0;
    obj.cv.notify_all();
}
