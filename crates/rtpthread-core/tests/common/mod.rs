//! A `std`-backed, genuinely multi-threaded [`Kernel`] mock for this crate's
//! integration tests — real OS threads standing in for kernel tasks, real
//! `std::sync` primitives standing in for kernel semaphores, so the
//! contention scenarios in `lifecycle.rs`/`mutex.rs` (double join, static-
//! mutex race, recursive-mutex exclusion) exercise genuine concurrency
//! rather than the single-threaded `FakeKernel` the crate's own in-module
//! unit tests use. Independent of (and deliberately similar in shape to)
//! `rtpthread-abi::sim_kernel::SimKernel`, since this crate does not and
//! should not depend on its own ABI-hosting sibling.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, OnceLock};
use std::thread;

use rtpthread_core::kernel::{Kernel, Timeout};

pub type Task = u64;
pub type Sem = u64;

#[derive(Default)]
struct NotifyCell {
    signalled: bool,
}

struct State {
    notify_cells: Mutex<HashMap<Task, std::sync::Arc<(Mutex<NotifyCell>, Condvar)>>>,
    sems: Mutex<HashMap<Sem, std::sync::Arc<SemObject>>>,
}

enum SemKind {
    Binary,
    Recursive,
}

struct SemObject {
    kind: SemKind,
    inner: Mutex<SemInner>,
    cv: Condvar,
}

struct SemInner {
    held_by: Option<Task>,
    depth: u32,
}

fn state() -> &'static State {
    static STATE: OnceLock<State> = OnceLock::new();
    STATE.get_or_init(|| State {
        notify_cells: Mutex::new(HashMap::new()),
        sems: Mutex::new(HashMap::new()),
    })
}

fn notify_cell_for(task: Task) -> std::sync::Arc<(Mutex<NotifyCell>, Condvar)> {
    let mut cells = state().notify_cells.lock().unwrap();
    cells
        .entry(task)
        .or_insert_with(|| std::sync::Arc::new((Mutex::new(NotifyCell::default()), Condvar::new())))
        .clone()
}

thread_local! {
    static MY_TASK: std::cell::Cell<Option<Task>> = const { std::cell::Cell::new(None) };
}

static NEXT_TASK: AtomicU64 = AtomicU64::new(1);
static NEXT_SEM: AtomicU64 = AtomicU64::new(1);

fn assign_task_id() -> Task {
    let id = NEXT_TASK.fetch_add(1, Ordering::Relaxed);
    MY_TASK.with(|c| c.set(Some(id)));
    id
}

pub struct ThreadKernel;

impl Kernel for ThreadKernel {
    type Task = Task;
    type Sem = Sem;
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
        let (tx, rx) = std::sync::mpsc::channel::<Task>();
        let builder = thread::Builder::new().name(name);
        let spawned = builder.spawn(move || {
            let id = assign_task_id();
            tx.send(id).expect("parent dropped spawn handshake channel");
            // SAFETY: `arg_addr` round-trips the pointer handed to `spawn`.
            entry(arg_addr as *mut u8);
        });
        match spawned {
            Ok(handle) => {
                let id = rx.recv().ok()?;
                drop(handle);
                Some(id)
            }
            Err(_) => None,
        }
    }

    fn delete(_task: Option<Self::Task>) {}

    fn current() -> Self::Task {
        MY_TASK.with(|c| c.get().unwrap_or_else(assign_task_id))
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

fn create_sem(kind: SemKind) -> Option<Sem> {
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

fn sem_object(sem: Sem) -> Option<std::sync::Arc<SemObject>> {
    state().sems.lock().unwrap().get(&sem).cloned()
}

fn take_sem(sem: Sem, timeout: Timeout, recursive_caller: bool) -> bool {
    let Some(obj) = sem_object(sem) else {
        return false;
    };
    let is_recursive = matches!(obj.kind, SemKind::Recursive) || recursive_caller;
    let me = ThreadKernel::current();
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
            _ => match timeout {
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
            },
        }
    }
}

fn give_sem(sem: Sem) {
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
