//! Thin surface over the RTOS kernel this shim is layered on.
//!
//! Every other module in this crate is generic over `K: Kernel` and calls
//! nothing else into the kernel. A concrete `Kernel` implementation is
//! supplied by whatever hosts this shim — a real RTOS port for firmware, or
//! a simulated kernel over OS threads for development and tests (see
//! `rtpthread-abi::sim_kernel::SimKernel`).
//!
//! Heap allocation is deliberately not part of this trait: the crate uses
//! Rust's `alloc` (`Box`, `Vec`) as the idiomatic surface over the kernel
//! heap, the same way a `no_std` firmware crate relies on a
//! `#[global_allocator]` that the application wires to the kernel's own
//! `alloc`/`free`.

/// A blocking-wait duration understood by the kernel's semaphore and
/// recursive-mutex primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    /// Block until the primitive is available.
    Forever,
    /// Block for at most this many kernel ticks.
    Ticks(u32),
}

impl Timeout {
    /// `0`-tick timeout: "poll, do not block."
    pub const POLL: Timeout = Timeout::Ticks(0);
}

/// Capabilities this shim consumes from the underlying kernel.
///
/// All methods are associated functions, not instance methods: a kernel is a
/// process-wide singleton, and every implementor of this trait models one
/// concrete kernel binding (so the whole shim is monomorphized per target,
/// with zero runtime dispatch overhead).
pub trait Kernel: 'static {
    /// Opaque handle to a kernel task. Two handles compare equal iff they
    /// name the same task.
    type Task: Copy + Eq;
    /// Opaque handle to a kernel semaphore / binary or recursive mutex.
    type Sem: Copy;
    /// Storage for a binary mutex created before any heap exists (used only
    /// by the thread registry's own guarding mutex). Lives inside whatever
    /// `static` the application places the registry in, so it is available
    /// at kernel-object-creation time with no allocation.
    type StaticStorage: 'static;

    /// Zeroed/initial value for [`Kernel::StaticStorage`], usable in a
    /// `const` context.
    const STATIC_STORAGE_INIT: Self::StaticStorage;

    /// Spawn a new kernel task running `entry(arg)`. Returns `None` on
    /// resource exhaustion.
    fn spawn(
        entry: extern "C" fn(*mut u8),
        arg: *mut u8,
        priority: u8,
        stack_bytes: usize,
        name: &str,
    ) -> Option<Self::Task>;

    /// Delete a kernel task. `None` means "delete the calling task" and does
    /// not return.
    fn delete(task: Option<Self::Task>);

    /// Handle of the calling task.
    fn current() -> Self::Task;

    /// Wake `target` from a pending [`Kernel::notify_wait`].
    fn notify(target: Self::Task);

    /// Block the calling task until notified. `forever == false` is not used
    /// by this shim (every wait in the protocol is unbounded) but is part of
    /// the adapter surface for completeness. Returns whether a notification
    /// was observed.
    fn notify_wait(forever: bool) -> bool;

    /// Create a binary mutex backed by static (pre-heap) storage.
    fn binary_mutex_create_static(storage: &'static Self::StaticStorage) -> Option<Self::Sem>;

    /// Create a heap-allocated binary (normal) mutex.
    fn mutex_create() -> Option<Self::Sem>;

    /// Create a heap-allocated recursive mutex.
    fn recursive_mutex_create() -> Option<Self::Sem>;

    /// Take a binary semaphore/mutex. Returns `false` on timeout/failure.
    fn sem_take(sem: Self::Sem, timeout: Timeout) -> bool;
    /// Give (release) a binary semaphore/mutex.
    fn sem_give(sem: Self::Sem);
    /// Take a recursive mutex (nested acquisition by the holder succeeds).
    fn recursive_take(sem: Self::Sem, timeout: Timeout) -> bool;
    /// Give (release) one level of a recursive mutex.
    fn recursive_give(sem: Self::Sem);
    /// Destroy a semaphore/mutex kernel object.
    fn sem_delete(sem: Self::Sem);

    /// Run `f` with all pre-emption blocked on this CPU.
    fn critical_section<R>(f: impl FnOnce() -> R) -> R;

    /// Block for `ticks` kernel ticks. `0` means "yield: requeue at the end
    /// of this task's priority band."
    fn delay(ticks: u32);
}
