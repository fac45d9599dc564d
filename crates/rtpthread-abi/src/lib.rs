//! # rtpthread-abi
//!
//! Hosts `rtpthread-core`'s shim logic with two concrete pieces a real
//! target still needs: a [`Kernel`](rtpthread_core::kernel::Kernel)
//! implementation, and the `extern "C"` symbol boundary a C/C++ runtime
//! links against.
//!
//! - [`sim_kernel`]: [`sim_kernel::SimKernel`], a kernel simulated over
//!   `std::thread`/`std::sync`, for development and tests off real hardware.
//! - [`errno_abi`]: thread-local ambient error storage (`__errno_location`).
//! - [`pthread_abi`]: the literal `pthread_*` ABI surface, instantiated over
//!   `SimKernel`.
//! - [`safe`]: a small ergonomic `Result`-returning convenience API over the
//!   same registry, for callers that would rather not touch raw pointers.
//!
//! A real embedded target swaps in its own `Kernel` implementation in place
//! of `SimKernel` and re-instantiates [`pthread_abi`]'s functions against
//! it; nothing in `rtpthread-core` changes.

pub mod errno_abi;
pub mod pthread_abi;
pub mod safe;
pub mod sim_kernel;

pub use sim_kernel::SimKernel;
