//! POSIX error codes returned by this shim.
//!
//! Values match the numeric assignments a Linux/glibc target expects, since
//! upper-layer C/C++ code compares against `<errno.h>` constants directly.

/// Operation not permitted / would deadlock's sibling codes start here;
/// this module only lists the codes this shim actually returns.
pub const ESRCH: i32 = 3;
pub const EAGAIN: i32 = 11;
pub const ENOMEM: i32 = 12;
pub const EBUSY: i32 = 16;
pub const EINVAL: i32 = 22;
pub const EDEADLK: i32 = 35;
pub const ENOSYS: i32 = 38;
pub const ENOMSG: i32 = 42;
