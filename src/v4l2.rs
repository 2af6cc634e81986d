//! Raw kernel interface: syscall wrappers and ioctl request codes.

mod api;
pub use api::*;

pub mod vidioc;
