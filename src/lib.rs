//! Memory-mapped frame capture from video4linux devices.
//!
//! A [`CaptureSession`] negotiates capabilities and format with a capture device, maps a small
//! [`BufferPool`] shared with the driver and cycles its buffers through the driver's queue.
//! Every dequeued buffer is copied into an owned [`Frame`] and immediately re-queued, so callers
//! never see memory the device may still write to.
//!
//! ```no_run
//! use v4l_capture::{CaptureSession, FourCC};
//!
//! let mut session = CaptureSession::open("/dev/video0")?;
//! session.negotiate_format(1280, 720, FourCC::new(b"YUYV"))?;
//! session.allocate_buffers(4)?;
//! session.start()?;
//!
//! let frames = (0..5)
//!     .map(|_| session.get_frame())
//!     .collect::<Result<Vec<_>, _>>()?;
//! session.stop()?;
//!
//! for frame in &frames {
//!     println!("frame #{}: {} bytes", frame.meta().sequence, frame.len());
//! }
//! # Ok::<(), v4l_capture::Error>(())
//! ```

pub use v4l2_sys as v4l_sys;

pub mod v4l2;

pub mod buffer;

mod capability;
pub use capability::{Capabilities, Flags as CapabilityFlags};

mod config;
pub use config::CaptureConfig;

pub mod device;
pub use device::{Device, DeviceHandle};

mod error;
pub use error::{errno_hint, Error, Result};

mod format;
pub use format::{Description as FormatDescription, Format};

mod fourcc;
pub use fourcc::FourCC;

mod fraction;
pub use fraction::Fraction;

mod frame;
pub use frame::Frame;

pub mod log;

pub mod parameters;
pub use parameters::Parameters;

pub mod pool;
pub use pool::BufferPool;

mod session;
pub use session::{CaptureSession, Frames};

pub mod state;
pub use state::{Operation, State};

mod timestamp;
pub use timestamp::Timestamp;
