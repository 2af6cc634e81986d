use std::{io, time::Duration};

use crate::state::{Operation, State};

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while driving a capture device
///
/// Variants raised by a failing device call carry the underlying OS error as their source, so
/// callers can still inspect the errno (see [`Error::raw_os_error`]).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("device not found or cannot be opened: {0}")]
    DeviceNotFound(#[source] io::Error),

    #[error("permission denied while opening device: {0}")]
    PermissionDenied(#[source] io::Error),

    #[error("device does not support streaming video capture: {reason}")]
    UnsupportedDevice {
        reason: String,
        #[source]
        source: Option<io::Error>,
    },

    #[error("device rejected format: {0}")]
    FormatRejected(#[source] io::Error),

    #[error("device rejected streaming parameters: {0}")]
    ParametersRejected(#[source] io::Error),

    #[error("device refused to allocate buffers: {0}")]
    BufferRequestFailed(#[source] io::Error),

    #[error("device granted {granted} buffer(s), at least {required} are required")]
    InsufficientBuffers { granted: u32, required: u32 },

    #[error("failed to map buffer {index}: {source}")]
    MappingFailed {
        index: u32,
        #[source]
        source: io::Error,
    },

    #[error("cannot {operation} while {state}")]
    InvalidStateTransition { operation: Operation, state: State },

    #[error("failed to start streaming: {0}")]
    StreamStartFailed(#[source] io::Error),

    #[error("failed to stop streaming: {0}")]
    StreamStopFailed(#[source] io::Error),

    #[error("failed to dequeue buffer: {0}")]
    DequeueFailed(#[source] io::Error),

    #[error("no frame within {0:?}")]
    DequeueTimedOut(Duration),

    #[error("failed to enqueue buffer {index}: {source}")]
    BufferEnqueueFailed {
        index: u32,
        #[source]
        source: io::Error,
    },

    #[error("driver reported {bytes_used} bytes for buffer {index} of {length} bytes")]
    CorruptBufferReport {
        index: u32,
        bytes_used: u32,
        length: usize,
    },
}

impl Error {
    /// Classifies a failed open(2)
    pub(crate) fn from_open(err: io::Error) -> Self {
        match err.raw_os_error() {
            Some(libc::EACCES) | Some(libc::EPERM) => Error::PermissionDenied(err),
            _ => Error::DeviceNotFound(err),
        }
    }

    /// Returns the underlying OS error, if any
    pub fn io_error(&self) -> Option<&io::Error> {
        match self {
            Error::DeviceNotFound(e)
            | Error::PermissionDenied(e)
            | Error::FormatRejected(e)
            | Error::ParametersRejected(e)
            | Error::BufferRequestFailed(e)
            | Error::StreamStartFailed(e)
            | Error::StreamStopFailed(e)
            | Error::DequeueFailed(e) => Some(e),
            Error::UnsupportedDevice { source, .. } => source.as_ref(),
            Error::MappingFailed { source, .. } | Error::BufferEnqueueFailed { source, .. } => {
                Some(source)
            }
            Error::InsufficientBuffers { .. }
            | Error::InvalidStateTransition { .. }
            | Error::DequeueTimedOut(_)
            | Error::CorruptBufferReport { .. } => None,
        }
    }

    /// Returns the errno reported by the OS, if any
    pub fn raw_os_error(&self) -> Option<i32> {
        self.io_error().and_then(io::Error::raw_os_error)
    }

    /// Explains the errno in V4L2 terms, if there is one
    ///
    /// # Example
    ///
    /// ```
    /// use std::io;
    /// use v4l_capture::Error;
    ///
    /// let err = Error::StreamStartFailed(io::Error::from_raw_os_error(libc::EBUSY));
    /// assert!(err.hint().unwrap().starts_with("EBUSY"));
    /// ```
    pub fn hint(&self) -> Option<&'static str> {
        self.raw_os_error().and_then(errno_hint)
    }
}

/// Meaning of the errno values V4L2 ioctls commonly report
pub fn errno_hint(errno: i32) -> Option<&'static str> {
    let hint = match errno {
        libc::EAGAIN => {
            "EAGAIN: the device cannot handle the request in its current state, or the request \
             would block on a descriptor opened in non-blocking mode"
        }
        libc::EBADF => "EBADF: the file descriptor is not valid",
        libc::EBUSY => {
            "EBUSY: the device is busy, typically because it is streaming or a hardware resource \
             is already claimed; fix the cause before retrying"
        }
        libc::EFAULT => "EFAULT: failure while copying data from or to userspace",
        libc::EINVAL => "EINVAL: one or more ioctl parameters are invalid or out of range",
        libc::ENODEV => "ENODEV: device not found or was removed",
        libc::ENOMEM => "ENOMEM: not enough memory to handle the request",
        libc::ENOTTY => {
            "ENOTTY: the ioctl is not supported by the driver, or the node is not a media device"
        }
        libc::ENOSPC => {
            "ENOSPC: the request would overcommit the USB bandwidth reserved for periodic \
             transfers"
        }
        libc::EPERM => "EPERM: permission denied",
        libc::EIO => "EIO: I/O error while communicating with the hardware",
        libc::ENXIO => "ENXIO: no device corresponding to this device special file exists",
        _ => return None,
    };
    Some(hint)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_errors_are_classified() {
        let err = Error::from_open(io::Error::from_raw_os_error(libc::EACCES));
        assert!(matches!(err, Error::PermissionDenied(_)));

        let err = Error::from_open(io::Error::from_raw_os_error(libc::ENOENT));
        assert!(matches!(err, Error::DeviceNotFound(_)));
        assert_eq!(err.raw_os_error(), Some(libc::ENOENT));
    }

    #[test]
    fn hints_cover_v4l2_errnos() {
        let err = Error::DequeueFailed(io::Error::from_raw_os_error(libc::ENODEV));
        assert_eq!(err.hint(), Some("ENODEV: device not found or was removed"));
        assert_eq!(errno_hint(libc::ENOENT), None);

        let err = Error::CorruptBufferReport {
            index: 0,
            bytes_used: 10,
            length: 4,
        };
        assert_eq!(err.hint(), None);
    }
}
