use std::os::raw::{c_int, c_void};
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use std::time::Duration;
use std::{io, mem};

use crate::buffer::{BufferInfo, Dequeued, Metadata};
use crate::error::{Error, Result};
use crate::format::Description as FormatDescription;
use crate::v4l2;
use crate::v4l_sys::*;
use crate::{Capabilities, Format, Parameters};

/// Operations a capture session consumes from a video device
///
/// [`DeviceHandle`] implements this on top of a kernel device node. Other implementations (for
/// example a scripted device in tests) can be injected into a session instead.
///
/// All calls report failures as [`io::Error`] so the errno survives until the session maps it to
/// an [`Error`].
pub trait Device {
    /// Query for device capabilities
    fn query_caps(&self) -> io::Result<Capabilities>;

    /// Returns the format currently in use
    fn format(&self) -> io::Result<Format>;

    /// Modifies the capture format and returns the actual format
    ///
    /// The driver tries to match the format parameters on a best effort basis.
    /// Thus, if the combination of format properties cannot be achieved, the closest possible
    /// settings are used and reported back.
    fn set_format(&self, fmt: &Format) -> io::Result<Format>;

    /// Returns a vector of valid formats for this device
    fn enum_formats(&self) -> io::Result<Vec<FormatDescription>>;

    /// Returns the streaming parameters, including the frame interval
    fn params(&self) -> io::Result<Parameters>;

    /// Modifies the streaming parameters and returns the ones the driver settled on
    fn set_params(&self, params: &Parameters) -> io::Result<Parameters>;

    /// Requests `count` memory-mapped buffers, returns the number granted by the driver
    ///
    /// Requesting zero buffers frees all of them.
    fn request_buffers(&self, count: u32) -> io::Result<u32>;

    /// Returns offset and length of the buffer at `index`
    fn query_buffer(&self, index: u32) -> io::Result<BufferInfo>;

    /// Maps a buffer into the address space
    fn map(&self, buf: &BufferInfo) -> io::Result<NonNull<u8>>;

    /// Removes a mapping established by [`Device::map`]
    ///
    /// # Safety
    ///
    /// `ptr` and `length` must describe a live mapping returned by `map` on this device, and no
    /// reference into the region may outlive this call.
    unsafe fn unmap(&self, ptr: NonNull<u8>, length: usize) -> io::Result<()>;

    /// Insert a buffer into the drivers' incoming queue
    fn queue(&self, index: u32) -> io::Result<()>;

    /// Remove a buffer from the drivers' outgoing queue
    ///
    /// Blocks until a buffer is filled unless the device was opened in non-blocking mode, in
    /// which case [`io::ErrorKind::WouldBlock`] is reported when nothing is ready.
    fn dequeue(&self) -> io::Result<Dequeued>;

    /// Start streaming, takes exclusive ownership of a device
    fn stream_on(&self) -> io::Result<()>;

    /// Stop streaming, returns all queued buffers to the application
    fn stream_off(&self) -> io::Result<()>;

    /// Waits until a filled buffer can be dequeued
    ///
    /// Returns `false` if the timeout elapsed first, `None` waits forever.
    fn poll(&self, timeout: Option<Duration>) -> io::Result<bool>;
}

/// Fails unless the capabilities describe a streaming video capture node
pub(crate) fn ensure_capture(caps: &Capabilities) -> Result<()> {
    if caps.supports_streaming_capture() {
        Ok(())
    } else {
        Err(Error::UnsupportedDevice {
            reason: format!("{} reports {}", caps.card, caps.capabilities),
            source: None,
        })
    }
}

/// Linux video4linux device node
///
/// Owns the file descriptor, which is closed exactly once when the handle is dropped. Buffer
/// pools keep the handle alive through an `Arc`, so the descriptor outlives every mapping made
/// through it.
pub struct DeviceHandle {
    /// raw OS file descriptor
    fd: c_int,
    /// device node path
    path: PathBuf,
}

impl DeviceHandle {
    /// Opens a capture device by path in blocking mode
    ///
    /// The node is opened for reading and writing, then its capabilities are queried to make
    /// sure it can stream video frames.
    ///
    /// # Arguments
    ///
    /// * `path` - Path (e.g. "/dev/video0")
    ///
    /// # Example
    ///
    /// ```
    /// use v4l_capture::DeviceHandle;
    /// let dev = DeviceHandle::open("/dev/video0");
    /// ```
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_flags(path.as_ref(), libc::O_RDWR)
    }

    /// Opens a capture device by path in non-blocking mode
    ///
    /// Dequeueing reports [`io::ErrorKind::WouldBlock`] instead of waiting for the hardware.
    pub fn open_nonblocking<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_flags(path.as_ref(), libc::O_RDWR | libc::O_NONBLOCK)
    }

    fn open_with_flags(path: &Path, flags: c_int) -> Result<Self> {
        let fd = v4l2::open(path, flags).map_err(Error::from_open)?;
        let dev = DeviceHandle {
            fd,
            path: path.to_path_buf(),
        };

        let caps = dev.query_caps().map_err(|e| Error::UnsupportedDevice {
            reason: "VIDIOC_QUERYCAP failed".to_string(),
            source: Some(e),
        })?;
        ensure_capture(&caps)?;

        Ok(dev)
    }

    /// Returns the raw file descriptor
    pub fn fd(&self) -> c_int {
        self.fd
    }

    /// Returns the device node path
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn buffer_desc(&self) -> v4l2_buffer {
        v4l2_buffer {
            type_: v4l2_buf_type_V4L2_BUF_TYPE_VIDEO_CAPTURE,
            memory: v4l2_memory_V4L2_MEMORY_MMAP,
            ..unsafe { mem::zeroed() }
        }
    }

    fn stream_ioctl(&self, request: v4l2::vidioc::_IOC_TYPE) -> io::Result<()> {
        let mut typ = v4l2_buf_type_V4L2_BUF_TYPE_VIDEO_CAPTURE;
        unsafe { v4l2::ioctl(self.fd, request, &mut typ as *mut _ as *mut c_void) }
    }
}

impl Drop for DeviceHandle {
    fn drop(&mut self) {
        if let Err(e) = v4l2::close(self.fd) {
            tracing::warn!(path = %self.path.display(), "failed to close device: {}", e);
        }
    }
}

impl Device for DeviceHandle {
    fn query_caps(&self) -> io::Result<Capabilities> {
        unsafe {
            let mut v4l2_caps: v4l2_capability = mem::zeroed();
            v4l2::ioctl(
                self.fd,
                v4l2::vidioc::VIDIOC_QUERYCAP,
                &mut v4l2_caps as *mut _ as *mut c_void,
            )?;

            Ok(Capabilities::from(v4l2_caps))
        }
    }

    fn format(&self) -> io::Result<Format> {
        unsafe {
            let mut v4l2_fmt = v4l2_format {
                type_: v4l2_buf_type_V4L2_BUF_TYPE_VIDEO_CAPTURE,
                ..mem::zeroed()
            };
            v4l2::ioctl(
                self.fd,
                v4l2::vidioc::VIDIOC_G_FMT,
                &mut v4l2_fmt as *mut _ as *mut c_void,
            )?;

            Ok(Format::from(v4l2_fmt.fmt.pix))
        }
    }

    fn set_format(&self, fmt: &Format) -> io::Result<Format> {
        unsafe {
            let mut v4l2_fmt = v4l2_format {
                type_: v4l2_buf_type_V4L2_BUF_TYPE_VIDEO_CAPTURE,
                ..mem::zeroed()
            };
            v4l2_fmt.fmt.pix = (*fmt).into();
            v4l2::ioctl(
                self.fd,
                v4l2::vidioc::VIDIOC_S_FMT,
                &mut v4l2_fmt as *mut _ as *mut c_void,
            )?;

            // the driver writes the format it settled on back into the argument
            Ok(Format::from(v4l2_fmt.fmt.pix))
        }
    }

    fn enum_formats(&self) -> io::Result<Vec<FormatDescription>> {
        let mut formats: Vec<FormatDescription> = Vec::new();
        let mut v4l2_fmt = v4l2_fmtdesc {
            index: 0,
            type_: v4l2_buf_type_V4L2_BUF_TYPE_VIDEO_CAPTURE,
            ..unsafe { mem::zeroed() }
        };

        loop {
            let ret = unsafe {
                v4l2::ioctl(
                    self.fd,
                    v4l2::vidioc::VIDIOC_ENUM_FMT,
                    &mut v4l2_fmt as *mut _ as *mut c_void,
                )
            };

            match ret {
                Ok(()) => formats.push(FormatDescription::from(v4l2_fmt)),
                // EINVAL marks the end of the list
                Err(e) if e.kind() == io::ErrorKind::InvalidInput => break,
                Err(e) => return Err(e),
            }

            v4l2_fmt.index += 1;
        }

        Ok(formats)
    }

    fn params(&self) -> io::Result<Parameters> {
        unsafe {
            let mut v4l2_params = v4l2_streamparm {
                type_: v4l2_buf_type_V4L2_BUF_TYPE_VIDEO_CAPTURE,
                ..mem::zeroed()
            };
            v4l2::ioctl(
                self.fd,
                v4l2::vidioc::VIDIOC_G_PARM,
                &mut v4l2_params as *mut _ as *mut c_void,
            )?;

            Ok(Parameters::from(v4l2_params.parm.capture))
        }
    }

    fn set_params(&self, params: &Parameters) -> io::Result<Parameters> {
        unsafe {
            let mut v4l2_params = v4l2_streamparm {
                type_: v4l2_buf_type_V4L2_BUF_TYPE_VIDEO_CAPTURE,
                ..mem::zeroed()
            };
            v4l2_params.parm.capture = (*params).into();
            v4l2::ioctl(
                self.fd,
                v4l2::vidioc::VIDIOC_S_PARM,
                &mut v4l2_params as *mut _ as *mut c_void,
            )?;

            Ok(Parameters::from(v4l2_params.parm.capture))
        }
    }

    fn request_buffers(&self, count: u32) -> io::Result<u32> {
        let mut v4l2_reqbufs = v4l2_requestbuffers {
            count,
            type_: v4l2_buf_type_V4L2_BUF_TYPE_VIDEO_CAPTURE,
            memory: v4l2_memory_V4L2_MEMORY_MMAP,
            ..unsafe { mem::zeroed() }
        };
        unsafe {
            v4l2::ioctl(
                self.fd,
                v4l2::vidioc::VIDIOC_REQBUFS,
                &mut v4l2_reqbufs as *mut _ as *mut c_void,
            )?;
        }

        Ok(v4l2_reqbufs.count)
    }

    fn query_buffer(&self, index: u32) -> io::Result<BufferInfo> {
        let mut v4l2_buf = v4l2_buffer {
            index,
            ..self.buffer_desc()
        };
        unsafe {
            v4l2::ioctl(
                self.fd,
                v4l2::vidioc::VIDIOC_QUERYBUF,
                &mut v4l2_buf as *mut _ as *mut c_void,
            )?;

            Ok(BufferInfo {
                index,
                offset: v4l2_buf.m.offset,
                length: v4l2_buf.length,
            })
        }
    }

    fn map(&self, buf: &BufferInfo) -> io::Result<NonNull<u8>> {
        let ptr = unsafe {
            v4l2::mmap(
                self.fd,
                buf.length as usize,
                buf.offset as libc::off_t,
            )?
        };

        NonNull::new(ptr as *mut u8)
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "mmap returned a null mapping"))
    }

    unsafe fn unmap(&self, ptr: NonNull<u8>, length: usize) -> io::Result<()> {
        v4l2::munmap(ptr.as_ptr() as *mut c_void, length)
    }

    fn queue(&self, index: u32) -> io::Result<()> {
        let mut v4l2_buf = v4l2_buffer {
            index,
            ..self.buffer_desc()
        };
        unsafe {
            v4l2::ioctl(
                self.fd,
                v4l2::vidioc::VIDIOC_QBUF,
                &mut v4l2_buf as *mut _ as *mut c_void,
            )
        }
    }

    fn dequeue(&self) -> io::Result<Dequeued> {
        let mut v4l2_buf = self.buffer_desc();
        unsafe {
            v4l2::ioctl(
                self.fd,
                v4l2::vidioc::VIDIOC_DQBUF,
                &mut v4l2_buf as *mut _ as *mut c_void,
            )?;
        }

        Ok(Dequeued {
            index: v4l2_buf.index,
            bytes_used: v4l2_buf.bytesused,
            meta: Metadata {
                sequence: v4l2_buf.sequence,
                timestamp: v4l2_buf.timestamp.into(),
                flags: v4l2_buf.flags.into(),
            },
        })
    }

    fn stream_on(&self) -> io::Result<()> {
        self.stream_ioctl(v4l2::vidioc::VIDIOC_STREAMON)
    }

    fn stream_off(&self) -> io::Result<()> {
        self.stream_ioctl(v4l2::vidioc::VIDIOC_STREAMOFF)
    }

    fn poll(&self, timeout: Option<Duration>) -> io::Result<bool> {
        v4l2::poll_readable(self.fd, timeout)
    }
}
