use std::ffi::CString;
use std::os::raw::{c_int, c_void};
use std::os::unix::ffi::OsStrExt;
use std::time::Duration;
use std::{io, path::Path, ptr};

use crate::v4l2::vidioc;

mod detail {
    use crate::v4l2::vidioc;

    pub unsafe fn open(path: *const std::os::raw::c_char, flags: i32) -> std::os::raw::c_int {
        libc::open(path, flags)
    }
    pub unsafe fn close(fd: std::os::raw::c_int) -> std::os::raw::c_int {
        libc::close(fd)
    }
    pub unsafe fn ioctl(
        fd: std::os::raw::c_int,
        request: vidioc::_IOC_TYPE,
        argp: *mut std::os::raw::c_void,
    ) -> std::os::raw::c_int {
        // libc declares ioctl() with a different request type per platform, syscall() does not
        libc::syscall(libc::SYS_ioctl, fd, request, argp) as std::os::raw::c_int
    }
    pub unsafe fn mmap(
        start: *mut std::os::raw::c_void,
        length: usize,
        prot: std::os::raw::c_int,
        flags: std::os::raw::c_int,
        fd: std::os::raw::c_int,
        offset: libc::off_t,
    ) -> *mut std::os::raw::c_void {
        libc::mmap(start, length, prot, flags, fd, offset)
    }
    pub unsafe fn munmap(start: *mut std::os::raw::c_void, length: usize) -> std::os::raw::c_int {
        libc::munmap(start, length)
    }
}

/// A convenience wrapper around open(2).
///
/// Returns the file descriptor on success.
/// In case of errors, the last OS error will be reported, aka errno on Linux.
///
/// # Arguments
///
/// * `path` - Path to the device node
/// * `flags` - Open flags
pub fn open<P: AsRef<Path>>(path: P, flags: i32) -> io::Result<c_int> {
    let c_path = CString::new(path.as_ref().as_os_str().as_bytes())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    let fd = unsafe { detail::open(c_path.as_ptr(), flags) };
    if fd == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(fd)
    }
}

/// A convenience wrapper around close(2).
///
/// # Arguments
///
/// * `fd` - File descriptor of a previously opened device
pub fn close(fd: c_int) -> io::Result<()> {
    let ret = unsafe { detail::close(fd) };
    if ret == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// A convenience wrapper around ioctl(2).
///
/// In case of errors, the last OS error will be reported, aka errno on Linux.
///
/// # Arguments
///
/// * `fd` - File descriptor
/// * `request` - IO control code (see [`vidioc`])
/// * `argp` - Pointer to memory region holding the argument type
///
/// # Safety
///
/// `argp` must point to a live value of the type encoded in `request`.
pub unsafe fn ioctl(fd: c_int, request: vidioc::_IOC_TYPE, argp: *mut c_void) -> io::Result<()> {
    let ret = detail::ioctl(fd, request, argp);
    if ret == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// Maps `length` bytes of device memory at `offset` into the address space, shared and
/// read/write.
///
/// # Safety
///
/// The returned region aliases memory the device may write to at any time while the buffer is
/// queued. It must be released with [`munmap`] exactly once.
pub unsafe fn mmap(fd: c_int, length: usize, offset: libc::off_t) -> io::Result<*mut c_void> {
    let ret = detail::mmap(
        ptr::null_mut(),
        length,
        libc::PROT_READ | libc::PROT_WRITE,
        libc::MAP_SHARED,
        fd,
        offset,
    );
    if ret == libc::MAP_FAILED {
        Err(io::Error::last_os_error())
    } else {
        Ok(ret)
    }
}

/// A convenience wrapper around munmap(2).
///
/// # Safety
///
/// `start` and `length` must describe a region previously returned by [`mmap`].
pub unsafe fn munmap(start: *mut c_void, length: usize) -> io::Result<()> {
    let ret = detail::munmap(start, length);
    if ret == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// Converts a wait duration into poll(2) milliseconds
///
/// Rounds up, so a non-zero duration never turns into a non-blocking check.
fn poll_timeout(timeout: Option<Duration>) -> c_int {
    match timeout {
        Some(duration) => {
            c_int::try_from(duration.as_nanos().div_ceil(1_000_000)).unwrap_or(c_int::MAX)
        }
        None => -1,
    }
}

/// Waits until `fd` is readable.
///
/// Returns `false` if the timeout elapsed first. `None` waits forever.
pub fn poll_readable(fd: c_int, timeout: Option<Duration>) -> io::Result<bool> {
    let timeout = poll_timeout(timeout);
    let mut pollfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };

    loop {
        let ret = unsafe { libc::poll(&mut pollfd, 1, timeout) };
        match ret {
            -1 => {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(err);
            }
            0 => return Ok(false),
            _ => return Ok(true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_timeout_rounds_up_to_milliseconds() {
        assert_eq!(poll_timeout(None), -1);
        assert_eq!(poll_timeout(Some(Duration::ZERO)), 0);
        assert_eq!(poll_timeout(Some(Duration::from_micros(500))), 1);
        assert_eq!(poll_timeout(Some(Duration::from_micros(2_001))), 3);
        assert_eq!(poll_timeout(Some(Duration::from_secs(u64::MAX))), c_int::MAX);
    }
}
