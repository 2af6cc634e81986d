#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::io;
use std::ptr::NonNull;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use v4l_capture::buffer::{BufferInfo, Dequeued, Metadata};
use v4l_capture::log::{Level, Logger};
use v4l_capture::parameters::Capabilities as ParamCapabilities;
use v4l_capture::{
    CapabilityFlags, Capabilities, Device, Format, FormatDescription, FourCC, Fraction,
    Parameters, Timestamp,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Collects every event so tests can assert on what the session reported
#[derive(Default)]
pub struct RecordingLogger {
    events: Mutex<Vec<(Level, String)>>,
}

impl RecordingLogger {
    pub fn events(&self) -> Vec<(Level, String)> {
        self.events.lock().unwrap().clone()
    }

    pub fn contains(&self, level: Level, needle: &str) -> bool {
        self.events()
            .iter()
            .any(|(l, msg)| *l == level && msg.contains(needle))
    }
}

impl Logger for RecordingLogger {
    fn log(&self, level: Level, args: fmt::Arguments<'_>) {
        self.events.lock().unwrap().push((level, args.to_string()));
    }
}

/// Behaviour knobs of [`MockDevice`]
#[derive(Debug, Clone)]
pub struct MockConfig {
    pub capabilities: CapabilityFlags,
    /// Largest frame the device supports; requests are clamped to it
    pub max_width: u32,
    pub max_height: u32,
    /// Formats the device accepts; anything else is replaced by the first entry
    pub formats: Vec<FourCC>,
    pub reject_format: bool,
    /// Upper bound on granted buffers
    pub max_buffers: u32,
    pub buffer_length: u32,
    /// `bytesused` reported on every dequeue
    pub bytes_used: u32,
    /// Fail mapping of this buffer index
    pub fail_map_at: Option<u32>,
    pub stream_on_errno: Option<i32>,
    pub stream_off_errno: Option<i32>,
    /// The n-th (1-based) VIDIOC_QBUF fails with EIO
    pub fail_queue_call: Option<u32>,
    pub dequeue_errno: Option<i32>,
    /// Index reported by every dequeue instead of the one actually filled
    pub report_index: Option<u32>,
    /// Frame interval reported before any request
    pub interval: Fraction,
    /// Whether the frame interval can be changed
    pub time_per_frame: bool,
    /// Number of dequeues reporting EAGAIN before each real one
    pub would_block: u32,
    /// Whether `poll` reports readiness
    pub ready: bool,
}

impl Default for MockConfig {
    fn default() -> Self {
        MockConfig {
            capabilities: CapabilityFlags::VIDEO_CAPTURE | CapabilityFlags::STREAMING,
            max_width: 1920,
            max_height: 1080,
            formats: vec![FourCC::new(b"YUYV"), FourCC::new(b"MJPG")],
            reject_format: false,
            max_buffers: 8,
            buffer_length: 64 * 1024,
            bytes_used: 42_000,
            fail_map_at: None,
            stream_on_errno: None,
            stream_off_errno: None,
            fail_queue_call: None,
            dequeue_errno: None,
            report_index: None,
            interval: Fraction::new(1, 30),
            time_per_frame: true,
            would_block: 0,
            ready: true,
        }
    }
}

struct Mapping {
    index: u32,
    ptr: *mut u8,
    len: usize,
}

#[derive(Default)]
struct Inner {
    format: Option<Format>,
    interval: Option<Fraction>,
    allocated: u32,
    queue_calls: u32,
    mappings: Vec<Mapping>,
    queued: VecDeque<u32>,
    streaming: bool,
    sequence: u32,
    pending_blocks: u32,
    calls: Vec<&'static str>,
    stream_on_calls: u32,
    stream_off_calls: u32,
}

/// In-memory capture device following the V4L2 buffer protocol
///
/// Each dequeue fills the buffer with the frame's sequence number (as a byte) up to
/// `bytes_used`, so copies can be told apart.
pub struct MockDevice {
    config: MockConfig,
    inner: Mutex<Inner>,
}

fn errno(code: i32) -> io::Error {
    io::Error::from_raw_os_error(code)
}

impl MockDevice {
    pub fn new(config: MockConfig) -> Arc<Self> {
        Arc::new(MockDevice {
            config,
            inner: Mutex::new(Inner::default()),
        })
    }

    fn record(&self, call: &'static str) -> std::sync::MutexGuard<'_, Inner> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(call);
        inner
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn live_mappings(&self) -> usize {
        self.inner.lock().unwrap().mappings.len()
    }

    pub fn allocated(&self) -> u32 {
        self.inner.lock().unwrap().allocated
    }

    pub fn queued(&self) -> usize {
        self.inner.lock().unwrap().queued.len()
    }

    pub fn streaming(&self) -> bool {
        self.inner.lock().unwrap().streaming
    }

    pub fn stream_on_calls(&self) -> u32 {
        self.inner.lock().unwrap().stream_on_calls
    }

    pub fn stream_off_calls(&self) -> u32 {
        self.inner.lock().unwrap().stream_off_calls
    }

    fn default_format(&self) -> Format {
        let mut fmt = Format::new(640, 480, self.config.formats[0]);
        fmt.stride = 640 * 2;
        fmt.size = 640 * 480 * 2;
        fmt
    }
}

impl Drop for MockDevice {
    fn drop(&mut self) {
        let inner = self.inner.get_mut().unwrap();
        for m in inner.mappings.drain(..) {
            drop(unsafe { Box::from_raw(std::ptr::slice_from_raw_parts_mut(m.ptr, m.len)) });
        }
    }
}

impl Device for MockDevice {
    fn query_caps(&self) -> io::Result<Capabilities> {
        let _inner = self.record("querycap");
        Ok(Capabilities {
            driver: "mock".to_string(),
            card: "Mock Camera".to_string(),
            bus: "platform:mock".to_string(),
            version: (6, 1, 0),
            capabilities: self.config.capabilities,
        })
    }

    fn format(&self) -> io::Result<Format> {
        let inner = self.record("g_fmt");
        Ok(inner.format.unwrap_or_else(|| self.default_format()))
    }

    fn set_format(&self, fmt: &Format) -> io::Result<Format> {
        let mut inner = self.record("s_fmt");
        if self.config.reject_format {
            return Err(errno(libc::EINVAL));
        }
        if inner.allocated > 0 {
            return Err(errno(libc::EBUSY));
        }

        let fourcc = if self.config.formats.contains(&fmt.fourcc) {
            fmt.fourcc
        } else {
            self.config.formats[0]
        };
        let width = fmt.width.min(self.config.max_width);
        let height = fmt.height.min(self.config.max_height);
        let mut actual = Format::new(width, height, fourcc);
        actual.stride = width * 2;
        actual.size = width * height * 2;

        inner.format = Some(actual);
        Ok(actual)
    }

    fn enum_formats(&self) -> io::Result<Vec<FormatDescription>> {
        let _inner = self.record("enum_fmt");
        Ok(self
            .config
            .formats
            .iter()
            .enumerate()
            .map(|(i, fourcc)| FormatDescription {
                index: i as u32,
                flags: 0,
                description: fourcc.description().to_string(),
                fourcc: *fourcc,
            })
            .collect())
    }

    fn params(&self) -> io::Result<Parameters> {
        let inner = self.record("g_parm");
        let mut params = Parameters::new(inner.interval.unwrap_or(self.config.interval));
        if self.config.time_per_frame {
            params.capabilities = ParamCapabilities::TIME_PER_FRAME;
        }
        Ok(params)
    }

    fn set_params(&self, params: &Parameters) -> io::Result<Parameters> {
        {
            let mut inner = self.record("s_parm");
            if inner.streaming {
                return Err(errno(libc::EBUSY));
            }
            if params.interval.numerator == 0 || params.interval.denominator == 0 {
                return Err(errno(libc::EINVAL));
            }
            if self.config.time_per_frame {
                inner.interval = Some(params.interval);
            }
        }
        self.params()
    }

    fn request_buffers(&self, count: u32) -> io::Result<u32> {
        let mut inner = self.record("reqbufs");
        if count == 0 {
            inner.allocated = 0;
            inner.queued.clear();
            return Ok(0);
        }
        if !inner.mappings.is_empty() {
            return Err(errno(libc::EBUSY));
        }
        inner.allocated = count.min(self.config.max_buffers);
        Ok(inner.allocated)
    }

    fn query_buffer(&self, index: u32) -> io::Result<BufferInfo> {
        let inner = self.record("querybuf");
        if index >= inner.allocated {
            return Err(errno(libc::EINVAL));
        }
        Ok(BufferInfo {
            index,
            offset: index * self.config.buffer_length,
            length: self.config.buffer_length,
        })
    }

    fn map(&self, buf: &BufferInfo) -> io::Result<NonNull<u8>> {
        let mut inner = self.record("mmap");
        if self.config.fail_map_at == Some(buf.index) {
            return Err(errno(libc::ENOMEM));
        }

        let region = vec![0u8; buf.length as usize].into_boxed_slice();
        let len = region.len();
        let ptr = Box::into_raw(region) as *mut u8;
        inner.mappings.push(Mapping {
            index: buf.index,
            ptr,
            len,
        });
        Ok(NonNull::new(ptr).unwrap())
    }

    unsafe fn unmap(&self, ptr: NonNull<u8>, length: usize) -> io::Result<()> {
        let mut inner = self.record("munmap");
        let pos = inner
            .mappings
            .iter()
            .position(|m| m.ptr == ptr.as_ptr() && m.len == length)
            .ok_or_else(|| errno(libc::EINVAL))?;
        let m = inner.mappings.remove(pos);
        drop(Box::from_raw(std::ptr::slice_from_raw_parts_mut(m.ptr, m.len)));
        Ok(())
    }

    fn queue(&self, index: u32) -> io::Result<()> {
        let mut inner = self.record("qbuf");
        inner.queue_calls += 1;
        if self.config.fail_queue_call == Some(inner.queue_calls) {
            return Err(errno(libc::EIO));
        }
        if index >= inner.allocated || inner.queued.contains(&index) {
            return Err(errno(libc::EINVAL));
        }
        inner.queued.push_back(index);
        Ok(())
    }

    fn dequeue(&self) -> io::Result<Dequeued> {
        let mut inner = self.record("dqbuf");
        if !inner.streaming {
            return Err(errno(libc::EINVAL));
        }
        if let Some(code) = self.config.dequeue_errno {
            return Err(errno(code));
        }
        if inner.pending_blocks > 0 {
            inner.pending_blocks -= 1;
            return Err(errno(libc::EAGAIN));
        }
        inner.pending_blocks = self.config.would_block;

        let index = inner.queued.pop_front().ok_or_else(|| errno(libc::EAGAIN))?;
        let sequence = inner.sequence;
        inner.sequence += 1;

        if let Some(m) = inner.mappings.iter().find(|m| m.index == index) {
            let fill = (self.config.bytes_used as usize).min(m.len);
            unsafe { std::ptr::write_bytes(m.ptr, sequence as u8, fill) };
        }

        Ok(Dequeued {
            index: self.config.report_index.unwrap_or(index),
            bytes_used: self.config.bytes_used,
            meta: Metadata {
                sequence,
                timestamp: Timestamp::new(sequence as i64, 0),
                flags: Default::default(),
            },
        })
    }

    fn stream_on(&self) -> io::Result<()> {
        let mut inner = self.record("streamon");
        inner.stream_on_calls += 1;
        if let Some(code) = self.config.stream_on_errno {
            return Err(errno(code));
        }
        inner.streaming = true;
        inner.pending_blocks = self.config.would_block;
        Ok(())
    }

    fn stream_off(&self) -> io::Result<()> {
        let mut inner = self.record("streamoff");
        inner.stream_off_calls += 1;
        if let Some(code) = self.config.stream_off_errno {
            return Err(errno(code));
        }
        inner.streaming = false;
        inner.queued.clear();
        Ok(())
    }

    fn poll(&self, _timeout: Option<Duration>) -> io::Result<bool> {
        let _inner = self.record("poll");
        Ok(self.config.ready)
    }
}

/// Session over a mock device, with a logger the test can inspect
pub fn session_with(
    config: MockConfig,
) -> (
    v4l_capture::CaptureSession<MockDevice>,
    Arc<MockDevice>,
    Arc<RecordingLogger>,
) {
    init_tracing();
    let device = MockDevice::new(config);
    let logger = Arc::new(RecordingLogger::default());
    let session = v4l_capture::CaptureSession::with_device(Arc::clone(&device), logger.clone())
        .expect("mock device is a capture device");
    (session, device, logger)
}

pub fn distinct_ranges(ranges: &[std::ops::Range<usize>]) -> bool {
    let mut seen: HashMap<usize, usize> = HashMap::new();
    for r in ranges {
        for (start, end) in &seen {
            if r.start < *end && *start < r.end {
                return false;
            }
        }
        seen.insert(r.start, r.end);
    }
    true
}
