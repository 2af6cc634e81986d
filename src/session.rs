use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::device::{ensure_capture, Device, DeviceHandle};
use crate::error::{Error, Result};
use crate::format::Description as FormatDescription;
use crate::log::{Level, Logger, TracingLogger};
use crate::pool::BufferPool;
use crate::state::{Operation, State};
use crate::{Capabilities, CaptureConfig, Format, FourCC, Fraction, Frame, Parameters};

macro_rules! log {
    ($session:expr, $level:expr, $($arg:tt)+) => {
        $session.logger.log($level, format_args!($($arg)+))
    };
}

/// Memory-mapped capture from a single device
///
/// The session drives the device through `Configured -> Streaming -> Stopped` (see [`State`]),
/// owns the [`BufferPool`] and copies every dequeued buffer into an owned [`Frame`] before
/// handing the buffer back to the driver.
///
/// Dropping the session stops streaming, unmaps all buffers and then closes the device, in that
/// order. A session is driven from one thread; frames can be moved anywhere.
pub struct CaptureSession<D: Device = DeviceHandle> {
    // declared before `device` so the mappings go first on drop
    pool: Option<BufferPool<D>>,
    device: Arc<D>,
    caps: Capabilities,
    format: Format,
    state: State,
    timeout: Option<Duration>,
    logger: Arc<dyn Logger>,
}

impl CaptureSession<DeviceHandle> {
    /// Opens a capture device in blocking mode, logging through `tracing`
    ///
    /// # Arguments
    ///
    /// * `path` - Path (e.g. "/dev/video0")
    ///
    /// # Example
    ///
    /// ```
    /// use v4l_capture::CaptureSession;
    ///
    /// if let Ok(mut session) = CaptureSession::open("/dev/video0") {
    ///     println!("Active format: {}", session.format());
    /// }
    /// ```
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_logger(path, Arc::new(TracingLogger))
    }

    /// Opens a capture device in blocking mode
    pub fn open_with_logger<P: AsRef<Path>>(path: P, logger: Arc<dyn Logger>) -> Result<Self> {
        let path = path.as_ref();
        let device = DeviceHandle::open(path).map_err(|e| {
            logger.log(
                Level::Error,
                format_args!("cannot open {}: {}", path.display(), e),
            );
            e
        })?;
        logger.log(
            Level::Info,
            format_args!("Device {} open.", path.display()),
        );

        Self::with_device(Arc::new(device), logger)
    }

    /// Opens a capture device in non-blocking mode
    ///
    /// Frames are still delivered synchronously by [`CaptureSession::get_frame`], which waits
    /// for readiness instead of blocking inside the driver.
    pub fn open_nonblocking<P: AsRef<Path>>(path: P, logger: Arc<dyn Logger>) -> Result<Self> {
        let path = path.as_ref();
        let device = DeviceHandle::open_nonblocking(path)?;
        logger.log(
            Level::Info,
            format_args!("Device {} open (non-blocking).", path.display()),
        );

        Self::with_device(Arc::new(device), logger)
    }

    /// Opens, configures and allocates buffers as described by `config`
    ///
    /// The returned session is ready to [`start`](CaptureSession::start).
    pub fn from_config(config: &CaptureConfig, logger: Arc<dyn Logger>) -> Result<Self> {
        let mut session = if config.nonblocking {
            Self::open_nonblocking(&config.device, logger)?
        } else {
            Self::open_with_logger(&config.device, logger)?
        };

        session.negotiate_format(config.width, config.height, config.fourcc)?;
        if let Some(fps) = config.fps {
            session.set_frame_interval(Fraction::new(1, fps))?;
        }
        session.allocate_buffers(config.buffer_count)?;
        if let Some(timeout) = config.timeout {
            session.set_timeout(timeout);
        }

        Ok(session)
    }
}

impl<D: Device> CaptureSession<D> {
    /// Wraps an already opened device
    ///
    /// Capabilities are negotiated and the current format is read from the device; the session
    /// starts out [`Configured`](State::Configured).
    pub fn with_device(device: Arc<D>, logger: Arc<dyn Logger>) -> Result<Self> {
        let caps = device.query_caps().map_err(|e| Error::UnsupportedDevice {
            reason: "failed to query capabilities".to_string(),
            source: Some(e),
        })?;
        ensure_capture(&caps)?;
        logger.log(
            Level::Debug,
            format_args!(
                "Capabilities negotiated: {} ({}) on {}, version {}.{}.{}",
                caps.card, caps.driver, caps.bus, caps.version.0, caps.version.1, caps.version.2
            ),
        );

        let format = device.format().map_err(|e| Error::UnsupportedDevice {
            reason: "failed to read capture format".to_string(),
            source: Some(e),
        })?;
        logger.log(Level::Debug, format_args!("Current image format: {}", format));

        Ok(CaptureSession {
            pool: None,
            device,
            caps,
            format,
            state: State::Configured,
            timeout: None,
            logger,
        })
    }

    /// Current lifecycle state
    pub fn state(&self) -> State {
        self.state
    }

    /// Capabilities reported by the device when the session was opened
    pub fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    /// Authoritative capture format, as last reported by the device
    pub fn format(&self) -> Format {
        self.format
    }

    /// The device shared with the buffer pool
    pub fn device(&self) -> &Arc<D> {
        &self.device
    }

    /// The mapped buffers, once allocated
    pub fn pool(&self) -> Option<&BufferPool<D>> {
        self.pool.as_ref()
    }

    /// Number of mapped buffers, zero before allocation
    pub fn buffer_count(&self) -> usize {
        self.pool.as_ref().map_or(0, BufferPool::len)
    }

    /// Limits how long [`get_frame`](CaptureSession::get_frame) waits for the device
    pub fn set_timeout(&mut self, duration: Duration) {
        self.timeout = Some(duration);
    }

    /// Waits for the device without a limit
    pub fn clear_timeout(&mut self) {
        self.timeout = None;
    }

    fn transition(&mut self, to: State) {
        log!(self, Level::Debug, "State: {} -> {}", self.state, to);
        self.state = to;
    }

    /// Pixel formats the device can capture
    pub fn enum_formats(&self) -> Result<Vec<FormatDescription>> {
        let formats = self.device.enum_formats().map_err(|e| Error::UnsupportedDevice {
            reason: "failed to enumerate formats".to_string(),
            source: Some(e),
        })?;

        for desc in &formats {
            log!(self, Level::Debug, "Supported format {}", desc);
        }
        Ok(formats)
    }

    /// Requests a capture format
    ///
    /// The driver may adjust width, height or pixel format. The format it reports back becomes
    /// the session's format and is returned.
    ///
    /// # Arguments
    ///
    /// * `width` - Width in pixels
    /// * `height` - Height in pixels
    /// * `fourcc` - Four character code
    pub fn negotiate_format(&mut self, width: u32, height: u32, fourcc: FourCC) -> Result<Format> {
        self.state.check(Operation::NegotiateFormat)?;
        if self.pool.is_some() {
            // the driver refuses format changes while buffers are allocated
            return Err(Error::InvalidStateTransition {
                operation: Operation::NegotiateFormat,
                state: self.state,
            });
        }

        let requested = Format::new(width, height, fourcc);
        let format = self.device.set_format(&requested).map_err(|e| {
            log!(self, Level::Error, "Format {} rejected: {}", requested, e);
            Error::FormatRejected(e)
        })?;

        if format.width != width || format.height != height || format.fourcc != fourcc {
            log!(
                self,
                Level::Warning,
                "Requested {}x{} {}, device chose {}x{} {}",
                width,
                height,
                fourcc,
                format.width,
                format.height,
                format.fourcc
            );
        }
        log!(self, Level::Info, "Negotiated image format: {}", format);

        self.format = format;
        Ok(format)
    }

    /// Streaming parameters currently in effect
    pub fn params(&self) -> Result<Parameters> {
        self.device.params().map_err(|e| Error::UnsupportedDevice {
            reason: "failed to read streaming parameters".to_string(),
            source: Some(e),
        })
    }

    /// Time per frame as reported by the device
    ///
    /// This is the time base for whatever consumes the frames (e.g. an encoder). Drivers
    /// without frame interval support report 0/0.
    pub fn frame_interval(&self) -> Result<Fraction> {
        Ok(self.params()?.interval)
    }

    /// Requests a frame interval and returns the one the driver settled on
    pub fn set_frame_interval(&mut self, interval: Fraction) -> Result<Fraction> {
        self.state.check(Operation::SetFrameInterval)?;
        let mut params = self.params()?;
        params.interval = interval;

        let actual = self.device.set_params(&params).map_err(|e| {
            log!(self, Level::Error, "Frame interval {} rejected: {}", interval, e);
            Error::ParametersRejected(e)
        })?;

        if actual.interval != interval {
            log!(
                self,
                Level::Warning,
                "Requested frame interval {}, device chose {}",
                interval,
                actual.interval
            );
        }
        log!(self, Level::Info, "Frame interval: {} [s]", actual.interval);
        Ok(actual.interval)
    }

    /// Requests `count` buffers from the device and maps them
    ///
    /// Returns the number of buffers granted, which may be lower than requested but never below
    /// [`MIN_BUFFERS`](crate::pool::MIN_BUFFERS).
    pub fn allocate_buffers(&mut self, count: u32) -> Result<usize> {
        self.state.check(Operation::AllocateBuffers)?;
        // a previous pool has to be unmapped before the driver accepts a new request
        self.pool = None;

        let pool = BufferPool::allocate(Arc::clone(&self.device), count).map_err(|e| {
            log!(self, Level::Error, "Buffer allocation failed: {}", e);
            e
        })?;

        let granted = pool.len();
        if granted < count as usize {
            log!(
                self,
                Level::Warning,
                "Requested {} buffers, device granted {}",
                count,
                granted
            );
        }
        log!(self, Level::Info, "Allocated {} memory-mapped buffers", granted);

        self.pool = Some(pool);
        Ok(granted)
    }

    /// Unmaps and frees all buffers, returning to [`Configured`](State::Configured)
    ///
    /// Afterwards the format can be renegotiated and buffers allocated again.
    pub fn release_buffers(&mut self) -> Result<()> {
        self.state.check(Operation::ReleaseBuffers)?;
        self.pool = None;
        if self.state != State::Configured {
            self.transition(State::Configured);
        }
        Ok(())
    }

    /// Hands every buffer to the driver and starts streaming
    ///
    /// Also restarts a stopped session. Requires allocated buffers.
    pub fn start(&mut self) -> Result<()> {
        self.state.check(Operation::Start)?;
        let pool = match self.pool.as_mut() {
            Some(pool) => pool,
            None => {
                return Err(Error::InvalidStateTransition {
                    operation: Operation::Start,
                    state: self.state,
                })
            }
        };

        let started = pool
            .queue_all()
            .and_then(|()| self.device.stream_on().map_err(Error::StreamStartFailed));

        if let Err(e) = started {
            // stream-off takes already queued buffers back from the driver
            if let Err(e) = self.device.stream_off() {
                log!(self, Level::Warning, "Cannot stop video stream: {}", e);
            }
            pool.reclaim_all();
            log!(self, Level::Error, "Cannot start video stream: {}", e);
            return Err(e);
        }

        self.transition(State::Streaming);
        log!(self, Level::Info, "Camera video stream started.");
        Ok(())
    }

    /// Stops streaming
    ///
    /// All buffers return from the driver and stay unreadable until the next
    /// [`start`](CaptureSession::start).
    pub fn stop(&mut self) -> Result<()> {
        self.state.check(Operation::Stop)?;
        self.device.stream_off().map_err(|e| {
            log!(self, Level::Error, "Cannot stop video stream: {}", e);
            Error::StreamStopFailed(e)
        })?;

        if let Some(pool) = self.pool.as_mut() {
            pool.reclaim_all();
        }
        self.transition(State::Stopped);
        log!(self, Level::Info, "Camera video stream stopped.");
        Ok(())
    }

    /// Waits for the next filled buffer and returns a copy of it
    ///
    /// This is the only blocking call of the session. The buffer is copied into the returned
    /// frame and handed back to the driver before this returns. A zero-length capture still
    /// produces a (empty) frame.
    ///
    /// If a buffer cannot be handed back, [`Error::BufferEnqueueFailed`] is returned and the
    /// stream is stopped, since capture would continue with fewer buffers than the pool holds.
    /// The session is [`Stopped`](State::Stopped) afterwards and can be restarted.
    pub fn get_frame(&mut self) -> Result<Frame> {
        self.state.check(Operation::GetFrame)?;

        let result = self.capture();
        match &result {
            Ok(frame) => log!(
                self,
                Level::Debug,
                "Frame #{}: {} bytes",
                frame.meta().sequence,
                frame.len()
            ),
            Err(e @ Error::BufferEnqueueFailed { .. }) => {
                log!(self, Level::Error, "Capture failed: {}", e);
                self.halt();
            }
            Err(e) => log!(self, Level::Error, "Capture failed: {}", e),
        }
        result
    }

    fn capture(&mut self) -> Result<Frame> {
        let timeout = self.timeout;
        let pool = match self.pool.as_mut() {
            Some(pool) => pool,
            None => {
                return Err(Error::InvalidStateTransition {
                    operation: Operation::GetFrame,
                    state: self.state,
                })
            }
        };

        let dq = loop {
            if let Some(timeout) = timeout {
                let ready = self.device.poll(Some(timeout)).map_err(Error::DequeueFailed)?;
                if !ready {
                    return Err(Error::DequeueTimedOut(timeout));
                }
            }

            match pool.dequeue()? {
                Some(dq) => break dq,
                // non-blocking device with nothing ready
                None => {
                    if timeout.is_none() {
                        self.device.poll(None).map_err(Error::DequeueFailed)?;
                    }
                }
            }
        };

        pool.copy_and_requeue(&dq)
    }

    /// Stops streaming after a buffer could not be handed back to the driver
    fn halt(&mut self) {
        if let Err(e) = self.device.stream_off() {
            log!(self, Level::Warning, "Cannot stop video stream: {}", e);
        }
        if let Some(pool) = self.pool.as_mut() {
            pool.reclaim_all();
        }
        self.transition(State::Stopped);
    }

    /// Iterator over captured frames
    ///
    /// Each step calls [`get_frame`](CaptureSession::get_frame), starting the stream first if the
    /// session is not streaming yet. Errors are yielded; the iterator ends after an error that
    /// leaves the session without a running stream (a failed start, or a stream stopped by a
    /// failed re-enqueue).
    pub fn frames(&mut self) -> Frames<'_, D> {
        Frames {
            session: self,
            done: false,
        }
    }

    /// Stops streaming if necessary, unmaps all buffers and closes the device
    ///
    /// Buffers are released and the device closed even if stopping fails; that error is still
    /// returned.
    pub fn close(mut self) -> Result<()> {
        self.teardown()
    }

    fn teardown(&mut self) -> Result<()> {
        let mut result = Ok(());

        if self.state == State::Streaming {
            if let Err(e) = self.device.stream_off() {
                log!(self, Level::Error, "Cannot stop video stream: {}", e);
                result = Err(Error::StreamStopFailed(e));
            }
        }

        if let Some(mut pool) = self.pool.take() {
            pool.reclaim_all();
        }
        if self.state != State::Closed {
            self.transition(State::Closed);
        }
        result
    }
}

impl<D: Device> Drop for CaptureSession<D> {
    fn drop(&mut self) {
        let _ = self.teardown();
    }
}

/// Iterator returned by [`CaptureSession::frames`]
pub struct Frames<'a, D: Device> {
    session: &'a mut CaptureSession<D>,
    done: bool,
}

impl<'a, D: Device> Iterator for Frames<'a, D> {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        if self.session.state != State::Streaming {
            if let Err(e) = self.session.start() {
                self.done = true;
                return Some(Err(e));
            }
        }

        let frame = self.session.get_frame();
        if frame.is_err() && self.session.state != State::Streaming {
            self.done = true;
        }
        Some(frame)
    }
}
