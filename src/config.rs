use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::FourCC;

/// Settings for opening and preparing a capture session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    /// Device node path
    pub device: PathBuf,
    /// Requested width in pixels, the driver may adjust it
    pub width: u32,
    /// Requested height in pixels, the driver may adjust it
    pub height: u32,
    /// Requested pixel format
    pub fourcc: FourCC,
    /// Requested frame rate, `None` keeps the driver's current interval
    pub fps: Option<u32>,
    /// Requested number of mapped buffers
    pub buffer_count: u32,
    /// Longest wait for a single frame, `None` blocks until the device delivers
    pub timeout: Option<Duration>,
    /// Open the device with O_NONBLOCK
    pub nonblocking: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        CaptureConfig {
            device: PathBuf::from("/dev/video0"),
            width: 1280,
            height: 720,
            fourcc: FourCC::new(b"YUYV"),
            fps: None,
            buffer_count: 4,
            timeout: None,
            nonblocking: false,
        }
    }
}

impl CaptureConfig {
    /// Reads overrides from `CAPTURE_*` environment variables
    ///
    /// Unset or unparsable variables keep their default value.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let parse = |key: &str| lookup(key).and_then(|s| s.trim().parse::<u32>().ok());

        let fourcc = lookup("CAPTURE_FOURCC")
            .and_then(|s| <[u8; 4]>::try_from(s.trim().as_bytes()).ok())
            .map(|repr| FourCC::new(&repr))
            .unwrap_or(defaults.fourcc);

        let nonblocking = lookup("CAPTURE_NONBLOCKING")
            .map(|s| matches!(s.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(defaults.nonblocking);

        CaptureConfig {
            device: lookup("CAPTURE_DEVICE")
                .map(PathBuf::from)
                .unwrap_or(defaults.device),
            width: parse("CAPTURE_WIDTH").unwrap_or(defaults.width),
            height: parse("CAPTURE_HEIGHT").unwrap_or(defaults.height),
            fourcc,
            fps: parse("CAPTURE_FPS").filter(|&fps| fps > 0).or(defaults.fps),
            buffer_count: parse("CAPTURE_BUFFERS").unwrap_or(defaults.buffer_count),
            timeout: parse("CAPTURE_TIMEOUT_MS")
                .map(|ms| Duration::from_millis(ms.into()))
                .or(defaults.timeout),
            nonblocking,
        }
    }
}
