use std::{fmt, mem};

use crate::v4l_sys::{v4l2_field_V4L2_FIELD_ANY, v4l2_fmtdesc, v4l2_pix_format};
use crate::FourCC;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
/// Streaming format (single-planar)
pub struct Format {
    /// width in pixels
    pub width: u32,
    /// height in pixels
    pub height: u32,
    /// pixelformat code
    pub fourcc: FourCC,

    /// bytes per line
    pub stride: u32,
    /// maximum number of bytes required to store an image
    pub size: u32,
}

impl Format {
    /// Returns a capture format
    ///
    /// # Arguments
    ///
    /// * `width` - Width in pixels
    /// * `height` - Height in pixels
    /// * `fourcc` - Four character code (pixelformat)
    ///
    /// # Example
    ///
    /// ```
    /// use v4l_capture::{Format, FourCC};
    /// let fmt = Format::new(640, 480, FourCC::new(b"YUYV"));
    /// ```
    pub const fn new(width: u32, height: u32, fourcc: FourCC) -> Self {
        Format {
            width,
            height,
            fourcc,
            stride: 0,
            size: 0,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} {} ({}), stride {}, {} bytes",
            self.width,
            self.height,
            self.fourcc,
            self.fourcc.description(),
            self.stride,
            self.size
        )
    }
}

impl From<v4l2_pix_format> for Format {
    fn from(fmt: v4l2_pix_format) -> Self {
        Self {
            width: fmt.width,
            height: fmt.height,
            fourcc: FourCC::from(fmt.pixelformat),
            stride: fmt.bytesperline,
            size: fmt.sizeimage,
        }
    }
}

impl From<Format> for v4l2_pix_format {
    fn from(format: Format) -> Self {
        Self {
            width: format.width,
            height: format.height,
            pixelformat: format.fourcc.into(),
            field: v4l2_field_V4L2_FIELD_ANY,
            bytesperline: format.stride,
            sizeimage: format.size,
            ..unsafe { mem::zeroed() }
        }
    }
}

#[derive(Debug, Clone)]
/// Format description as returned by VIDIOC_ENUM_FMT
pub struct Description {
    /// index in the driver's list of formats
    pub index: u32,
    /// driver flags, e.g. compressed or emulated
    pub flags: u32,
    /// description of the format
    pub description: String,
    /// pixelformat code
    pub fourcc: FourCC,
}

impl From<v4l2_fmtdesc> for Description {
    fn from(desc: v4l2_fmtdesc) -> Self {
        let end = desc
            .description
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(desc.description.len());

        Description {
            index: desc.index,
            flags: desc.flags,
            description: String::from_utf8_lossy(&desc.description[..end]).into_owned(),
            fourcc: FourCC::from(desc.pixelformat),
        }
    }
}

impl fmt::Display for Description {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.index, self.fourcc, self.description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pix_format_conversion_keeps_driver_values() {
        let mut raw: v4l2_pix_format = unsafe { mem::zeroed() };
        raw.width = 1280;
        raw.height = 640;
        raw.pixelformat = FourCC::new(b"MJPG").into();
        raw.bytesperline = 0;
        raw.sizeimage = 1_638_400;

        let fmt = Format::from(raw);
        assert_eq!(fmt.width, 1280);
        assert_eq!(fmt.height, 640);
        assert_eq!(fmt.fourcc, FourCC::new(b"MJPG"));
        assert_eq!(fmt.size, 1_638_400);

        let back = v4l2_pix_format::from(fmt);
        assert_eq!(back.pixelformat, raw.pixelformat);
        assert_eq!(back.field, v4l2_field_V4L2_FIELD_ANY);
    }
}
