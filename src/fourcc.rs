use std::{fmt, str};

#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash)]
/// Four character code representing a pixelformat
pub struct FourCC {
    pub repr: [u8; 4],
}

impl FourCC {
    #[allow(clippy::trivially_copy_pass_by_ref)]
    /// Returns a pixelformat as four character code
    ///
    /// # Arguments
    ///
    /// * `repr` - Four characters as raw bytes
    ///
    /// # Example
    ///
    /// ```
    /// use v4l_capture::FourCC;
    /// let fourcc = FourCC::new(b"YUYV");
    /// ```
    pub const fn new(repr: &[u8; 4]) -> FourCC {
        FourCC { repr: *repr }
    }

    /// Returns the string representation of a four character code
    ///
    /// Fails if the code is not valid UTF-8.
    pub fn str(&self) -> Result<&str, str::Utf8Error> {
        str::from_utf8(&self.repr)
    }

    /// Human readable name of well-known capture formats
    ///
    /// # Example
    ///
    /// ```
    /// use v4l_capture::FourCC;
    /// assert_eq!(FourCC::new(b"MJPG").description(), "Motion-JPEG");
    /// ```
    pub fn description(&self) -> &'static str {
        match &self.repr {
            b"MJPG" => "Motion-JPEG",
            b"JPEG" => "JFIF JPEG",
            b"MPEG" => "MPEG-1/2/4 Multiplexed",
            b"MPG1" => "MPEG-1 ES",
            b"MPG2" => "MPEG-2 ES",
            b"MPG4" => "MPEG-4 part 2 ES",
            b"YUYV" => "(YUYV) YUV 4:2:2",
            b"YYUV" => "(YYUV) YUV 4:2:2",
            b"YVYU" => "(YVYU) YVU 4:2:2",
            b"UYVY" => "(UYVY) YUV 4:2:2",
            b"VYUY" => "(VYUY) YUV 4:2:2",
            _ => "Other format",
        }
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Ok(string) = self.str() {
            write!(f, "{}", string)?;
        }
        Ok(())
    }
}

impl From<u32> for FourCC {
    fn from(code: u32) -> Self {
        FourCC::new(&code.to_le_bytes())
    }
}

impl From<FourCC> for u32 {
    fn from(fourcc: FourCC) -> Self {
        Self::from_le_bytes(fourcc.repr)
    }
}
