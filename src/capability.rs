use bitflags::bitflags;
use std::fmt;

use crate::v4l_sys::v4l2_capability;

bitflags! {
    #[allow(clippy::unreadable_literal)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Flags: u32 {
        const VIDEO_CAPTURE         = 0x00000001;
        const VIDEO_OUTPUT          = 0x00000002;
        const VIDEO_OVERLAY         = 0x00000004;
        const VBI_CAPTURE           = 0x00000010;
        const VBI_OUTPUT            = 0x00000020;
        const SLICED_VBI_CAPTURE    = 0x00000040;
        const SLICED_VBI_OUTPUT     = 0x00000080;
        const RDS_CAPTURE           = 0x00000100;
        const VIDEO_OUTPUT_OVERLAY  = 0x00000200;
        const HW_FREQ_SEEK          = 0x00000400;
        const RDS_OUTPUT            = 0x00000800;

        const VIDEO_CAPTURE_MPLANE  = 0x00001000;
        const VIDEO_OUTPUT_MPLANE   = 0x00002000;
        const VIDEO_M2M_MPLANE      = 0x00004000;
        const VIDEO_M2M             = 0x00008000;

        const TUNER                 = 0x00010000;
        const AUDIO                 = 0x00020000;
        const RADIO                 = 0x00040000;
        const MODULATOR             = 0x00080000;

        const SDR_CAPTURE           = 0x00100000;
        const EXT_PIX_FORMAT        = 0x00200000;
        const SDR_OUTPUT            = 0x00400000;
        const META_CAPTURE          = 0x00800000;

        const READ_WRITE            = 0x01000000;
        const ASYNC_IO              = 0x02000000;
        const STREAMING             = 0x04000000;
        const META_OUTPUT           = 0x08000000;

        const TOUCH                 = 0x10000000;

        const DEVICE_CAPS           = 0x80000000;
    }
}

impl From<u32> for Flags {
    fn from(flags: u32) -> Self {
        Self::from_bits_retain(flags)
    }
}

impl From<Flags> for u32 {
    fn from(flags: Flags) -> Self {
        flags.bits()
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone)]
/// Device capabilities
pub struct Capabilities {
    /// Driver name, e.g. uvc for usb video class devices
    pub driver: String,
    /// Card name
    pub card: String,
    /// Bus name, e.g. USB or PCI
    pub bus: String,
    /// Version number MAJOR.MINOR.PATCH
    pub version: (u8, u8, u8),

    /// Capability flags
    pub capabilities: Flags,
}

impl Capabilities {
    /// Whether the node can stream single-planar video frames through mapped buffers
    pub fn supports_streaming_capture(&self) -> bool {
        self.capabilities
            .contains(Flags::VIDEO_CAPTURE | Flags::STREAMING)
    }
}

/// Decodes a fixed-size, NUL padded C string field
fn c_str(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

impl From<v4l2_capability> for Capabilities {
    fn from(cap: v4l2_capability) -> Self {
        // device_caps describes the opened node, capabilities the whole physical device
        let flags = Flags::from(cap.capabilities);
        let capabilities = if flags.contains(Flags::DEVICE_CAPS) {
            Flags::from(cap.device_caps)
        } else {
            flags
        };

        Capabilities {
            driver: c_str(&cap.driver),
            card: c_str(&cap.card),
            bus: c_str(&cap.bus_info),
            version: (
                ((cap.version >> 16) & 0xff) as u8,
                ((cap.version >> 8) & 0xff) as u8,
                (cap.version & 0xff) as u8,
            ),
            capabilities,
        }
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Driver      : {}", self.driver)?;
        writeln!(f, "Card        : {}", self.card)?;
        writeln!(f, "Bus         : {}", self.bus)?;
        writeln!(
            f,
            "Version     : {}.{}.{}",
            self.version.0, self.version.1, self.version.2
        )?;
        writeln!(f, "Capabilites : {}", self.capabilities)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem;

    fn raw_caps(capabilities: u32, device_caps: u32) -> v4l2_capability {
        let mut cap: v4l2_capability = unsafe { mem::zeroed() };
        cap.driver[..3].copy_from_slice(b"uvc");
        cap.card[..6].copy_from_slice(b"Webcam");
        cap.version = 0x0005_0a03;
        cap.capabilities = capabilities;
        cap.device_caps = device_caps;
        cap
    }

    #[test]
    fn prefers_device_caps_when_flagged() {
        let caps = Capabilities::from(raw_caps(
            0x8400_0003,
            (Flags::VIDEO_CAPTURE | Flags::STREAMING).bits(),
        ));
        assert_eq!(caps.driver, "uvc");
        assert_eq!(caps.card, "Webcam");
        assert_eq!(caps.version, (5, 10, 3));
        assert!(caps.supports_streaming_capture());
        assert!(!caps.capabilities.contains(Flags::VIDEO_OUTPUT));
    }

    #[test]
    fn output_only_node_is_not_capture() {
        let caps = Capabilities::from(raw_caps(
            (Flags::VIDEO_OUTPUT | Flags::STREAMING).bits(),
            0,
        ));
        assert!(!caps.supports_streaming_capture());
    }
}
