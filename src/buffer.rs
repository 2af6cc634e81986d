use bitflags::bitflags;
use std::fmt;

use crate::Timestamp;

bitflags! {
    #[allow(clippy::unreadable_literal)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Flags: u32 {
        /// Buffer is mapped
        const MAPPED                = 0x00000001;
        /// Buffer is queued for processing
        const QUEUED                = 0x00000002;
        /// Buffer is ready
        const DONE                  = 0x00000004;
        /// Image is a keyframe (I-frame)
        const KEYFRAME              = 0x00000008;
        /// Image is a P-frame
        const PFRAME                = 0x00000010;
        /// Image is a B-frame
        const BFRAME                = 0x00000020;
        /// Buffer is ready, but the data contained within is corrupted
        const ERROR                 = 0x00000040;
        /// Timecode field is valid
        const TIMECODE              = 0x00000100;
        /// Buffer is prepared for queuing
        const PREPARED              = 0x00000400;
        /// Timestamp type
        const TIMESTAMP_MONOTONIC   = 0x00002000;
        const TIMESTAMP_COPY        = 0x00004000;
        /// Timestamp taken at start of exposure rather than end of frame
        const TSTAMP_SRC_SOE        = 0x00010000;
        /// Last buffer produced by the hardware
        const LAST                  = 0x00100000;
    }
}

impl Default for Flags {
    fn default() -> Self {
        Flags::empty()
    }
}

impl From<u32> for Flags {
    fn from(flags: u32) -> Self {
        Self::from_bits_truncate(flags)
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

/// Buffer metadata, mostly used not to convolute the main buffer structs
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct Metadata {
    /// Sequence number, counting the frames
    pub sequence: u32,
    /// Time of capture (usually set by the driver)
    pub timestamp: Timestamp,
    /// Buffer flags
    pub flags: Flags,
}

/// Kernel-side placement of one buffer, as reported by VIDIOC_QUERYBUF
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BufferInfo {
    /// Kernel buffer index
    pub index: u32,
    /// Offset to pass to mmap(2)
    pub offset: u32,
    /// Length of the buffer in bytes
    pub length: u32,
}

/// A buffer handed back by the driver through VIDIOC_DQBUF
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Dequeued {
    /// Kernel buffer index
    pub index: u32,
    /// Number of bytes the driver wrote into the buffer
    pub bytes_used: u32,
    /// Sequence, timestamp and flags of the capture
    pub meta: Metadata,
}
