use std::ops::{Deref, DerefMut};

use crate::buffer::Metadata;

/// One captured image, copied out of a device buffer
///
/// A frame owns its bytes and shares no memory with the buffer pool it came from, so it can be
/// kept, mutated or sent to another thread (e.g. an encoder) without coordinating with the
/// capture session. Width, height and pixel format belong to the session's
/// [`Format`](crate::Format), not to the frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    data: Vec<u8>,
    meta: Metadata,
}

impl Frame {
    /// Returns a frame holding `data`
    ///
    /// # Arguments
    ///
    /// * `data` - Image bytes
    /// * `meta` - Metadata, usually filled in by the driver
    ///
    /// # Example
    ///
    /// ```
    /// use v4l_capture::{buffer::Metadata, Frame};
    ///
    /// let frame = Frame::new(vec![0u8; 16], Metadata::default());
    /// assert_eq!(frame.len(), 16);
    /// ```
    pub fn new(data: Vec<u8>, meta: Metadata) -> Self {
        Frame { data, meta }
    }

    /// Image bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable image bytes
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Number of bytes the device delivered, zero for an empty capture
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Sequence number, timestamp and flags reported by the driver
    pub fn meta(&self) -> &Metadata {
        &self.meta
    }

    /// Consumes the frame, returning its bytes
    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }
}

impl Deref for Frame {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

impl DerefMut for Frame {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.data
    }
}

impl From<Frame> for Vec<u8> {
    fn from(frame: Frame) -> Self {
        frame.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_do_not_alias() {
        let original = Frame::new(vec![1, 2, 3], Metadata::default());
        let mut copy = original.clone();
        copy[0] = 9;

        assert_eq!(original.data(), &[1, 2, 3]);
        assert_eq!(copy.data(), &[9, 2, 3]);
        assert_ne!(original.data().as_ptr(), copy.data().as_ptr());
    }

    #[test]
    fn frames_are_send() {
        fn assert_send<T: Send + 'static>() {}
        assert_send::<Frame>();
    }
}
