use std::ops::Range;
use std::ptr::NonNull;
use std::sync::Arc;
use std::{io, slice};

use crate::buffer::{BufferInfo, Dequeued};
use crate::device::Device;
use crate::error::{Error, Result};
use crate::Frame;

/// Fewest buffers a pool accepts, one being filled by the hardware while another is drained
pub const MIN_BUFFERS: u32 = 2;

/// Who may touch a slot's memory right now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// Not queued and not holding a capture; must not be read
    Idle,
    /// Queued on the driver, the device may write into it at any time
    Kernel,
    /// Dequeued, readable until handed back to the driver
    User,
}

struct Slot {
    index: u32,
    ptr: NonNull<u8>,
    length: usize,
    owner: Ownership,
}

/// Fixed set of memory-mapped capture buffers
///
/// Slot `i` maps kernel buffer `i`. Every slot is mapped on creation and unmapped on drop; the
/// pool keeps the device alive until then, since mappings are tied to its file descriptor.
pub struct BufferPool<D: Device> {
    device: Arc<D>,
    slots: Vec<Slot>,
}

// SAFETY: the mappings are reachable only through the pool, and the pool only moves between
// threads as a whole, so there is never more than one thread touching a slot.
unsafe impl<D: Device + Send + Sync> Send for BufferPool<D> {}

impl<D: Device> BufferPool<D> {
    /// Requests `count` buffers from the device and maps each one
    ///
    /// The driver may grant fewer buffers than requested; fewer than [`MIN_BUFFERS`] is an
    /// error. On any failure, mappings made so far are removed and the driver buffers freed
    /// before returning.
    pub fn allocate(device: Arc<D>, count: u32) -> Result<Self> {
        let granted = device
            .request_buffers(count)
            .map_err(Error::BufferRequestFailed)?;

        let mut pool = BufferPool {
            device,
            slots: Vec::with_capacity(granted as usize),
        };

        if granted < MIN_BUFFERS {
            // dropping the empty pool hands the granted buffers back
            return Err(Error::InsufficientBuffers {
                granted,
                required: MIN_BUFFERS,
            });
        }

        for index in 0..granted {
            let slot = pool
                .map_slot(index)
                .map_err(|source| Error::MappingFailed { index, source })?;
            pool.slots.push(slot);
        }

        Ok(pool)
    }

    fn map_slot(&self, index: u32) -> io::Result<Slot> {
        let info: BufferInfo = self.device.query_buffer(index)?;
        let ptr = self.device.map(&info)?;

        Ok(Slot {
            index,
            ptr,
            length: info.length as usize,
            owner: Ownership::Idle,
        })
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Mapped length of the slot at `index`
    pub fn slot_len(&self, index: usize) -> Option<usize> {
        self.slots.get(index).map(|slot| slot.length)
    }

    /// Current owner of the slot at `index`
    pub fn ownership(&self, index: usize) -> Option<Ownership> {
        self.slots.get(index).map(|slot| slot.owner)
    }

    /// Address ranges of all mappings, for diagnostics
    pub fn address_ranges(&self) -> Vec<Range<usize>> {
        self.slots
            .iter()
            .map(|slot| {
                let start = slot.ptr.as_ptr() as usize;
                start..start + slot.length
            })
            .collect()
    }

    /// Base pointer and length of a slot
    pub(crate) fn slot(&self, index: usize) -> Option<(NonNull<u8>, usize)> {
        self.slots.get(index).map(|slot| (slot.ptr, slot.length))
    }

    /// Hands a slot to the driver
    pub(crate) fn queue(&mut self, index: usize) -> Result<()> {
        let slot = &mut self.slots[index];
        debug_assert_ne!(slot.owner, Ownership::Kernel, "slot queued twice");

        self.device
            .queue(slot.index)
            .map_err(|source| Error::BufferEnqueueFailed {
                index: slot.index,
                source,
            })?;
        slot.owner = Ownership::Kernel;
        Ok(())
    }

    /// Hands every slot to the driver
    pub(crate) fn queue_all(&mut self) -> Result<()> {
        for index in 0..self.slots.len() {
            self.queue(index)?;
        }
        Ok(())
    }

    /// Marks every slot idle; the driver returns queued buffers on stream-off
    pub(crate) fn reclaim_all(&mut self) {
        for slot in &mut self.slots {
            slot.owner = Ownership::Idle;
        }
    }

    /// Number of slots currently owned by the driver
    pub fn queued(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.owner == Ownership::Kernel)
            .count()
    }

    /// Takes a filled buffer back from the driver
    ///
    /// Returns `Ok(None)` when the device is non-blocking and nothing is ready yet. The report is
    /// validated before the slot is considered readable.
    pub(crate) fn dequeue(&mut self) -> Result<Option<Dequeued>> {
        let dq = match self.device.dequeue() {
            Ok(dq) => dq,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(None),
            Err(e) => return Err(Error::DequeueFailed(e)),
        };

        let index = dq.index as usize;
        let corrupt = |length| Error::CorruptBufferReport {
            index: dq.index,
            bytes_used: dq.bytes_used,
            length,
        };

        let slot = match self.slots.get_mut(index) {
            Some(slot) if slot.owner == Ownership::Kernel => slot,
            Some(slot) => return Err(corrupt(slot.length)),
            None => return Err(corrupt(0)),
        };
        slot.owner = Ownership::User;

        if dq.bytes_used as usize > slot.length {
            let length = slot.length;
            // the slot never becomes readable, give it straight back
            self.queue(index)?;
            return Err(corrupt(length));
        }

        Ok(Some(dq))
    }

    /// Copies a dequeued slot into a new frame, then re-queues the slot
    ///
    /// The copy is finished before the driver regains the slot. If re-queueing fails the frame
    /// is lost and the error returned; the slot stays out of the driver's queue.
    pub(crate) fn copy_and_requeue(&mut self, dq: &Dequeued) -> Result<Frame> {
        let index = dq.index as usize;
        let len = dq.bytes_used as usize;
        let corrupt = |length| Error::CorruptBufferReport {
            index: dq.index,
            bytes_used: dq.bytes_used,
            length,
        };

        let (ptr, length) = self.slot(index).ok_or_else(|| corrupt(0))?;
        if len > length || self.slots[index].owner != Ownership::User {
            return Err(corrupt(length));
        }

        // SAFETY: the slot is user-owned, so the device does not write into it, and `len` is
        // within the mapping.
        let data = unsafe { slice::from_raw_parts(ptr.as_ptr(), len) }.to_vec();

        self.queue(index)?;
        Ok(Frame::new(data, dq.meta))
    }

    /// Unmaps every slot and frees the driver buffers
    fn release(&mut self) -> io::Result<()> {
        let mut result = Ok(());

        for slot in self.slots.drain(..) {
            // SAFETY: each slot holds a live mapping from `map` and no frame borrows from it
            if let Err(e) = unsafe { self.device.unmap(slot.ptr, slot.length) } {
                result = Err(e);
            }
        }

        // free all buffers by requesting 0
        self.device.request_buffers(0)?;
        result
    }
}

impl<D: Device> Drop for BufferPool<D> {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            tracing::warn!("failed to release capture buffers: {}", e);
        }
    }
}
