//! Buffer frame management.

use oak_common::ExtentId;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

/// Sentinel value indicating no extent is loaded in the frame.
const NO_EXTENT: u64 = u64::MAX;

/// Unique identifier for a frame in the buffer pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(pub u32);

impl FrameId {
    /// Invalid frame ID.
    pub const INVALID: FrameId = FrameId(u32::MAX);

    /// Returns true if this is a valid frame ID.
    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }
}

impl std::fmt::Display for FrameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "frame:{}", self.0)
    }
}

/// A frame in the buffer pool holding a single extent.
///
/// Each frame contains the extent bytes plus the metadata needed for
/// buffer management: the id of the resident extent, a pin count, and a
/// dirty flag. Only an unpinned frame may be evicted, and a dirty frame
/// must be written back before its slot is reused.
pub struct BufferFrame {
    /// Frame identifier.
    frame_id: FrameId,
    /// The extent currently stored in this frame (NO_EXTENT = none).
    extent_id: AtomicU64,
    /// Extent data buffer, sized to the storage extent size.
    data: RwLock<Box<[u8]>>,
    /// Number of users currently holding this extent pinned.
    pin_count: AtomicU32,
    /// Whether the extent has been modified since it was loaded.
    dirty: AtomicBool,
}

impl BufferFrame {
    /// Creates a new empty buffer frame holding `extent_size` bytes.
    pub fn new(frame_id: FrameId, extent_size: usize) -> Self {
        Self {
            frame_id,
            extent_id: AtomicU64::new(NO_EXTENT),
            data: RwLock::new(vec![0u8; extent_size].into_boxed_slice()),
            pin_count: AtomicU32::new(0),
            dirty: AtomicBool::new(false),
        }
    }

    /// Returns the frame ID.
    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    /// Returns the extent currently stored in this frame.
    #[inline]
    pub fn extent_id(&self) -> Option<ExtentId> {
        let raw = self.extent_id.load(Ordering::Acquire);
        if raw == NO_EXTENT {
            None
        } else {
            Some(ExtentId(raw))
        }
    }

    /// Binds the frame to an extent, or detaches it.
    #[inline]
    pub fn set_extent_id(&self, extent_id: Option<ExtentId>) {
        let raw = extent_id.map(|e| e.0).unwrap_or(NO_EXTENT);
        self.extent_id.store(raw, Ordering::Release);
    }

    /// Returns the current pin count.
    #[inline]
    pub fn pin_count(&self) -> u32 {
        self.pin_count.load(Ordering::Acquire)
    }

    /// Increments the pin count and returns the previous value.
    #[inline]
    pub fn pin(&self) -> u32 {
        self.pin_count.fetch_add(1, Ordering::AcqRel)
    }

    /// Decrements the pin count and returns the new value.
    ///
    /// The caller must ensure the count is non-zero; the pool enforces
    /// this and reports `NotPinned` before ever reaching the counter.
    #[inline]
    pub fn unpin(&self) -> u32 {
        let prev = self.pin_count.fetch_sub(1, Ordering::AcqRel);
        if prev == 0 {
            // Underflow protection: restore to 0.
            self.pin_count.store(0, Ordering::Release);
            return 0;
        }
        prev - 1
    }

    /// Returns true if this frame is pinned.
    #[inline]
    pub fn is_pinned(&self) -> bool {
        self.pin_count.load(Ordering::Acquire) > 0
    }

    /// Returns true if this frame is dirty.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Sets or clears the dirty flag.
    #[inline]
    pub fn set_dirty(&self, dirty: bool) {
        self.dirty.store(dirty, Ordering::Release);
    }

    /// Returns true if no extent is loaded.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.extent_id.load(Ordering::Acquire) == NO_EXTENT
    }

    /// Reads the extent data.
    #[inline]
    pub fn read_data(&self) -> parking_lot::RwLockReadGuard<'_, Box<[u8]>> {
        self.data.read()
    }

    /// Writes to the extent data.
    #[inline]
    pub fn write_data(&self) -> parking_lot::RwLockWriteGuard<'_, Box<[u8]>> {
        self.data.write()
    }

    /// Copies data into the frame.
    #[inline]
    pub fn copy_from(&self, src: &[u8]) {
        let mut data = self.data.write();
        let len = src.len().min(data.len());
        data[..len].copy_from_slice(&src[..len]);
    }

    /// Resets the frame to an empty, zeroed state.
    #[inline]
    pub fn reset(&self) {
        self.extent_id.store(NO_EXTENT, Ordering::Release);
        self.pin_count.store(0, Ordering::Release);
        self.dirty.store(false, Ordering::Release);
        self.data.write().fill(0);
    }
}

impl std::fmt::Debug for BufferFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferFrame")
            .field("frame_id", &self.frame_id)
            .field("extent_id", &self.extent_id())
            .field("pin_count", &self.pin_count())
            .field("dirty", &self.is_dirty())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_EXTENT_SIZE: usize = 4096;

    #[test]
    fn test_frame_id_validity() {
        assert!(FrameId(0).is_valid());
        assert!(!FrameId::INVALID.is_valid());
    }

    #[test]
    fn test_frame_id_display() {
        assert_eq!(FrameId(42).to_string(), "frame:42");
    }

    #[test]
    fn test_buffer_frame_new() {
        let frame = BufferFrame::new(FrameId(0), TEST_EXTENT_SIZE);

        assert_eq!(frame.frame_id(), FrameId(0));
        assert!(frame.extent_id().is_none());
        assert_eq!(frame.pin_count(), 0);
        assert!(!frame.is_dirty());
        assert!(frame.is_empty());
        assert_eq!(frame.read_data().len(), TEST_EXTENT_SIZE);
    }

    #[test]
    fn test_buffer_frame_pin_unpin() {
        let frame = BufferFrame::new(FrameId(0), TEST_EXTENT_SIZE);

        assert!(!frame.is_pinned());

        frame.pin();
        assert!(frame.is_pinned());
        assert_eq!(frame.pin_count(), 1);

        frame.pin();
        assert_eq!(frame.pin_count(), 2);

        assert_eq!(frame.unpin(), 1);
        assert!(frame.is_pinned());

        assert_eq!(frame.unpin(), 0);
        assert!(!frame.is_pinned());
    }

    #[test]
    fn test_buffer_frame_unpin_underflow() {
        let frame = BufferFrame::new(FrameId(0), TEST_EXTENT_SIZE);

        assert_eq!(frame.unpin(), 0);
        assert_eq!(frame.pin_count(), 0);
    }

    #[test]
    fn test_buffer_frame_dirty() {
        let frame = BufferFrame::new(FrameId(0), TEST_EXTENT_SIZE);

        assert!(!frame.is_dirty());
        frame.set_dirty(true);
        assert!(frame.is_dirty());
        frame.set_dirty(false);
        assert!(!frame.is_dirty());
    }

    #[test]
    fn test_buffer_frame_extent_binding() {
        let frame = BufferFrame::new(FrameId(0), TEST_EXTENT_SIZE);

        frame.set_extent_id(Some(ExtentId(7)));
        assert_eq!(frame.extent_id(), Some(ExtentId(7)));
        assert!(!frame.is_empty());

        frame.set_extent_id(None);
        assert!(frame.extent_id().is_none());
        assert!(frame.is_empty());
    }

    #[test]
    fn test_buffer_frame_data_access() {
        let frame = BufferFrame::new(FrameId(0), TEST_EXTENT_SIZE);

        {
            let mut data = frame.write_data();
            data[0] = 0xAB;
            data[TEST_EXTENT_SIZE - 1] = 0xCD;
        }

        let data = frame.read_data();
        assert_eq!(data[0], 0xAB);
        assert_eq!(data[TEST_EXTENT_SIZE - 1], 0xCD);
    }

    #[test]
    fn test_buffer_frame_copy_from() {
        let frame = BufferFrame::new(FrameId(0), TEST_EXTENT_SIZE);
        let src = [1u8, 2, 3, 4, 5];

        frame.copy_from(&src);
        assert_eq!(&frame.read_data()[..5], &src);
    }

    #[test]
    fn test_buffer_frame_reset() {
        let frame = BufferFrame::new(FrameId(0), TEST_EXTENT_SIZE);

        frame.set_extent_id(Some(ExtentId(3)));
        frame.pin();
        frame.set_dirty(true);
        frame.write_data()[0] = 0xFF;

        frame.reset();

        assert!(frame.extent_id().is_none());
        assert_eq!(frame.pin_count(), 0);
        assert!(!frame.is_dirty());
        assert_eq!(frame.read_data()[0], 0);
    }
}
