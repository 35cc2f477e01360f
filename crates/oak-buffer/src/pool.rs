//! Buffer pool manager.

use crate::frame::{BufferFrame, FrameId};
use crate::replacer::{ClockReplacer, Replacer};
use crate::table::ExtentTable;
use log::{debug, trace};
use oak_common::{ExtentId, OakError, Result};
use oak_store::ExtentStore;
use parking_lot::Mutex;
use sysinfo::System;

/// Configuration for the buffer pool.
#[derive(Debug, Clone)]
pub struct BufferPoolConfig {
    /// Number of frames in the pool.
    pub num_frames: usize,
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self { num_frames: 1024 }
    }
}

/// Buffer pool manager.
///
/// Caches extents of an owned `ExtentStore` in a fixed set of frames:
/// - Extent id to frame id mapping (lock-free extent table)
/// - Free frame list for unoccupied frames
/// - Clock replacement for eviction, restricted to unpinned frames
/// - Dirty write-back through the store before a victim frame is reused
///
/// A pinned extent is represented by a `BufferHandle`; holding one is the
/// proof that the frame's bytes may be read (and, after `mark_dirty`,
/// that a modification will be written back).
pub struct BufferPool {
    /// The extent store backing this pool.
    store: ExtentStore,
    /// Extent size in bytes, mirrored from the store.
    extent_size: usize,
    /// Array of buffer frames.
    frames: Vec<BufferFrame>,
    /// Extent id to frame id mapping.
    table: ExtentTable,
    /// List of free frame IDs.
    free_list: Mutex<Vec<FrameId>>,
    /// Extents released by callers, recycled by `alloc` before reserving
    /// new file space.
    free_extents: Mutex<Vec<ExtentId>>,
    /// Frame replacement policy.
    replacer: ClockReplacer,
}

impl BufferPool {
    /// Creates a new buffer pool over the given store.
    pub fn new(store: ExtentStore, config: BufferPoolConfig) -> Self {
        let num_frames = config.num_frames;
        let extent_size = store.extent_size();

        let frames: Vec<_> = (0..num_frames)
            .map(|i| BufferFrame::new(FrameId(i as u32), extent_size))
            .collect();
        let free_list: Vec<_> = (0..num_frames).map(|i| FrameId(i as u32)).collect();

        Self {
            store,
            extent_size,
            frames,
            table: ExtentTable::new(num_frames),
            free_list: Mutex::new(free_list),
            free_extents: Mutex::new(Vec::new()),
            replacer: ClockReplacer::new(num_frames),
        }
    }

    /// Creates a buffer pool sized to 25% of available system RAM.
    ///
    /// Minimum 1,000 frames so caching stays useful on low-memory
    /// systems.
    pub fn auto_sized(store: ExtentStore) -> Self {
        let mut sys = System::new_all();
        sys.refresh_memory();

        let available_bytes = sys.available_memory() as usize;
        let target_bytes = available_bytes / 4;
        let num_frames = (target_bytes / store.extent_size()).max(1_000);

        Self::new(store, BufferPoolConfig { num_frames })
    }

    /// Returns the number of frames in the pool.
    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    /// Returns the number of free frames.
    pub fn free_count(&self) -> usize {
        self.free_list.lock().len()
    }

    /// Returns the number of extents currently resident.
    pub fn resident_count(&self) -> usize {
        self.table.len()
    }

    /// Checks if an extent is resident in the pool.
    pub fn contains(&self, extent_id: ExtentId) -> bool {
        self.table.contains(extent_id)
    }

    /// Returns the extent size in bytes.
    pub fn extent_size(&self) -> usize {
        self.extent_size
    }

    /// Returns the underlying extent store.
    pub fn store(&self) -> &ExtentStore {
        &self.store
    }

    /// Acquires a frame for a new resident extent.
    ///
    /// Tries the free list first, then evicts an unpinned victim, writing
    /// it back first when dirty. The returned frame is not in the
    /// replacer's evictable set.
    fn acquire_frame(&self) -> Result<FrameId> {
        if let Some(frame_id) = self.free_list.lock().pop() {
            return Ok(frame_id);
        }

        let victim = self
            .replacer
            .evict(&|fid| self.frames[fid.0 as usize].pin_count() == 0)
            .ok_or(OakError::PoolExhausted)?;

        let frame = &self.frames[victim.0 as usize];
        if let Some(old_extent) = frame.extent_id() {
            if frame.is_dirty() {
                trace!("evicting dirty {old_extent}, writing back");
                let data = frame.read_data();
                self.store.write(&data[..], old_extent)?;
                drop(data);
                frame.set_dirty(false);
            }
            self.table.remove(old_extent);
        }

        Ok(victim)
    }

    /// Returns a frame acquired by `acquire_frame` to the free list.
    fn restore_frame(&self, frame_id: FrameId) {
        self.frames[frame_id.0 as usize].reset();
        self.free_list.lock().push(frame_id);
    }

    /// Reserves a fresh extent and binds it to a frame with pin count 1.
    ///
    /// The frame contents start zeroed and dirty: a recycled extent may
    /// hold stale bytes on disk, and the zeroed image must win. Released
    /// extents are reused before new file space is reserved.
    pub fn alloc(&self) -> Result<BufferHandle<'_>> {
        let frame_id = self.acquire_frame()?;

        let extent_id = match self.free_extents.lock().pop() {
            Some(recycled) => recycled,
            None => match self.store.reserve(1) {
                Ok(extent_id) => extent_id,
                Err(e) => {
                    self.restore_frame(frame_id);
                    return Err(e);
                }
            },
        };

        let frame = &self.frames[frame_id.0 as usize];
        frame.reset();
        frame.set_extent_id(Some(extent_id));
        frame.pin();
        frame.set_dirty(true);

        self.table.insert(extent_id, frame_id);
        self.replacer.record_access(frame_id);

        trace!("alloc {extent_id} -> {frame_id}");
        Ok(BufferHandle {
            extent_id,
            frame,
        })
    }

    /// Pins an extent, loading it from the store on a cache miss.
    pub fn pin(&self, extent_id: ExtentId) -> Result<BufferHandle<'_>> {
        if !extent_id.is_valid() || extent_id == ExtentId::HEADER {
            return Err(OakError::OutOfBoundsExtent {
                extent_id: extent_id.0,
                size: self.store.size(),
            });
        }

        if let Some(frame_id) = self.table.get(extent_id) {
            let frame = &self.frames[frame_id.0 as usize];
            frame.pin();
            self.replacer.record_access(frame_id);
            self.replacer.set_evictable(frame_id, false);
            return Ok(BufferHandle { extent_id, frame });
        }

        let frame_id = self.acquire_frame()?;
        let frame = &self.frames[frame_id.0 as usize];
        frame.reset();

        {
            let mut data = frame.write_data();
            if let Err(e) = self.store.read(&mut data[..], extent_id) {
                drop(data);
                self.restore_frame(frame_id);
                return Err(e);
            }
        }

        frame.set_extent_id(Some(extent_id));
        frame.pin();
        self.table.insert(extent_id, frame_id);
        self.replacer.record_access(frame_id);

        trace!("pin miss {extent_id} -> {frame_id}");
        Ok(BufferHandle { extent_id, frame })
    }

    /// Unpins an extent.
    ///
    /// Fails with `NotResident` for uncached extents and `NotPinned` when
    /// the pin count is already zero. A frame reaching pin count zero
    /// becomes evictable.
    pub fn unpin(&self, extent_id: ExtentId) -> Result<()> {
        let frame_id = self
            .table
            .get(extent_id)
            .ok_or(OakError::NotResident(extent_id.0))?;
        let frame = &self.frames[frame_id.0 as usize];

        if frame.pin_count() == 0 {
            return Err(OakError::NotPinned(extent_id.0));
        }
        if frame.unpin() == 0 {
            self.replacer.set_evictable(frame_id, true);
        }
        Ok(())
    }

    /// Marks a resident extent dirty.
    pub fn mark_dirty(&self, extent_id: ExtentId) -> Result<()> {
        let frame_id = self
            .table
            .get(extent_id)
            .ok_or(OakError::NotResident(extent_id.0))?;
        self.frames[frame_id.0 as usize].set_dirty(true);
        Ok(())
    }

    /// Releases an extent back to the pool for reuse.
    ///
    /// The extent must be resident and unpinned; it is detached from its
    /// frame and the id is recorded for reuse by `alloc`. Releasing an
    /// extent the pool does not hold fails with `NotResident`, so a
    /// double release can never enter the same id into the recycle list
    /// twice. Underlying file space is not reclaimed.
    pub fn release(&self, extent_id: ExtentId) -> Result<()> {
        let frame_id = self
            .table
            .get(extent_id)
            .ok_or(OakError::NotResident(extent_id.0))?;
        let frame = &self.frames[frame_id.0 as usize];
        if frame.is_pinned() {
            return Err(OakError::StillPinned(extent_id.0));
        }

        self.table.remove(extent_id);
        self.replacer.remove(frame_id);
        frame.reset();
        self.free_list.lock().push(frame_id);
        self.free_extents.lock().push(extent_id);
        trace!("released {extent_id}");
        Ok(())
    }

    /// Writes a resident dirty extent through the store.
    ///
    /// Returns true if the extent was written.
    pub fn flush_page(&self, extent_id: ExtentId) -> Result<bool> {
        if let Some(frame_id) = self.table.get(extent_id) {
            let frame = &self.frames[frame_id.0 as usize];
            if frame.is_dirty() {
                let data = frame.read_data();
                self.store.write(&data[..], extent_id)?;
                drop(data);
                frame.set_dirty(false);
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Writes all resident dirty extents through the store.
    ///
    /// Returns the number of extents written.
    pub fn flush_all(&self) -> Result<usize> {
        let mut resident = Vec::new();
        self.table.for_each(|extent_id, frame_id| {
            resident.push((extent_id, frame_id));
            true
        });

        let mut flushed = 0;
        for (extent_id, frame_id) in resident {
            let frame = &self.frames[frame_id.0 as usize];
            if frame.is_dirty() {
                let data = frame.read_data();
                self.store.write(&data[..], extent_id)?;
                drop(data);
                frame.set_dirty(false);
                flushed += 1;
            }
        }
        debug!("flushed {flushed} dirty extents");
        Ok(flushed)
    }

    /// Flushes all dirty extents and closes the underlying store.
    pub fn close(&self) -> Result<()> {
        self.flush_all()?;
        self.store.close()
    }

    /// Returns statistics about the buffer pool.
    pub fn stats(&self) -> BufferPoolStats {
        let mut pinned_count = 0;
        let mut dirty_count = 0;

        self.table.for_each(|_, frame_id| {
            let frame = &self.frames[frame_id.0 as usize];
            if frame.is_pinned() {
                pinned_count += 1;
            }
            if frame.is_dirty() {
                dirty_count += 1;
            }
            true
        });

        BufferPoolStats {
            total_frames: self.frames.len(),
            free_frames: self.free_count(),
            used_frames: self.table.len(),
            pinned_frames: pinned_count,
            dirty_frames: dirty_count,
        }
    }
}

/// Statistics about the buffer pool.
#[derive(Debug, Clone)]
pub struct BufferPoolStats {
    /// Total number of frames.
    pub total_frames: usize,
    /// Number of free frames.
    pub free_frames: usize,
    /// Number of frames holding extents.
    pub used_frames: usize,
    /// Number of pinned frames.
    pub pinned_frames: usize,
    /// Number of dirty frames.
    pub dirty_frames: usize,
}

/// A pinned extent.
///
/// The handle does not unpin on drop; the pin/unpin pairing is the
/// caller's responsibility, matching the pool's explicit `unpin`
/// operation.
pub struct BufferHandle<'a> {
    extent_id: ExtentId,
    frame: &'a BufferFrame,
}

impl<'a> BufferHandle<'a> {
    /// Returns the pinned extent's id.
    pub fn extent_id(&self) -> ExtentId {
        self.extent_id
    }

    /// Returns read access to the extent bytes.
    pub fn data(&self) -> parking_lot::RwLockReadGuard<'_, Box<[u8]>> {
        self.frame.read_data()
    }

    /// Returns write access to the extent bytes.
    ///
    /// Writing does not set the dirty flag; call `BufferPool::mark_dirty`
    /// for modifications that must reach disk.
    pub fn data_mut(&self) -> parking_lot::RwLockWriteGuard<'_, Box<[u8]>> {
        self.frame.write_data()
    }
}
