//! Frame replacement policies for the buffer pool.

use crate::frame::FrameId;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

/// Trait for frame replacement algorithms.
pub trait Replacer: Send + Sync {
    /// Records that the given frame was accessed.
    fn record_access(&self, frame_id: FrameId);

    /// Marks a frame as evictable (unpinned) or not.
    fn set_evictable(&self, frame_id: FrameId, evictable: bool);

    /// Selects a victim frame for eviction.
    ///
    /// `eligible` is consulted before a candidate is taken; a frame that
    /// fails the check (e.g. was pinned again concurrently) is skipped.
    /// Returns None if no evictable frame passes.
    fn evict(&self, eligible: &dyn Fn(FrameId) -> bool) -> Option<FrameId>;

    /// Removes a frame from the replacer entirely.
    fn remove(&self, frame_id: FrameId);

    /// Returns the number of evictable frames.
    fn size(&self) -> usize;
}

/// Clock replacement algorithm.
///
/// Reference bits are atomic for lock-free access recording; the mutex
/// only guards the evictable set and the clock hand.
pub struct ClockReplacer {
    /// Number of frames.
    num_frames: usize,
    /// Reference bits for each frame.
    reference_bits: Vec<AtomicBool>,
    /// Evictable set and clock hand.
    inner: Mutex<ClockReplacerInner>,
}

struct ClockReplacerInner {
    evictable: HashSet<FrameId>,
    clock_hand: usize,
}

impl ClockReplacer {
    /// Creates a new clock replacer for the given number of frames.
    pub fn new(num_frames: usize) -> Self {
        Self {
            num_frames,
            reference_bits: (0..num_frames).map(|_| AtomicBool::new(false)).collect(),
            inner: Mutex::new(ClockReplacerInner {
                evictable: HashSet::new(),
                clock_hand: 0,
            }),
        }
    }

    /// Returns the total frame capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.num_frames
    }
}

impl Replacer for ClockReplacer {
    #[inline]
    fn record_access(&self, frame_id: FrameId) {
        let idx = frame_id.0 as usize;
        if idx < self.num_frames {
            self.reference_bits[idx].store(true, Ordering::Relaxed);
        }
    }

    #[inline]
    fn set_evictable(&self, frame_id: FrameId, evictable: bool) {
        if (frame_id.0 as usize) >= self.num_frames {
            return;
        }

        let mut inner = self.inner.lock();
        if evictable {
            inner.evictable.insert(frame_id);
        } else {
            inner.evictable.remove(&frame_id);
        }
    }

    fn evict(&self, eligible: &dyn Fn(FrameId) -> bool) -> Option<FrameId> {
        let mut inner = self.inner.lock();

        if inner.evictable.is_empty() {
            return None;
        }

        let num_frames = self.num_frames;

        // At most two full rotations: the first clears reference bits, the
        // second is guaranteed to find any candidate whose bit was cleared.
        for _ in 0..(2 * num_frames) {
            let hand = inner.clock_hand;
            let frame_id = FrameId(hand as u32);
            inner.clock_hand = (hand + 1) % num_frames;

            if inner.evictable.contains(&frame_id) && eligible(frame_id) {
                if self.reference_bits[hand].load(Ordering::Relaxed) {
                    // Second chance: clear the bit and keep scanning.
                    self.reference_bits[hand].store(false, Ordering::Relaxed);
                } else {
                    inner.evictable.remove(&frame_id);
                    return Some(frame_id);
                }
            }
        }

        // Fall back to any evictable frame that passes the check.
        let candidate = inner
            .evictable
            .iter()
            .copied()
            .find(|&frame_id| eligible(frame_id));
        if let Some(frame_id) = candidate {
            inner.evictable.remove(&frame_id);
            return Some(frame_id);
        }

        None
    }

    fn remove(&self, frame_id: FrameId) {
        let idx = frame_id.0 as usize;
        if idx < self.num_frames {
            self.inner.lock().evictable.remove(&frame_id);
            self.reference_bits[idx].store(false, Ordering::Relaxed);
        }
    }

    fn size(&self) -> usize {
        self.inner.lock().evictable.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn any(_: FrameId) -> bool {
        true
    }

    #[test]
    fn test_clock_replacer_new() {
        let replacer = ClockReplacer::new(10);
        assert_eq!(replacer.capacity(), 10);
        assert_eq!(replacer.size(), 0);
    }

    #[test]
    fn test_set_evictable() {
        let replacer = ClockReplacer::new(10);

        replacer.set_evictable(FrameId(0), true);
        replacer.set_evictable(FrameId(1), true);
        replacer.set_evictable(FrameId(2), true);
        assert_eq!(replacer.size(), 3);

        replacer.set_evictable(FrameId(1), false);
        assert_eq!(replacer.size(), 2);
    }

    #[test]
    fn test_evict_empty() {
        let replacer = ClockReplacer::new(10);
        assert!(replacer.evict(&any).is_none());
    }

    #[test]
    fn test_evict_single() {
        let replacer = ClockReplacer::new(10);

        replacer.set_evictable(FrameId(5), true);
        assert_eq!(replacer.evict(&any), Some(FrameId(5)));
        assert_eq!(replacer.size(), 0);
    }

    #[test]
    fn test_evict_prefers_unreferenced() {
        let replacer = ClockReplacer::new(10);

        replacer.set_evictable(FrameId(0), true);
        replacer.set_evictable(FrameId(1), true);
        replacer.set_evictable(FrameId(2), true);

        replacer.record_access(FrameId(0));
        replacer.record_access(FrameId(1));

        // Frame 2 has no reference bit and goes first.
        assert_eq!(replacer.evict(&any), Some(FrameId(2)));
    }

    #[test]
    fn test_evict_all_referenced() {
        let replacer = ClockReplacer::new(3);

        for i in 0..3 {
            replacer.set_evictable(FrameId(i), true);
            replacer.record_access(FrameId(i));
        }

        // Still evicts after clearing reference bits on the first rotation.
        assert!(replacer.evict(&any).is_some());
        assert_eq!(replacer.size(), 2);
    }

    #[test]
    fn test_evict_respects_eligibility() {
        let replacer = ClockReplacer::new(4);

        replacer.set_evictable(FrameId(0), true);
        replacer.set_evictable(FrameId(1), true);

        // Only frame 1 passes the check.
        let victim = replacer.evict(&|f| f == FrameId(1));
        assert_eq!(victim, Some(FrameId(1)));

        // Nothing else is eligible.
        assert!(replacer.evict(&|f| f == FrameId(1)).is_none());
        assert_eq!(replacer.size(), 1);
    }

    #[test]
    fn test_remove() {
        let replacer = ClockReplacer::new(10);

        replacer.set_evictable(FrameId(0), true);
        replacer.set_evictable(FrameId(1), true);

        replacer.remove(FrameId(0));
        assert_eq!(replacer.size(), 1);
        assert_eq!(replacer.evict(&any), Some(FrameId(1)));
    }

    #[test]
    fn test_second_chance_cycle() {
        let replacer = ClockReplacer::new(2);

        replacer.set_evictable(FrameId(0), true);
        replacer.set_evictable(FrameId(1), true);
        replacer.record_access(FrameId(0));

        // Frame 1 is taken first; frame 0 had its reference bit.
        assert_eq!(replacer.evict(&any), Some(FrameId(1)));
        // Bit was cleared during the scan, so frame 0 goes next.
        assert_eq!(replacer.evict(&any), Some(FrameId(0)));
    }

    #[test]
    fn test_out_of_bounds_ids_ignored() {
        let replacer = ClockReplacer::new(5);

        replacer.set_evictable(FrameId(100), true);
        replacer.record_access(FrameId(100));
        replacer.remove(FrameId(100));
        assert_eq!(replacer.size(), 0);
    }
}
