//! Eviction policies for the buffer pool.
//!
//! The pool treats the policy polymorphically over the capability set
//! `{victim, pin, unpin, len}`, so alternative policies can be substituted
//! without changes to the pool itself.

use std::collections::{HashSet, VecDeque};

use parking_lot::Mutex;

use super::frame::FrameId;

/// Victim-selection policy over currently-unpinned frames.
///
/// The pool mirrors every pin transition into the replacer: `pin` on every
/// bind and fetch hit, `unpin` whenever a frame's pin count drops to zero.
/// `victim` produces the next frame to evict, or `None` when every tracked
/// frame is pinned.
pub trait Replacer: Send + Sync {
    /// Removes and returns the next eviction victim.
    ///
    /// The victim is no longer tracked by the replacer in any form.
    fn victim(&self) -> Option<FrameId>;

    /// Marks a frame ineligible for eviction.
    ///
    /// A frame unknown to the replacer is registered as pinned; a frame
    /// that is already pinned is left untouched, so repeated pins without
    /// an intervening unpin are idempotent.
    fn pin(&self, frame_id: FrameId);

    /// Marks a pinned frame eligible for eviction.
    ///
    /// No-op for frames that are already eligible.
    fn unpin(&self, frame_id: FrameId);

    /// Returns the number of frames currently tracked, eligible or pinned.
    fn len(&self) -> usize;

    /// Returns true if no frames are tracked.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Replacer state: the eligible queue, its membership index, and the set of
/// tracked-but-pinned frames. Eligible and pinned are disjoint.
struct LruState {
    /// Eligible frames, least recently unpinned at the front.
    queue: VecDeque<FrameId>,
    /// Membership index for `queue`.
    eligible: HashSet<FrameId>,
    /// Tracked frames that are currently pinned.
    pinned: HashSet<FrameId>,
}

/// LRU replacement policy.
///
/// Recency is defined solely by unpin time: a frame moves to the tail of
/// the eligible queue each time it is unpinned, and `victim` always takes
/// the head. Pinning a frame drops its queue position entirely, so a later
/// unpin re-inserts it at the tail.
pub struct LruReplacer {
    /// Pool size; the replacer never tracks more distinct ids than this.
    capacity: usize,
    state: Mutex<LruState>,
}

impl LruReplacer {
    /// Creates an LRU replacer sized for `num_frames` frames.
    pub fn new(num_frames: usize) -> Self {
        Self {
            capacity: num_frames,
            state: Mutex::new(LruState {
                queue: VecDeque::with_capacity(num_frames),
                eligible: HashSet::with_capacity(num_frames),
                pinned: HashSet::with_capacity(num_frames),
            }),
        }
    }

    /// Returns the advisory capacity this replacer was sized for.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Replacer for LruReplacer {
    fn victim(&self) -> Option<FrameId> {
        let mut state = self.state.lock();
        let frame_id = state.queue.pop_front()?;
        state.eligible.remove(&frame_id);
        Some(frame_id)
    }

    fn pin(&self, frame_id: FrameId) {
        let mut state = self.state.lock();
        if state.eligible.remove(&frame_id) {
            if let Some(pos) = state.queue.iter().position(|&f| f == frame_id) {
                state.queue.remove(pos);
            }
        }
        // First bind registers the frame; repeated pins are no-ops.
        state.pinned.insert(frame_id);
    }

    fn unpin(&self, frame_id: FrameId) {
        let mut state = self.state.lock();
        if state.pinned.remove(&frame_id) {
            state.queue.push_back(frame_id);
            state.eligible.insert(frame_id);
        }
    }

    fn len(&self) -> usize {
        let state = self.state.lock();
        state.eligible.len() + state.pinned.len()
    }
}

impl std::fmt::Debug for LruReplacer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("LruReplacer")
            .field("capacity", &self.capacity)
            .field("eligible", &state.queue.len())
            .field("pinned", &state.pinned.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unpinned(replacer: &LruReplacer, ids: &[usize]) {
        for &id in ids {
            replacer.pin(FrameId::new(id));
            replacer.unpin(FrameId::new(id));
        }
    }

    #[test]
    fn test_victim_on_empty() {
        let replacer = LruReplacer::new(4);
        assert_eq!(replacer.victim(), None);
        assert!(replacer.is_empty());
    }

    #[test]
    fn test_victim_order_is_unpin_order() {
        let replacer = LruReplacer::new(4);
        unpinned(&replacer, &[2, 0, 3]);

        assert_eq!(replacer.victim(), Some(FrameId::new(2)));
        assert_eq!(replacer.victim(), Some(FrameId::new(0)));
        assert_eq!(replacer.victim(), Some(FrameId::new(3)));
        assert_eq!(replacer.victim(), None);
    }

    #[test]
    fn test_victim_leaves_no_trace() {
        let replacer = LruReplacer::new(4);
        unpinned(&replacer, &[1]);

        assert_eq!(replacer.victim(), Some(FrameId::new(1)));
        assert_eq!(replacer.len(), 0);

        // A victimized frame can be registered again from scratch.
        replacer.pin(FrameId::new(1));
        assert_eq!(replacer.len(), 1);
        assert_eq!(replacer.victim(), None);
    }

    #[test]
    fn test_pin_removes_eligibility() {
        let replacer = LruReplacer::new(4);
        unpinned(&replacer, &[0, 1]);

        replacer.pin(FrameId::new(0));
        assert_eq!(replacer.victim(), Some(FrameId::new(1)));
        assert_eq!(replacer.victim(), None);
        // Frame 0 is still tracked as pinned.
        assert_eq!(replacer.len(), 1);
    }

    #[test]
    fn test_pin_is_idempotent() {
        let replacer = LruReplacer::new(4);
        replacer.pin(FrameId::new(0));
        replacer.pin(FrameId::new(0));
        assert_eq!(replacer.len(), 1);

        replacer.unpin(FrameId::new(0));
        assert_eq!(replacer.len(), 1);
        assert_eq!(replacer.victim(), Some(FrameId::new(0)));
    }

    #[test]
    fn test_unpin_of_eligible_keeps_position() {
        let replacer = LruReplacer::new(4);
        unpinned(&replacer, &[0, 1]);

        // Frame 0 is already eligible; a second unpin must not move it.
        replacer.unpin(FrameId::new(0));
        assert_eq!(replacer.victim(), Some(FrameId::new(0)));
    }

    #[test]
    fn test_reunpin_moves_to_tail() {
        let replacer = LruReplacer::new(4);
        unpinned(&replacer, &[0, 1, 2]);

        // Pin then unpin frame 0: it becomes the most recently unpinned.
        replacer.pin(FrameId::new(0));
        replacer.unpin(FrameId::new(0));

        assert_eq!(replacer.victim(), Some(FrameId::new(1)));
        assert_eq!(replacer.victim(), Some(FrameId::new(2)));
        assert_eq!(replacer.victim(), Some(FrameId::new(0)));
    }

    #[test]
    fn test_len_counts_eligible_and_pinned() {
        let replacer = LruReplacer::new(4);
        replacer.pin(FrameId::new(0));
        replacer.pin(FrameId::new(1));
        replacer.unpin(FrameId::new(1));

        assert_eq!(replacer.len(), 2);
        assert_eq!(replacer.capacity(), 4);
    }
}
