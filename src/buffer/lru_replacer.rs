use crate::buffer::replacer::Replacer;
use crate::common::config::FrameId;
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};

/// LRU eviction policy over unpinned frames.
///
/// Candidates are ordered by the time they were unpinned; `victim` takes the least recently
/// unpinned one. Re-unpinning a frame that is already a candidate does not refresh its position:
/// only transitions between pinned and unpinned reorder the queue.
pub struct LruReplacer {
    state: Mutex<LruState>,
    capacity: usize,
}

struct LruState {
    /// Front is the least recently unpinned candidate.
    queue: VecDeque<FrameId>,
    members: HashSet<FrameId>,
}

impl LruReplacer {
    pub fn new(num_frames: usize) -> Self {
        Self {
            state: Mutex::new(LruState {
                queue: VecDeque::with_capacity(num_frames),
                members: HashSet::with_capacity(num_frames),
            }),
            capacity: num_frames,
        }
    }
}

impl Replacer for LruReplacer {
    fn victim(&self) -> Option<FrameId> {
        let mut state = self.state.lock();
        let frame_id = state.queue.pop_front()?;
        state.members.remove(&frame_id);
        Some(frame_id)
    }

    fn pin(&self, frame_id: FrameId) {
        let mut state = self.state.lock();
        if state.members.remove(&frame_id) {
            state.queue.retain(|&candidate| candidate != frame_id);
        }
    }

    fn unpin(&self, frame_id: FrameId) {
        let mut state = self.state.lock();
        if state.members.contains(&frame_id) || state.members.len() >= self.capacity {
            return;
        }
        state.members.insert(frame_id);
        state.queue.push_back(frame_id);
    }

    fn size(&self) -> usize {
        self.state.lock().queue.len()
    }
}
