//! Pages: a main frame, its session history, and page-wide load progress.

use crate::history::BackForwardList;
use crate::history::HistoryItemHandle;
use crate::ids::FrameId;
use crate::ids::PageId;
use crate::types::HistoryLoadType;
use pd_net::CachePolicy;

/// A history load held back while the page defers loading.
#[derive(Debug, Clone)]
pub struct DeferredHistoryLoad {
    pub item: HistoryItemHandle,
    pub load_type: HistoryLoadType,
    pub cache_policy: CachePolicy,
}

/// Counts frames with a load in progress; the page is loading while any is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressTracker {
    tracked_frames: usize,
    originating_frame: Option<FrameId>,
}

impl ProgressTracker {
    /// Returns true when this is the first frame to start, i.e. the page starts loading.
    pub(crate) fn frame_started(&mut self, frame: FrameId) -> bool {
        let first = self.tracked_frames == 0;
        if first {
            self.originating_frame = Some(frame);
        }
        self.tracked_frames += 1;
        first
    }

    /// Returns the frame that started the page load once the last tracked frame finishes.
    pub(crate) fn frame_completed(&mut self) -> Option<FrameId> {
        self.tracked_frames = self.tracked_frames.saturating_sub(1);
        if self.tracked_frames == 0 {
            return self.originating_frame.take();
        }
        None
    }

    pub fn is_loading(&self) -> bool {
        self.tracked_frames > 0
    }

    pub fn tracked_frames(&self) -> usize {
        self.tracked_frames
    }
}

#[derive(Debug)]
pub struct Page {
    pub(crate) id: PageId,
    pub(crate) main_frame: FrameId,
    pub(crate) back_forward: BackForwardList,
    pub(crate) progress: ProgressTracker,
    pub(crate) defers_loading: bool,
    pub(crate) page_scale_factor: f32,
    pub(crate) frame_count: usize,
}

impl Page {
    pub(crate) fn new(id: PageId, main_frame: FrameId, history_capacity: usize) -> Self {
        Self {
            id,
            main_frame,
            back_forward: BackForwardList::new(history_capacity),
            progress: ProgressTracker::default(),
            defers_loading: false,
            page_scale_factor: 1.0,
            frame_count: 1,
        }
    }

    pub fn id(&self) -> PageId {
        self.id
    }

    pub fn main_frame(&self) -> FrameId {
        self.main_frame
    }

    pub fn back_forward(&self) -> &BackForwardList {
        &self.back_forward
    }

    pub fn progress(&self) -> &ProgressTracker {
        &self.progress
    }

    pub fn defers_loading(&self) -> bool {
        self.defers_loading
    }

    pub fn page_scale_factor(&self) -> f32 {
        self.page_scale_factor
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }
}

#[cfg(test)]
mod tests {
    use super::ProgressTracker;
    use crate::ids::FrameId;

    #[test]
    fn progress_finishes_with_the_last_frame() {
        let mut progress = ProgressTracker::default();
        assert!(progress.frame_started(FrameId(1)));
        assert!(!progress.frame_started(FrameId(2)));
        assert_eq!(progress.frame_completed(), None);
        assert!(progress.is_loading());
        assert_eq!(progress.frame_completed(), Some(FrameId(1)));
        assert!(!progress.is_loading());
    }
}
