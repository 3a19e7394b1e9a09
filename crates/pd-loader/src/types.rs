//! Small enums shared by the loader modules.

/// Per-frame loader state. `Complete` is the quiescent state between navigations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    Provisional,
    CommittedPage,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameLoadType {
    Standard,
    BackForward,
    Reload,
    ReloadFromOrigin,
    Same,
    RedirectLockedBackForward,
    InitialInChildFrame,
}

impl FrameLoadType {
    pub fn is_reload(self) -> bool {
        matches!(self, Self::Reload | Self::ReloadFromOrigin)
    }

    /// Load types that restore scroll and view state from the current history item.
    pub fn needs_history_item_restore(self) -> bool {
        matches!(self, Self::BackForward | Self::Reload | Self::ReloadFromOrigin)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryCommitType {
    StandardCommit,
    BackForwardCommit,
    InitialCommitInChildFrame,
    HistoryInertCommit,
}

impl HistoryCommitType {
    pub fn for_load_type(load_type: FrameLoadType, is_valid_history_url: bool) -> Self {
        match load_type {
            FrameLoadType::Standard if is_valid_history_url => Self::StandardCommit,
            FrameLoadType::InitialInChildFrame => Self::InitialCommitInChildFrame,
            FrameLoadType::BackForward => Self::BackForwardCommit,
            _ => Self::HistoryInertCommit,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryLoadType {
    SameDocument,
    DifferentDocument,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientRedirectPolicy {
    #[default]
    NotClientRedirect,
    ClientRedirect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateBackForwardListPolicy {
    UpdateBackForwardList,
    DoNotUpdateBackForwardList,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameDocumentNavigationSource {
    Default,
    HistoryApi,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReloadPolicy {
    #[default]
    Normal,
    EndToEnd,
}

/// Scroll position of a frame view, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScrollOffset {
    pub x: i32,
    pub y: i32,
}

impl ScrollOffset {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[cfg(test)]
mod tests {
    use super::FrameLoadType;
    use super::HistoryCommitType;

    #[test]
    fn commit_type_follows_load_type() {
        assert_eq!(
            HistoryCommitType::for_load_type(FrameLoadType::Standard, true),
            HistoryCommitType::StandardCommit
        );
        assert_eq!(
            HistoryCommitType::for_load_type(FrameLoadType::Standard, false),
            HistoryCommitType::HistoryInertCommit
        );
        assert_eq!(
            HistoryCommitType::for_load_type(FrameLoadType::InitialInChildFrame, true),
            HistoryCommitType::InitialCommitInChildFrame
        );
        assert_eq!(
            HistoryCommitType::for_load_type(FrameLoadType::BackForward, false),
            HistoryCommitType::BackForwardCommit
        );
        assert_eq!(
            HistoryCommitType::for_load_type(FrameLoadType::RedirectLockedBackForward, true),
            HistoryCommitType::HistoryInertCommit
        );
    }

    #[test]
    fn restore_applies_to_reload_and_back_forward() {
        assert!(FrameLoadType::BackForward.needs_history_item_restore());
        assert!(FrameLoadType::ReloadFromOrigin.needs_history_item_restore());
        assert!(!FrameLoadType::Same.needs_history_item_restore());
    }
}
