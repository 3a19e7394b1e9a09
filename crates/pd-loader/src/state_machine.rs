//! Monotonic progression of a frame from its initial empty document to real loads.

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LoaderMilestone {
    CreatingInitialEmptyDocument,
    DisplayingInitialEmptyDocument,
    StartedFirstRealLoad,
    CommittedFirstRealLoad,
    CommittedMultipleRealLoads,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLoaderStateMachine {
    milestone: LoaderMilestone,
}

impl Default for FrameLoaderStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameLoaderStateMachine {
    pub fn new() -> Self {
        Self {
            milestone: LoaderMilestone::CreatingInitialEmptyDocument,
        }
    }

    pub fn milestone(&self) -> LoaderMilestone {
        self.milestone
    }

    pub fn creating_initial_empty_document(&self) -> bool {
        self.milestone == LoaderMilestone::CreatingInitialEmptyDocument
    }

    /// Still showing the initial empty document, even once a real load has started.
    pub fn is_displaying_initial_empty_document(&self) -> bool {
        self.milestone >= LoaderMilestone::DisplayingInitialEmptyDocument
            && self.milestone < LoaderMilestone::CommittedFirstRealLoad
    }

    pub fn started_first_real_load(&self) -> bool {
        self.milestone >= LoaderMilestone::StartedFirstRealLoad
    }

    pub fn committed_first_real_document_load(&self) -> bool {
        self.milestone >= LoaderMilestone::CommittedFirstRealLoad
    }

    pub fn committed_multiple_real_loads(&self) -> bool {
        self.milestone == LoaderMilestone::CommittedMultipleRealLoads
    }

    /// Moves forward to `milestone`; requests to go backwards are ignored.
    pub fn advance_to(&mut self, milestone: LoaderMilestone) {
        if milestone > self.milestone {
            self.milestone = milestone;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::FrameLoaderStateMachine;
    use super::LoaderMilestone;

    #[test]
    fn never_regresses() {
        let mut machine = FrameLoaderStateMachine::new();
        assert!(machine.creating_initial_empty_document());

        machine.advance_to(LoaderMilestone::CommittedFirstRealLoad);
        assert!(machine.started_first_real_load());
        assert!(machine.committed_first_real_document_load());

        machine.advance_to(LoaderMilestone::DisplayingInitialEmptyDocument);
        assert_eq!(machine.milestone(), LoaderMilestone::CommittedFirstRealLoad);
        assert!(!machine.committed_multiple_real_loads());
    }

    #[test]
    fn started_load_still_displays_initial_document() {
        let mut machine = FrameLoaderStateMachine::new();
        machine.advance_to(LoaderMilestone::DisplayingInitialEmptyDocument);
        machine.advance_to(LoaderMilestone::StartedFirstRealLoad);
        assert!(machine.is_displaying_initial_empty_document());
        assert!(!machine.committed_first_real_document_load());
    }
}
