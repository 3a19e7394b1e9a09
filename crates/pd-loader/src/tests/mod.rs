//! Scenario tests that drive an engine through a recording embedder.

mod completion;
mod scripting;
mod support;

use crate::types::FrameState;
use support::Harness;

/// A provisional loader only exists while its frame is provisional.
fn assert_provisional_invariant(harness: &Harness) {
    for frame in harness.engine.frame_ids() {
        let Some(state) = harness.engine.frame(frame) else {
            continue;
        };
        if state.loader().provisional_document_loader().is_some() {
            assert_eq!(state.loader().state(), FrameState::Provisional, "{frame}");
        }
    }
}

/// A complete frame has only complete children.
fn assert_bottom_up_completion(harness: &Harness) {
    for frame in harness.engine.frame_ids() {
        if !harness.is_complete(frame) {
            continue;
        }
        for child in harness.engine.children_of(frame) {
            assert!(harness.is_complete(child), "{frame} is complete before {child}");
        }
    }
}
