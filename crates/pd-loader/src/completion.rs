//! Completion bookkeeping: when a frame is done, and when the page is.
//!
//! `check_completed` works bottom-up: a frame completes once its own document
//! has nothing left to do and every child is complete, then asks its parent to
//! check again. `check_load_complete` walks the page top-down from the main
//! frame to report finished and failed loads to the embedder.

use crate::engine::Engine;
use crate::ids::DocumentLoaderId;
use crate::ids::FrameId;
use crate::scheduler::Task;
use crate::scheduler::TaskId;
use crate::types::FrameLoadType;
use crate::types::FrameState;
use log::debug;
use log::trace;
use pd_dom::LoadEventProgress;
use pd_dom::ReadyState;

impl Engine {
    /// Marks `frame` complete if nothing in it or its children is still loading.
    ///
    /// Calling it on a complete frame does nothing.
    pub fn check_completed(&mut self, frame: FrameId) {
        let Some(state) = self.frame_mut(frame) else {
            return;
        };
        state.loader.should_call_check_completed = false;
        if state.loader.is_complete {
            return;
        }
        let Some(document) = &state.document else {
            return;
        };
        if document.parsing || document.has_pending_work() || document.is_delaying_load_event() {
            return;
        }
        if !self.all_children_are_complete(frame) {
            return;
        }

        let Some(state) = self.frame_mut(frame) else {
            return;
        };
        state.loader.is_complete = true;
        let Some(document) = &mut state.document else {
            return;
        };
        document.ready_state = ReadyState::Complete;
        trace!("{frame}: complete");
        if document.load_event_still_needed() {
            document.load_event_progress = LoadEventProgress::InProgress;
            if let Some(host) = self.host(frame) {
                host.dispatch_load_event(self, frame);
            }
            if let Some(document) = self.document_mut(frame) {
                if document.load_event_progress == LoadEventProgress::InProgress {
                    document.load_event_progress = LoadEventProgress::Completed;
                }
            }
        }
        if !self.is_alive(frame) {
            return;
        }

        self.start_navigation_timer(frame);
        self.completed(frame);
        if self.is_alive(frame) {
            self.check_load_complete(frame);
        }
    }

    /// Lets descendants' redirects run and tells the parent a child finished.
    fn completed(&mut self, frame: FrameId) {
        let mut next = self.traverse_next(frame, Some(frame));
        while let Some(descendant) = next {
            self.start_navigation_timer(descendant);
            next = self.traverse_next(descendant, Some(frame));
        }
        if let Some(parent) = self.parent_of(frame) {
            self.check_completed(parent);
        }
    }

    /// The document finished parsing.
    pub(crate) fn finished_parsing(&mut self, frame: FrameId) {
        let Some(state) = self.frame_ref(frame) else {
            return;
        };
        if state.loader.state_machine.creating_initial_empty_document() {
            return;
        }
        if let Some(client) = self.client(frame) {
            client.dispatch_did_finish_document_load(self, frame);
        }
        self.check_completed(frame);
        let Some(url) = self.document(frame).map(|document| document.url.clone()) else {
            return;
        };
        self.scroll_to_fragment_with_parent_boundary(frame, &url);
    }

    /// A subresource or import of the frame's document finished.
    pub fn load_done(&mut self, frame: FrameId) {
        self.check_completed(frame);
    }

    /// Runs `check_completed` on the next turn of the task queue.
    pub fn schedule_check_completed(&mut self, frame: FrameId) {
        let Some(state) = self.frame_mut(frame) else {
            return;
        };
        state.loader.should_call_check_completed = true;
        self.start_check_complete_timer(frame);
    }

    pub(crate) fn start_check_complete_timer(&mut self, frame: FrameId) {
        let Some(state) = self.frame_ref(frame) else {
            return;
        };
        if !state.loader.should_call_check_completed {
            return;
        }
        if state.loader.check_timer.is_some_and(|timer| self.tasks.is_pending(timer)) {
            return;
        }
        let timer = self.tasks.post(0, Task::CheckCompleted(frame));
        if let Some(state) = self.frame_mut(frame) {
            state.loader.check_timer = Some(timer);
        }
    }

    pub(crate) fn check_timer_fired(&mut self, frame: FrameId, task: TaskId) {
        let Some(state) = self.frame_mut(frame) else {
            return;
        };
        if state.loader.check_timer != Some(task) {
            return;
        }
        state.loader.check_timer = None;
        let should_call = state.loader.should_call_check_completed;
        if self.page_of(frame).is_none_or(|page| page.defers_loading) {
            return;
        }
        if should_call {
            self.check_completed(frame);
        }
    }

    pub fn all_children_are_complete(&self, frame: FrameId) -> bool {
        self.children_of(frame).into_iter().all(|child| {
            self.frame_ref(child)
                .is_none_or(|state| state.loader.is_complete)
        })
    }

    /// True when `frame` and each of its ancestors has finished its load event.
    pub fn all_ancestors_are_complete(&self, frame: FrameId) -> bool {
        let mut current = Some(frame);
        while let Some(ancestor) = current {
            let finished = self
                .document(ancestor)
                .is_some_and(|document| document.load_event_finished());
            if !finished {
                return false;
            }
            current = self.parent_of(ancestor);
        }
        true
    }

    /// Reports finished or failed loads for the whole page `frame` belongs to.
    pub fn check_load_complete(&mut self, frame: FrameId) {
        let Some(main_frame) = self.page_of(frame).map(|page| page.main_frame) else {
            return;
        };
        self.check_load_complete_for_this_frame(main_frame);
    }

    /// Returns whether `frame` and its subtree are done loading.
    fn check_load_complete_for_this_frame(&mut self, frame: FrameId) -> bool {
        let Some(state) = self.frame_ref(frame) else {
            return false;
        };
        if state.loader.state == FrameState::Provisional {
            if let Some(provisional) = state.loader.provisional_document_loader {
                return self.fail_provisional_load(frame, provisional);
            }
        }

        let mut all_children_done = true;
        for child in self.children_of(frame) {
            all_children_done &= self.check_load_complete_for_this_frame(child);
        }
        if !all_children_done {
            return false;
        }

        let Some(state) = self.frame_ref(frame) else {
            return false;
        };
        if state.loader.state == FrameState::Complete {
            return true;
        }
        let in_stop_all_loaders = state.loader.in_stop_all_loaders;
        if state.loader.provisional_document_loader.is_some() {
            return false;
        }
        let Some(loader) = state.loader.document_loader else {
            return false;
        };
        if !self.is_document_done_loading(frame) && !in_stop_all_loaders {
            return false;
        }

        let Some(state) = self.frame_mut(frame) else {
            return false;
        };
        state.loader.state = FrameState::Complete;
        let committed_real_load = state.loader.state_machine.committed_first_real_document_load();
        // Content size no longer clamps the restored position once the frame is complete.
        self.restore_scroll_position_and_view_state(frame);
        if !committed_real_load {
            return true;
        }

        self.progress_completed(frame);
        let error = self
            .loader(loader)
            .and_then(|loader| loader.main_document_error().cloned());
        if let Some(client) = self.client(frame) {
            match &error {
                Some(error) => client.dispatch_did_fail_load(self, frame, error),
                None => client.dispatch_did_finish_load(self, frame),
            }
        }
        debug!("{frame}: load finished{}", if error.is_some() { " with an error" } else { "" });
        if let Some(state) = self.frame_mut(frame) {
            state.loader.load_type = FrameLoadType::Standard;
        }
        true
    }

    /// Reports a failed provisional load once and drops its loader.
    fn fail_provisional_load(&mut self, frame: FrameId, provisional: DocumentLoaderId) -> bool {
        let Some(error) = self
            .loader(provisional)
            .and_then(|loader| loader.main_document_error().cloned())
        else {
            return false;
        };
        debug!("{frame}: provisional load failed: {error}");
        if let Some(client) = self.client(frame) {
            client.dispatch_did_fail_provisional_load(self, frame, &error);
        }
        if self.provisional_loader_id(frame) != Some(provisional) {
            return false;
        }
        if let Some(state) = self.frame_mut(frame) {
            state.loader.provisional_document_loader = None;
        }
        self.detach_document_loader(provisional);
        self.progress_completed(frame);
        if let Some(state) = self.frame_mut(frame) {
            state.loader.state = FrameState::Complete;
        }
        true
    }

    fn is_document_done_loading(&self, frame: FrameId) -> bool {
        let Some(loader) = self.document_loader_id(frame) else {
            return true;
        };
        if self
            .loader(loader)
            .is_some_and(|loader| loader.is_loading_main_resource())
        {
            return false;
        }
        let Some(document) = self.document(frame) else {
            return true;
        };
        if !document.load_event_finished()
            && (self.is_document_loader_loading(loader) || document.is_delaying_load_event())
        {
            return false;
        }
        document.pending_subresources == 0 && !document.processing_load_event() && !document.parsing
    }

    /// A navigation or load began in `frame`; the page's progress starts with its first frame.
    pub(crate) fn progress_started(&mut self, frame: FrameId) {
        let Some(state) = self.frames.get_mut(&frame) else {
            return;
        };
        if state.loader.in_progress {
            return;
        }
        state.loader.in_progress = true;
        let page = state.page;
        let first = self
            .pages
            .get_mut(&page)
            .is_some_and(|page| page.progress.frame_started(frame));
        if first {
            if let Some(client) = self.client(frame) {
                client.post_progress_started_notification(self, frame);
            }
        }
    }

    pub(crate) fn progress_completed(&mut self, frame: FrameId) {
        let Some(state) = self.frames.get_mut(&frame) else {
            return;
        };
        if !state.loader.in_progress {
            return;
        }
        state.loader.in_progress = false;
        let page = state.page;
        let Some(originating) = self.pages.get_mut(&page).and_then(|page| page.progress.frame_completed()) else {
            return;
        };
        let client = self.client(originating).or_else(|| self.client(frame));
        if let Some(client) = client {
            client.post_progress_finished_notification(self, originating);
        }
    }

    /// A provisional load exists, or the committed document is still loading.
    pub fn is_loading(&self, frame: FrameId) -> bool {
        if self.provisional_loader_id(frame).is_some() {
            return true;
        }
        self.document_loader_id(frame)
            .is_some_and(|loader| self.is_document_loader_loading(loader))
    }

    /// Outstanding subresource requests of `frame`, or of its whole subtree when `recurse`.
    pub fn num_pending_or_loading_requests(&self, frame: FrameId, recurse: bool) -> usize {
        let pending = |frame: FrameId| {
            self.document(frame)
                .map_or(0, |document| document.pending_subresources)
        };
        if !recurse {
            return pending(frame);
        }
        self.subtree(frame).into_iter().map(pending).sum()
    }

    /// Script touched the main frame's initial empty document; the embedder hears about it once.
    pub fn did_access_initial_document(&mut self, frame: FrameId) {
        let Some(state) = self.frame_ref(frame) else {
            return;
        };
        if state.parent.is_some() || state.loader.did_access_initial_document {
            return;
        }
        let timer = self.tasks.post(0, Task::DidAccessInitialDocument(frame));
        if let Some(state) = self.frame_mut(frame) {
            state.loader.did_access_initial_document = true;
            state.loader.did_access_initial_document_timer = Some(timer);
        }
    }

    /// Delivers a pending initial-document notification right away.
    pub fn notify_if_initial_document_accessed(&mut self, frame: FrameId) {
        let Some(timer) = self
            .frame_mut(frame)
            .and_then(|state| state.loader.did_access_initial_document_timer.take())
        else {
            return;
        };
        self.tasks.cancel(timer);
        if let Some(client) = self.client(frame) {
            client.did_access_initial_document(self, frame);
        }
    }

    pub(crate) fn did_access_initial_document_timer_fired(&mut self, frame: FrameId, task: TaskId) {
        let Some(state) = self.frame_mut(frame) else {
            return;
        };
        if state.loader.did_access_initial_document_timer != Some(task) {
            return;
        }
        state.loader.did_access_initial_document_timer = None;
        if let Some(client) = self.client(frame) {
            client.did_access_initial_document(self, frame);
        }
    }
}
