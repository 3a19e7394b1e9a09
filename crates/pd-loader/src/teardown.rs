//! Stopping loads and removing frames from the tree.

use crate::client::FrameLoaderClient;
use crate::engine::Engine;
use crate::ids::FrameId;
use log::debug;
use log::trace;
use pd_dom::Document;
use std::rc::Rc;

impl Engine {
    /// Stops every load in `frame` and its descendants, children first.
    ///
    /// A nested call on a frame that is already stopping does nothing, as does
    /// a call while the frame's document runs its unload handlers.
    pub fn stop_all_loaders(&mut self, frame: FrameId) {
        let Some(state) = self.frame_mut(frame) else {
            return;
        };
        if state.document.as_ref().is_some_and(Document::is_dismissing) || state.loader.in_stop_all_loaders {
            return;
        }
        state.loader.in_stop_all_loaders = true;
        trace!("{frame}: stopping all loaders");

        for child in self.children_of(frame) {
            self.stop_all_loaders(child);
        }
        if let Some(provisional) = self.provisional_loader_id(frame) {
            self.stop_document_loader(provisional);
        }
        if let Some(loader) = self.document_loader_id(frame) {
            self.stop_document_loader(loader);
        }
        let provisional = self
            .frame_mut(frame)
            .and_then(|state| state.loader.provisional_document_loader.take());
        if let Some(provisional) = provisional {
            self.detach_document_loader(provisional);
        }

        let Some(state) = self.frame_mut(frame) else {
            return;
        };
        let check_timer = state.loader.check_timer.take();
        state.loader.in_stop_all_loaders = false;
        if let Some(task) = check_timer {
            self.tasks.cancel(task);
        }
        if let Some(client) = self.client(frame) {
            client.did_stop_all_loaders(self, frame);
        }
    }

    /// Detaches the children of `frame`, last child first.
    pub(crate) fn detach_children(&mut self, frame: FrameId) {
        for child in self.children_of(frame).into_iter().rev() {
            self.detach_from_parent(child);
        }
    }

    /// The owner element of `frame` went away.
    pub fn frame_detached(&mut self, frame: FrameId) {
        self.stop_all_loaders(frame);
        self.detach_from_parent(frame);
    }

    /// Tears `frame` down and removes it from the engine.
    ///
    /// Unload handlers run before anything is detached; they may navigate or
    /// even detach this frame themselves, in which case the second pass finds
    /// no client and stops early. Detaching a main frame closes its page.
    pub fn detach_from_parent(&mut self, frame: FrameId) {
        if !self.is_alive(frame) {
            return;
        }
        self.close_url(frame);
        self.detach_children(frame);
        self.stop_all_loaders(frame);

        let Some(state) = self.frame_mut(frame) else {
            return;
        };
        let loader = state.loader.document_loader.take();
        let policy = state.loader.policy_document_loader;
        if let Some(loader) = loader {
            self.detach_document_loader(loader);
        }
        if let Some(policy) = policy {
            self.discard_policy_loader(frame, policy);
        }

        let Some(state) = self.frame_mut(frame) else {
            return;
        };
        let Some(client) = state.client.take() else {
            return;
        };
        let parent = state.parent;
        let page = state.page;
        debug!("{frame}: detaching");

        if let Some(parent) = parent {
            if let Some(parent) = self.frame_mut(parent) {
                parent.children.retain(|child| *child != frame);
            }
            if let Some(page) = self.pages.get_mut(&page) {
                page.frame_count = page.frame_count.saturating_sub(1);
            }
            self.schedule_check_completed(parent);
        }
        self.detach_client(frame, client);
        self.remove_frame(frame);
    }

    /// Last conversation with the embedder about `frame`.
    fn detach_client(&mut self, frame: FrameId, client: Rc<dyn FrameLoaderClient>) {
        if self.frame_ref(frame).is_some_and(|state| state.loader.in_progress) {
            if let Some(state) = self.frame_mut(frame) {
                state.loader.in_progress = false;
            }
            let page = self.frame_ref(frame).map(|state| state.page);
            if let Some(page) = page.and_then(|page| self.pages.get_mut(&page)) {
                page.progress.frame_completed();
            }
        }
        self.set_opener(frame, None);
        if let Some(host) = self.host(frame) {
            host.clear_for_close(self, frame);
        }
        client.detached_from_parent(self, frame);
    }

    fn remove_frame(&mut self, frame: FrameId) {
        let Some(state) = self.frames.remove(&frame) else {
            return;
        };
        for task in [
            state.loader.check_timer,
            state.loader.did_access_initial_document_timer,
            state.scheduler.timer,
        ]
        .into_iter()
        .flatten()
        {
            self.tasks.cancel(task);
        }
        for other in self.frames.values_mut() {
            if other.opener == Some(frame) {
                other.opener = None;
            }
        }
        if state.parent.is_none() && self.pages.remove(&state.page).is_some() {
            debug!("{}: closed", state.page);
        }
        trace!("{frame}: removed");
    }
}
