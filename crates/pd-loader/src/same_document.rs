//! Navigations that keep the current document: fragments and the History API.

use crate::engine::Engine;
use crate::ids::FrameId;
use crate::types::ClientRedirectPolicy;
use crate::types::HistoryCommitType;
use crate::types::SameDocumentNavigationSource;
use crate::types::UpdateBackForwardListPolicy;
use log::debug;
use pd_core::BrowserError;
use pd_core::BrowserResult;
use pd_net::url::elided;
use pd_net::url::equal_ignoring_fragment;
use url::Url;

impl Engine {
    /// Moves `frame` to `url` within its current document.
    ///
    /// A pending provisional load is cancelled. The navigation starts and
    /// completes synchronously so the parent does not wait on it.
    pub(crate) fn load_in_same_document(
        &mut self,
        frame: FrameId,
        url: &Url,
        state_object: Option<String>,
        update: UpdateBackForwardListPolicy,
        client_redirect: ClientRedirectPolicy,
    ) {
        if let Some(provisional) = self.provisional_loader_id(frame) {
            self.stop_document_loader(provisional);
            if self.provisional_loader_id(frame) == Some(provisional) {
                if let Some(state) = self.frame_mut(frame) {
                    state.loader.provisional_document_loader = None;
                }
                self.detach_document_loader(provisional);
            }
        }
        if !self.is_alive(frame) {
            return;
        }
        self.save_document_state(frame);
        self.save_scroll_state(frame);

        let Some(old_url) = self.document(frame).map(|document| document.url.clone()) else {
            return;
        };
        let hash_change = equal_ignoring_fragment(url, &old_url) && url.fragment() != old_url.fragment();
        if hash_change {
            if let Some(host) = self.host(frame) {
                host.enqueue_hashchange(self, frame, &old_url, url);
            }
        }
        let Some(loader) = self.document_loader_id(frame) else {
            return;
        };
        if let Some(loader) = self.loader_mut(loader) {
            loader.set_is_client_redirect(client_redirect == ClientRedirectPolicy::ClientRedirect);
            loader.set_replaces_current_history_item(update == UpdateBackForwardListPolicy::DoNotUpdateBackForwardList);
        }
        debug!("{frame}: same-document navigation to {}", elided(url));
        self.update_for_same_document_navigation(frame, url, SameDocumentNavigationSource::Default, None, update);
        if !self.is_alive(frame) {
            return;
        }

        if let Some(state) = self.frame_mut(frame) {
            state.view.was_scrolled_by_user = false;
        }
        self.started(frame);
        self.scroll_to_fragment_with_parent_boundary(frame, url);

        if let Some(state) = self.frame_mut(frame) {
            state.loader.is_complete = false;
        }
        self.check_completed(frame);
        if !self.is_alive(frame) {
            return;
        }
        if let Some(host) = self.host(frame) {
            host.state_popped(self, frame, state_object.as_deref());
        }
    }

    fn update_for_same_document_navigation(
        &mut self,
        frame: FrameId,
        new_url: &Url,
        source: SameDocumentNavigationSource,
        state_object: Option<String>,
        update: UpdateBackForwardListPolicy,
    ) {
        let Some(document) = self.document_mut(frame) else {
            return;
        };
        document.url = new_url.clone();
        let Some(loader) = self.document_loader_id(frame) else {
            return;
        };
        if let Some(loader) = self.loader_mut(loader) {
            loader.update_for_same_document_navigation(new_url);
        }

        // Fragment navigations from the load handler are part of the load itself.
        let load_event_finished = |engine: &Engine| {
            engine
                .document(frame)
                .is_some_and(|document| document.load_event_finished())
        };
        let client = self.client(frame);
        if load_event_finished(self) {
            if let Some(client) = &client {
                client.post_progress_started_notification(self, frame);
            }
        }

        let has_current_item = self
            .frame_ref(frame)
            .is_some_and(|state| state.loader.current_item.is_some());
        let commit_type = if update == UpdateBackForwardListPolicy::UpdateBackForwardList && has_current_item {
            HistoryCommitType::StandardCommit
        } else {
            HistoryCommitType::HistoryInertCommit
        };
        let is_history_api = source == SameDocumentNavigationSource::HistoryApi;
        self.set_history_item_state_for_commit(frame, commit_type, is_history_api, state_object, true);

        let item = self
            .frame_ref(frame)
            .and_then(|state| state.loader.current_item.as_ref())
            .map(|item| item.borrow().clone());
        if let (Some(client), Some(item)) = (&client, item) {
            client.dispatch_did_navigate_within_page(self, frame, &item, commit_type);
            if load_event_finished(self) {
                client.post_progress_finished_notification(self, frame);
            }
        }
    }

    /// `history.pushState` / `history.replaceState` on `frame`'s document.
    pub fn update_for_history_api(
        &mut self,
        frame: FrameId,
        url: &Url,
        state_object: Option<String>,
        replace: bool,
    ) -> BrowserResult<()> {
        let Some(document) = self.document(frame) else {
            return Err(BrowserError::new(
                "loader.frame.detached",
                format!("{frame} has no document"),
            ));
        };
        if !document.security_origin.can_request(url) {
            return Err(BrowserError::new(
                "loader.history.cross_origin",
                format!(
                    "a history state object with URL '{}' cannot be created in a document with URL '{}'",
                    elided(url),
                    elided(&document.url)
                ),
            ));
        }
        let update = if replace {
            UpdateBackForwardListPolicy::DoNotUpdateBackForwardList
        } else {
            UpdateBackForwardListPolicy::UpdateBackForwardList
        };
        self.update_for_same_document_navigation(frame, url, SameDocumentNavigationSource::HistoryApi, state_object, update);
        Ok(())
    }

    /// Scrolls `frame` to the fragment of `url` without revealing the target
    /// to a cross-origin ancestor.
    pub(crate) fn scroll_to_fragment_with_parent_boundary(&mut self, frame: FrameId, url: &Url) {
        let Some(fragment) = url.fragment().map(str::to_owned) else {
            return;
        };
        let boundary = self.find_unsafe_parent_scroll_propagation_boundary(frame);
        if let Some(boundary) = boundary.and_then(|boundary| self.frame_mut(boundary)) {
            boundary.view.safe_to_propagate_scroll_to_parent = false;
        }
        if let Some(state) = self.frame_mut(frame) {
            state.view.scroll_to_fragment(&fragment);
        }
        if let Some(boundary) = boundary.and_then(|boundary| self.frame_mut(boundary)) {
            boundary.view.safe_to_propagate_scroll_to_parent = true;
        }
    }
}
