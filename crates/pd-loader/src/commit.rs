//! Committing a provisional load and installing the new document.

use crate::engine::Engine;
use crate::history::HistoryItem;
use crate::ids::FrameId;
use crate::state_machine::LoaderMilestone;
use crate::types::FrameLoadType;
use crate::types::FrameState;
use crate::types::HistoryCommitType;
use log::debug;
use log::trace;
use log::warn;
use pd_dom::PageDismissalType;
use pd_dom::ReadyState;
use pd_net::url::elided;
use pd_net::url::is_about_blank;
use pd_security::ContentSecurityPolicy;
use pd_security::SandboxFlags;
use pd_security::SecurityOrigin;
use url::Url;

impl Engine {
    /// Makes the provisional loader the frame's document loader.
    ///
    /// Unload handlers of the outgoing document and its children may start
    /// another navigation; the commit is abandoned if the provisional slot no
    /// longer holds the loader it started with.
    pub(crate) fn commit_provisional_load(&mut self, frame: FrameId) {
        let Some(provisional) = self.provisional_loader_id(frame) else {
            return;
        };
        let same_origin = match (self.loader(provisional), self.document(frame)) {
            (Some(loader), Some(document)) => SecurityOrigin::create(loader.url()).can_request(&document.url),
            _ => false,
        };
        if let Some(loader) = self.loader_mut(provisional) {
            loader.set_has_same_origin_as_previous_document(same_origin);
        }

        if self.document_loader_id(frame).is_some() {
            if let Some(client) = self.client(frame) {
                client.dispatch_will_close(self, frame);
            }
            if self.provisional_loader_id(frame) != Some(provisional) {
                debug!("{frame}: commit of {provisional} abandoned by will-close");
                return;
            }
            self.close_url(frame);
        }
        self.detach_children(frame);
        if self.provisional_loader_id(frame) != Some(provisional) {
            debug!("{frame}: commit of {provisional} abandoned by an unload handler");
            return;
        }
        if let Some(previous) = self.document_loader_id(frame) {
            self.detach_document_loader(previous);
        }
        let Some(state) = self.frame_mut(frame) else {
            return;
        };
        if state.loader.provisional_document_loader != Some(provisional) {
            return;
        }
        state.loader.document_loader = state.loader.provisional_document_loader.take();
        state.loader.state = FrameState::CommittedPage;
        let is_main_frame = state.parent.is_none();
        let creating = state.loader.state_machine.creating_initial_empty_document();
        debug!("{frame}: committed {provisional}");

        if let Some(client) = self.client(frame) {
            if is_main_frame {
                client.need_touch_events(self, frame, false);
            }
            client.transition_to_committed_for_new_page(self, frame);
        }
        if !self.is_alive(frame) {
            return;
        }
        self.cancel_scheduled_navigation(frame);
        if let Some(host) = self.host(frame) {
            host.clear_last_edit_command(self, frame);
        }
        if !creating {
            if let Some(document) = self.document_mut(frame) {
                document.window_status.clear();
            }
        }
        self.started(frame);
    }

    /// Saves the outgoing document's state, runs its unload handlers and stops its loads.
    pub(crate) fn close_url(&mut self, frame: FrameId) {
        self.save_document_state(frame);
        self.save_scroll_state(frame);

        if self.document(frame).is_some() {
            if let Some(document) = self.document_mut(frame) {
                document.page_dismissal = PageDismissalType::Unload;
            }
            if let Some(host) = self.host(frame) {
                host.dispatch_unload(self, frame);
            }
            if let Some(document) = self.document_mut(frame) {
                document.page_dismissal = PageDismissalType::None;
            }
        }
        if self.is_alive(frame) {
            self.stop_frame_loading(frame);
        }
    }

    /// Ends parsing and cancels scheduled navigations without reporting completion.
    pub(crate) fn stop_frame_loading(&mut self, frame: FrameId) {
        let Some(state) = self.frame_mut(frame) else {
            return;
        };
        state.loader.is_complete = true;
        let parsing = state.document.as_ref().is_some_and(|document| document.parsing);
        if parsing {
            if let Some(document) = self.document_mut(frame) {
                document.finish_parsing();
            }
            self.finished_parsing(frame);
        }
        if let Some(document) = self.document_mut(frame) {
            document.ready_state = ReadyState::Complete;
        }
        self.cancel_scheduled_navigation(frame);
    }

    /// Resets per-document frame state before a new document is installed.
    pub(crate) fn clear(&mut self, frame: FrameId) {
        let Some(state) = self.frame_mut(frame) else {
            return;
        };
        if state.loader.state_machine.creating_initial_empty_document() {
            return;
        }
        if let Some(document) = &mut state.document {
            document.cancel_parsing();
        }
        state.view.reset();
        state.loader.should_call_check_completed = false;
        let check_timer = state.loader.check_timer.take();
        if state.loader.state_machine.is_displaying_initial_empty_document() {
            state
                .loader
                .state_machine
                .advance_to(LoaderMilestone::CommittedFirstRealLoad);
        }
        if let Some(task) = check_timer {
            self.tasks.cancel(task);
        }
        self.cancel_scheduled_navigation(frame);
    }

    /// `document.open()` was called on the frame's document.
    pub fn did_explicit_open(&mut self, frame: FrameId) {
        let Some(state) = self.frame_mut(frame) else {
            return;
        };
        state.loader.is_complete = false;
        state
            .loader
            .state_machine
            .advance_to(LoaderMilestone::CommittedFirstRealLoad);
        if let Some(document) = &mut state.document {
            document.explicitly_opened = true;
        }
        self.cancel_scheduled_navigation(frame);
    }

    /// First bytes of the committed document: records the history commit and tells the embedder.
    pub(crate) fn received_first_data(&mut self, frame: FrameId) {
        let Some(state) = self.frame_ref(frame) else {
            return;
        };
        if state.loader.state_machine.creating_initial_empty_document() {
            return;
        }
        let load_type = state.loader.load_type;
        let has_current_item = state.loader.current_item.is_some();
        let has_opener = state.opener.is_some();
        let Some(loader) = self.document_loader_of(frame) else {
            return;
        };
        let is_valid_history_url = !has_opener || has_current_item || !is_about_blank(&loader.original_request().url);
        let commit_type = HistoryCommitType::for_load_type(load_type, is_valid_history_url);
        self.set_history_item_state_for_commit(frame, commit_type, false, None, false);

        let Some(state) = self.frame_mut(frame) else {
            return;
        };
        if !state.loader.state_machine.committed_multiple_real_loads() && load_type == FrameLoadType::Standard {
            state
                .loader
                .state_machine
                .advance_to(LoaderMilestone::CommittedMultipleRealLoads);
        }
        let Some(item) = state.loader.current_item.as_ref().map(|item| item.borrow().clone()) else {
            return;
        };
        trace!("{frame}: committing {} as {commit_type:?}", elided(&item.url));
        if let Some(client) = self.client(frame) {
            client.dispatch_did_commit_load(self, frame, &item, commit_type);
        }
    }

    /// Points the frame's current history item at the committed state.
    ///
    /// Standard commits get a fresh item; a same-document commit keeps the
    /// document sequence number of the item it replaces.
    pub(crate) fn set_history_item_state_for_commit(
        &mut self,
        frame: FrameId,
        commit_type: HistoryCommitType,
        is_push_or_replace: bool,
        state_object: Option<String>,
        same_document: bool,
    ) {
        let Some(loader) = self.document_loader_of(frame) else {
            return;
        };
        let url_for_history = loader.url_for_history().clone();
        let loader_url = loader.url().clone();
        let referrer = loader.request().http_referrer().map(str::to_owned);
        let request = (!is_push_or_replace).then(|| loader.request().clone());
        let referrer_policy = self
            .document(frame)
            .map(|document| document.referrer_policy)
            .unwrap_or_default();

        let Some(state) = self.frames.get_mut(&frame) else {
            return;
        };
        if let Some(provisional) = state.loader.provisional_item.take() {
            state.loader.current_item = Some(provisional);
        }
        let previous_document_sequence_number = state
            .loader
            .current_item
            .as_ref()
            .map(|item| item.borrow().document_sequence_number);
        let reused = state
            .loader
            .current_item
            .clone()
            .filter(|_| commit_type != HistoryCommitType::StandardCommit);
        let item = match reused {
            Some(item) => {
                let mut current = item.borrow_mut();
                if !is_push_or_replace && current.url != loader_url {
                    if same_document {
                        current.item_sequence_number = self.ids.next_id();
                    } else {
                        current.generate_new_sequence_numbers(&mut self.ids);
                    }
                }
                drop(current);
                item
            }
            None => {
                let mut fresh = HistoryItem::new(url_for_history.clone(), &mut self.ids);
                if same_document {
                    if let Some(number) = previous_document_sequence_number {
                        fresh.document_sequence_number = number;
                    }
                }
                let handle = fresh.into_handle();
                state.loader.current_item = Some(handle.clone());
                handle
            }
        };
        {
            let mut current = item.borrow_mut();
            current.url = url_for_history;
            current.target = state.unique_name.clone();
            if is_push_or_replace {
                current.state_object = state_object;
            }
            current.referrer = referrer;
            current.referrer_policy = referrer_policy;
            current.set_form_info_from_request(request.as_ref());
        }

        let page = state.page;
        let is_main_frame = state.parent.is_none();
        if commit_type == HistoryCommitType::StandardCommit && is_main_frame {
            if let Some(page) = self.pages.get_mut(&page) {
                page.back_forward.add_item(item);
            }
        }
    }

    /// The frame's new document exists and is about to receive content.
    pub(crate) fn did_begin_document(&mut self, frame: FrameId) {
        let Some(state) = self.frame_mut(frame) else {
            return;
        };
        state.loader.is_complete = false;
        if let Some(document) = &mut state.document {
            document.ready_state = ReadyState::Loading;
        }
        let back_forward_item = match (&state.loader.provisional_item, state.loader.load_type) {
            (Some(item), FrameLoadType::BackForward) => Some(item.borrow().clone()),
            _ => None,
        };

        if let Some(item) = &back_forward_item {
            if let Some(host) = self.host(frame) {
                host.state_popped(self, frame, item.state_object.as_deref());
            }
            if !self.is_alive(frame) {
                return;
            }
        }

        let response_headers = self
            .document_loader_of(frame)
            .and_then(|loader| loader.response())
            .map(|response| {
                (
                    response.headers.get_combined("Content-Security-Policy"),
                    response.header("Content-Language").map(str::to_owned),
                )
            });
        let (policy_header, content_language) = response_headers.unwrap_or_default();

        if self.security.enforce_content_security_policy {
            let policy = policy_header
                .as_deref()
                .map(ContentSecurityPolicy::parse)
                .unwrap_or_default();
            let ancestors = self.ancestor_urls(frame);
            let Some(document) = self.document_mut(frame) else {
                return;
            };
            let allowed = policy.allows_ancestors(&ancestors, &document.url);
            document.content_security_policy = policy;
            if !allowed {
                self.did_fail_content_security_policy_check(frame);
                return;
            }
        }

        if let Some(document) = self.document_mut(frame) {
            if let Some(language) = &content_language {
                document.set_content_language(language);
            }
            if let Some(item) = &back_forward_item {
                document.restore_form_element_state(&item.document_state);
            }
        }
    }

    /// Document URLs of `frame`'s ancestors, nearest first.
    fn ancestor_urls(&self, frame: FrameId) -> Vec<Url> {
        let mut urls = Vec::new();
        let mut current = self.parent_of(frame);
        while let Some(ancestor) = current {
            if let Some(document) = self.document(ancestor) {
                urls.push(document.url.clone());
            }
            current = self.parent_of(ancestor);
        }
        urls
    }

    fn did_fail_content_security_policy_check(&mut self, frame: FrameId) {
        if let Some(document) = self.document(frame) {
            warn!(
                "{frame}: refused to display '{}' because an ancestor violates its frame-ancestors policy",
                elided(&document.url)
            );
        }
        if let Some(document) = self.document_mut(frame) {
            document.enforce_sandbox_flags(SandboxFlags::ORIGIN);
        }
        self.stop_all_loaders(frame);
        if !self.is_alive(frame) {
            return;
        }
        if let Some(host) = self.host(frame) {
            host.dispatch_owner_load_event(self, frame);
        }
    }

    /// A load began in `frame`; it and every ancestor are incomplete again.
    pub(crate) fn started(&mut self, frame: FrameId) {
        let mut current = Some(frame);
        while let Some(ancestor) = current {
            let Some(state) = self.frame_mut(ancestor) else {
                break;
            };
            state.loader.is_complete = false;
            current = state.parent;
        }
    }
}
