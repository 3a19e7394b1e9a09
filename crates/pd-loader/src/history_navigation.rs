//! Reloads and session history traversal.

use crate::engine::Engine;
use crate::history::HistoryItem;
use crate::history::HistoryItemHandle;
use crate::ids::FrameId;
use crate::ids::PageId;
use crate::navigation_policy::NavigationAction;
use crate::page::DeferredHistoryLoad;
use crate::types::ClientRedirectPolicy;
use crate::types::FrameLoadType;
use crate::types::HistoryLoadType;
use crate::types::ReloadPolicy;
use crate::types::UpdateBackForwardListPolicy;
use log::debug;
use log::trace;
use pd_net::CachePolicy;
use pd_net::HttpMethod;
use pd_net::ResourceRequest;
use pd_net::url::elided;
use pd_security::SecurityOrigin;
use url::Url;

impl Engine {
    /// Request that reproduces `item`, re-posting its form data if it has any.
    pub fn request_from_history_item(&self, item: &HistoryItem, cache_policy: CachePolicy) -> ResourceRequest {
        let mut request = ResourceRequest::with_referrer(item.url.clone(), item.referrer.as_deref());
        request.cache_policy = cache_policy;
        if let Some(form_data) = &item.form_data {
            request.method = HttpMethod::Post;
            request.body = Some(form_data.clone());
            if let Some(content_type) = &item.form_content_type {
                request.set_http_content_type(content_type);
            }
            let origin = item
                .referrer
                .as_deref()
                .map(|referrer| SecurityOrigin::from_string(referrer).to_header_value())
                .unwrap_or_default();
            self.privacy.add_http_origin_if_needed(&mut request, &origin);
        }
        request
    }

    /// Reloads the frame's current history item.
    ///
    /// `override_url` replaces the item's URL and drops its referrer.
    pub fn reload(
        &mut self,
        frame: FrameId,
        policy: ReloadPolicy,
        override_url: Option<Url>,
        override_encoding: Option<String>,
    ) {
        let Some(item) = self
            .frame_ref(frame)
            .and_then(|state| state.loader.current_item.clone())
        else {
            debug!("{frame}: nothing to reload");
            return;
        };
        let mut request = self.request_from_history_item(&item.borrow(), CachePolicy::ReloadIgnoringCacheData);
        if let Some(url) = override_url {
            request.url = url;
            request.clear_http_referrer();
        }
        let load_type = match policy {
            ReloadPolicy::EndToEnd => FrameLoadType::ReloadFromOrigin,
            ReloadPolicy::Normal => FrameLoadType::Reload,
        };
        debug!("{frame}: {load_type:?} of {}", elided(&request.url));
        self.load_with_navigation_action(
            frame,
            NavigationAction::for_load_type(request, load_type),
            load_type,
            None,
            None,
            ClientRedirectPolicy::NotClientRedirect,
            override_encoding,
        );
    }

    /// Navigates `frame` to the state recorded in `item`.
    ///
    /// While the page defers loading the request is parked on the frame and
    /// replayed by [`Engine::set_defers_loading`].
    pub fn load_history_item(
        &mut self,
        frame: FrameId,
        item: HistoryItemHandle,
        load_type: HistoryLoadType,
        cache_policy: CachePolicy,
    ) {
        let Some(state) = self.frames.get_mut(&frame) else {
            return;
        };
        if self.pages.get(&state.page).is_some_and(|page| page.defers_loading) {
            trace!("{frame}: deferring history load");
            state.loader.deferred_history_load = Some(DeferredHistoryLoad {
                item,
                load_type,
                cache_policy,
            });
            return;
        }

        state.loader.provisional_item = Some(item.clone());
        state.loader.load_type = FrameLoadType::BackForward;
        let (url, state_object) = {
            let item = item.borrow();
            (item.url.clone(), item.state_object.clone())
        };
        debug!("{frame}: history load of {} ({load_type:?})", elided(&url));

        if load_type == HistoryLoadType::SameDocument {
            self.load_in_same_document(
                frame,
                &url,
                state_object,
                UpdateBackForwardListPolicy::DoNotUpdateBackForwardList,
                ClientRedirectPolicy::NotClientRedirect,
            );
            self.restore_scroll_position_and_view_state(frame);
            return;
        }

        let request = self.request_from_history_item(&item.borrow(), cache_policy);
        self.load_with_navigation_action(
            frame,
            NavigationAction::for_load_type(request, FrameLoadType::BackForward),
            FrameLoadType::BackForward,
            None,
            None,
            ClientRedirectPolicy::NotClientRedirect,
            None,
        );
    }

    /// Pauses or resumes the page's loading.
    ///
    /// Resuming replays parked history loads and restarts the scheduler and
    /// completion timers of every frame.
    pub fn set_defers_loading(&mut self, page: PageId, defers: bool) {
        let Some(state) = self.pages.get_mut(&page) else {
            return;
        };
        if state.defers_loading == defers {
            return;
        }
        state.defers_loading = defers;
        let main_frame = state.main_frame;
        debug!("{page}: {} loading", if defers { "deferring" } else { "resuming" });
        if defers {
            return;
        }

        for frame in self.subtree(main_frame) {
            let deferred = self
                .frame_mut(frame)
                .and_then(|state| state.loader.deferred_history_load.take());
            if let Some(deferred) = deferred {
                self.load_history_item(frame, deferred.item, deferred.load_type, deferred.cache_policy);
            }
            if !self.is_alive(frame) {
                continue;
            }
            self.start_navigation_timer(frame);
            self.start_check_complete_timer(frame);
        }
    }

    /// Moves the page's session history by `offset` entries.
    ///
    /// An entry that shares the current document is reached without a load.
    pub fn go_to_offset(&mut self, page: PageId, offset: isize) {
        let Some(state) = self.pages.get(&page) else {
            return;
        };
        let Some(item) = state.back_forward.item_at_offset(offset) else {
            debug!("{page}: no history entry at offset {offset}");
            return;
        };
        let main_frame = state.main_frame;
        let same_document = self
            .frame_ref(main_frame)
            .and_then(|state| state.loader.current_item.as_ref())
            .is_some_and(|current| current.borrow().is_same_document_as(&item.borrow()));
        if let Some(state) = self.pages.get_mut(&page) {
            state.back_forward.go_to_item(&item);
        }
        let load_type = if same_document {
            HistoryLoadType::SameDocument
        } else {
            HistoryLoadType::DifferentDocument
        };
        self.load_history_item(main_frame, item, load_type, CachePolicy::ReturnCacheDataElseLoad);
    }

    pub fn go_back(&mut self, page: PageId) {
        self.go_to_offset(page, -1);
    }

    pub fn go_forward(&mut self, page: PageId) {
        self.go_to_offset(page, 1);
    }
}
