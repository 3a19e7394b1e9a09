//! Collaborator interfaces the loader calls out to.
//!
//! Every callout receives the engine mutably, so an implementation may start,
//! stop, or detach navigations from inside the callback. The loader re-checks
//! its own state after each call returns.

use crate::application_cache::ApplicationCacheHost;
use crate::application_cache::NoopApplicationCacheHost;
use crate::engine::Engine;
use crate::history::HistoryItem;
use crate::history::HistoryItemHandle;
use crate::ids::DocumentLoaderId;
use crate::ids::FrameId;
use crate::ids::PageId;
use crate::load_request::FrameLoadRequest;
use crate::navigation_policy::NavigationPolicy;
use crate::navigation_policy::NavigationType;
use crate::types::HistoryCommitType;
use pd_dom::ConsoleMessage;
use pd_dom::FormElement;
use pd_net::ResourceError;
use pd_net::ResourceRequest;
use std::rc::Rc;
use url::Url;

/// Embedder notifications and decisions.
pub trait FrameLoaderClient {
    fn dispatch_did_start_provisional_load(&self, _engine: &mut Engine, _frame: FrameId) {}

    fn dispatch_did_commit_load(
        &self,
        _engine: &mut Engine,
        _frame: FrameId,
        _item: &HistoryItem,
        _commit_type: HistoryCommitType,
    ) {
    }

    fn dispatch_did_fail_provisional_load(&self, _engine: &mut Engine, _frame: FrameId, _error: &ResourceError) {}

    fn dispatch_did_finish_load(&self, _engine: &mut Engine, _frame: FrameId) {}

    fn dispatch_did_fail_load(&self, _engine: &mut Engine, _frame: FrameId, _error: &ResourceError) {}

    fn dispatch_did_finish_document_load(&self, _engine: &mut Engine, _frame: FrameId) {}

    fn dispatch_did_navigate_within_page(
        &self,
        _engine: &mut Engine,
        _frame: FrameId,
        _item: &HistoryItem,
        _commit_type: HistoryCommitType,
    ) {
    }

    fn did_update_current_history_item(&self, _engine: &mut Engine, _frame: FrameId) {}

    fn did_access_initial_document(&self, _engine: &mut Engine, _frame: FrameId) {}

    fn dispatch_will_close(&self, _engine: &mut Engine, _frame: FrameId) {}

    fn dispatch_will_submit_form(&self, _engine: &mut Engine, _frame: FrameId, _form: &FormElement) {}

    fn transition_to_committed_for_new_page(&self, _engine: &mut Engine, _frame: FrameId) {}

    fn did_stop_all_loaders(&self, _engine: &mut Engine, _frame: FrameId) {}

    /// Returns the disposition to use; the default keeps the suggested one.
    fn decide_policy_for_navigation(
        &self,
        _engine: &mut Engine,
        _frame: FrameId,
        _request: &ResourceRequest,
        _navigation_type: NavigationType,
        suggested: NavigationPolicy,
    ) -> NavigationPolicy {
        suggested
    }

    /// Opens a page for a navigation that targets a new window. `None` means the window was not created.
    fn create_window_for_request(
        &self,
        _engine: &mut Engine,
        _opener: FrameId,
        _request: &FrameLoadRequest,
        _policy: NavigationPolicy,
    ) -> Option<PageId> {
        None
    }

    fn load_url_externally(
        &self,
        _engine: &mut Engine,
        _frame: FrameId,
        _request: &ResourceRequest,
        _policy: NavigationPolicy,
    ) {
    }

    fn can_run_before_unload_confirm_panel(&self) -> bool {
        true
    }

    /// True lets the navigation proceed.
    fn run_before_unload_confirm_panel(&self, _engine: &mut Engine, _frame: FrameId, _message: &str) -> bool {
        true
    }

    fn post_progress_started_notification(&self, _engine: &mut Engine, _frame: FrameId) {}

    fn post_progress_finished_notification(&self, _engine: &mut Engine, _frame: FrameId) {}

    fn need_touch_events(&self, _engine: &mut Engine, _frame: FrameId, _needed: bool) {}

    fn focus(&self, _engine: &mut Engine, _frame: FrameId) {}

    /// Starts the network fetch; results come back through the engine's main-resource entry points.
    fn start_main_resource_fetch(
        &self,
        _engine: &mut Engine,
        _frame: FrameId,
        _loader: DocumentLoaderId,
        _request: &ResourceRequest,
    ) {
    }

    fn cancel_main_resource_fetch(&self, _engine: &mut Engine, _frame: FrameId, _loader: DocumentLoaderId) {}

    /// Item to restore into a child frame created during a back/forward load.
    fn history_item_for_new_child_frame(&self, _engine: &mut Engine, _child: FrameId) -> Option<HistoryItemHandle> {
        None
    }

    fn create_application_cache_host(&self, _frame: FrameId) -> Rc<dyn ApplicationCacheHost> {
        Rc::new(NoopApplicationCacheHost)
    }

    fn detached_from_parent(&self, _engine: &mut Engine, _frame: FrameId) {}
}

/// Result of running a `javascript:` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JavaScriptUrlOutcome {
    /// The script ran; the document stays.
    Handled,
    /// The script produced markup that replaces the current document.
    ReplaceDocument(String),
}

/// Script and DOM side of a frame.
pub trait DocumentHost {
    fn execute_javascript_url(&self, _engine: &mut Engine, _frame: FrameId, _url: &Url) -> JavaScriptUrlOutcome {
        JavaScriptUrlOutcome::Handled
    }

    /// Runs `beforeunload`; `Some(message)` asks the user to confirm leaving.
    fn dispatch_before_unload(&self, _engine: &mut Engine, _frame: FrameId) -> Option<String> {
        None
    }

    /// Runs `pagehide` and `unload`.
    fn dispatch_unload(&self, _engine: &mut Engine, _frame: FrameId) {}

    /// Fires `beforeload` on the element owning `frame`; false cancels the load.
    fn dispatch_before_load(&self, _engine: &mut Engine, _frame: FrameId, _url: &Url) -> bool {
        true
    }

    /// Fires `load` on the element owning `frame`.
    fn dispatch_owner_load_event(&self, _engine: &mut Engine, _frame: FrameId) {}

    /// Fires the window `load` event of the frame's document.
    fn dispatch_load_event(&self, _engine: &mut Engine, _frame: FrameId) {}

    fn enqueue_hashchange(&self, _engine: &mut Engine, _frame: FrameId, _old_url: &Url, _new_url: &Url) {}

    fn state_popped(&self, _engine: &mut Engine, _frame: FrameId, _state: Option<&str>) {}

    fn render_fallback_content(&self, _engine: &mut Engine, _frame: FrameId) {}

    fn clear_last_edit_command(&self, _engine: &mut Engine, _frame: FrameId) {}

    fn close_dialog(&self, _engine: &mut Engine, _frame: FrameId, _result: &str) {}

    fn add_console_message(&self, _engine: &mut Engine, _frame: FrameId, _message: &ConsoleMessage) {}

    fn clear_for_close(&self, _engine: &mut Engine, _frame: FrameId) {}
}

/// Host with no script: every event is a no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct InertDocumentHost;

impl DocumentHost for InertDocumentHost {}
