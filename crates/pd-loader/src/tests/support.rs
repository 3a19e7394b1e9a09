//! Recording embedder and a small harness around an engine with one page.

use crate::client::DocumentHost;
use crate::client::FrameLoaderClient;
use crate::client::JavaScriptUrlOutcome;
use crate::engine::Engine;
use crate::history::HistoryItem;
use crate::ids::DocumentLoaderId;
use crate::ids::FrameId;
use crate::ids::PageId;
use crate::load_request::FrameLoadRequest;
use crate::settings::LoaderSettings;
use crate::types::HistoryCommitType;
use pd_core::IdentifierSource;
use pd_net::ResourceError;
use pd_net::ResourceRequest;
use pd_net::ResourceResponse;
use pd_privacy::PrivacyPolicy;
use pd_security::SecurityPolicy;
use std::cell::Cell;
use std::cell::RefCell;
use std::rc::Rc;
use url::Url;

pub(crate) fn url(input: &str) -> Url {
    match Url::parse(input) {
        Ok(url) => url,
        Err(error) => panic!("{input}: {error}"),
    }
}

/// Logs every callout in order and lets a test script a few answers.
pub(crate) struct Recorder {
    events: RefCell<Vec<String>>,
    /// `beforeunload` returns this message.
    pub(crate) before_unload_message: RefCell<Option<String>>,
    /// Answer of the beforeunload confirmation panel.
    pub(crate) confirm_leave: Cell<bool>,
    /// Loaded into the frame the next time one of its fetches is cancelled.
    pub(crate) load_on_cancel: RefCell<Option<Url>>,
    /// Loaded into the frame from inside its `beforeunload` handler.
    pub(crate) load_on_before_unload: RefCell<Option<Url>>,
    /// Loaded into the frame from inside its `unload` handler.
    pub(crate) load_on_unload: RefCell<Option<Url>>,
    /// Markup a `javascript:` URL evaluates to; `None` means the script handled itself.
    pub(crate) javascript_result: RefCell<Option<String>>,
}

impl Default for Recorder {
    fn default() -> Self {
        Self {
            events: RefCell::new(Vec::new()),
            before_unload_message: RefCell::new(None),
            confirm_leave: Cell::new(true),
            load_on_cancel: RefCell::new(None),
            load_on_before_unload: RefCell::new(None),
            load_on_unload: RefCell::new(None),
            javascript_result: RefCell::new(None),
        }
    }
}

impl Recorder {
    fn record(&self, event: String) {
        self.events.borrow_mut().push(event);
    }

    pub(crate) fn events(&self) -> Vec<String> {
        self.events.borrow().clone()
    }

    pub(crate) fn clear(&self) {
        self.events.borrow_mut().clear();
    }

    pub(crate) fn count(&self, event: &str) -> usize {
        self.events.borrow().iter().filter(|recorded| *recorded == event).count()
    }

    pub(crate) fn position(&self, event: &str) -> Option<usize> {
        self.events.borrow().iter().position(|recorded| recorded == event)
    }

    /// Runs a scripted load, if any, after the triggering callout was recorded.
    fn run_scripted_load(slot: &RefCell<Option<Url>>, engine: &mut Engine, frame: FrameId) {
        let scripted = slot.borrow_mut().take();
        if let Some(url) = scripted {
            engine.load(frame, FrameLoadRequest::for_url(url));
        }
    }
}

impl FrameLoaderClient for Recorder {
    fn dispatch_did_start_provisional_load(&self, _engine: &mut Engine, frame: FrameId) {
        self.record(format!("start_provisional {frame}"));
    }

    fn dispatch_did_commit_load(
        &self,
        _engine: &mut Engine,
        frame: FrameId,
        item: &HistoryItem,
        commit_type: HistoryCommitType,
    ) {
        self.record(format!("commit {frame} {} {commit_type:?}", item.url));
    }

    fn dispatch_did_fail_provisional_load(&self, _engine: &mut Engine, frame: FrameId, _error: &ResourceError) {
        self.record(format!("fail_provisional {frame}"));
    }

    fn dispatch_did_finish_load(&self, _engine: &mut Engine, frame: FrameId) {
        self.record(format!("finish_load {frame}"));
    }

    fn dispatch_did_fail_load(&self, _engine: &mut Engine, frame: FrameId, _error: &ResourceError) {
        self.record(format!("fail_load {frame}"));
    }

    fn dispatch_did_finish_document_load(&self, _engine: &mut Engine, frame: FrameId) {
        self.record(format!("finish_document_load {frame}"));
    }

    fn dispatch_did_navigate_within_page(
        &self,
        _engine: &mut Engine,
        frame: FrameId,
        item: &HistoryItem,
        _commit_type: HistoryCommitType,
    ) {
        self.record(format!("navigate_within_page {frame} {}", item.url));
    }

    fn dispatch_will_close(&self, _engine: &mut Engine, frame: FrameId) {
        self.record(format!("will_close {frame}"));
    }

    fn did_stop_all_loaders(&self, _engine: &mut Engine, frame: FrameId) {
        self.record(format!("stop_all_loaders {frame}"));
    }

    fn run_before_unload_confirm_panel(&self, _engine: &mut Engine, frame: FrameId, _message: &str) -> bool {
        self.record(format!("confirm_before_unload {frame}"));
        self.confirm_leave.get()
    }

    fn post_progress_started_notification(&self, _engine: &mut Engine, frame: FrameId) {
        self.record(format!("progress_started {frame}"));
    }

    fn post_progress_finished_notification(&self, _engine: &mut Engine, frame: FrameId) {
        self.record(format!("progress_finished {frame}"));
    }

    fn start_main_resource_fetch(
        &self,
        _engine: &mut Engine,
        frame: FrameId,
        _loader: DocumentLoaderId,
        request: &ResourceRequest,
    ) {
        self.record(format!("fetch {frame} {}", request.url));
    }

    fn cancel_main_resource_fetch(&self, engine: &mut Engine, frame: FrameId, _loader: DocumentLoaderId) {
        self.record(format!("cancel_fetch {frame}"));
        Self::run_scripted_load(&self.load_on_cancel, engine, frame);
    }

    fn detached_from_parent(&self, _engine: &mut Engine, frame: FrameId) {
        self.record(format!("detached {frame}"));
    }

    fn did_access_initial_document(&self, _engine: &mut Engine, frame: FrameId) {
        self.record(format!("access_initial {frame}"));
    }
}

impl DocumentHost for Recorder {
    fn dispatch_before_unload(&self, engine: &mut Engine, frame: FrameId) -> Option<String> {
        self.record(format!("before_unload {frame}"));
        Self::run_scripted_load(&self.load_on_before_unload, engine, frame);
        self.before_unload_message.borrow().clone()
    }

    fn dispatch_unload(&self, engine: &mut Engine, frame: FrameId) {
        self.record(format!("unload {frame}"));
        Self::run_scripted_load(&self.load_on_unload, engine, frame);
    }

    fn dispatch_owner_load_event(&self, _engine: &mut Engine, frame: FrameId) {
        self.record(format!("owner_load {frame}"));
    }

    fn dispatch_load_event(&self, _engine: &mut Engine, frame: FrameId) {
        self.record(format!("load_event {frame}"));
    }

    fn enqueue_hashchange(&self, _engine: &mut Engine, frame: FrameId, old_url: &Url, new_url: &Url) {
        self.record(format!("hashchange {frame} {old_url} {new_url}"));
    }

    fn state_popped(&self, _engine: &mut Engine, frame: FrameId, state: Option<&str>) {
        self.record(format!("state_popped {frame} {}", state.unwrap_or("-")));
    }

    fn render_fallback_content(&self, _engine: &mut Engine, frame: FrameId) {
        self.record(format!("fallback {frame}"));
    }

    fn execute_javascript_url(&self, _engine: &mut Engine, frame: FrameId, url: &Url) -> JavaScriptUrlOutcome {
        self.record(format!("javascript {frame} {url}"));
        match self.javascript_result.borrow().clone() {
            Some(markup) => JavaScriptUrlOutcome::ReplaceDocument(markup),
            None => JavaScriptUrlOutcome::Handled,
        }
    }
}

/// An engine with one page whose embedder is a [`Recorder`].
pub(crate) struct Harness {
    pub(crate) engine: Engine,
    pub(crate) recorder: Rc<Recorder>,
    pub(crate) page: PageId,
    pub(crate) main: FrameId,
}

impl Harness {
    pub(crate) fn new() -> Self {
        Self::with_settings(LoaderSettings::default())
    }

    pub(crate) fn with_settings(settings: LoaderSettings) -> Self {
        let engine = match Engine::new(settings, SecurityPolicy::default(), PrivacyPolicy::default()) {
            Ok(engine) => engine,
            Err(error) => panic!("{error}"),
        };
        let mut engine = engine.with_identifier_source(IdentifierSource::starting_after(0));
        let recorder = Rc::new(Recorder::default());
        let page = engine.create_page(recorder.clone(), recorder.clone());
        let main = match engine.page(page) {
            Some(page) => page.main_frame(),
            None => panic!("{page} missing"),
        };
        recorder.clear();
        Self {
            engine,
            recorder,
            page,
            main,
        }
    }

    pub(crate) fn provisional(&self, frame: FrameId) -> Option<DocumentLoaderId> {
        self.engine
            .frame(frame)
            .and_then(|state| state.loader().provisional_document_loader())
    }

    pub(crate) fn committed(&self, frame: FrameId) -> Option<DocumentLoaderId> {
        self.engine
            .frame(frame)
            .and_then(|state| state.loader().document_loader())
    }

    pub(crate) fn is_complete(&self, frame: FrameId) -> bool {
        self.engine
            .frame(frame)
            .is_some_and(|state| state.loader().is_complete())
    }

    pub(crate) fn document_url(&self, frame: FrameId) -> Option<String> {
        self.engine.document(frame).map(|document| document.url.to_string())
    }

    /// Starts a browser-initiated load and returns its provisional loader.
    pub(crate) fn navigate(&mut self, frame: FrameId, target: &str) -> DocumentLoaderId {
        self.engine.load(frame, FrameLoadRequest::for_url(url(target)));
        match self.provisional(frame) {
            Some(loader) => loader,
            None => panic!("{frame}: no provisional loader for {target}"),
        }
    }

    /// Loads a URL that differs from the current one only by fragment.
    pub(crate) fn navigate_within_document(&mut self, frame: FrameId, target: &str) {
        self.engine.load(frame, FrameLoadRequest::for_url(url(target)));
        assert!(self.provisional(frame).is_none(), "{frame}: {target} started a new document");
    }

    pub(crate) fn respond(&mut self, loader: DocumentLoaderId, response: ResourceResponse) {
        self.engine.did_receive_main_resource_response(loader, response);
    }

    /// Delivers a `200 text/html` response and a first chunk, which commits the load.
    pub(crate) fn commit(&mut self, loader: DocumentLoaderId) {
        let Some(target) = self.engine.loader(loader).map(|loader| loader.url().clone()) else {
            panic!("{loader} missing");
        };
        self.respond(loader, ResourceResponse::new(target, "text/html"));
        self.engine.did_receive_main_resource_data(loader, b"<p>hello</p>");
    }

    pub(crate) fn finish(&mut self, loader: DocumentLoaderId) {
        self.engine.did_finish_main_resource(loader);
    }

    /// Runs a whole load of `target` in `frame`.
    pub(crate) fn load_fully(&mut self, frame: FrameId, target: &str) -> DocumentLoaderId {
        let loader = self.navigate(frame, target);
        self.commit(loader);
        self.finish(loader);
        loader
    }

    pub(crate) fn back_forward_urls(&self) -> Vec<String> {
        self.engine
            .page(self.page)
            .map(|page| page.back_forward().urls().iter().map(Url::to_string).collect())
            .unwrap_or_default()
    }
}
