//! The engine: arena of pages, frames and document loaders.
//!
//! All loader state lives here and is addressed by id. Collaborators get the
//! engine back mutably on every callout, so any id held across a callout must
//! be looked up again before use.

use crate::application_cache::NoopApplicationCacheHost;
use crate::client::DocumentHost;
use crate::client::FrameLoaderClient;
use crate::document_loader::DocumentLoader;
use crate::frame::Frame;
use crate::frame::FrameOwner;
use crate::ids::DocumentLoaderId;
use crate::ids::FrameId;
use crate::ids::PageId;
use crate::load_request::FrameLoadRequest;
use crate::load_request::OriginDocument;
use crate::load_request::SubstituteData;
use crate::page::Page;
use crate::scheduler::TaskQueue;
use crate::settings::LoaderSettings;
use crate::types::FrameLoadType;
use crate::types::HistoryLoadType;
use log::debug;
use log::warn;
use pd_core::BrowserError;
use pd_core::BrowserResult;
use pd_core::IdentifierSource;
use pd_dom::ConsoleMessage;
use pd_dom::Document;
use pd_dom::MessageLevel;
use pd_net::CachePolicy;
use pd_net::ResourceRequest;
use pd_net::url::blank_url;
use pd_net::url::srcdoc_url;
use pd_privacy::PrivacyPolicy;
use pd_security::SecurityPolicy;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use url::Url;

pub struct Engine {
    pub(crate) frames: HashMap<FrameId, Frame>,
    pub(crate) pages: BTreeMap<PageId, Page>,
    pub(crate) loaders: HashMap<DocumentLoaderId, DocumentLoader>,
    pub(crate) ids: IdentifierSource,
    pub(crate) tasks: TaskQueue,
    pub(crate) settings: LoaderSettings,
    pub(crate) security: SecurityPolicy,
    pub(crate) privacy: PrivacyPolicy,
    /// Non-zero while `beforeunload` handlers run.
    pub(crate) navigation_disable_count: usize,
    next_frame_id: u64,
    next_page_id: u64,
    next_loader_id: u64,
    next_document_id: u64,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("pages", &self.pages.len())
            .field("frames", &self.frames.len())
            .field("loaders", &self.loaders.len())
            .field("pending_tasks", &self.tasks.len())
            .finish_non_exhaustive()
    }
}

impl Engine {
    pub fn new(
        settings: LoaderSettings,
        security: SecurityPolicy,
        privacy: PrivacyPolicy,
    ) -> BrowserResult<Self> {
        settings.validate()?;
        security.validate()?;
        privacy.validate()?;
        Ok(Self {
            frames: HashMap::new(),
            pages: BTreeMap::new(),
            loaders: HashMap::new(),
            ids: IdentifierSource::time_seeded(),
            tasks: TaskQueue::default(),
            settings,
            security,
            privacy,
            navigation_disable_count: 0,
            next_frame_id: 0,
            next_page_id: 0,
            next_loader_id: 0,
            next_document_id: 0,
        })
    }

    /// Replaces the time-seeded source, e.g. to get reproducible sequence numbers.
    pub fn with_identifier_source(mut self, ids: IdentifierSource) -> Self {
        self.ids = ids;
        self
    }

    pub fn settings(&self) -> &LoaderSettings {
        &self.settings
    }

    pub fn security(&self) -> &SecurityPolicy {
        &self.security
    }

    pub fn privacy(&self) -> &PrivacyPolicy {
        &self.privacy
    }

    pub fn tasks(&self) -> &TaskQueue {
        &self.tasks
    }

    pub fn now_ms(&self) -> u64 {
        self.tasks.now_ms()
    }

    pub fn frame(&self, frame: FrameId) -> Option<&Frame> {
        self.frames.get(&frame)
    }

    pub(crate) fn frame_ref(&self, frame: FrameId) -> Option<&Frame> {
        self.frames.get(&frame)
    }

    pub(crate) fn frame_mut(&mut self, frame: FrameId) -> Option<&mut Frame> {
        self.frames.get_mut(&frame)
    }

    /// False once the frame has been detached and removed.
    pub fn is_alive(&self, frame: FrameId) -> bool {
        self.frames.contains_key(&frame)
    }

    pub fn frame_ids(&self) -> Vec<FrameId> {
        let mut ids: Vec<FrameId> = self.frames.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn document(&self, frame: FrameId) -> Option<&Document> {
        self.frames.get(&frame)?.document.as_ref()
    }

    /// Mutable access for the DOM side: parsing progress, subresource counts, load-event delays.
    pub fn document_mut(&mut self, frame: FrameId) -> Option<&mut Document> {
        self.frames.get_mut(&frame)?.document.as_mut()
    }

    pub fn loader(&self, loader: DocumentLoaderId) -> Option<&DocumentLoader> {
        self.loaders.get(&loader)
    }

    pub(crate) fn loader_mut(&mut self, loader: DocumentLoaderId) -> Option<&mut DocumentLoader> {
        self.loaders.get_mut(&loader)
    }

    pub fn page(&self, page: PageId) -> Option<&Page> {
        self.pages.get(&page)
    }

    pub fn page_ids(&self) -> Vec<PageId> {
        self.pages.keys().copied().collect()
    }

    pub fn page_of(&self, frame: FrameId) -> Option<&Page> {
        let page = self.frames.get(&frame)?.page;
        self.pages.get(&page)
    }

    pub(crate) fn page_of_mut(&mut self, frame: FrameId) -> Option<&mut Page> {
        let page = self.frames.get(&frame)?.page;
        self.pages.get_mut(&page)
    }

    pub(crate) fn client(&self, frame: FrameId) -> Option<Rc<dyn FrameLoaderClient>> {
        self.frames.get(&frame)?.client.clone()
    }

    pub(crate) fn host(&self, frame: FrameId) -> Option<Rc<dyn DocumentHost>> {
        self.frames.get(&frame).map(|state| Rc::clone(&state.host))
    }

    /// Committed document loader of `frame`.
    pub fn document_loader_of(&self, frame: FrameId) -> Option<&DocumentLoader> {
        let id = self.frames.get(&frame)?.loader.document_loader?;
        self.loaders.get(&id)
    }

    pub fn provisional_document_loader_of(&self, frame: FrameId) -> Option<&DocumentLoader> {
        let id = self.frames.get(&frame)?.loader.provisional_document_loader?;
        self.loaders.get(&id)
    }

    pub(crate) fn document_loader_id(&self, frame: FrameId) -> Option<DocumentLoaderId> {
        self.frames.get(&frame)?.loader.document_loader
    }

    pub(crate) fn provisional_loader_id(&self, frame: FrameId) -> Option<DocumentLoaderId> {
        self.frames.get(&frame)?.loader.provisional_document_loader
    }

    pub(crate) fn policy_loader_id(&self, frame: FrameId) -> Option<DocumentLoaderId> {
        self.frames.get(&frame)?.loader.policy_document_loader
    }

    pub(crate) fn next_document_id(&mut self) -> u64 {
        self.next_document_id += 1;
        self.next_document_id
    }

    pub(crate) fn create_document_loader(
        &mut self,
        frame: FrameId,
        request: ResourceRequest,
        substitute_data: Option<SubstituteData>,
    ) -> DocumentLoaderId {
        self.next_loader_id += 1;
        let id = DocumentLoaderId(self.next_loader_id);
        let application_cache_host = match self.client(frame) {
            Some(client) => client.create_application_cache_host(frame),
            None => Rc::new(NoopApplicationCacheHost),
        };
        self.loaders.insert(
            id,
            DocumentLoader::new(id, frame, request, substitute_data, application_cache_host),
        );
        id
    }

    /// Opens a page with a main frame showing the initial empty document.
    pub fn create_page(
        &mut self,
        client: Rc<dyn FrameLoaderClient>,
        host: Rc<dyn DocumentHost>,
    ) -> PageId {
        self.next_page_id += 1;
        let page = PageId(self.next_page_id);
        self.next_frame_id += 1;
        let main_frame = FrameId(self.next_frame_id);

        self.pages.insert(
            page,
            Page::new(page, main_frame, self.settings.back_forward_list_capacity),
        );
        self.frames
            .insert(main_frame, Frame::new(main_frame, page, None, None, client, host));
        debug!("{page}: created with main frame {main_frame}");
        self.init_frame_loader(main_frame);
        page
    }

    /// Creates a frame for `owner` inside `parent` and starts its first load.
    ///
    /// Without `url` the frame loads `about:srcdoc` when the owner has a
    /// `srcdoc` attribute and `about:blank` otherwise.
    pub fn create_child_frame(
        &mut self,
        parent: FrameId,
        owner: FrameOwner,
        url: Option<Url>,
    ) -> BrowserResult<FrameId> {
        let Some(parent_state) = self.frames.get(&parent) else {
            return Err(BrowserError::new(
                "loader.frame.detached",
                format!("{parent} is not attached to a page"),
            ));
        };
        let Some(client) = parent_state.client.clone() else {
            return Err(BrowserError::new(
                "loader.frame.detached",
                format!("{parent} is being detached"),
            ));
        };
        let host = Rc::clone(&parent_state.host);
        let page = parent_state.page;
        let frame_count = self.pages.get(&page).map_or(0, Page::frame_count);
        if frame_count >= self.settings.max_frames_per_page {
            return Err(BrowserError::new(
                "loader.frame.limit",
                format!(
                    "{page} already has {frame_count} frames (limit {})",
                    self.settings.max_frames_per_page
                ),
            ));
        }

        self.next_frame_id += 1;
        let child = FrameId(self.next_frame_id);
        let srcdoc = owner.srcdoc.is_some();
        let requested_name = owner.name.clone();
        self.frames
            .insert(child, Frame::new(child, page, Some(parent), Some(owner), client, host));
        if let Some(parent_state) = self.frames.get_mut(&parent) {
            parent_state.children.push(child);
        }
        let unique_name = self.unique_child_name(parent, &requested_name);
        if let Some(state) = self.frames.get_mut(&child) {
            state.unique_name = unique_name;
        }
        if let Some(page) = self.pages.get_mut(&page) {
            page.frame_count += 1;
        }
        debug!("{child}: created in {parent}");

        self.init_frame_loader(child);
        if !self.is_alive(child) {
            return Ok(child);
        }

        let restoring = self
            .frame_ref(parent)
            .is_some_and(|state| state.loader.load_type == FrameLoadType::BackForward);
        if restoring {
            let item = match self.client(child) {
                Some(client) => client.history_item_for_new_child_frame(self, child),
                None => None,
            };
            if let Some(item) = item {
                if self.is_alive(child) {
                    self.load_history_item(
                        child,
                        item,
                        HistoryLoadType::DifferentDocument,
                        CachePolicy::UseProtocolCachePolicy,
                    );
                }
                return Ok(child);
            }
        }

        let url = url.unwrap_or_else(|| if srcdoc { srcdoc_url() } else { blank_url() });
        let origin = self
            .document(parent)
            .map(|document| OriginDocument::capture(parent, document));
        let request = FrameLoadRequest::new(origin, ResourceRequest::new(url)).with_frame_name("_self");
        self.load(child, request);
        Ok(child)
    }

    /// Logs to the frame's document console and forwards the message to its host.
    pub fn add_console_message(&mut self, frame: FrameId, level: MessageLevel, text: &str) {
        let Some(document) = self.document_mut(frame) else {
            warn!("{frame}: dropped console message without a document: {text}");
            return;
        };
        document.add_console_message(level, text);
        let message = ConsoleMessage {
            level,
            text: text.to_owned(),
        };
        if let Some(host) = self.host(frame) {
            host.add_console_message(self, frame, &message);
        }
    }
}
