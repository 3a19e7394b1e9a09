//! Frames: one node of a page's frame tree and the loader state it owns.

use crate::client::DocumentHost;
use crate::client::FrameLoaderClient;
use crate::history::HistoryItemHandle;
use crate::ids::DocumentLoaderId;
use crate::ids::FrameId;
use crate::ids::PageId;
use crate::page::DeferredHistoryLoad;
use crate::scheduler::NavigationScheduler;
use crate::scheduler::TaskId;
use crate::state_machine::FrameLoaderStateMachine;
use crate::types::FrameLoadType;
use crate::types::FrameState;
use crate::types::ScrollOffset;
use pd_dom::Document;
use pd_security::SandboxFlags;
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOwnerKind {
    IFrame,
    Frame,
    Object,
}

/// The element in the parent document that hosts a child frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameOwner {
    pub kind: FrameOwnerKind,
    pub name: String,
    /// `srcdoc` markup; its presence makes the frame a srcdoc document.
    pub srcdoc: Option<String>,
    pub sandbox_flags: SandboxFlags,
}

impl FrameOwner {
    pub fn new(kind: FrameOwnerKind, name: &str) -> Self {
        Self {
            kind,
            name: name.to_owned(),
            srcdoc: None,
            sandbox_flags: SandboxFlags::empty(),
        }
    }

    pub fn iframe(name: &str) -> Self {
        Self::new(FrameOwnerKind::IFrame, name)
    }

    pub fn with_srcdoc(mut self, markup: &str) -> Self {
        self.srcdoc = Some(markup.to_owned());
        self
    }

    pub fn with_sandbox(mut self, flags: SandboxFlags) -> Self {
        self.sandbox_flags = flags;
        self
    }

    /// Objects render fallback content when their load fails.
    pub fn is_object(&self) -> bool {
        self.kind == FrameOwnerKind::Object
    }
}

/// A fragment scroll recorded on a view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentScroll {
    pub fragment: String,
    /// False while a cross-origin ancestor must not learn about the scroll.
    pub propagated_to_parent: bool,
}

/// Scroll state of a frame's viewport.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameView {
    pub scroll_position: ScrollOffset,
    /// Largest reachable offset for the current layout.
    pub maximum_scroll_position: ScrollOffset,
    pub was_scrolled_by_user: bool,
    pub safe_to_propagate_scroll_to_parent: bool,
    pub last_fragment_scroll: Option<FragmentScroll>,
}

impl Default for FrameView {
    fn default() -> Self {
        Self {
            scroll_position: ScrollOffset::default(),
            maximum_scroll_position: ScrollOffset::default(),
            was_scrolled_by_user: false,
            safe_to_propagate_scroll_to_parent: true,
            last_fragment_scroll: None,
        }
    }
}

impl FrameView {
    pub fn clamp(&self, point: ScrollOffset) -> ScrollOffset {
        ScrollOffset::new(
            point.x.clamp(0, self.maximum_scroll_position.x.max(0)),
            point.y.clamp(0, self.maximum_scroll_position.y.max(0)),
        )
    }

    pub fn set_scroll_position(&mut self, point: ScrollOffset) {
        self.scroll_position = self.clamp(point);
    }

    /// User scrolls stop scroll restoration from overriding the position.
    pub fn scroll_by_user(&mut self, point: ScrollOffset) {
        self.set_scroll_position(point);
        self.was_scrolled_by_user = true;
    }

    /// Forgets the previous document's scroll state; layout extent is kept.
    pub(crate) fn reset(&mut self) {
        self.scroll_position = ScrollOffset::default();
        self.was_scrolled_by_user = false;
        self.last_fragment_scroll = None;
    }

    pub(crate) fn scroll_to_fragment(&mut self, fragment: &str) {
        self.last_fragment_scroll = Some(FragmentScroll {
            fragment: fragment.to_owned(),
            propagated_to_parent: self.safe_to_propagate_scroll_to_parent,
        });
    }
}

/// Navigation state of one frame.
#[derive(Debug)]
pub struct FrameLoader {
    pub(crate) state: FrameState,
    pub(crate) load_type: FrameLoadType,
    pub(crate) document_loader: Option<DocumentLoaderId>,
    pub(crate) provisional_document_loader: Option<DocumentLoaderId>,
    pub(crate) policy_document_loader: Option<DocumentLoaderId>,
    pub(crate) current_item: Option<HistoryItemHandle>,
    pub(crate) provisional_item: Option<HistoryItemHandle>,
    pub(crate) deferred_history_load: Option<DeferredHistoryLoad>,
    pub(crate) state_machine: FrameLoaderStateMachine,
    pub(crate) is_complete: bool,
    pub(crate) in_stop_all_loaders: bool,
    pub(crate) should_call_check_completed: bool,
    pub(crate) check_timer: Option<TaskId>,
    pub(crate) did_access_initial_document: bool,
    pub(crate) did_access_initial_document_timer: Option<TaskId>,
    pub(crate) forced_sandbox_flags: SandboxFlags,
    pub(crate) in_progress: bool,
}

impl Default for FrameLoader {
    fn default() -> Self {
        Self {
            state: FrameState::Provisional,
            load_type: FrameLoadType::Standard,
            document_loader: None,
            provisional_document_loader: None,
            policy_document_loader: None,
            current_item: None,
            provisional_item: None,
            deferred_history_load: None,
            state_machine: FrameLoaderStateMachine::new(),
            is_complete: false,
            in_stop_all_loaders: false,
            should_call_check_completed: false,
            check_timer: None,
            did_access_initial_document: false,
            did_access_initial_document_timer: None,
            forced_sandbox_flags: SandboxFlags::empty(),
            in_progress: false,
        }
    }
}

impl FrameLoader {
    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn load_type(&self) -> FrameLoadType {
        self.load_type
    }

    pub fn document_loader(&self) -> Option<DocumentLoaderId> {
        self.document_loader
    }

    pub fn provisional_document_loader(&self) -> Option<DocumentLoaderId> {
        self.provisional_document_loader
    }

    pub fn policy_document_loader(&self) -> Option<DocumentLoaderId> {
        self.policy_document_loader
    }

    pub fn current_item(&self) -> Option<&HistoryItemHandle> {
        self.current_item.as_ref()
    }

    pub fn provisional_item(&self) -> Option<&HistoryItemHandle> {
        self.provisional_item.as_ref()
    }

    pub fn state_machine(&self) -> &FrameLoaderStateMachine {
        &self.state_machine
    }

    pub fn is_complete(&self) -> bool {
        self.is_complete
    }

    pub fn in_stop_all_loaders(&self) -> bool {
        self.in_stop_all_loaders
    }

    pub fn has_pending_check_completed(&self) -> bool {
        self.check_timer.is_some()
    }

    pub fn has_deferred_history_load(&self) -> bool {
        self.deferred_history_load.is_some()
    }

    pub fn forced_sandbox_flags(&self) -> SandboxFlags {
        self.forced_sandbox_flags
    }
}

pub struct Frame {
    pub(crate) id: FrameId,
    pub(crate) page: PageId,
    pub(crate) parent: Option<FrameId>,
    pub(crate) children: Vec<FrameId>,
    pub(crate) name: String,
    pub(crate) unique_name: String,
    pub(crate) owner: Option<FrameOwner>,
    pub(crate) opener: Option<FrameId>,
    pub(crate) document: Option<Document>,
    pub(crate) view: FrameView,
    pub(crate) loader: FrameLoader,
    pub(crate) scheduler: NavigationScheduler,
    pub(crate) client: Option<Rc<dyn FrameLoaderClient>>,
    pub(crate) host: Rc<dyn DocumentHost>,
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("id", &self.id)
            .field("page", &self.page)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("unique_name", &self.unique_name)
            .field("loader", &self.loader)
            .finish_non_exhaustive()
    }
}

impl Frame {
    pub(crate) fn new(
        id: FrameId,
        page: PageId,
        parent: Option<FrameId>,
        owner: Option<FrameOwner>,
        client: Rc<dyn FrameLoaderClient>,
        host: Rc<dyn DocumentHost>,
    ) -> Self {
        let mut loader = FrameLoader::default();
        if let Some(owner) = &owner {
            loader.forced_sandbox_flags = owner.sandbox_flags;
        }
        Self {
            id,
            page,
            parent,
            children: Vec::new(),
            name: owner
                .as_ref()
                .map(|owner| owner.name.clone())
                .unwrap_or_default(),
            unique_name: String::new(),
            owner,
            opener: None,
            document: None,
            view: FrameView::default(),
            loader,
            scheduler: NavigationScheduler::default(),
            client: Some(client),
            host,
        }
    }

    pub fn id(&self) -> FrameId {
        self.id
    }

    pub fn page(&self) -> PageId {
        self.page
    }

    pub fn parent(&self) -> Option<FrameId> {
        self.parent
    }

    pub fn children(&self) -> &[FrameId] {
        &self.children
    }

    pub fn is_main_frame(&self) -> bool {
        self.parent.is_none()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unique_name(&self) -> &str {
        &self.unique_name
    }

    pub fn owner(&self) -> Option<&FrameOwner> {
        self.owner.as_ref()
    }

    pub fn opener(&self) -> Option<FrameId> {
        self.opener
    }

    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    pub fn view(&self) -> &FrameView {
        &self.view
    }

    pub fn loader(&self) -> &FrameLoader {
        &self.loader
    }

    pub fn scheduler(&self) -> &NavigationScheduler {
        &self.scheduler
    }

    pub fn has_client(&self) -> bool {
        self.client.is_some()
    }
}
