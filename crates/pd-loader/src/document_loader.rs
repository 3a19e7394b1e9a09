//! Per-navigation record of one document's main-resource load.
//!
//! The struct only holds state. The transitions that touch the frame (commit,
//! completion, cancellation) are engine methods in `main_resource.rs`.

use crate::application_cache::ApplicationCacheHost;
use crate::ids::DocumentLoaderId;
use crate::ids::FrameId;
use crate::load_request::SubstituteData;
use crate::navigation_policy::NavigationAction;
use pd_net::ResourceError;
use pd_net::ResourceRequest;
use pd_net::ResourceResponse;
use std::fmt;
use std::rc::Rc;
use url::Url;

pub struct DocumentLoader {
    id: DocumentLoaderId,
    frame: FrameId,
    original_request: ResourceRequest,
    request: ResourceRequest,
    substitute_data: Option<SubstituteData>,
    response: Option<ResourceResponse>,
    main_document_error: Option<ResourceError>,
    loading_main_resource: bool,
    committed: bool,
    writing: bool,
    is_client_redirect: bool,
    replaces_current_history_item: bool,
    override_encoding: Option<String>,
    triggering_action: Option<NavigationAction>,
    redirect_chain: Vec<Url>,
    has_same_origin_as_previous_document: bool,
    application_cache_host: Rc<dyn ApplicationCacheHost>,
}

impl fmt::Debug for DocumentLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentLoader")
            .field("id", &self.id)
            .field("frame", &self.frame)
            .field("url", &self.request.url.as_str())
            .field("loading_main_resource", &self.loading_main_resource)
            .field("committed", &self.committed)
            .field("main_document_error", &self.main_document_error)
            .finish_non_exhaustive()
    }
}

impl DocumentLoader {
    pub fn new(
        id: DocumentLoaderId,
        frame: FrameId,
        request: ResourceRequest,
        substitute_data: Option<SubstituteData>,
        application_cache_host: Rc<dyn ApplicationCacheHost>,
    ) -> Self {
        Self {
            id,
            frame,
            original_request: request.clone(),
            request,
            substitute_data,
            response: None,
            main_document_error: None,
            loading_main_resource: false,
            committed: false,
            writing: false,
            is_client_redirect: false,
            replaces_current_history_item: false,
            override_encoding: None,
            triggering_action: None,
            redirect_chain: Vec::new(),
            has_same_origin_as_previous_document: false,
            application_cache_host,
        }
    }

    pub fn id(&self) -> DocumentLoaderId {
        self.id
    }

    /// Frame the loader was created for. Detached loaders leave the engine,
    /// so a loader that can still be looked up is attached to this frame.
    pub fn frame(&self) -> FrameId {
        self.frame
    }

    pub fn url(&self) -> &Url {
        &self.request.url
    }

    /// URL of the failed load this loader's substitute content stands in for.
    pub fn unreachable_url(&self) -> Option<&Url> {
        self.substitute_data
            .as_ref()
            .and_then(|data| data.failing_url.as_ref())
    }

    pub fn url_for_history(&self) -> &Url {
        self.unreachable_url().unwrap_or(&self.request.url)
    }

    pub fn request(&self) -> &ResourceRequest {
        &self.request
    }

    pub(crate) fn request_mut(&mut self) -> &mut ResourceRequest {
        &mut self.request
    }

    pub fn original_request(&self) -> &ResourceRequest {
        &self.original_request
    }

    pub fn substitute_data(&self) -> Option<&SubstituteData> {
        self.substitute_data.as_ref()
    }

    pub fn response(&self) -> Option<&ResourceResponse> {
        self.response.as_ref()
    }

    pub(crate) fn set_response(&mut self, response: ResourceResponse) {
        self.response = Some(response);
    }

    pub fn main_document_error(&self) -> Option<&ResourceError> {
        self.main_document_error.as_ref()
    }

    pub(crate) fn set_main_document_error(&mut self, error: Option<ResourceError>) {
        self.main_document_error = error;
    }

    pub fn is_loading_main_resource(&self) -> bool {
        self.loading_main_resource
    }

    pub(crate) fn set_loading_main_resource(&mut self, loading: bool) {
        self.loading_main_resource = loading;
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    pub(crate) fn mark_committed(&mut self) {
        self.committed = true;
    }

    /// True while bytes are being fed into the frame's document.
    pub fn is_writing(&self) -> bool {
        self.writing
    }

    pub(crate) fn set_writing(&mut self, writing: bool) {
        self.writing = writing;
    }

    pub fn is_client_redirect(&self) -> bool {
        self.is_client_redirect
    }

    pub fn set_is_client_redirect(&mut self, is_client_redirect: bool) {
        self.is_client_redirect = is_client_redirect;
    }

    pub fn replaces_current_history_item(&self) -> bool {
        self.replaces_current_history_item
    }

    pub fn set_replaces_current_history_item(&mut self, replaces: bool) {
        self.replaces_current_history_item = replaces;
    }

    pub fn override_encoding(&self) -> Option<&str> {
        self.override_encoding.as_deref()
    }

    pub fn set_override_encoding(&mut self, encoding: Option<String>) {
        self.override_encoding = encoding.filter(|label| !label.is_empty());
    }

    pub fn triggering_action(&self) -> Option<&NavigationAction> {
        self.triggering_action.as_ref()
    }

    pub fn set_triggering_action(&mut self, action: NavigationAction) {
        self.triggering_action = Some(action);
    }

    pub fn redirect_chain(&self) -> &[Url] {
        &self.redirect_chain
    }

    pub fn append_redirect(&mut self, url: Url) {
        self.redirect_chain.push(url);
    }

    pub fn has_same_origin_as_previous_document(&self) -> bool {
        self.has_same_origin_as_previous_document
    }

    pub(crate) fn set_has_same_origin_as_previous_document(&mut self, same_origin: bool) {
        self.has_same_origin_as_previous_document = same_origin;
    }

    pub fn application_cache_host(&self) -> Rc<dyn ApplicationCacheHost> {
        Rc::clone(&self.application_cache_host)
    }

    /// POST answered by 301-303 or 307.
    pub fn is_redirect_after_post(&self, status: u16) -> bool {
        ((301..=303).contains(&status) || status == 307) && self.original_request.is_post()
    }

    /// Rewrites the request URL for a same-document navigation.
    pub fn update_for_same_document_navigation(&mut self, new_url: &Url) {
        let old_url = self.request.url.clone();
        self.original_request.url = new_url.clone();
        self.request.url = new_url.clone();
        self.redirect_chain.clear();
        if self.is_client_redirect {
            self.append_redirect(old_url);
        }
        self.append_redirect(new_url.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::DocumentLoader;
    use crate::application_cache::NoopApplicationCacheHost;
    use crate::ids::DocumentLoaderId;
    use crate::ids::FrameId;
    use crate::load_request::SubstituteData;
    use pd_net::HttpMethod;
    use pd_net::ResourceRequest;
    use std::rc::Rc;
    use url::Url;

    fn url(input: &str) -> Url {
        match Url::parse(input) {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        }
    }

    fn loader(request: ResourceRequest, substitute: Option<SubstituteData>) -> DocumentLoader {
        DocumentLoader::new(
            DocumentLoaderId(1),
            FrameId(1),
            request,
            substitute,
            Rc::new(NoopApplicationCacheHost),
        )
    }

    #[test]
    fn history_url_prefers_the_unreachable_url() {
        let plain = loader(ResourceRequest::new(url("http://a/1")), None);
        assert_eq!(plain.url_for_history().as_str(), "http://a/1");

        let error_page = loader(
            ResourceRequest::new(url("data:text/html,error")),
            Some(SubstituteData::error_page("oops", url("http://a/missing"))),
        );
        assert_eq!(error_page.url_for_history().as_str(), "http://a/missing");
    }

    #[test]
    fn redirect_after_post_needs_post_and_redirect_status() {
        let mut request = ResourceRequest::new(url("http://a/form"));
        request.method = HttpMethod::Post;
        let post = loader(request, None);
        assert!(post.is_redirect_after_post(303));
        assert!(post.is_redirect_after_post(307));
        assert!(!post.is_redirect_after_post(308));

        let get = loader(ResourceRequest::new(url("http://a/form")), None);
        assert!(!get.is_redirect_after_post(302));
    }

    #[test]
    fn same_document_update_extends_redirect_chain() {
        let mut loader = loader(ResourceRequest::new(url("http://a/1#foo")), None);
        loader.set_is_client_redirect(true);
        loader.update_for_same_document_navigation(&url("http://a/1#bar"));
        assert_eq!(loader.url().as_str(), "http://a/1#bar");
        assert_eq!(loader.original_request().url.as_str(), "http://a/1#bar");
        assert_eq!(loader.redirect_chain().len(), 2);
    }

    #[test]
    fn empty_override_encoding_is_dropped() {
        let mut loader = loader(ResourceRequest::new(url("http://a/1")), None);
        loader.set_override_encoding(Some(String::new()));
        assert_eq!(loader.override_encoding(), None);
        loader.set_override_encoding(Some("windows-1252".to_owned()));
        assert_eq!(loader.override_encoding(), Some("windows-1252"));
    }
}
