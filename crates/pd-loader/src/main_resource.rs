//! Main-resource loading for document loaders.
//!
//! Covers empty and substituted documents, the callbacks the embedder's
//! network stack reports through, writing into the frame's document, and
//! cancellation. Loaders are addressed by id; a loader that has been detached
//! is gone from the engine, so late network callbacks for it are ignored.

use crate::application_cache::ManifestSelection;
use crate::engine::Engine;
use crate::frame::FrameOwnerKind;
use crate::ids::DocumentLoaderId;
use crate::ids::FrameId;
use crate::navigation_policy::NavigationType;
use crate::types::ReloadPolicy;
use encoding_rs::Encoding;
use log::debug;
use log::trace;
use log::warn;
use pd_dom::Document;
use pd_dom::MessageLevel;
use pd_net::CachePolicy;
use pd_net::ResourceError;
use pd_net::ResourceRequest;
use pd_net::ResourceResponse;
use pd_net::url::elided;
use pd_net::url::is_about_blank;
use pd_net::url::is_about_srcdoc;
use pd_net::url::resolve_url;
use pd_security::SecurityOrigin;
use pd_security::XFrameOptionsDisposition;
use pd_security::parse_x_frame_options;
use url::Url;

const X_FRAME_OPTIONS: &str = "X-Frame-Options";

impl Engine {
    /// Frame `loader` still belongs to, if both are alive.
    pub(crate) fn attached_frame(&self, loader: DocumentLoaderId) -> Option<FrameId> {
        let frame = self.loaders.get(&loader)?.frame();
        self.is_alive(frame).then_some(frame)
    }

    fn main_resource_in_flight(&self, loader: DocumentLoaderId) -> bool {
        self.attached_frame(loader).is_some()
            && self
                .loader(loader)
                .is_some_and(|loader| loader.is_loading_main_resource())
    }

    /// Resolves the frame for a network callback, dropping callbacks for loads that already ended.
    fn frame_for_network_callback(&self, loader: DocumentLoaderId, what: &str) -> Option<FrameId> {
        if !self.main_resource_in_flight(loader) {
            warn!("{loader}: ignoring {what}, the main resource is no longer loading");
            return None;
        }
        self.attached_frame(loader)
    }

    pub(crate) fn start_loading_main_resource(&mut self, loader: DocumentLoaderId) {
        let Some(document_loader) = self.loader_mut(loader) else {
            return;
        };
        document_loader.set_main_document_error(None);
        document_loader.set_loading_main_resource(true);

        if self.maybe_load_empty(loader) {
            return;
        }
        if self
            .loader(loader)
            .is_some_and(|document_loader| document_loader.substitute_data().is_some())
        {
            self.load_substitute_data(loader);
            return;
        }

        let Some(request) = self.loader(loader).map(|document_loader| document_loader.request().clone()) else {
            return;
        };
        if !self.will_send_request(loader, request, None) {
            return;
        }
        let Some(frame) = self.attached_frame(loader) else {
            return;
        };
        let Some(document_loader) = self.loader_mut(loader) else {
            return;
        };
        let mut request = document_loader.request().clone();
        document_loader
            .application_cache_host()
            .will_start_loading_main_resource(&mut request);
        *document_loader.request_mut() = request.clone();
        debug!("{frame}: fetching {} for {loader}", elided(&request.url));
        if let Some(client) = self.client(frame) {
            client.start_main_resource_fetch(self, frame, loader, &request);
        }
    }

    /// `about:` URLs without substitute data finish at once with an empty document.
    fn maybe_load_empty(&mut self, loader: DocumentLoaderId) -> bool {
        let Some(document_loader) = self.loader(loader) else {
            return false;
        };
        let url = document_loader.url().clone();
        if document_loader.substitute_data().is_some() || !self.settings.should_load_url_as_empty_document(&url) {
            return false;
        }
        trace!("{loader}: loading {url} as an empty document");
        if let Some(document_loader) = self.loader_mut(loader) {
            document_loader.set_response(ResourceResponse::new(url, "text/html"));
        }
        self.finished_loading(loader);
        true
    }

    fn load_substitute_data(&mut self, loader: DocumentLoaderId) {
        let Some(document_loader) = self.loader(loader) else {
            return;
        };
        let Some(data) = document_loader.substitute_data().cloned() else {
            return;
        };
        let mut response = ResourceResponse::new(document_loader.url().clone(), &data.mime_type);
        if !data.text_encoding.is_empty() {
            response.text_encoding_name = Some(data.text_encoding.clone());
        }

        self.did_receive_main_resource_response(loader, response);
        if !data.content.is_empty() && self.main_resource_in_flight(loader) {
            self.did_receive_main_resource_data(loader, &data.content);
        }
        if self.main_resource_in_flight(loader) {
            self.did_finish_main_resource(loader);
        }
    }

    /// Vets the initial request or a redirect and stores it on the loader.
    ///
    /// Returns false when the load was cancelled.
    fn will_send_request(
        &mut self,
        loader: DocumentLoaderId,
        mut request: ResourceRequest,
        redirect_response: Option<&ResourceResponse>,
    ) -> bool {
        let Some(frame) = self.attached_frame(loader) else {
            return false;
        };
        let Some(document_loader) = self.loader(loader) else {
            return false;
        };
        let is_form_submission = document_loader.triggering_action().is_some_and(|action| {
            matches!(
                action.navigation_type(),
                NavigationType::FormSubmitted | NavigationType::FormResubmitted
            )
        });
        if is_form_submission && self.security.enforce_content_security_policy {
            let allowed = self.document(frame).is_none_or(|document| {
                document
                    .content_security_policy
                    .allows_form_action(&request.url, &document.url)
            });
            if !allowed {
                warn!("{frame}: form action '{}' violates the Content Security Policy", elided(&request.url));
                self.cancel_main_resource_load(loader, ResourceError::cancelled(Some(request.url)));
                return false;
            }
        }

        if let Some(redirect) = redirect_response {
            let redirecting_origin = SecurityOrigin::create(&redirect.url);
            if !self.security.can_display(&redirecting_origin, &request.url) {
                self.report_local_load_failed(frame, &request.url);
                self.cancel_main_resource_load(loader, ResourceError::cancelled(Some(request.url)));
                return false;
            }
        }

        if self.parent_of(frame).is_none() {
            request.first_party_for_cookies = Some(request.url.clone());
        }
        let Some(document_loader) = self.loader_mut(loader) else {
            return false;
        };
        if let Some(redirect) = redirect_response {
            if request.cache_policy == CachePolicy::UseProtocolCachePolicy
                && document_loader.is_redirect_after_post(redirect.status.as_u16())
            {
                request.cache_policy = CachePolicy::ReloadIgnoringCacheData;
            }
        }
        *document_loader.request_mut() = request.clone();

        if redirect_response.is_none() {
            return true;
        }
        document_loader.append_redirect(request.url.clone());
        debug!("{frame}: {loader} redirected to {}", elided(&request.url));
        if !self.should_continue_for_navigation_policy(frame, loader, &request) {
            if self.main_resource_in_flight(loader) {
                self.cancel_main_resource_load(loader, ResourceError::cancelled(Some(request.url)));
            }
            return false;
        }
        true
    }

    /// The network stack received the main resource's response headers.
    pub fn did_receive_main_resource_response(&mut self, loader: DocumentLoaderId, response: ResourceResponse) {
        let Some(frame) = self.frame_for_network_callback(loader, "a response") else {
            return;
        };
        if let Some(document_loader) = self.loader(loader) {
            document_loader
                .application_cache_host()
                .did_receive_response_for_main_resource(&response);
        }

        if self.security.honor_x_frame_options {
            if let Some(content) = response.headers.get_combined(X_FRAME_OPTIONS) {
                if self.should_interrupt_load_for_x_frame_options(frame, &content, &response.url) {
                    let message = format!(
                        "Refused to display '{}' in a frame because it set 'X-Frame-Options' to '{content}'.",
                        elided(&response.url)
                    );
                    warn!("{frame}: {message}");
                    self.add_console_message(frame, MessageLevel::Error, &message);
                    self.refuse_framed_load(frame);
                    if self.main_resource_in_flight(loader) {
                        let error = ResourceError::blocked_by_response(
                            Some(response.url.clone()),
                            "blocked by X-Frame-Options",
                        );
                        self.cancel_main_resource_load(loader, error);
                    }
                    return;
                }
            }
        }

        let object_fallback = response.is_http()
            && !response.status.is_success()
            && self
                .frame_ref(frame)
                .and_then(|state| state.owner.as_ref())
                .is_some_and(|owner| owner.kind == FrameOwnerKind::Object);
        if let Some(document_loader) = self.loader_mut(loader) {
            document_loader.set_response(response);
        }

        if !self.should_continue_for_response(loader) {
            debug!("{frame}: {loader} response will not be displayed");
            self.cancel_main_resource_load(loader, self.cancelled_error(loader));
            return;
        }
        if object_fallback {
            if let Some(host) = self.host(frame) {
                host.render_fallback_content(self, frame);
            }
            if self.main_resource_in_flight(loader) {
                self.cancel_main_resource_load(loader, self.cancelled_error(loader));
            }
        }
    }

    /// A chunk of the main resource's body arrived.
    pub fn did_receive_main_resource_data(&mut self, loader: DocumentLoaderId, data: &[u8]) {
        if self.frame_for_network_callback(loader, "data").is_none() {
            return;
        }
        if let Some(document_loader) = self.loader(loader) {
            document_loader.application_cache_host().main_resource_data_received(data);
        }
        self.commit_if_ready(loader);
        if self.attached_frame(loader).is_none() {
            return;
        }
        self.commit_data(loader, data);
    }

    pub fn did_finish_main_resource(&mut self, loader: DocumentLoaderId) {
        if self.frame_for_network_callback(loader, "completion").is_none() {
            return;
        }
        self.finished_loading(loader);
    }

    pub fn did_fail_main_resource(&mut self, loader: DocumentLoaderId, error: ResourceError) {
        if self.frame_for_network_callback(loader, "a failure").is_none() {
            return;
        }
        self.main_received_error(loader, error);
    }

    /// The server redirected the main resource to `request`.
    ///
    /// Returns false when the redirect was refused and the load cancelled.
    pub fn did_redirect_main_resource(
        &mut self,
        loader: DocumentLoaderId,
        request: ResourceRequest,
        redirect_response: &ResourceResponse,
    ) -> bool {
        if self.frame_for_network_callback(loader, "a redirect").is_none() {
            return false;
        }
        self.will_send_request(loader, request, Some(redirect_response))
    }

    /// The committed document declared `manifest_url`; the cache may ask to restart the navigation.
    pub fn select_cache_with_manifest(&mut self, frame: FrameId, manifest_url: &Url) {
        let Some(document_loader) = self.document_loader_of(frame) else {
            return;
        };
        let selection = document_loader
            .application_cache_host()
            .select_cache_with_manifest(manifest_url);
        if selection == ManifestSelection::RestartNavigation {
            debug!("{frame}: application cache restarts the navigation");
            self.reload(frame, ReloadPolicy::Normal, None, None);
        }
    }

    fn should_interrupt_load_for_x_frame_options(&mut self, frame: FrameId, content: &str, url: &Url) -> bool {
        let top = self.top(frame);
        if top == frame {
            return false;
        }
        match parse_x_frame_options(content) {
            XFrameOptionsDisposition::SameOrigin => {
                let origin = SecurityOrigin::create(url);
                self.document(top)
                    .is_none_or(|document| !origin.is_same_scheme_host_port(&document.security_origin))
            }
            XFrameOptionsDisposition::Deny => true,
            XFrameOptionsDisposition::AllowAll | XFrameOptionsDisposition::None => false,
            XFrameOptionsDisposition::Conflict => {
                let message = format!(
                    "Multiple 'X-Frame-Options' headers with conflicting values ('{content}') encountered when loading '{}'. Falling back to 'DENY'.",
                    elided(url)
                );
                self.add_console_message(frame, MessageLevel::Error, &message);
                true
            }
            XFrameOptionsDisposition::Invalid => {
                let message = format!(
                    "Invalid 'X-Frame-Options' header encountered when loading '{}': '{content}' is not a recognized directive. The header will be ignored.",
                    elided(url)
                );
                self.add_console_message(frame, MessageLevel::Error, &message);
                false
            }
        }
    }

    fn should_continue_for_response(&self, loader: DocumentLoaderId) -> bool {
        let Some(document_loader) = self.loader(loader) else {
            return false;
        };
        if document_loader.substitute_data().is_some() {
            return true;
        }
        let Some(response) = document_loader.response() else {
            return true;
        };
        if response.status.keeps_current_document() || response.is_attachment() {
            return false;
        }
        // Remote web archives could claim any origin.
        if response.mime_type.eq_ignore_ascii_case("multipart/related")
            && !self.security.is_local_scheme(document_loader.url().scheme())
        {
            return false;
        }
        true
    }

    fn cancelled_error(&self, loader: DocumentLoaderId) -> ResourceError {
        ResourceError::cancelled(self.loader(loader).map(|document_loader| document_loader.url().clone()))
    }

    /// Main resource still loading, the document still parsing, or subresources in flight.
    pub fn is_document_loader_loading(&self, loader: DocumentLoaderId) -> bool {
        let Some(document_loader) = self.loader(loader) else {
            return false;
        };
        if document_loader.is_loading_main_resource() {
            return true;
        }
        self.current_document_of(loader)
            .is_some_and(|document| document.parsing || document.pending_subresources > 0)
    }

    /// The frame's document, when `loader` is the loader that produced it.
    fn current_document_of(&self, loader: DocumentLoaderId) -> Option<&Document> {
        let frame = self.attached_frame(loader)?;
        if self.document_loader_id(frame) != Some(loader) {
            return None;
        }
        self.document(frame)
    }

    /// Cancels everything `loader` has in flight.
    pub(crate) fn stop_document_loader(&mut self, loader: DocumentLoaderId) {
        let Some(document_loader) = self.loader(loader) else {
            return;
        };
        let committed = document_loader.is_committed();
        let loading = self.is_document_loader_loading(loader);
        if committed {
            if let Some(frame) = self.attached_frame(loader) {
                let parsing = self.document(frame).is_some_and(|document| document.parsing);
                if loading || parsing {
                    self.stop_frame_loading(frame);
                }
            }
        }
        if !loading {
            return;
        }

        let Some(document_loader) = self.loader(loader) else {
            return;
        };
        let error = self.cancelled_error(loader);
        if document_loader.is_loading_main_resource() {
            self.cancel_main_resource_load(loader, error);
        } else if self
            .current_document_of(loader)
            .is_some_and(|document| document.pending_subresources > 0)
        {
            if let Some(document_loader) = self.loader_mut(loader) {
                document_loader.set_main_document_error(Some(error));
            }
        } else {
            self.main_received_error(loader, error);
        }

        if let Some(frame) = self.attached_frame(loader) {
            if self.document_loader_id(frame) == Some(loader) {
                if let Some(document) = self.document_mut(frame) {
                    document.pending_subresources = 0;
                }
            }
        }
    }

    fn cancel_main_resource_load(&mut self, loader: DocumentLoaderId, error: ResourceError) {
        if self.main_resource_in_flight(loader) {
            if let Some(frame) = self.attached_frame(loader) {
                if let Some(client) = self.client(frame) {
                    client.cancel_main_resource_fetch(self, frame, loader);
                }
            }
        }
        self.main_received_error(loader, error);
    }

    fn main_received_error(&mut self, loader: DocumentLoaderId, error: ResourceError) {
        let Some(document_loader) = self.loader(loader) else {
            return;
        };
        document_loader.application_cache_host().failed_loading_main_resource();
        let Some(frame) = self.attached_frame(loader) else {
            return;
        };
        debug!("{frame}: {loader} failed: {error}");
        if let Some(document_loader) = self.loader_mut(loader) {
            document_loader.set_main_document_error(Some(error.clone()));
            document_loader.set_loading_main_resource(false);
        }
        self.received_main_resource_error(frame, &error);
    }

    fn received_main_resource_error(&mut self, frame: FrameId, error: &ResourceError) {
        if let Some(document) = self.document_mut(frame) {
            document.cancel_parsing();
        }
        let has_owner = self.frame_ref(frame).is_some_and(|state| state.owner.is_some());
        if !error.is_loader_cancellation() && has_owner {
            if let Some(host) = self.host(frame) {
                host.render_fallback_content(self, frame);
            }
        }
        self.check_completed(frame);
        if self.is_alive(frame) {
            self.check_load_complete(frame);
        }
    }

    fn commit_if_ready(&mut self, loader: DocumentLoaderId) {
        let Some(document_loader) = self.loader_mut(loader) else {
            return;
        };
        if document_loader.is_committed() {
            return;
        }
        document_loader.mark_committed();
        let frame = document_loader.frame();
        if self.provisional_loader_id(frame) == Some(loader) {
            self.commit_provisional_load(frame);
        }
    }

    fn finished_loading(&mut self, loader: DocumentLoaderId) {
        self.commit_if_ready(loader);
        if self.attached_frame(loader).is_none() {
            return;
        }
        if self.loader(loader).is_some_and(|document_loader| !document_loader.is_writing()) {
            self.commit_data(loader, &[]);
        }
        self.end_writing(loader);

        let Some(document_loader) = self.loader_mut(loader) else {
            return;
        };
        if document_loader.main_document_error().is_some() {
            return;
        }
        document_loader.set_loading_main_resource(false);
        let application_cache_host = document_loader.application_cache_host();
        if let Some(frame) = self.attached_frame(loader) {
            let creating = self
                .frame_ref(frame)
                .is_some_and(|state| state.loader.state_machine.creating_initial_empty_document());
            if !creating {
                self.check_load_complete(frame);
            }
        }
        application_cache_host.finished_loading_main_resource();
    }

    /// Installs the loader's document on first data, exactly once per load.
    fn ensure_writer(&mut self, loader: DocumentLoaderId) {
        let Some(document_loader) = self.loader(loader) else {
            return;
        };
        if document_loader.is_writing() {
            return;
        }
        let frame = document_loader.frame();
        if self.document_loader_id(frame) != Some(loader) {
            return;
        }
        let encoding = document_loader
            .override_encoding()
            .map(str::to_owned)
            .or_else(|| {
                document_loader
                    .response()
                    .and_then(|response| response.text_encoding_name.clone())
            });
        let url = document_loader.url().clone();
        let refresh = document_loader
            .response()
            .and_then(|response| response.header("Refresh"))
            .map(str::to_owned);
        if let Some(document_loader) = self.loader_mut(loader) {
            document_loader.set_writing(true);
        }

        self.create_writer_for(frame, &url, encoding.as_deref());
        if self.document_loader_id(frame) != Some(loader) {
            return;
        }
        self.received_first_data(frame);
        if !self.is_alive(frame) {
            return;
        }
        if let Some((delay_seconds, target)) = refresh.as_deref().and_then(|header| parse_refresh_header(header, &url)) {
            self.schedule_redirect(frame, delay_seconds, target);
        }
    }

    /// Replaces the frame's document with a fresh one for `url` and opens its parser.
    fn create_writer_for(&mut self, frame: FrameId, url: &Url, encoding: Option<&str>) {
        self.clear(frame);
        let origin = self.origin_for_new_document(frame, url);
        let sandbox_flags = self.effective_sandbox_flags(frame);
        let id = self.next_document_id();
        let mut document = Document::new(id, url.clone(), origin);
        if let Some(label) = encoding {
            if let Some(encoding) = Encoding::for_label(label.as_bytes()) {
                document.encoding = encoding;
            }
        }
        document.enforce_sandbox_flags(sandbox_flags);
        document.begin_parsing();
        let Some(state) = self.frame_mut(frame) else {
            return;
        };
        state.document = Some(document);
        trace!("{frame}: installed document {id} for {}", elided(url));
        self.did_begin_document(frame);
    }

    /// `about:blank` and srcdoc documents run in the origin of the frame that created them.
    fn origin_for_new_document(&self, frame: FrameId, url: &Url) -> SecurityOrigin {
        if !is_about_blank(url) && !is_about_srcdoc(url) {
            return SecurityOrigin::create(url);
        }
        let creator = self
            .frame_ref(frame)
            .and_then(|state| state.parent.or(state.opener));
        match creator.and_then(|creator| self.document(creator)) {
            Some(document) => document.security_origin.clone(),
            None => SecurityOrigin::create(url),
        }
    }

    fn commit_data(&mut self, loader: DocumentLoaderId, data: &[u8]) {
        self.ensure_writer(loader);
        if data.is_empty() {
            return;
        }
        if let Some(frame) = self.attached_frame(loader) {
            if self.document_loader_id(frame) != Some(loader) {
                return;
            }
            if let Some(document) = self.document_mut(frame) {
                if document.parsing {
                    document.append_bytes(data);
                }
            }
        }
    }

    fn end_writing(&mut self, loader: DocumentLoaderId) {
        let Some(document_loader) = self.loader_mut(loader) else {
            return;
        };
        if !document_loader.is_writing() {
            return;
        }
        document_loader.set_writing(false);
        let frame = document_loader.frame();
        if self.document_loader_id(frame) != Some(loader) {
            return;
        }
        let Some(document) = self.document_mut(frame) else {
            return;
        };
        if !document.parsing {
            return;
        }
        document.finish_parsing();
        self.finished_parsing(frame);
    }

    /// Stops `loader` and drops it from the engine.
    pub(crate) fn detach_document_loader(&mut self, loader: DocumentLoaderId) {
        if self.loader(loader).is_none() {
            return;
        }
        self.stop_document_loader(loader);
        if let Some(document_loader) = self.loaders.remove(&loader) {
            document_loader.application_cache_host().dispose();
            trace!("{loader}: detached");
        }
    }
}

/// Parses `Refresh: <seconds>[; url=<target>]`; without a target the document reloads itself.
pub(crate) fn parse_refresh_header(header: &str, base: &Url) -> Option<(f64, Url)> {
    let header = header.trim();
    let (delay, rest) = match header.find([';', ',']) {
        Some(index) => (&header[..index], header[index + 1..].trim()),
        None => (header, ""),
    };
    let delay: f64 = delay.trim().parse().ok()?;
    if !delay.is_finite() || delay < 0.0 {
        return None;
    }
    if rest.is_empty() {
        return Some((delay, base.clone()));
    }
    let target = match rest.get(..4) {
        Some(prefix) if prefix.eq_ignore_ascii_case("url=") => rest[4..].trim(),
        _ => rest,
    };
    let target = target.trim_matches(|c| c == '\'' || c == '"');
    let url = resolve_url(base, target).ok()?;
    Some((delay, url))
}

#[cfg(test)]
mod tests {
    use super::parse_refresh_header;
    use url::Url;

    fn url(input: &str) -> Url {
        match Url::parse(input) {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        }
    }

    #[test]
    fn refresh_without_target_reloads_the_document() {
        let base = url("http://a/page");
        assert_eq!(parse_refresh_header("5", &base), Some((5.0, base.clone())));
    }

    #[test]
    fn refresh_target_resolves_against_the_document() {
        let base = url("http://a/dir/page");
        let parsed = parse_refresh_header("0; URL='next'", &base);
        assert_eq!(parsed, Some((0.0, url("http://a/dir/next"))));
        let parsed = parse_refresh_header("1,url=http://b/", &base);
        assert_eq!(parsed, Some((1.0, url("http://b/"))));
    }

    #[test]
    fn malformed_refresh_is_ignored() {
        let base = url("http://a/");
        assert_eq!(parse_refresh_header("soon", &base), None);
        assert_eq!(parse_refresh_header("-1", &base), None);
    }
}
