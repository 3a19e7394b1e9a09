//! Starting navigations: request preparation, load-type classification and
//! the policy gates a load passes before it becomes provisional.

use crate::client::JavaScriptUrlOutcome;
use crate::engine::Engine;
use crate::frame::FrameOwnerKind;
use crate::ids::DocumentLoaderId;
use crate::ids::FrameId;
use crate::load_request::FormState;
use crate::load_request::FrameLoadRequest;
use crate::load_request::OriginDocument;
use crate::load_request::SubstituteData;
use crate::navigation_policy::LoadTypeContext;
use crate::navigation_policy::LoadTypeRequest;
use crate::navigation_policy::NavigationAction;
use crate::navigation_policy::NavigationPolicy;
use crate::navigation_policy::NavigationType;
use crate::navigation_policy::should_perform_fragment_navigation;
use crate::state_machine::LoaderMilestone;
use crate::types::ClientRedirectPolicy;
use crate::types::FrameLoadType;
use crate::types::FrameState;
use crate::types::UpdateBackForwardListPolicy;
use log::debug;
use log::trace;
use log::warn;
use pd_dom::FormSubmissionTrigger;
use pd_dom::MessageLevel;
use pd_dom::PageDismissalType;
use pd_net::CachePolicy;
use pd_net::ResourceRequest;
use pd_net::url::blank_url;
use pd_net::url::elided;
use pd_net::url::is_about_srcdoc;
use pd_net::url::protocol_is_javascript;
use pd_privacy::ShouldSendReferrer;
use pd_security::SandboxFlags;
use pd_security::SecurityOrigin;
use url::Url;

impl Engine {
    /// Gives a new frame its initial empty document.
    pub(crate) fn init_frame_loader(&mut self, frame: FrameId) {
        let mut request = ResourceRequest::new(blank_url());
        if self.parent_of(frame).is_none() {
            request.first_party_for_cookies = Some(blank_url());
        }
        let loader = self.create_document_loader(frame, request, None);
        let Some(state) = self.frame_mut(frame) else {
            return;
        };
        state.loader.provisional_document_loader = Some(loader);
        state.loader.state = FrameState::Provisional;
        self.start_loading_main_resource(loader);

        let Some(state) = self.frame_mut(frame) else {
            return;
        };
        if let Some(document) = &mut state.document {
            document.cancel_parsing();
        }
        state
            .loader
            .state_machine
            .advance_to(LoaderMilestone::DisplayingInitialEmptyDocument);
        trace!("{frame}: displaying the initial empty document");
    }

    /// Entry point for every navigation of `frame`.
    pub fn load(&mut self, frame: FrameId, mut request: FrameLoadRequest) {
        let Some(state) = self.frame_ref(frame) else {
            warn!("{frame}: load of {} requested after detach", request.url());
            return;
        };
        if state.loader.in_stop_all_loaders {
            debug!("{frame}: dropping load of {} while stopping loaders", request.url());
            return;
        }
        if self.navigation_disable_count > 0 && !protocol_is_javascript(request.url()) {
            debug!("{frame}: dropping load of {} during beforeunload", request.url());
            return;
        }
        if !self.prepare_request_for_this_frame(frame, &mut request) {
            return;
        }

        let target = if request.form_state.is_some() {
            None
        } else {
            let active = match self.document(frame) {
                Some(document) => OriginDocument::capture(frame, document),
                None => return,
            };
            let name = request.frame_name.clone();
            self.find_frame_for_navigation(frame, &name, &active)
        };
        if let Some(target) = target {
            if target != frame {
                request.frame_name = "_self".to_owned();
                self.load(target, request);
                if let Some(client) = self.client(target) {
                    client.focus(self, target);
                }
                return;
            }
        }

        let load_type = self.determine_frame_load_type(frame, &request);
        let action = NavigationAction::new(
            request.resource_request.clone(),
            load_type,
            request.form_state.is_some(),
            request.triggering_event,
        );
        let opens_new_window = (target.is_none() && !request.frame_name.is_empty())
            || (request.form_state.is_some() && action.should_open_in_new_window());
        if opens_new_window {
            if action.policy() == NavigationPolicy::Download {
                if let Some(client) = self.client(frame) {
                    client.load_url_externally(self, frame, action.request(), NavigationPolicy::Download);
                }
            } else {
                self.create_window_for_request(frame, request, action.policy());
            }
            return;
        }

        let url = request.url().clone();
        let fragment_only = !action.should_open_in_new_window()
            && self.document(frame).is_some_and(|document| {
                should_perform_fragment_navigation(
                    request.form_state.is_some(),
                    request.resource_request.method,
                    load_type,
                    &url,
                    &document.url,
                    document.is_frameset,
                )
            });
        if fragment_only {
            if let Some(loader) = self.document_loader_id(frame).and_then(|id| self.loader_mut(id)) {
                loader.set_triggering_action(action);
            }
            let update = if load_type == FrameLoadType::Standard {
                UpdateBackForwardListPolicy::UpdateBackForwardList
            } else {
                UpdateBackForwardListPolicy::DoNotUpdateBackForwardList
            };
            self.load_in_same_document(frame, &url, None, update, request.client_redirect);
            return;
        }

        let same_url = self
            .document_loader_of(frame)
            .is_some_and(|loader| *loader.url_for_history() == url);
        let is_post = request.resource_request.is_post();
        self.load_with_navigation_action(
            frame,
            action,
            load_type,
            request.form_state,
            request.substitute_data,
            request.client_redirect,
            None,
        );
        if same_url && !load_type.is_reload() && !is_post {
            if let Some(state) = self.frame_mut(frame) {
                state.loader.load_type = FrameLoadType::Same;
            }
        }
    }

    /// Security pre-checks for requests that name the document asking for them.
    ///
    /// Returns false when the request was consumed (a `javascript:` URL) or refused.
    fn prepare_request_for_this_frame(&mut self, frame: FrameId, request: &mut FrameLoadRequest) -> bool {
        let Some(origin) = request.origin_document.clone() else {
            return true;
        };
        let url = request.url().clone();
        if protocol_is_javascript(&url) {
            self.execute_javascript_url(frame, &url);
            return false;
        }
        if !self.security.can_display(&origin.security_origin, &url) {
            self.report_local_load_failed(frame, &url);
            return false;
        }
        if request.form_state.is_none() && request.frame_name.is_empty() {
            if let Some(document) = self.document(frame) {
                request.frame_name.clone_from(&document.base_target);
            }
        }
        self.set_referrer_for_frame_request(&mut request.resource_request, request.should_send_referrer, &origin);
        true
    }

    /// Computes the `Referer` header from the requesting document and adds
    /// an `Origin` header to unsafe-method requests.
    pub(crate) fn set_referrer_for_frame_request(
        &self,
        request: &mut ResourceRequest,
        should_send_referrer: ShouldSendReferrer,
        origin: &OriginDocument,
    ) {
        if should_send_referrer == ShouldSendReferrer::Never {
            request.clear_http_referrer();
            return;
        }
        let explicit = request
            .http_referrer()
            .and_then(|referrer| Url::parse(referrer).ok());
        let outgoing = explicit.as_ref().or_else(|| origin.outgoing_referrer());
        let referrer = self
            .privacy
            .generate_referrer_header(origin.referrer_policy, &request.url, outgoing);
        match &referrer {
            Some(referrer) => request.set_http_referrer(referrer),
            None => request.clear_http_referrer(),
        }
        let referrer_origin = referrer
            .as_deref()
            .map(|referrer| SecurityOrigin::from_string(referrer).to_header_value())
            .unwrap_or_default();
        self.privacy.add_http_origin_if_needed(request, &referrer_origin);
    }

    fn determine_frame_load_type(&self, frame: FrameId, request: &FrameLoadRequest) -> FrameLoadType {
        let Some(state) = self.frame_ref(frame) else {
            return FrameLoadType::Standard;
        };
        let url_for_history = self
            .document_loader_of(frame)
            .map(|loader| loader.url_for_history());
        let provisional_url = self
            .provisional_document_loader_of(frame)
            .map(|loader| loader.url());
        let context = LoadTypeContext {
            has_parent: state.parent.is_some(),
            started_first_real_load: state.loader.state_machine.started_first_real_load(),
            back_forward_list_is_empty: self
                .page(state.page)
                .is_none_or(|page| page.back_forward.is_empty()),
            provisional_url,
            current_load_type: state.loader.load_type,
            url_for_history,
            has_user_gesture: request.has_user_gesture(),
        };
        let load_type = context.classify(&LoadTypeRequest {
            url: request.url(),
            failing_url: request.failing_url(),
            reload_ignoring_cache: request.resource_request.cache_policy == CachePolicy::ReloadIgnoringCacheData,
            lock_back_forward_list: request.lock_back_forward_list,
            script_submitted_form: request
                .form_state
                .as_ref()
                .is_some_and(|form| form.trigger == FormSubmissionTrigger::SubmittedByJavaScript),
            has_origin_document: request.origin_document.is_some(),
        });
        debug!("{frame}: {} classified as {load_type:?}", request.url());
        load_type
    }

    /// Runs a `javascript:` URL in `frame`, replacing the document when the
    /// script evaluates to markup.
    pub(crate) fn execute_javascript_url(&mut self, frame: FrameId, url: &Url) {
        let Some(document) = self.document(frame) else {
            return;
        };
        if document.sandbox_flags.contains(SandboxFlags::SCRIPTS) {
            debug!("{frame}: scripts are sandboxed, ignoring {}", elided(url));
            return;
        }
        let Some(host) = self.host(frame) else {
            return;
        };
        let location_change_before = self.location_change_pending(frame);
        let outcome = host.execute_javascript_url(self, frame, url);
        if !self.is_alive(frame) {
            return;
        }
        let JavaScriptUrlOutcome::ReplaceDocument(markup) = outcome else {
            return;
        };
        if !location_change_before && self.location_change_pending(frame) {
            debug!("{frame}: script scheduled a navigation, keeping the document");
            return;
        }

        let Some(state) = self.frame_ref(frame) else {
            return;
        };
        let load_type = if state.parent.is_some() && !state.loader.state_machine.started_first_real_load() {
            FrameLoadType::InitialInChildFrame
        } else {
            FrameLoadType::RedirectLockedBackForward
        };
        let Some(document_url) = state.document.as_ref().map(|document| document.url.clone()) else {
            return;
        };
        let action = NavigationAction::for_load_type(ResourceRequest::new(document_url), load_type);
        self.load_with_navigation_action(
            frame,
            action,
            load_type,
            None,
            Some(SubstituteData::html(&markup)),
            ClientRedirectPolicy::ClientRedirect,
            None,
        );
    }

    /// The full-load path: runs the policy checks and, if they pass, makes
    /// a new document loader provisional and starts its main resource.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn load_with_navigation_action(
        &mut self,
        frame: FrameId,
        action: NavigationAction,
        load_type: FrameLoadType,
        form_state: Option<FormState>,
        substitute_data: Option<SubstituteData>,
        client_redirect: ClientRedirectPolicy,
        override_encoding: Option<String>,
    ) {
        let Some(state) = self.frame_ref(frame) else {
            return;
        };
        if state.document.as_ref().is_some_and(|document| document.is_dismissing()) {
            debug!("{frame}: ignoring navigation while the document is being dismissed");
            return;
        }
        let url = action.request().url.clone();
        if !state.loader.state_machine.committed_first_real_document_load() && state.owner.is_some() {
            if let Some(host) = self.host(frame) {
                if !host.dispatch_before_load(self, frame, &url) {
                    debug!("{frame}: beforeload cancelled {}", elided(&url));
                    return;
                }
            }
        }

        let Some(state) = self.frame_mut(frame) else {
            return;
        };
        if state.client.is_none() {
            return;
        }
        state
            .loader
            .state_machine
            .advance_to(LoaderMilestone::StartedFirstRealLoad);
        let replaces_current_history_item = load_type == FrameLoadType::RedirectLockedBackForward
            || !state.loader.state_machine.committed_first_real_document_load();

        let substitute_data = substitute_data.or_else(|| self.default_substitute_data_for_url(frame, &url));
        let encoding = match self.parent_of(frame) {
            Some(parent) => self
                .document_loader_of(parent)
                .and_then(|loader| loader.override_encoding())
                .map(str::to_owned),
            None => override_encoding.filter(|label| !label.is_empty()).or_else(|| {
                self.document_loader_of(frame)
                    .and_then(|loader| loader.override_encoding())
                    .map(str::to_owned)
            }),
        };
        let request = action.request().clone();
        let policy_loader = self.create_document_loader(frame, request.clone(), substitute_data);
        if let Some(loader) = self.loader_mut(policy_loader) {
            loader.set_triggering_action(action);
            loader.set_replaces_current_history_item(replaces_current_history_item);
            loader.set_is_client_redirect(client_redirect == ClientRedirectPolicy::ClientRedirect);
            loader.set_override_encoding(encoding);
        }
        if let Some(state) = self.frame_mut(frame) {
            state.loader.policy_document_loader = Some(policy_loader);
        }

        let allowed = self.should_continue_for_navigation_policy(frame, policy_loader, &request)
            && self.should_close(frame);
        if !allowed {
            debug!("{frame}: navigation to {} refused", elided(&url));
            self.discard_policy_loader(frame, policy_loader);
            return;
        }

        self.stop_all_loaders(frame);
        if self.policy_loader_id(frame) != Some(policy_loader) {
            debug!("{frame}: {policy_loader} superseded while stopping loaders");
            self.discard_policy_loader(frame, policy_loader);
            return;
        }

        let Some(state) = self.frame_mut(frame) else {
            return;
        };
        state.loader.provisional_document_loader = state.loader.policy_document_loader.take();
        state.loader.load_type = load_type;
        state.loader.state = FrameState::Provisional;
        debug!("{frame}: {policy_loader} is provisional for {}", elided(&url));

        if let Some(form_state) = &form_state {
            if let Some(client) = self.client(frame) {
                client.dispatch_will_submit_form(self, frame, &form_state.form);
            }
        }
        if self.provisional_loader_id(frame) != Some(policy_loader) {
            return;
        }

        self.progress_started(frame);
        let previous_url = self.document(frame).map(|document| document.url.clone());
        if let Some(loader) = self.loader_mut(policy_loader) {
            if loader.is_client_redirect() {
                if let Some(previous_url) = previous_url {
                    loader.append_redirect(previous_url);
                }
            }
            let url = loader.url().clone();
            loader.append_redirect(url);
        }
        if let Some(client) = self.client(frame) {
            client.dispatch_did_start_provisional_load(self, frame);
        }
        if self.provisional_loader_id(frame) != Some(policy_loader) {
            return;
        }
        self.start_loading_main_resource(policy_loader);
    }

    pub(crate) fn discard_policy_loader(&mut self, frame: FrameId, loader: DocumentLoaderId) {
        if let Some(state) = self.frame_mut(frame) {
            if state.loader.policy_document_loader == Some(loader) {
                state.loader.policy_document_loader = None;
            }
        }
        self.detach_document_loader(loader);
    }

    /// Parent CSP, tracker blocking and the embedder's navigation policy.
    pub(crate) fn should_continue_for_navigation_policy(
        &mut self,
        frame: FrameId,
        loader: DocumentLoaderId,
        request: &ResourceRequest,
    ) -> bool {
        let Some(document_loader) = self.loader(loader) else {
            return false;
        };
        if document_loader.substitute_data().is_some() {
            return true;
        }
        let (navigation_type, suggested, user_gesture) = match document_loader.triggering_action() {
            Some(action) => (
                action.navigation_type(),
                action.policy(),
                action.event().is_some_and(|event| event.user_gesture),
            ),
            None => (NavigationType::Other, NavigationPolicy::CurrentTab, false),
        };

        if let Some(parent) = self.parent_of(frame) {
            let allowed_by_parent = !self.security.enforce_content_security_policy
                || self.document(parent).is_none_or(|document| {
                    document
                        .content_security_policy
                        .allows_child_frame_from(&request.url, &document.url)
                });
            if !allowed_by_parent {
                warn!(
                    "{frame}: refused to frame '{}' because it violates the parent's Content Security Policy",
                    elided(&request.url)
                );
                self.refuse_framed_load(frame);
                return false;
            }
            if self.privacy.should_block_url(&request.url) {
                warn!("{frame}: blocked framed tracker '{}'", elided(&request.url));
                self.refuse_framed_load(frame);
                return false;
            }
        }

        let Some(client) = self.client(frame) else {
            return false;
        };
        let policy = client.decide_policy_for_navigation(self, frame, request, navigation_type, suggested);
        match policy {
            NavigationPolicy::CurrentTab => true,
            NavigationPolicy::Ignore => false,
            _ => {
                if self.allow_popup(frame, user_gesture) {
                    if let Some(client) = self.client(frame) {
                        client.load_url_externally(self, frame, request, policy);
                    }
                }
                false
            }
        }
    }

    /// Makes a refused framed load look like any cross-origin load to the embedding page.
    pub(crate) fn refuse_framed_load(&mut self, frame: FrameId) {
        if let Some(document) = self.document_mut(frame) {
            document.enforce_sandbox_flags(SandboxFlags::ORIGIN);
        }
        if let Some(host) = self.host(frame) {
            host.dispatch_owner_load_event(self, frame);
        }
    }

    /// Runs `beforeunload` in `frame` and its descendants; false means the user chose to stay.
    pub fn should_close(&mut self, frame: FrameId) -> bool {
        let Some(client) = self.client(frame) else {
            return true;
        };
        if !client.can_run_before_unload_confirm_panel() {
            return true;
        }

        let targets = self.subtree(frame);
        self.navigation_disable_count += 1;
        let mut did_allow_navigation = false;
        let mut should_close = true;
        for target in targets {
            if !self.is_descendant_of(target, frame) {
                continue;
            }
            if !self.dispatch_before_unload_event(target, &mut did_allow_navigation) {
                should_close = false;
                break;
            }
        }
        self.navigation_disable_count -= 1;
        should_close
    }

    fn dispatch_before_unload_event(&mut self, frame: FrameId, did_allow_navigation: &mut bool) -> bool {
        let Some(host) = self.host(frame) else {
            return true;
        };
        let Some(document) = self.document_mut(frame) else {
            return true;
        };
        document.page_dismissal = PageDismissalType::BeforeUnload;
        let message = host.dispatch_before_unload(self, frame);
        if let Some(document) = self.document_mut(frame) {
            if document.page_dismissal == PageDismissalType::BeforeUnload {
                document.page_dismissal = PageDismissalType::None;
            }
        }
        let Some(message) = message else {
            return true;
        };

        if *did_allow_navigation {
            self.add_console_message(
                frame,
                MessageLevel::Error,
                "Blocked attempt to show multiple 'beforeunload' confirmation panels for a single navigation.",
            );
            return true;
        }
        if !self.settings.before_unload_dialogs_enabled {
            self.add_console_message(
                frame,
                MessageLevel::Error,
                "Blocked attempt to show a 'beforeunload' confirmation panel.",
            );
            return true;
        }
        let Some(client) = self.client(frame) else {
            return true;
        };
        if client.run_before_unload_confirm_panel(self, frame, &message) {
            *did_allow_navigation = true;
            return true;
        }
        false
    }

    pub(crate) fn report_local_load_failed(&mut self, frame: FrameId, url: &Url) {
        let message = format!("Not allowed to load local resource: {}", elided(url));
        warn!("{frame}: {message}");
        self.add_console_message(frame, MessageLevel::Error, &message);
    }

    /// `about:srcdoc` in an iframe that carries a `srcdoc` attribute.
    pub fn should_treat_url_as_srcdoc_document(&self, frame: FrameId, url: &Url) -> bool {
        is_about_srcdoc(url)
            && self
                .frame_ref(frame)
                .and_then(|state| state.owner.as_ref())
                .is_some_and(|owner| owner.kind == FrameOwnerKind::IFrame && owner.srcdoc.is_some())
    }

    fn default_substitute_data_for_url(&self, frame: FrameId, url: &Url) -> Option<SubstituteData> {
        if !self.should_treat_url_as_srcdoc_document(frame, url) {
            return None;
        }
        let markup = self.frame_ref(frame)?.owner.as_ref()?.srcdoc.as_deref()?;
        Some(SubstituteData::html(markup))
    }

    /// Whether `frame` may open a window for a navigation.
    pub(crate) fn allow_popup(&self, frame: FrameId, user_gesture: bool) -> bool {
        if user_gesture || self.settings.javascript_can_open_windows_automatically {
            return true;
        }
        debug!("{frame}: popup blocked without a user gesture");
        false
    }

    fn create_window_for_request(&mut self, opener: FrameId, request: FrameLoadRequest, policy: NavigationPolicy) {
        let Some(document) = self.document(opener) else {
            return;
        };
        if document.is_dismissing() {
            return;
        }
        if document.sandbox_flags.contains(SandboxFlags::POPUPS) {
            let message = format!(
                "Blocked opening '{}' in a new window because the request was made in a sandboxed frame whose 'allow-popups' permission is not set.",
                elided(request.url())
            );
            self.add_console_message(opener, MessageLevel::Error, &message);
            return;
        }
        if !self.allow_popup(opener, request.has_user_gesture()) {
            return;
        }
        let policy = if policy == NavigationPolicy::CurrentTab {
            NavigationPolicy::NewForegroundTab
        } else {
            policy
        };
        let Some(client) = self.client(opener) else {
            return;
        };
        let Some(page) = client.create_window_for_request(self, opener, &request, policy) else {
            debug!("{opener}: embedder declined to open a window for {}", elided(request.url()));
            return;
        };
        let Some(main_frame) = self.page(page).map(|page| page.main_frame) else {
            return;
        };
        if request.should_send_referrer != ShouldSendReferrer::Never {
            self.set_opener(main_frame, Some(opener));
        }

        let mut forwarded = FrameLoadRequest::new(None, request.resource_request);
        forwarded.substitute_data = request.substitute_data;
        forwarded.triggering_event = request.triggering_event;
        forwarded.user_gesture = request.user_gesture;
        forwarded.form_state = request.form_state;
        forwarded.should_send_referrer = request.should_send_referrer;
        self.load(main_frame, forwarded);
    }
}
