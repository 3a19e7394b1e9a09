//! Navigation requests and the values they carry.

use crate::ids::FrameId;
use crate::types::ClientRedirectPolicy;
use bitflags::bitflags;
use pd_dom::Document;
use pd_dom::DocumentId;
use pd_dom::FormElement;
use pd_dom::FormSubmissionTrigger;
use pd_net::ResourceRequest;
use pd_privacy::ReferrerPolicy;
use pd_privacy::ShouldSendReferrer;
use pd_security::SandboxFlags;
use pd_security::SecurityOrigin;
use url::Url;

/// Content delivered in place of a network fetch (srcdoc, error pages, `javascript:` results).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubstituteData {
    pub content: Vec<u8>,
    pub mime_type: String,
    pub text_encoding: String,
    /// URL the substituted content stands in for, if it replaces a failed load.
    pub failing_url: Option<Url>,
}

impl SubstituteData {
    pub fn html(content: &str) -> Self {
        Self {
            content: content.as_bytes().to_vec(),
            mime_type: "text/html".to_owned(),
            text_encoding: "UTF-8".to_owned(),
            failing_url: None,
        }
    }

    pub fn error_page(content: &str, failing_url: Url) -> Self {
        Self {
            failing_url: Some(failing_url),
            ..Self::html(content)
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Modifiers: u8 {
        const CTRL = 1;
        const SHIFT = 1 << 1;
        const ALT = 1 << 2;
        const META = 1 << 3;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
}

/// The DOM event that started a navigation, reduced to what policy decisions need.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TriggeringEvent {
    pub button: Option<MouseButton>,
    pub modifiers: Modifiers,
    pub user_gesture: bool,
}

impl TriggeringEvent {
    pub fn click(button: MouseButton, modifiers: Modifiers) -> Self {
        Self {
            button: Some(button),
            modifiers,
            user_gesture: true,
        }
    }

    pub fn user_gesture() -> Self {
        Self {
            user_gesture: true,
            ..Self::default()
        }
    }
}

/// What the loader needs to know about the document that asked for a navigation.
///
/// Taken when the request is built; the document itself may be gone by the
/// time the request runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginDocument {
    pub frame: FrameId,
    pub document: DocumentId,
    pub url: Url,
    pub security_origin: SecurityOrigin,
    pub base_target: String,
    pub referrer_policy: ReferrerPolicy,
    pub sandbox_flags: SandboxFlags,
}

impl OriginDocument {
    pub fn capture(frame: FrameId, document: &Document) -> Self {
        Self {
            frame,
            document: document.id,
            url: document.url.clone(),
            security_origin: document.security_origin.clone(),
            base_target: document.base_target.clone(),
            referrer_policy: document.referrer_policy,
            sandbox_flags: document.sandbox_flags,
        }
    }

    pub fn is_sandboxed(&self, flags: SandboxFlags) -> bool {
        self.sandbox_flags.contains(flags)
    }

    /// Referrer used when the request does not carry one.
    pub fn outgoing_referrer(&self) -> Option<&Url> {
        Some(&self.url)
    }
}

/// Submitted form plus the document it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormState {
    pub form: FormElement,
    pub source_document: OriginDocument,
    pub trigger: FormSubmissionTrigger,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameLoadRequest {
    /// Absent for browser-initiated loads, which skip the security pre-checks.
    pub origin_document: Option<OriginDocument>,
    pub resource_request: ResourceRequest,
    pub frame_name: String,
    pub substitute_data: Option<SubstituteData>,
    pub lock_back_forward_list: bool,
    pub client_redirect: ClientRedirectPolicy,
    pub should_send_referrer: ShouldSendReferrer,
    pub triggering_event: Option<TriggeringEvent>,
    /// Set for loads started while handling a user gesture that carry no event of their own.
    pub user_gesture: bool,
    pub form_state: Option<FormState>,
}

impl FrameLoadRequest {
    pub fn new(origin_document: Option<OriginDocument>, resource_request: ResourceRequest) -> Self {
        Self {
            origin_document,
            resource_request,
            frame_name: String::new(),
            substitute_data: None,
            lock_back_forward_list: false,
            client_redirect: ClientRedirectPolicy::NotClientRedirect,
            should_send_referrer: ShouldSendReferrer::Maybe,
            triggering_event: None,
            user_gesture: false,
            form_state: None,
        }
    }

    /// Browser-initiated load of `url`.
    pub fn for_url(url: Url) -> Self {
        Self::new(None, ResourceRequest::new(url))
    }

    pub fn with_frame_name(mut self, frame_name: &str) -> Self {
        self.frame_name = frame_name.to_owned();
        self
    }

    pub fn with_substitute_data(mut self, substitute_data: SubstituteData) -> Self {
        self.substitute_data = Some(substitute_data);
        self
    }

    pub fn with_triggering_event(mut self, event: TriggeringEvent) -> Self {
        self.triggering_event = Some(event);
        self
    }

    pub fn url(&self) -> &Url {
        &self.resource_request.url
    }

    pub fn with_user_gesture(mut self) -> Self {
        self.user_gesture = true;
        self
    }

    pub fn has_user_gesture(&self) -> bool {
        self.user_gesture
            || self
                .triggering_event
                .is_some_and(|event| event.user_gesture)
    }

    pub fn failing_url(&self) -> Option<&Url> {
        self.substitute_data
            .as_ref()
            .and_then(|data| data.failing_url.as_ref())
    }
}
