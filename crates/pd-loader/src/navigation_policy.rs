//! Where a navigation goes and what kind of load it is.

use crate::load_request::Modifiers;
use crate::load_request::MouseButton;
use crate::load_request::TriggeringEvent;
use crate::types::FrameLoadType;
use pd_net::HttpMethod;
use pd_net::ResourceRequest;
use pd_net::url::equal_ignoring_fragment;
use pd_net::url::has_fragment_identifier;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationType {
    LinkClicked,
    FormSubmitted,
    BackForward,
    Reload,
    FormResubmitted,
    Other,
}

impl NavigationType {
    fn classify(load_type: FrameLoadType, is_form_submission: bool, has_event: bool) -> Self {
        let is_reload = load_type.is_reload();
        let is_back_forward = load_type == FrameLoadType::BackForward;
        if is_form_submission {
            return if is_reload || is_back_forward {
                Self::FormResubmitted
            } else {
                Self::FormSubmitted
            };
        }
        if has_event {
            Self::LinkClicked
        } else if is_reload {
            Self::Reload
        } else if is_back_forward {
            Self::BackForward
        } else {
            Self::Other
        }
    }

    pub fn is_form_submission(self) -> bool {
        matches!(self, Self::FormSubmitted | Self::FormResubmitted)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NavigationPolicy {
    Ignore,
    Download,
    #[default]
    CurrentTab,
    NewBackgroundTab,
    NewForegroundTab,
    NewWindow,
    NewPopup,
}

/// Maps a click's button and modifiers to a disposition; `None` keeps the current tab.
pub fn navigation_policy_from_event(button: MouseButton, modifiers: Modifiers) -> Option<NavigationPolicy> {
    let new_tab = button == MouseButton::Middle
        || modifiers.intersects(Modifiers::CTRL | Modifiers::META);
    let shift = modifiers.contains(Modifiers::SHIFT);
    let alt = modifiers.contains(Modifiers::ALT);

    if new_tab {
        Some(if shift {
            NavigationPolicy::NewForegroundTab
        } else {
            NavigationPolicy::NewBackgroundTab
        })
    } else if shift {
        Some(NavigationPolicy::NewWindow)
    } else if alt {
        Some(NavigationPolicy::Download)
    } else {
        None
    }
}

/// A classified navigation as presented to the embedder for a policy decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationAction {
    request: ResourceRequest,
    navigation_type: NavigationType,
    policy: NavigationPolicy,
    event: Option<TriggeringEvent>,
}

impl NavigationAction {
    pub fn new(
        request: ResourceRequest,
        load_type: FrameLoadType,
        is_form_submission: bool,
        event: Option<TriggeringEvent>,
    ) -> Self {
        let navigation_type = NavigationType::classify(load_type, is_form_submission, event.is_some());
        let policy = match (navigation_type, event.and_then(|event| event.button)) {
            (NavigationType::LinkClicked | NavigationType::FormSubmitted, Some(button)) => {
                let modifiers = event.map(|event| event.modifiers).unwrap_or_default();
                navigation_policy_from_event(button, modifiers).unwrap_or_default()
            }
            _ => NavigationPolicy::CurrentTab,
        };
        Self {
            request,
            navigation_type,
            policy,
            event,
        }
    }

    /// Action for loads that carry no event or form (reloads, history loads).
    pub fn for_load_type(request: ResourceRequest, load_type: FrameLoadType) -> Self {
        Self::new(request, load_type, false, None)
    }

    pub fn request(&self) -> &ResourceRequest {
        &self.request
    }

    pub fn navigation_type(&self) -> NavigationType {
        self.navigation_type
    }

    pub fn policy(&self) -> NavigationPolicy {
        self.policy
    }

    pub fn event(&self) -> Option<TriggeringEvent> {
        self.event
    }

    pub fn should_open_in_new_window(&self) -> bool {
        self.policy != NavigationPolicy::CurrentTab
    }
}

/// Inputs to load-type classification, gathered from the frame and its page.
#[derive(Debug, Clone, Copy)]
pub struct LoadTypeContext<'a> {
    pub has_parent: bool,
    pub started_first_real_load: bool,
    pub back_forward_list_is_empty: bool,
    pub provisional_url: Option<&'a Url>,
    pub current_load_type: FrameLoadType,
    pub url_for_history: Option<&'a Url>,
    pub has_user_gesture: bool,
}

/// What a request contributes to load-type classification.
#[derive(Debug, Clone, Copy)]
pub struct LoadTypeRequest<'a> {
    pub url: &'a Url,
    pub failing_url: Option<&'a Url>,
    pub reload_ignoring_cache: bool,
    pub lock_back_forward_list: bool,
    pub script_submitted_form: bool,
    pub has_origin_document: bool,
}

impl LoadTypeContext<'_> {
    /// First matching rule wins.
    pub fn classify(&self, request: &LoadTypeRequest<'_>) -> FrameLoadType {
        if self.has_parent && !self.started_first_real_load {
            return FrameLoadType::InitialInChildFrame;
        }
        if !self.has_parent && self.back_forward_list_is_empty {
            return FrameLoadType::Standard;
        }
        if self.provisional_url.is_some()
            && request.failing_url == self.provisional_url
            && self.current_load_type == FrameLoadType::BackForward
        {
            return FrameLoadType::BackForward;
        }
        if request.reload_ignoring_cache {
            return FrameLoadType::Reload;
        }
        let script_submission_in_child =
            self.has_parent && !self.has_user_gesture && request.script_submitted_form;
        if request.lock_back_forward_list || script_submission_in_child {
            return FrameLoadType::RedirectLockedBackForward;
        }
        if !request.has_origin_document && Some(request.url) == self.url_for_history {
            return FrameLoadType::Same;
        }
        if request.failing_url.is_some()
            && request.failing_url == self.url_for_history
            && self.current_load_type == FrameLoadType::Reload
        {
            return FrameLoadType::Reload;
        }
        FrameLoadType::Standard
    }
}

/// Whether `url` only moves within the committed document at `current_url`.
pub fn should_perform_fragment_navigation(
    is_form_submission: bool,
    method: HttpMethod,
    load_type: FrameLoadType,
    url: &Url,
    current_url: &Url,
    is_frameset: bool,
) -> bool {
    (!is_form_submission || method == HttpMethod::Get)
        && !matches!(
            load_type,
            FrameLoadType::Reload
                | FrameLoadType::ReloadFromOrigin
                | FrameLoadType::Same
                | FrameLoadType::BackForward
        )
        && has_fragment_identifier(url)
        && equal_ignoring_fragment(current_url, url)
        && !is_frameset
}

#[cfg(test)]
mod tests {
    use super::LoadTypeContext;
    use super::LoadTypeRequest;
    use super::NavigationAction;
    use super::NavigationPolicy;
    use super::NavigationType;
    use super::navigation_policy_from_event;
    use super::should_perform_fragment_navigation;
    use crate::load_request::Modifiers;
    use crate::load_request::MouseButton;
    use crate::load_request::TriggeringEvent;
    use crate::types::FrameLoadType;
    use pd_net::HttpMethod;
    use pd_net::ResourceRequest;
    use url::Url;

    fn url(input: &str) -> Url {
        match Url::parse(input) {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        }
    }

    fn context<'a>(history: Option<&'a Url>) -> LoadTypeContext<'a> {
        LoadTypeContext {
            has_parent: false,
            started_first_real_load: true,
            back_forward_list_is_empty: false,
            provisional_url: None,
            current_load_type: FrameLoadType::Standard,
            url_for_history: history,
            has_user_gesture: false,
        }
    }

    fn request(url: &Url) -> LoadTypeRequest<'_> {
        LoadTypeRequest {
            url,
            failing_url: None,
            reload_ignoring_cache: false,
            lock_back_forward_list: false,
            script_submitted_form: false,
            has_origin_document: true,
        }
    }

    #[test]
    fn modifier_clicks_pick_new_tabs_and_windows() {
        assert_eq!(
            navigation_policy_from_event(MouseButton::Middle, Modifiers::empty()),
            Some(NavigationPolicy::NewBackgroundTab)
        );
        assert_eq!(
            navigation_policy_from_event(MouseButton::Left, Modifiers::CTRL | Modifiers::SHIFT),
            Some(NavigationPolicy::NewForegroundTab)
        );
        assert_eq!(
            navigation_policy_from_event(MouseButton::Left, Modifiers::SHIFT),
            Some(NavigationPolicy::NewWindow)
        );
        assert_eq!(
            navigation_policy_from_event(MouseButton::Left, Modifiers::ALT),
            Some(NavigationPolicy::Download)
        );
        assert_eq!(navigation_policy_from_event(MouseButton::Left, Modifiers::empty()), None);
    }

    #[test]
    fn action_type_reflects_form_and_event() {
        let target = url("http://a/1");
        let click = TriggeringEvent::click(MouseButton::Middle, Modifiers::empty());
        let link = NavigationAction::new(ResourceRequest::new(target.clone()), FrameLoadType::Standard, false, Some(click));
        assert_eq!(link.navigation_type(), NavigationType::LinkClicked);
        assert!(link.should_open_in_new_window());

        let resubmit = NavigationAction::new(ResourceRequest::new(target.clone()), FrameLoadType::BackForward, true, None);
        assert_eq!(resubmit.navigation_type(), NavigationType::FormResubmitted);
        assert!(!resubmit.should_open_in_new_window());

        let reload = NavigationAction::for_load_type(ResourceRequest::new(target), FrameLoadType::Reload);
        assert_eq!(reload.navigation_type(), NavigationType::Reload);
    }

    #[test]
    fn child_frames_start_with_initial_load_type() {
        let target = url("http://a/1");
        let mut ctx = context(None);
        ctx.has_parent = true;
        ctx.started_first_real_load = false;
        assert_eq!(ctx.classify(&request(&target)), FrameLoadType::InitialInChildFrame);
    }

    #[test]
    fn empty_history_in_main_frame_is_standard() {
        let target = url("http://a/1");
        let mut ctx = context(Some(&target));
        ctx.back_forward_list_is_empty = true;
        let mut req = request(&target);
        req.reload_ignoring_cache = true;
        assert_eq!(ctx.classify(&req), FrameLoadType::Standard);
    }

    #[test]
    fn reload_and_lock_rules_apply_in_order() {
        let target = url("http://a/1");
        let ctx = context(None);
        let mut req = request(&target);
        req.reload_ignoring_cache = true;
        req.lock_back_forward_list = true;
        assert_eq!(ctx.classify(&req), FrameLoadType::Reload);

        req.reload_ignoring_cache = false;
        assert_eq!(ctx.classify(&req), FrameLoadType::RedirectLockedBackForward);
    }

    #[test]
    fn script_form_submission_in_child_frame_locks_history() {
        let target = url("http://a/1");
        let mut ctx = context(None);
        ctx.has_parent = true;
        let mut req = request(&target);
        req.script_submitted_form = true;
        assert_eq!(ctx.classify(&req), FrameLoadType::RedirectLockedBackForward);

        ctx.has_user_gesture = true;
        assert_eq!(ctx.classify(&req), FrameLoadType::Standard);
    }

    #[test]
    fn browser_reload_of_history_url_is_same() {
        let target = url("http://a/1");
        let ctx = context(Some(&target));
        let mut req = request(&target);
        assert_eq!(ctx.classify(&req), FrameLoadType::Standard);
        req.has_origin_document = false;
        assert_eq!(ctx.classify(&req), FrameLoadType::Same);
    }

    #[test]
    fn failed_reload_stays_a_reload() {
        let target = url("http://a/1");
        let mut ctx = context(Some(&target));
        ctx.current_load_type = FrameLoadType::Reload;
        let mut req = request(&target);
        req.failing_url = Some(&target);
        assert_eq!(ctx.classify(&req), FrameLoadType::Reload);
    }

    #[test]
    fn failed_back_forward_load_keeps_its_type() {
        let target = url("http://a/2");
        let mut ctx = context(None);
        ctx.provisional_url = Some(&target);
        ctx.current_load_type = FrameLoadType::BackForward;
        let mut req = request(&target);
        req.failing_url = Some(&target);
        assert_eq!(ctx.classify(&req), FrameLoadType::BackForward);
    }

    #[test]
    fn fragment_navigation_requires_matching_document() {
        let current = url("http://a/1#foo");
        let next = url("http://a/1#bar");
        assert!(should_perform_fragment_navigation(false, HttpMethod::Get, FrameLoadType::Standard, &next, &current, false));
        assert!(!should_perform_fragment_navigation(true, HttpMethod::Post, FrameLoadType::Standard, &next, &current, false));
        assert!(!should_perform_fragment_navigation(false, HttpMethod::Get, FrameLoadType::Reload, &next, &current, false));
        assert!(!should_perform_fragment_navigation(false, HttpMethod::Get, FrameLoadType::Standard, &next, &current, true));
        assert!(!should_perform_fragment_navigation(false, HttpMethod::Get, FrameLoadType::Standard, &url("http://a/1"), &current, false));
        assert!(!should_perform_fragment_navigation(false, HttpMethod::Get, FrameLoadType::Standard, &url("http://a/2#bar"), &current, false));
    }
}
