//! Which frames a document may navigate, and form submission targeting.

use crate::engine::Engine;
use crate::form_submission::FormSubmission;
use crate::form_submission::FormSubmissionOutcome;
use crate::ids::FrameId;
use crate::load_request::OriginDocument;
use crate::load_request::TriggeringEvent;
use log::debug;
use log::warn;
use pd_core::BrowserError;
use pd_core::BrowserResult;
use pd_dom::FormElement;
use pd_dom::FormSubmissionTrigger;
use pd_dom::MessageLevel;
use pd_net::url::elided;
use pd_net::url::protocol_is_javascript;
use pd_security::SandboxFlags;
use pd_security::SecurityOrigin;

const SANDBOXED_ANCESTOR_NAVIGATION: &str =
    "The frame attempting navigation is sandboxed, and is therefore disallowed from navigating its ancestors.";
const SANDBOXED_TOP_NAVIGATION: &str = "The frame attempting navigation of the top-level window is sandboxed, but the 'allow-top-navigation' flag is not set.";
const UNRELATED_NAVIGATION: &str = "The frame attempting navigation is neither same-origin with the target, nor is it the target's parent or opener.";

impl Engine {
    /// Whether the document described by `active` may navigate `target`.
    pub fn can_navigate(&mut self, active: &OriginDocument, target: FrameId) -> bool {
        if !self.is_alive(active.frame) || !self.is_alive(target) {
            return false;
        }
        let top = self.top(active.frame);
        if !active.is_sandboxed(SandboxFlags::TOP_NAVIGATION) && target == top {
            return true;
        }

        if active.is_sandboxed(SandboxFlags::NAVIGATION) {
            if self.is_descendant_of(target, active.frame) {
                return true;
            }
            let reason = if active.is_sandboxed(SandboxFlags::TOP_NAVIGATION) && target == top {
                SANDBOXED_TOP_NAVIGATION
            } else {
                SANDBOXED_ANCESTOR_NAVIGATION
            };
            self.print_navigation_error_message(target, active, reason);
            return false;
        }

        if self.can_access_ancestor(&active.security_origin, Some(target)) {
            return true;
        }

        if self.parent_of(target).is_none() {
            let active_opener = self.frame_ref(active.frame).and_then(|state| state.opener);
            if active_opener == Some(target) {
                return true;
            }
            let target_opener = self.frame_ref(target).and_then(|state| state.opener);
            if self.can_access_ancestor(&active.security_origin, target_opener) {
                return true;
            }
        }

        self.print_navigation_error_message(target, active, UNRELATED_NAVIGATION);
        false
    }

    fn can_access_ancestor(&self, origin: &SecurityOrigin, frame: Option<FrameId>) -> bool {
        let origin_is_local = self.security.is_local_scheme(origin.scheme());
        let mut current = frame;
        while let Some(ancestor) = current {
            if let Some(document) = self.document(ancestor) {
                if origin.can_access(&document.security_origin) {
                    return true;
                }
                if origin_is_local && self.security.is_local_scheme(document.url.scheme()) {
                    return true;
                }
            }
            current = self.parent_of(ancestor);
        }
        false
    }

    fn print_navigation_error_message(&mut self, target: FrameId, active: &OriginDocument, reason: &str) {
        let target_url = self
            .document(target)
            .map(|document| document.url.to_string())
            .unwrap_or_default();
        let message = format!(
            "Unsafe JavaScript attempt to initiate navigation for frame with URL '{target_url}' from frame with URL '{}'. {reason}\n",
            active.url
        );
        warn!("{target}: {}", message.trim_end());
        self.add_console_message(target, MessageLevel::Error, &message);
    }

    /// Looks `name` up from `frame` and drops the result if `active` may not navigate it.
    pub fn find_frame_for_navigation(&mut self, frame: FrameId, name: &str, active: &OriginDocument) -> Option<FrameId> {
        let target = self.find_frame(frame, name)?;
        if !self.can_navigate(active, target) {
            return None;
        }
        Some(target)
    }

    /// Sandbox flags a new document in `frame` starts with.
    pub fn effective_sandbox_flags(&self, frame: FrameId) -> SandboxFlags {
        let Some(state) = self.frame_ref(frame) else {
            return SandboxFlags::empty();
        };
        let mut flags = state.loader.forced_sandbox_flags;
        if let Some(parent) = state.parent {
            if let Some(document) = self.document(parent) {
                flags |= document.sandbox_flags;
            }
        }
        if let Some(owner) = &state.owner {
            flags |= owner.sandbox_flags;
        }
        flags
    }

    pub fn set_opener(&mut self, frame: FrameId, opener: Option<FrameId>) {
        if let Some(state) = self.frame_mut(frame) {
            state.opener = opener;
        }
    }

    /// Submits `form` from `frame`'s document.
    ///
    /// `submitter` indexes the control that triggered the submission. The
    /// navigation itself runs from the scheduler on the next task.
    pub fn submit_form(
        &mut self,
        frame: FrameId,
        form: &FormElement,
        submitter: Option<usize>,
        trigger: FormSubmissionTrigger,
        event: Option<TriggeringEvent>,
    ) -> BrowserResult<()> {
        let dialog_enabled = self.settings.dialog_element_enabled;
        let outcome = {
            let Some(state) = self.frames.get(&frame) else {
                return Err(BrowserError::new(
                    "loader.frame.detached",
                    format!("{frame} is not attached to a page"),
                ));
            };
            let Some(document) = &state.document else {
                return Err(BrowserError::new(
                    "loader.frame.detached",
                    format!("{frame} has no document to submit from"),
                ));
            };
            FormSubmission::create(
                form,
                submitter,
                document,
                frame,
                trigger,
                event,
                dialog_enabled,
                &mut self.ids,
            )?
        };

        let mut submission = match outcome {
            FormSubmissionOutcome::CloseDialog(result) => {
                if let Some(host) = self.host(frame) {
                    host.close_dialog(self, frame, &result);
                }
                return Ok(());
            }
            FormSubmissionOutcome::Submit(submission) => submission,
        };

        if submission.action().as_str().is_empty() {
            return Ok(());
        }
        let Some(document) = self.document(frame) else {
            return Ok(());
        };
        if document.sandbox_flags.contains(SandboxFlags::FORMS) {
            let message = format!(
                "Blocked form submission to '{}' because the form's frame is sandboxed and the 'allow-forms' permission is not set.",
                elided(submission.action())
            );
            self.add_console_message(frame, MessageLevel::Error, &message);
            return Ok(());
        }

        if protocol_is_javascript(submission.action()) {
            let allowed = document
                .content_security_policy
                .allows_form_action(submission.action(), &document.url);
            if allowed {
                let url = submission.action().clone();
                self.execute_javascript_url(frame, &url);
            }
            return Ok(());
        }

        let document_url = document.url.clone();
        let user_gesture = event.is_some_and(|event| event.user_gesture);
        let source = submission.state().source_document.clone();
        let target_name = submission.target().to_owned();
        let target = match self.find_frame_for_navigation(frame, &target_name, &source) {
            Some(target) => {
                submission.set_target("");
                target
            }
            None => {
                if !self.allow_popup(frame, user_gesture) {
                    debug!("{frame}: blocked form submission opening `{target_name}`");
                    return Ok(());
                }
                frame
            }
        };
        if !self.is_alive(target) {
            return Ok(());
        }
        submission.set_referrer(Some(document_url.to_string()));
        self.schedule_form_submission(target, submission, user_gesture);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::client::FrameLoaderClient;
    use crate::client::InertDocumentHost;
    use crate::engine::Engine;
    use crate::frame::FrameOwner;
    use crate::ids::FrameId;
    use crate::load_request::OriginDocument;
    use crate::settings::LoaderSettings;
    use pd_dom::MessageLevel;
    use pd_privacy::PrivacyPolicy;
    use pd_security::SandboxFlags;
    use pd_security::SecurityOrigin;
    use pd_security::SecurityPolicy;
    use std::rc::Rc;
    use url::Url;

    struct Quiet;

    impl FrameLoaderClient for Quiet {}

    fn engine() -> Engine {
        match Engine::new(LoaderSettings::default(), SecurityPolicy::default(), PrivacyPolicy::default()) {
            Ok(engine) => engine,
            Err(error) => panic!("{error}"),
        }
    }

    fn url(input: &str) -> Url {
        match Url::parse(input) {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        }
    }

    fn page(engine: &mut Engine) -> FrameId {
        let page = engine.create_page(Rc::new(Quiet), Rc::new(InertDocumentHost));
        match engine.page(page) {
            Some(page) => page.main_frame(),
            None => panic!("page missing"),
        }
    }

    fn give_origin(engine: &mut Engine, frame: FrameId, address: &str) {
        let address = url(address);
        if let Some(document) = engine.document_mut(frame) {
            document.security_origin = SecurityOrigin::create(&address);
            document.url = address;
        }
    }

    fn origin_of(engine: &Engine, frame: FrameId) -> OriginDocument {
        match engine.document(frame) {
            Some(document) => OriginDocument::capture(frame, document),
            None => panic!("{frame} has no document"),
        }
    }

    #[test]
    fn same_origin_ancestor_may_navigate_child() {
        let mut engine = engine();
        let root = page(&mut engine);
        let child = match engine.create_child_frame(root, FrameOwner::iframe("c"), None) {
            Ok(child) => child,
            Err(error) => panic!("{error}"),
        };
        give_origin(&mut engine, root, "https://a.example/");
        give_origin(&mut engine, child, "https://b.example/");

        let parent = origin_of(&engine, root);
        assert!(engine.can_navigate(&parent, child));
        let framed = origin_of(&engine, child);
        assert!(engine.can_navigate(&framed, root));
    }

    #[test]
    fn sandboxed_frame_cannot_navigate_its_parent() {
        let mut engine = engine();
        let root = page(&mut engine);
        let sandbox = SandboxFlags::NAVIGATION | SandboxFlags::TOP_NAVIGATION;
        let child = match engine.create_child_frame(root, FrameOwner::iframe("c").with_sandbox(sandbox), None) {
            Ok(child) => child,
            Err(error) => panic!("{error}"),
        };
        assert_eq!(engine.effective_sandbox_flags(child), sandbox);

        let framed = origin_of(&engine, child);
        assert!(engine.can_navigate(&framed, child));
        assert!(!engine.can_navigate(&framed, root));
        let logged = engine.document(root).is_some_and(|document| {
            document.console_messages.iter().any(|message| {
                message.level == MessageLevel::Error && message.text.contains("'allow-top-navigation'")
            })
        });
        assert!(logged);
    }

    #[test]
    fn unrelated_top_level_frames_are_protected() {
        let mut engine = engine();
        let first = page(&mut engine);
        let second = page(&mut engine);
        give_origin(&mut engine, first, "https://a.example/");
        give_origin(&mut engine, second, "https://b.example/");

        let active = origin_of(&engine, first);
        assert!(!engine.can_navigate(&active, second));

        engine.set_opener(first, Some(second));
        assert!(engine.can_navigate(&active, second));
    }
}
