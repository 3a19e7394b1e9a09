//! Document state observed and driven by frame loading.

use crate::forms::FormElement;
use encoding_rs::Encoding;
use encoding_rs::UTF_8;
use pd_core::BrowserResult;
use pd_net::url::resolve_url;
use pd_privacy::ReferrerPolicy;
use pd_security::ContentSecurityPolicy;
use pd_security::SandboxFlags;
use pd_security::SecurityOrigin;
use url::Url;

/// ID used to address documents owned by the loader's arena.
pub type DocumentId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadyState {
    #[default]
    Loading,
    Interactive,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadEventProgress {
    #[default]
    NotStarted,
    InProgress,
    Completed,
}

/// Which page-dismissal event the document is currently dispatching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageDismissalType {
    #[default]
    None,
    BeforeUnload,
    PageHide,
    Unload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLevel {
    Log,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleMessage {
    pub level: MessageLevel,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct Document {
    pub id: DocumentId,
    pub url: Url,
    pub base_target: String,
    pub ready_state: ReadyState,
    pub parsing: bool,
    pub pending_imports: usize,
    pub pending_subresources: usize,
    pub load_event_delay_count: usize,
    pub load_event_progress: LoadEventProgress,
    pub is_frameset: bool,
    pub security_origin: SecurityOrigin,
    pub sandbox_flags: SandboxFlags,
    pub referrer_policy: ReferrerPolicy,
    pub content_security_policy: ContentSecurityPolicy,
    pub page_dismissal: PageDismissalType,
    pub encoding: &'static Encoding,
    pub content_language: Option<String>,
    pub console_messages: Vec<ConsoleMessage>,
    pub forms: Vec<FormElement>,
    pub window_status: String,
    pub explicitly_opened: bool,
    /// Form-control state changed since it was last saved into history.
    pub history_state_dirty: bool,
    received_bytes: Vec<u8>,
    text: String,
}

impl Document {
    pub fn new(id: DocumentId, url: Url, security_origin: SecurityOrigin) -> Self {
        Self {
            id,
            url,
            base_target: String::new(),
            ready_state: ReadyState::Loading,
            parsing: false,
            pending_imports: 0,
            pending_subresources: 0,
            load_event_delay_count: 0,
            load_event_progress: LoadEventProgress::NotStarted,
            is_frameset: false,
            security_origin,
            sandbox_flags: SandboxFlags::empty(),
            referrer_policy: ReferrerPolicy::Default,
            content_security_policy: ContentSecurityPolicy::default(),
            page_dismissal: PageDismissalType::None,
            encoding: UTF_8,
            content_language: None,
            console_messages: Vec::new(),
            forms: Vec::new(),
            window_status: String::new(),
            explicitly_opened: false,
            history_state_dirty: false,
            received_bytes: Vec::new(),
            text: String::new(),
        }
    }

    pub fn complete_url(&self, href: &str) -> BrowserResult<Url> {
        if href.trim().is_empty() {
            return Ok(self.url.clone());
        }
        resolve_url(&self.url, href)
    }

    pub fn is_delaying_load_event(&self) -> bool {
        self.load_event_delay_count > 0
    }

    pub fn processing_load_event(&self) -> bool {
        self.load_event_progress == LoadEventProgress::InProgress
    }

    pub fn load_event_finished(&self) -> bool {
        self.load_event_progress == LoadEventProgress::Completed
    }

    pub fn load_event_still_needed(&self) -> bool {
        self.load_event_progress == LoadEventProgress::NotStarted
    }

    pub fn is_dismissing(&self) -> bool {
        self.page_dismissal != PageDismissalType::None
    }

    pub fn has_pending_work(&self) -> bool {
        self.pending_imports > 0 || self.pending_subresources > 0
    }

    pub fn add_console_message(&mut self, level: MessageLevel, text: impl Into<String>) {
        self.console_messages.push(ConsoleMessage {
            level,
            text: text.into(),
        });
    }

    /// Opens the parser for a fresh byte stream.
    pub fn begin_parsing(&mut self) {
        self.parsing = true;
        self.received_bytes.clear();
        self.text.clear();
    }

    pub fn append_bytes(&mut self, bytes: &[u8]) {
        self.received_bytes.extend_from_slice(bytes);
    }

    /// Decodes everything received so far; a byte-order mark overrides `encoding`.
    pub fn finish_parsing(&mut self) {
        let (text, actual, _) = self.encoding.decode(&self.received_bytes);
        self.encoding = actual;
        self.text = text.into_owned();
        self.is_frameset = contains_frameset_tag(&self.text);
        self.received_bytes.clear();
        self.parsing = false;
        if self.ready_state == ReadyState::Loading {
            self.ready_state = ReadyState::Interactive;
        }
    }

    /// Drops partially parsed content without finishing the parse.
    pub fn cancel_parsing(&mut self) {
        self.parsing = false;
        self.received_bytes.clear();
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Takes the first entry of a `Content-Language` header.
    pub fn set_content_language(&mut self, header: &str) {
        let first = header.split(',').next().unwrap_or_default().trim();
        self.content_language = if first.is_empty() {
            None
        } else {
            Some(first.to_owned())
        };
    }

    pub fn enforce_sandbox_flags(&mut self, flags: SandboxFlags) {
        self.sandbox_flags |= flags;
        if flags.contains(SandboxFlags::ORIGIN) && !self.security_origin.is_unique() {
            self.security_origin = SecurityOrigin::create_unique();
        }
    }

    /// Control values of every form, in document order.
    pub fn form_element_state(&self) -> Vec<String> {
        self.forms
            .iter()
            .flat_map(FormElement::save_state)
            .collect()
    }

    pub fn restore_form_element_state(&mut self, state: &[String]) {
        let mut values = state.iter();
        for form in &mut self.forms {
            form.restore_state(&mut values);
        }
    }
}

fn contains_frameset_tag(text: &str) -> bool {
    text.to_ascii_lowercase().contains("<frameset")
}

#[cfg(test)]
mod tests {
    use super::Document;
    use super::ReadyState;
    use encoding_rs::WINDOWS_1252;
    use pd_security::SandboxFlags;
    use pd_security::SecurityOrigin;
    use url::Url;

    fn document(input: &str) -> Document {
        let url = match Url::parse(input) {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };
        let origin = SecurityOrigin::create(&url);
        Document::new(1, url, origin)
    }

    #[test]
    fn completes_relative_urls_against_document_url() {
        let document = document("https://a.example/dir/page.html");
        let resolved = match document.complete_url("../next?x=1") {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };
        assert_eq!(resolved.as_str(), "https://a.example/next?x=1");
        assert_eq!(document.complete_url("").ok(), Some(document.url.clone()));
    }

    #[test]
    fn decodes_received_bytes_with_document_encoding() {
        let mut document = document("https://a.example/");
        document.encoding = WINDOWS_1252;
        document.begin_parsing();
        document.append_bytes(b"caf\xe9 <FRAMESET>");
        assert!(document.parsing);
        document.finish_parsing();
        assert!(!document.parsing);
        assert_eq!(document.text(), "caf\u{e9} <FRAMESET>");
        assert!(document.is_frameset);
        assert_eq!(document.ready_state, ReadyState::Interactive);
    }

    #[test]
    fn content_language_uses_first_entry() {
        let mut document = document("https://a.example/");
        document.set_content_language(" fr-CA , en");
        assert_eq!(document.content_language.as_deref(), Some("fr-CA"));
        document.set_content_language(" ");
        assert_eq!(document.content_language, None);
    }

    #[test]
    fn origin_sandbox_makes_origin_unique() {
        let mut document = document("https://a.example/");
        document.enforce_sandbox_flags(SandboxFlags::ORIGIN);
        assert!(document.security_origin.is_unique());
        assert!(document.sandbox_flags.contains(SandboxFlags::ORIGIN));
    }
}
