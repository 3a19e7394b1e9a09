//! Browser coordinator: validated configuration and the page engine it drives.

use log::debug;
use log::info;
use pd_core::BrowserError;
use pd_core::BrowserResult;
use pd_loader::DocumentHost;
use pd_loader::Engine;
use pd_loader::FrameId;
use pd_loader::FrameLoadRequest;
use pd_loader::FrameLoaderClient;
use pd_loader::LoaderSettings;
use pd_loader::PageId;
use pd_privacy::PrivacyPolicy;
use pd_security::SecurityPolicy;
use std::rc::Rc;
use url::Url;

/// Everything the engine is configured with at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BrowserConfig {
    pub security: SecurityPolicy,
    pub privacy: PrivacyPolicy,
    pub loader: LoaderSettings,
}

impl BrowserConfig {
    pub fn validate(&self) -> BrowserResult<()> {
        self.security.validate()?;
        self.privacy.validate()?;
        self.loader.validate()
    }

    /// Defaults with `PIXELDUST_*` environment overrides applied.
    pub fn from_env() -> BrowserResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`BrowserConfig::from_env`], reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> BrowserResult<Self> {
        let mut config = Self::default();
        if let Some(value) = lookup("PIXELDUST_BLOCK_TRACKERS") {
            config.privacy.block_known_trackers = parse_flag("PIXELDUST_BLOCK_TRACKERS", &value)?;
        }
        if let Some(value) = lookup("PIXELDUST_HONOR_X_FRAME_OPTIONS") {
            config.security.honor_x_frame_options = parse_flag("PIXELDUST_HONOR_X_FRAME_OPTIONS", &value)?;
        }
        if let Some(value) = lookup("PIXELDUST_ALLOW_POPUPS") {
            config.loader.javascript_can_open_windows_automatically = parse_flag("PIXELDUST_ALLOW_POPUPS", &value)?;
        }
        if let Some(value) = lookup("PIXELDUST_BEFORE_UNLOAD_DIALOGS") {
            config.loader.before_unload_dialogs_enabled = parse_flag("PIXELDUST_BEFORE_UNLOAD_DIALOGS", &value)?;
        }
        if let Some(value) = lookup("PIXELDUST_MAX_FRAMES") {
            config.loader.max_frames_per_page = parse_count("PIXELDUST_MAX_FRAMES", &value)?;
        }
        if let Some(value) = lookup("PIXELDUST_HISTORY_CAPACITY") {
            config.loader.back_forward_list_capacity = parse_count("PIXELDUST_HISTORY_CAPACITY", &value)?;
        }
        config.validate()?;
        Ok(config)
    }
}

fn parse_flag(key: &str, value: &str) -> BrowserResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(BrowserError::new(
            "browser.config.invalid_env",
            format!("{key} expects a boolean, got `{other}`"),
        )),
    }
}

fn parse_count(key: &str, value: &str) -> BrowserResult<usize> {
    value.trim().parse().map_err(|error| {
        BrowserError::new(
            "browser.config.invalid_env",
            format!("{key} expects a count, got `{value}`: {error}"),
        )
    })
}

/// Embedder that accepts every default answer and renders nothing.
#[derive(Debug, Default)]
pub struct HeadlessEmbedder;

impl FrameLoaderClient for HeadlessEmbedder {}

impl DocumentHost for HeadlessEmbedder {}

/// Startup summary used by the shell layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserSummary {
    pub open_pages: usize,
    pub privacy_hardened: bool,
    pub security_hardened: bool,
}

/// Owns the engine and the pages opened in it.
#[derive(Debug)]
pub struct Browser {
    config: BrowserConfig,
    engine: Engine,
}

impl Browser {
    pub fn new(config: BrowserConfig) -> BrowserResult<Self> {
        config.validate()?;
        let engine = Engine::new(
            config.loader.clone(),
            config.security.clone(),
            config.privacy.clone(),
        )?;
        info!("browser started");
        Ok(Self { config, engine })
    }

    pub fn from_env() -> BrowserResult<Self> {
        Self::new(BrowserConfig::from_env()?)
    }

    pub fn config(&self) -> &BrowserConfig {
        &self.config
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    /// Opens a page whose main frame shows the initial empty document.
    pub fn open_page(&mut self, client: Rc<dyn FrameLoaderClient>, host: Rc<dyn DocumentHost>) -> PageId {
        let page = self.engine.create_page(client, host);
        debug!("{page}: opened");
        page
    }

    pub fn open_headless_page(&mut self) -> PageId {
        let embedder = Rc::new(HeadlessEmbedder);
        self.open_page(embedder.clone(), embedder)
    }

    pub fn main_frame(&self, page: PageId) -> BrowserResult<FrameId> {
        self.engine
            .page(page)
            .map(|page| page.main_frame())
            .ok_or_else(|| BrowserError::new("browser.page.closed", format!("{page} is not open")))
    }

    /// Starts a browser-initiated navigation of the page's main frame.
    pub fn navigate(&mut self, page: PageId, url: &str) -> BrowserResult<()> {
        let url = Url::parse(url).map_err(|error| {
            BrowserError::new("browser.navigate.invalid_url", format!("`{url}`: {error}"))
        })?;
        let frame = self.main_frame(page)?;
        self.engine.load(frame, FrameLoadRequest::for_url(url));
        Ok(())
    }

    pub fn close_page(&mut self, page: PageId) -> BrowserResult<()> {
        let frame = self.main_frame(page)?;
        self.engine.detach_from_parent(frame);
        debug!("{page}: closed");
        Ok(())
    }

    pub fn summary(&self) -> BrowserSummary {
        BrowserSummary {
            open_pages: self.engine.page_ids().len(),
            privacy_hardened: self.config.privacy.block_known_trackers
                && self.config.privacy.strip_referrer_cross_origin
                && self.config.privacy.send_origin_header_for_unsafe_methods,
            security_hardened: self.config.security.restrict_access_to_local
                && self.config.security.honor_x_frame_options
                && self.config.security.enforce_content_security_policy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Browser;
    use super::BrowserConfig;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let values: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
            .collect();
        move |key| values.get(key).cloned()
    }

    fn browser() -> Browser {
        match Browser::new(BrowserConfig::default()) {
            Ok(browser) => browser,
            Err(error) => panic!("{error}"),
        }
    }

    #[test]
    fn defaults_are_hardened() {
        let browser = browser();
        let summary = browser.summary();
        assert_eq!(summary.open_pages, 0);
        assert!(summary.privacy_hardened);
        assert!(summary.security_hardened);
    }

    #[test]
    fn environment_overrides_apply() {
        let config = BrowserConfig::from_lookup(lookup(&[
            ("PIXELDUST_BLOCK_TRACKERS", "off"),
            ("PIXELDUST_MAX_FRAMES", " 12 "),
            ("PIXELDUST_ALLOW_POPUPS", "TRUE"),
        ]));
        let config = match config {
            Ok(config) => config,
            Err(error) => panic!("{error}"),
        };
        assert!(!config.privacy.block_known_trackers);
        assert_eq!(config.loader.max_frames_per_page, 12);
        assert!(config.loader.javascript_can_open_windows_automatically);
        assert_eq!(
            config.loader.back_forward_list_capacity,
            BrowserConfig::default().loader.back_forward_list_capacity
        );
    }

    #[test]
    fn malformed_or_invalid_overrides_are_rejected() {
        let error = BrowserConfig::from_lookup(lookup(&[("PIXELDUST_BLOCK_TRACKERS", "maybe")]));
        assert!(error.is_err_and(|error| error.code == "browser.config.invalid_env"));
        let error = BrowserConfig::from_lookup(lookup(&[("PIXELDUST_MAX_FRAMES", "0")]));
        assert!(error.is_err_and(|error| error.code == "loader.invalid_settings"));
    }

    #[test]
    fn pages_open_navigate_and_close() {
        let mut browser = browser();
        let page = browser.open_headless_page();
        assert_eq!(browser.summary().open_pages, 1);
        let frame = match browser.main_frame(page) {
            Ok(frame) => frame,
            Err(error) => panic!("{error}"),
        };
        assert!(
            browser
                .engine()
                .document(frame)
                .is_some_and(|document| document.url.as_str() == "about:blank")
        );

        assert!(browser.navigate(page, "not a url").is_err());
        assert!(browser.navigate(page, "http://example.test/").is_ok());
        assert!(
            browser
                .engine()
                .frame(frame)
                .is_some_and(|frame| frame.loader().provisional_document_loader().is_some())
        );

        assert!(browser.close_page(page).is_ok());
        assert_eq!(browser.summary().open_pages, 0);
        assert!(browser.navigate(page, "http://example.test/").is_err());
    }
}
