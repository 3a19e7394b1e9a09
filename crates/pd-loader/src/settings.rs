//! Loader feature switches and limits.

use pd_core::BrowserError;
use pd_core::BrowserResult;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderSettings {
    pub dialog_element_enabled: bool,
    pub javascript_can_open_windows_automatically: bool,
    pub before_unload_dialogs_enabled: bool,
    pub max_frames_per_page: usize,
    pub back_forward_list_capacity: usize,
    /// Schemes whose documents are synthesized empty instead of fetched.
    pub empty_document_schemes: Vec<String>,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            dialog_element_enabled: true,
            javascript_can_open_windows_automatically: false,
            before_unload_dialogs_enabled: true,
            max_frames_per_page: 1000,
            back_forward_list_capacity: 100,
            empty_document_schemes: vec!["about".to_owned()],
        }
    }
}

impl LoaderSettings {
    pub fn validate(&self) -> BrowserResult<()> {
        if self.max_frames_per_page == 0 {
            return Err(BrowserError::new(
                "loader.invalid_settings",
                "max_frames_per_page must be at least 1",
            ));
        }
        if self.back_forward_list_capacity == 0 {
            return Err(BrowserError::new(
                "loader.invalid_settings",
                "back_forward_list_capacity must be at least 1",
            ));
        }
        if let Some(scheme) = self
            .empty_document_schemes
            .iter()
            .find(|scheme| scheme.is_empty() || scheme.bytes().any(|byte| byte.is_ascii_uppercase()))
        {
            return Err(BrowserError::new(
                "loader.invalid_settings",
                format!("empty-document scheme `{scheme}` must be non-empty lowercase"),
            ));
        }
        Ok(())
    }

    pub fn should_load_url_as_empty_document(&self, url: &Url) -> bool {
        self.empty_document_schemes
            .iter()
            .any(|scheme| scheme == url.scheme())
    }
}
