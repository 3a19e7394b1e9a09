//! Resource request contract used for main-resource navigations.

use crate::form_data::FormData;
use crate::http::HeaderList;
use crate::http::HttpMethod;
use url::Url;

/// Cache behaviour requested by a navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    #[default]
    UseProtocolCachePolicy,
    ReloadIgnoringCacheData,
    ReturnCacheDataElseLoad,
    ReturnCacheDataDontLoad,
}

/// Outgoing request for a document's main resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRequest {
    pub url: Url,
    pub method: HttpMethod,
    pub headers: HeaderList,
    pub body: Option<FormData>,
    pub cache_policy: CachePolicy,
    pub first_party_for_cookies: Option<Url>,
}

impl ResourceRequest {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            method: HttpMethod::Get,
            headers: HeaderList::new(),
            body: None,
            cache_policy: CachePolicy::UseProtocolCachePolicy,
            first_party_for_cookies: None,
        }
    }

    pub fn with_referrer(url: Url, referrer: Option<&str>) -> Self {
        let mut request = Self::new(url);
        if let Some(referrer) = referrer {
            request.set_http_referrer(referrer);
        }
        request
    }

    pub fn is_post(&self) -> bool {
        self.method == HttpMethod::Post
    }

    pub fn http_referrer(&self) -> Option<&str> {
        self.headers.get("Referer").filter(|value| !value.is_empty())
    }

    /// Invalid header values are dropped rather than sent.
    pub fn set_http_referrer(&mut self, referrer: &str) {
        if referrer.is_empty() || self.headers.set("Referer", referrer).is_err() {
            self.clear_http_referrer();
        }
    }

    pub fn clear_http_referrer(&mut self) {
        self.headers.remove("Referer");
    }

    pub fn http_origin(&self) -> Option<&str> {
        self.headers.get("Origin").filter(|value| !value.is_empty())
    }

    pub fn set_http_origin(&mut self, origin: &str) {
        if self.headers.set("Origin", origin).is_err() {
            self.headers.remove("Origin");
        }
    }

    pub fn http_content_type(&self) -> Option<&str> {
        self.headers.get("Content-Type")
    }

    pub fn set_http_content_type(&mut self, content_type: &str) {
        if self.headers.set("Content-Type", content_type).is_err() {
            self.headers.remove("Content-Type");
        }
    }
}
