//! Main-resource responses and load errors.

use crate::http::HeaderList;
use crate::http::HttpStatusCode;
use core::fmt;
use url::Url;

/// Error domain used for cancellations issued by the loader itself.
pub const LOADER_ERROR_DOMAIN: &str = "pixeldust.loader";
pub const NETWORK_ERROR_DOMAIN: &str = "pixeldust.net";

pub const ERROR_CANCELLED: i32 = -3;
pub const ERROR_BLOCKED_BY_RESPONSE: i32 = -20;
pub const ERROR_FAILED: i32 = -2;

/// Response metadata for a document's main resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceResponse {
    pub url: Url,
    pub status: HttpStatusCode,
    pub mime_type: String,
    pub text_encoding_name: Option<String>,
    pub headers: HeaderList,
}

impl ResourceResponse {
    pub fn new(url: Url, mime_type: &str) -> Self {
        Self {
            url,
            status: HttpStatusCode::OK,
            mime_type: mime_type.to_ascii_lowercase(),
            text_encoding_name: None,
            headers: HeaderList::new(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn is_http(&self) -> bool {
        matches!(self.url.scheme(), "http" | "https")
    }

    /// `Content-Disposition: attachment` asks for a download.
    pub fn is_attachment(&self) -> bool {
        self.headers
            .get("Content-Disposition")
            .and_then(|value| value.split(';').next())
            .is_some_and(|kind| kind.trim().eq_ignore_ascii_case("attachment"))
    }
}

/// Failure reported for a main-resource load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceError {
    pub domain: &'static str,
    pub code: i32,
    pub failing_url: Option<Url>,
    pub description: String,
    pub is_cancellation: bool,
}

impl ResourceError {
    pub fn new(domain: &'static str, code: i32, failing_url: Option<Url>, description: &str) -> Self {
        Self {
            domain,
            code,
            failing_url,
            description: description.to_owned(),
            is_cancellation: false,
        }
    }

    pub fn cancelled(failing_url: Option<Url>) -> Self {
        Self {
            domain: LOADER_ERROR_DOMAIN,
            code: ERROR_CANCELLED,
            failing_url,
            description: "the load was cancelled".to_owned(),
            is_cancellation: true,
        }
    }

    pub fn network(failing_url: Option<Url>, description: &str) -> Self {
        Self::new(NETWORK_ERROR_DOMAIN, ERROR_FAILED, failing_url, description)
    }

    pub fn blocked_by_response(failing_url: Option<Url>, description: &str) -> Self {
        Self::new(
            LOADER_ERROR_DOMAIN,
            ERROR_BLOCKED_BY_RESPONSE,
            failing_url,
            description,
        )
    }

    /// Matches the loader's own cancellation error by domain and code.
    pub fn is_loader_cancellation(&self) -> bool {
        self.domain == LOADER_ERROR_DOMAIN && self.code == ERROR_CANCELLED
    }
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.failing_url {
            Some(url) => write!(
                f,
                "{} ({}) loading {url}: {}",
                self.domain, self.code, self.description
            ),
            None => write!(f, "{} ({}): {}", self.domain, self.code, self.description),
        }
    }
}
