//! Security policy, origins, sandboxing, and framing protections.

pub mod csp;
pub mod origin;
pub mod sandbox;
pub mod x_frame_options;

use pd_core::BrowserError;
use pd_core::BrowserResult;
use url::Url;

pub use csp::ContentSecurityPolicy;
pub use origin::SecurityOrigin;
pub use sandbox::SandboxFlags;
pub use sandbox::parse_sandbox_policy;
pub use x_frame_options::XFrameOptionsDisposition;
pub use x_frame_options::parse_x_frame_options;

/// Central security policy for navigation and framing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityPolicy {
    pub restrict_access_to_local: bool,
    pub local_schemes: Vec<String>,
    pub display_isolated_schemes: Vec<String>,
    pub display_only_if_can_request_schemes: Vec<String>,
    pub honor_x_frame_options: bool,
    pub enforce_content_security_policy: bool,
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        Self {
            restrict_access_to_local: true,
            local_schemes: vec!["file".to_owned()],
            display_isolated_schemes: vec!["pixeldust".to_owned()],
            display_only_if_can_request_schemes: vec!["blob".to_owned(), "filesystem".to_owned()],
            honor_x_frame_options: true,
            enforce_content_security_policy: true,
        }
    }
}

impl SecurityPolicy {
    pub fn validate(&self) -> BrowserResult<()> {
        if !self.honor_x_frame_options && !self.enforce_content_security_policy {
            return Err(BrowserError::new(
                "security.invalid_policy",
                "at least one framing protection must stay enabled",
            ));
        }

        let all_schemes = self
            .local_schemes
            .iter()
            .chain(&self.display_isolated_schemes)
            .chain(&self.display_only_if_can_request_schemes);
        for scheme in all_schemes {
            if scheme.is_empty() || scheme.bytes().any(|byte| byte.is_ascii_uppercase()) {
                return Err(BrowserError::new(
                    "security.invalid_scheme",
                    format!("scheme `{scheme}` must be non-empty lowercase"),
                ));
            }
        }

        if self
            .local_schemes
            .iter()
            .any(|scheme| scheme == "http" || scheme == "https")
        {
            return Err(BrowserError::new(
                "security.invalid_policy",
                "network schemes cannot be treated as local",
            ));
        }

        Ok(())
    }

    pub fn is_local_scheme(&self, scheme: &str) -> bool {
        self.local_schemes
            .iter()
            .any(|local| local.eq_ignore_ascii_case(scheme))
    }

    pub fn can_load_local_resources(&self, origin: &SecurityOrigin) -> bool {
        !self.restrict_access_to_local || self.is_local_scheme(origin.scheme())
    }

    /// Whether a document with `origin` may display `url` in a frame it navigates.
    pub fn can_display(&self, origin: &SecurityOrigin, url: &Url) -> bool {
        let scheme = url.scheme();
        if contains_scheme(&self.display_only_if_can_request_schemes, scheme) {
            return origin.can_request(url);
        }
        if contains_scheme(&self.display_isolated_schemes, scheme) {
            return origin.scheme().eq_ignore_ascii_case(scheme);
        }
        if self.restrict_access_to_local && self.is_local_scheme(scheme) {
            return self.can_load_local_resources(origin);
        }
        true
    }
}

fn contains_scheme(schemes: &[String], scheme: &str) -> bool {
    schemes.iter().any(|known| known.eq_ignore_ascii_case(scheme))
}

#[cfg(test)]
mod tests {
    use super::SecurityOrigin;
    use super::SecurityPolicy;
    use url::Url;

    fn url(input: &str) -> Url {
        match Url::parse(input) {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        }
    }

    #[test]
    fn default_policy_is_valid() {
        assert!(SecurityPolicy::default().validate().is_ok());
    }

    #[test]
    fn rejects_disabling_all_framing_protection() {
        let policy = SecurityPolicy {
            honor_x_frame_options: false,
            enforce_content_security_policy: false,
            ..SecurityPolicy::default()
        };
        assert!(policy.validate().is_err());
    }

    #[test]
    fn rejects_network_scheme_as_local() {
        let mut policy = SecurityPolicy::default();
        policy.local_schemes.push("https".to_owned());
        assert!(policy.validate().is_err());
    }

    #[test]
    fn remote_documents_cannot_display_local_files() {
        let policy = SecurityPolicy::default();
        let remote = SecurityOrigin::create(&url("https://example.com/"));
        let local = SecurityOrigin::create(&url("file:///home/user/index.html"));
        let target = url("file:///etc/passwd");

        assert!(!policy.can_display(&remote, &target));
        assert!(policy.can_display(&local, &target));
        assert!(policy.can_display(&remote, &url("https://other.example/")));
    }

    #[test]
    fn display_isolated_scheme_requires_same_scheme() {
        let policy = SecurityPolicy::default();
        let remote = SecurityOrigin::create(&url("https://example.com/"));
        let internal = SecurityOrigin::create(&url("pixeldust://settings/"));
        let target = url("pixeldust://history/");
        assert!(!policy.can_display(&remote, &target));
        assert!(policy.can_display(&internal, &target));
    }
}
