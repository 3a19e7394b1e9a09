//! Privacy-first defaults: referrer policy, Origin headers, and tracker blocking.

use pd_core::BrowserError;
use pd_core::BrowserResult;
use pd_net::ResourceRequest;
use pd_net::url::same_origin;
use pd_net::url::strip_for_referrer;
use url::Url;

const KNOWN_TRACKER_SUFFIXES: &[&str] = &[
    "doubleclick.net",
    "googlesyndication.com",
    "google-analytics.com",
    "googletagmanager.com",
    "facebook.net",
    "facebook.com",
];

/// Referrer policy of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferrerPolicy {
    Always,
    #[default]
    Default,
    NoReferrerWhenDowngrade,
    Never,
    Origin,
    OriginWhenCrossOrigin,
}

impl ReferrerPolicy {
    /// Parses a `<meta name=referrer>` or `Referrer-Policy` token.
    pub fn parse(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "always" | "unsafe-url" => Some(Self::Always),
            "default" => Some(Self::Default),
            "no-referrer-when-downgrade" => Some(Self::NoReferrerWhenDowngrade),
            "never" | "no-referrer" => Some(Self::Never),
            "origin" => Some(Self::Origin),
            "origin-when-crossorigin" | "origin-when-cross-origin" => {
                Some(Self::OriginWhenCrossOrigin)
            }
            _ => None,
        }
    }
}

/// Whether a navigation request carries a referrer (and so may keep an opener).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShouldSendReferrer {
    Always,
    Never,
    #[default]
    Maybe,
}

/// Global privacy policy enabled at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivacyPolicy {
    pub strip_referrer_cross_origin: bool,
    pub block_known_trackers: bool,
    pub send_origin_header_for_unsafe_methods: bool,
}

impl Default for PrivacyPolicy {
    fn default() -> Self {
        Self {
            strip_referrer_cross_origin: true,
            block_known_trackers: true,
            send_origin_header_for_unsafe_methods: true,
        }
    }
}

impl PrivacyPolicy {
    pub fn validate(&self) -> BrowserResult<()> {
        if !self.send_origin_header_for_unsafe_methods && !self.strip_referrer_cross_origin {
            return Err(BrowserError::new(
                "privacy.invalid_policy",
                "disabling Origin headers requires cross-origin referrer stripping",
            ));
        }
        Ok(())
    }

    /// Returns true if this host should be blocked by tracker protection.
    pub fn should_block_host(&self, host: &str) -> bool {
        if !self.block_known_trackers {
            return false;
        }

        let normalized = host.trim().trim_end_matches('.').to_ascii_lowercase();
        if normalized.is_empty() {
            return false;
        }

        KNOWN_TRACKER_SUFFIXES
            .iter()
            .any(|suffix| normalized == *suffix || normalized.ends_with(&format!(".{suffix}")))
    }

    pub fn should_block_url(&self, url: &Url) -> bool {
        url.host_str()
            .is_some_and(|host| self.should_block_host(host))
    }

    /// Adds an `Origin` header to unsafe-method requests that lack one.
    ///
    /// An empty `origin` is sent as `null`.
    pub fn add_http_origin_if_needed(&self, request: &mut ResourceRequest, origin: &str) {
        if !self.send_origin_header_for_unsafe_methods
            || request.http_origin().is_some()
            || request.method.is_get_or_head()
        {
            return;
        }
        let origin = if origin.is_empty() { "null" } else { origin };
        request.set_http_origin(origin);
    }

    /// Referrer to send when a document at `referrer` navigates to `target`.
    ///
    /// Returns `None` when no `Referer` header should be sent.
    pub fn generate_referrer_header(
        &self,
        policy: ReferrerPolicy,
        target: &Url,
        referrer: Option<&Url>,
    ) -> Option<String> {
        let referrer = referrer?;
        if !matches!(referrer.scheme(), "http" | "https") {
            return None;
        }

        let full = strip_for_referrer(referrer);
        let origin_only = || format!("{}/", referrer.origin().ascii_serialization());
        let cross_origin = !same_origin(referrer, target);

        let value = match policy {
            ReferrerPolicy::Never => return None,
            ReferrerPolicy::Origin => return Some(origin_only()),
            ReferrerPolicy::OriginWhenCrossOrigin if cross_origin => return Some(origin_only()),
            ReferrerPolicy::Always | ReferrerPolicy::OriginWhenCrossOrigin => full.to_string(),
            ReferrerPolicy::Default | ReferrerPolicy::NoReferrerWhenDowngrade => {
                if referrer.scheme() == "https" && target.scheme() != "https" {
                    return None;
                }
                full.to_string()
            }
        };

        if cross_origin && self.strip_referrer_cross_origin {
            return Some(origin_only());
        }
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::PrivacyPolicy;
    use super::ReferrerPolicy;
    use pd_net::HttpMethod;
    use pd_net::ResourceRequest;
    use url::Url;

    fn url(input: &str) -> Url {
        match Url::parse(input) {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        }
    }

    #[test]
    fn blocks_known_tracker_hosts() {
        let policy = PrivacyPolicy::default();
        assert!(policy.should_block_host("stats.google-analytics.com"));
        assert!(policy.should_block_host("doubleclick.net"));
        assert!(policy.should_block_url(&url("https://ad.doubleclick.net/frame")));
        assert!(!policy.should_block_url(&url("about:blank")));
    }

    #[test]
    fn ignores_hosts_when_tracker_blocking_disabled() {
        let mut policy = PrivacyPolicy::default();
        policy.block_known_trackers = false;
        assert!(!policy.should_block_host("doubleclick.net"));
    }

    #[test]
    fn parses_referrer_policy_tokens() {
        assert_eq!(ReferrerPolicy::parse("no-referrer"), Some(ReferrerPolicy::Never));
        assert_eq!(ReferrerPolicy::parse(" ORIGIN "), Some(ReferrerPolicy::Origin));
        assert_eq!(ReferrerPolicy::parse("bogus"), None);
    }

    #[test]
    fn default_policy_hides_referrer_on_downgrade() {
        let policy = PrivacyPolicy::default();
        let referrer = url("https://a.example/page#frag");
        assert_eq!(
            policy.generate_referrer_header(
                ReferrerPolicy::Default,
                &url("http://a.example/"),
                Some(&referrer)
            ),
            None
        );
        assert_eq!(
            policy.generate_referrer_header(
                ReferrerPolicy::Default,
                &url("https://a.example/next"),
                Some(&referrer)
            ),
            Some("https://a.example/page".to_owned())
        );
    }

    #[test]
    fn cross_origin_referrer_is_reduced_to_origin() {
        let referrer = url("https://a.example/secret/path");
        let target = url("https://b.example/");

        let strict = PrivacyPolicy::default();
        assert_eq!(
            strict.generate_referrer_header(ReferrerPolicy::Always, &target, Some(&referrer)),
            Some("https://a.example/".to_owned())
        );

        let relaxed = PrivacyPolicy {
            strip_referrer_cross_origin: false,
            ..PrivacyPolicy::default()
        };
        assert_eq!(
            relaxed.generate_referrer_header(ReferrerPolicy::Always, &target, Some(&referrer)),
            Some("https://a.example/secret/path".to_owned())
        );
        assert_eq!(
            relaxed.generate_referrer_header(ReferrerPolicy::Never, &target, Some(&referrer)),
            None
        );
    }

    #[test]
    fn non_http_referrers_are_never_sent() {
        let policy = PrivacyPolicy::default();
        assert_eq!(
            policy.generate_referrer_header(
                ReferrerPolicy::Always,
                &url("https://b.example/"),
                Some(&url("about:blank"))
            ),
            None
        );
    }

    #[test]
    fn origin_header_only_for_unsafe_methods() {
        let policy = PrivacyPolicy::default();
        let mut get = ResourceRequest::new(url("https://b.example/"));
        policy.add_http_origin_if_needed(&mut get, "https://a.example");
        assert_eq!(get.http_origin(), None);

        let mut post = ResourceRequest::new(url("https://b.example/"));
        post.method = HttpMethod::Post;
        policy.add_http_origin_if_needed(&mut post, "");
        assert_eq!(post.http_origin(), Some("null"));
        policy.add_http_origin_if_needed(&mut post, "https://a.example");
        assert_eq!(post.http_origin(), Some("null"));
    }

    #[test]
    fn rejects_incoherent_policy() {
        let policy = PrivacyPolicy {
            strip_referrer_cross_origin: false,
            send_origin_header_for_unsafe_methods: false,
            ..PrivacyPolicy::default()
        };
        assert!(policy.validate().is_err());
    }
}
