//! Content-Security-Policy directives that gate framing and navigation.
//!
//! Only `frame-ancestors`, `frame-src`, `form-action`, and the
//! `default-src` fallback are understood; other directives are ignored.

use url::Url;

/// Enforced policy set for one document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContentSecurityPolicy {
    policies: Vec<Policy>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct Policy {
    default_src: Option<SourceList>,
    frame_src: Option<SourceList>,
    frame_ancestors: Option<SourceList>,
    form_action: Option<SourceList>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct SourceList {
    allow_self: bool,
    allow_star: bool,
    sources: Vec<Source>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Source {
    scheme: Option<String>,
    host: Option<String>,
    host_wildcard: bool,
    port: Option<PortMatch>,
    path: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PortMatch {
    Any,
    Exact(u16),
}

impl ContentSecurityPolicy {
    /// Parses the (possibly comma-joined) `Content-Security-Policy` header value.
    pub fn parse(header: &str) -> Self {
        let policies = header
            .split(',')
            .map(Policy::parse)
            .filter(|policy| *policy != Policy::default())
            .collect();
        Self { policies }
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// `frame-src` (or `default-src`) check for a child frame navigation.
    pub fn allows_child_frame_from(&self, url: &Url, protected: &Url) -> bool {
        self.policies.iter().all(|policy| {
            policy
                .frame_src
                .as_ref()
                .or(policy.default_src.as_ref())
                .is_none_or(|list| list.matches(url, protected))
        })
    }

    pub fn allows_form_action(&self, url: &Url, protected: &Url) -> bool {
        self.policies.iter().all(|policy| {
            policy
                .form_action
                .as_ref()
                .is_none_or(|list| list.matches(url, protected))
        })
    }

    /// `frame-ancestors` check; `ancestors` lists the embedding documents' URLs, nearest first.
    pub fn allows_ancestors(&self, ancestors: &[Url], protected: &Url) -> bool {
        self.policies.iter().all(|policy| {
            policy.frame_ancestors.as_ref().is_none_or(|list| {
                ancestors
                    .iter()
                    .all(|ancestor| list.matches(ancestor, protected))
            })
        })
    }
}

impl Policy {
    fn parse(text: &str) -> Self {
        let mut policy = Self::default();
        for directive in text.split(';') {
            let mut tokens = directive.split_ascii_whitespace();
            let Some(name) = tokens.next() else {
                continue;
            };
            let slot = match name.to_ascii_lowercase().as_str() {
                "default-src" => &mut policy.default_src,
                "frame-src" | "child-src" => &mut policy.frame_src,
                "frame-ancestors" => &mut policy.frame_ancestors,
                "form-action" => &mut policy.form_action,
                _ => continue,
            };
            // The first occurrence of a directive wins.
            if slot.is_none() {
                *slot = Some(SourceList::parse(tokens));
            }
        }
        policy
    }
}

impl SourceList {
    fn parse<'a>(tokens: impl Iterator<Item = &'a str>) -> Self {
        let mut list = Self::default();
        let tokens = tokens.collect::<Vec<_>>();
        if tokens.len() == 1 && tokens[0].eq_ignore_ascii_case("'none'") {
            return list;
        }

        for token in tokens {
            if token.eq_ignore_ascii_case("'self'") {
                list.allow_self = true;
            } else if token == "*" {
                list.allow_star = true;
            } else if let Some(source) = Source::parse(token) {
                list.sources.push(source);
            }
        }
        list
    }

    fn matches(&self, url: &Url, protected: &Url) -> bool {
        if self.allow_star && !matches!(url.scheme(), "data" | "blob" | "filesystem") {
            return true;
        }
        if self.allow_self && url.origin().is_tuple() && url.origin() == protected.origin() {
            return true;
        }
        self.sources
            .iter()
            .any(|source| source.matches(url, protected))
    }
}

impl Source {
    fn parse(token: &str) -> Option<Self> {
        if token.starts_with('\'') {
            return None;
        }

        let (scheme, rest) = match token.find("://") {
            Some(index) => (Some(token[..index].to_ascii_lowercase()), &token[index + 3..]),
            None => match token.strip_suffix(':') {
                Some(scheme) if !scheme.contains('/') => {
                    return Some(Self {
                        scheme: Some(scheme.to_ascii_lowercase()),
                        host: None,
                        host_wildcard: false,
                        port: None,
                        path: None,
                    });
                }
                _ => (None, token),
            },
        };

        let (authority, path) = match rest.find('/') {
            Some(index) => (&rest[..index], Some(rest[index..].to_owned())),
            None => (rest, None),
        };
        let (host, port) = match authority.rsplit_once(':') {
            Some((host, "*")) => (host, Some(PortMatch::Any)),
            Some((host, port)) => (host, Some(PortMatch::Exact(port.parse().ok()?))),
            None => (authority, None),
        };
        if host.is_empty() {
            return None;
        }

        let (host, host_wildcard) = match host.strip_prefix("*.") {
            Some(suffix) => (suffix, true),
            None if host == "*" => ("", true),
            None => (host, false),
        };

        Some(Self {
            scheme,
            host: Some(host.to_ascii_lowercase()),
            host_wildcard,
            port,
            path,
        })
    }

    fn matches(&self, url: &Url, protected: &Url) -> bool {
        let scheme_ok = match &self.scheme {
            Some(scheme) => url.scheme() == scheme,
            None => {
                url.scheme() == protected.scheme()
                    || (protected.scheme() == "http" && url.scheme() == "https")
            }
        };
        if !scheme_ok {
            return false;
        }

        let Some(host) = &self.host else {
            return true;
        };
        let Some(url_host) = url.host_str() else {
            return false;
        };
        let url_host = url_host.to_ascii_lowercase();
        let host_ok = if self.host_wildcard {
            host.is_empty() || url_host.ends_with(&format!(".{host}"))
        } else {
            url_host == *host
        };
        if !host_ok {
            return false;
        }

        let port_ok = match self.port {
            Some(PortMatch::Any) => true,
            Some(PortMatch::Exact(port)) => url.port_or_known_default() == Some(port),
            None => url.port().is_none(),
        };
        if !port_ok {
            return false;
        }

        match &self.path {
            None => true,
            Some(path) if path.ends_with('/') => url.path().starts_with(path.as_str()),
            Some(path) => url.path() == path,
        }
    }
}
