//! URL helpers shared by the loader and the DOM model.

use pd_core::BrowserError;
use pd_core::BrowserResult;
use url::Url;

pub const ABOUT_BLANK: &str = "about:blank";
pub const ABOUT_SRCDOC: &str = "about:srcdoc";

/// Parses an absolute URL.
pub fn parse_url(input: &str) -> BrowserResult<Url> {
    Url::parse(input.trim()).map_err(|error| {
        BrowserError::new(
            "net.url.invalid",
            format!("failed to parse URL `{input}`: {error}"),
        )
    })
}

/// Resolves `href` against `base` the way documents complete relative URLs.
pub fn resolve_url(base: &Url, href: &str) -> BrowserResult<Url> {
    base.join(href.trim()).map_err(|error| {
        BrowserError::new(
            "net.url.unresolvable",
            format!("failed to resolve `{href}` against `{base}`: {error}"),
        )
    })
}

pub fn blank_url() -> Url {
    match Url::parse(ABOUT_BLANK) {
        Ok(url) => url,
        Err(_) => unreachable!("about:blank is a valid URL"),
    }
}

pub fn srcdoc_url() -> Url {
    match Url::parse(ABOUT_SRCDOC) {
        Ok(url) => url,
        Err(_) => unreachable!("about:srcdoc is a valid URL"),
    }
}

pub fn is_about_blank(url: &Url) -> bool {
    url.as_str().eq_ignore_ascii_case(ABOUT_BLANK)
}

pub fn is_about_srcdoc(url: &Url) -> bool {
    url.as_str().eq_ignore_ascii_case(ABOUT_SRCDOC)
}

pub fn protocol_is(url: &Url, scheme: &str) -> bool {
    url.scheme().eq_ignore_ascii_case(scheme)
}

pub fn protocol_is_javascript(url: &Url) -> bool {
    protocol_is(url, "javascript")
}

pub fn protocol_is_in_http_family(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}

/// Compares everything before the `#`.
pub fn equal_ignoring_fragment(left: &Url, right: &Url) -> bool {
    url_without_fragment(left) == url_without_fragment(right)
}

pub fn url_without_fragment(url: &Url) -> &str {
    match url.as_str().find('#') {
        Some(index) => &url.as_str()[..index],
        None => url.as_str(),
    }
}

/// True when the URL carries a `#`, even an empty one.
pub fn has_fragment_identifier(url: &Url) -> bool {
    url.fragment().is_some()
}

/// Same scheme, host, and effective port.
pub fn same_origin(left: &Url, right: &Url) -> bool {
    left.scheme() == right.scheme()
        && left.host_str() == right.host_str()
        && left.port_or_known_default() == right.port_or_known_default()
}

/// Drops userinfo and fragment so the URL is safe to send as a referrer.
pub fn strip_for_referrer(url: &Url) -> Url {
    let mut stripped = url.clone();
    stripped.set_fragment(None);
    let _ = stripped.set_username("");
    let _ = stripped.set_password(None);
    stripped
}

/// Shortens long URLs for console messages.
pub fn elided(url: &Url) -> String {
    const MAX_LEN: usize = 200;
    let text = url.as_str();
    if text.len() <= MAX_LEN {
        return text.to_owned();
    }

    let mut cut = MAX_LEN / 2;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    let mut tail = text.len() - MAX_LEN / 2;
    while !text.is_char_boundary(tail) {
        tail += 1;
    }
    format!("{}...{}", &text[..cut], &text[tail..])
}

#[cfg(test)]
mod tests {
    use super::equal_ignoring_fragment;
    use super::has_fragment_identifier;
    use super::parse_url;
    use super::resolve_url;
    use super::same_origin;
    use super::strip_for_referrer;

    fn url(input: &str) -> url::Url {
        match parse_url(input) {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        }
    }

    #[test]
    fn fragment_is_ignored_when_comparing() {
        assert!(equal_ignoring_fragment(
            &url("http://a/1#foo"),
            &url("http://a/1#bar")
        ));
        assert!(!equal_ignoring_fragment(
            &url("http://a/1#foo"),
            &url("http://a/2#foo")
        ));
    }

    #[test]
    fn empty_fragment_still_counts_as_fragment() {
        assert!(has_fragment_identifier(&url("http://a/1#")));
        assert!(!has_fragment_identifier(&url("http://a/1")));
    }

    #[test]
    fn same_origin_checks_scheme_host_and_port() {
        assert!(same_origin(
            &url("https://example.com/a"),
            &url("https://example.com:443/b")
        ));
        assert!(!same_origin(
            &url("https://example.com/a"),
            &url("http://example.com/a")
        ));
    }

    #[test]
    fn referrer_strips_credentials_and_fragment() {
        let stripped = strip_for_referrer(&url("https://user:pw@example.com/p?q=1#frag"));
        assert_eq!(stripped.as_str(), "https://example.com/p?q=1");
    }

    #[test]
    fn resolves_relative_href() {
        let resolved = resolve_url(&url("http://a/dir/page"), "../other#x");
        assert!(resolved.is_ok());
        let resolved = match resolved {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };
        assert_eq!(resolved.as_str(), "http://a/other#x");
    }
}
