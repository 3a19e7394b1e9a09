//! Security origins for documents and requests.

use url::Origin;
use url::Url;

/// Origin of a document, plus the scheme it was derived from.
///
/// Opaque origins compare equal only to clones of themselves, which is what
/// "fresh unique origin" means for sandboxed and blocked documents.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SecurityOrigin {
    origin: Origin,
    scheme: String,
}

impl SecurityOrigin {
    pub fn create(url: &Url) -> Self {
        Self {
            origin: url.origin(),
            scheme: url.scheme().to_ascii_lowercase(),
        }
    }

    pub fn create_unique() -> Self {
        Self {
            origin: Origin::new_opaque(),
            scheme: String::new(),
        }
    }

    /// Parses a serialized origin or referrer; anything unparsable is unique.
    pub fn from_string(value: &str) -> Self {
        match Url::parse(value) {
            Ok(url) => Self::create(&url),
            Err(_) => Self::create_unique(),
        }
    }

    pub fn is_unique(&self) -> bool {
        !self.origin.is_tuple()
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host(&self) -> Option<String> {
        match &self.origin {
            Origin::Tuple(_, host, _) => Some(host.to_string()),
            Origin::Opaque(_) => None,
        }
    }

    pub fn can_access(&self, other: &SecurityOrigin) -> bool {
        self.origin == other.origin
    }

    pub fn is_same_scheme_host_port(&self, other: &SecurityOrigin) -> bool {
        self.origin.is_tuple() && self.origin == other.origin
    }

    pub fn can_request(&self, url: &Url) -> bool {
        self.origin.is_tuple() && self.origin == url.origin()
    }

    /// Value for an `Origin` header; unique origins serialize as `null`.
    pub fn to_header_value(&self) -> String {
        self.origin.ascii_serialization()
    }
}

#[cfg(test)]
mod tests {
    use super::SecurityOrigin;
    use url::Url;

    fn url(input: &str) -> Url {
        match Url::parse(input) {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        }
    }

    #[test]
    fn tuple_origins_compare_by_scheme_host_port() {
        let a = SecurityOrigin::create(&url("https://example.com/a"));
        let b = SecurityOrigin::create(&url("https://example.com:443/b"));
        let c = SecurityOrigin::create(&url("http://example.com/"));
        assert!(a.can_access(&b));
        assert!(!a.can_access(&c));
        assert!(a.can_request(&url("https://example.com/other")));
        assert_eq!(a.to_header_value(), "https://example.com");
    }

    #[test]
    fn unique_origins_only_match_themselves() {
        let unique = SecurityOrigin::create_unique();
        let copy = unique.clone();
        assert!(unique.is_unique());
        assert!(unique.can_access(&copy));
        assert!(!unique.can_access(&SecurityOrigin::create_unique()));
        assert!(!unique.can_request(&url("https://example.com/")));
        assert_eq!(unique.to_header_value(), "null");
    }

    #[test]
    fn unparsable_referrer_yields_unique_origin() {
        assert!(SecurityOrigin::from_string("").is_unique());
        assert!(!SecurityOrigin::from_string("http://a/page").is_unique());
    }
}
