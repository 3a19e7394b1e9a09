//! `X-Frame-Options` response header parsing.

/// Parsed disposition of an `X-Frame-Options` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XFrameOptionsDisposition {
    None,
    Deny,
    SameOrigin,
    AllowAll,
    Invalid,
    Conflict,
}

/// Repeated headers arrive comma-joined; differing values are a conflict.
pub fn parse_x_frame_options(header: &str) -> XFrameOptionsDisposition {
    let mut result = XFrameOptionsDisposition::None;
    if header.trim().is_empty() {
        return result;
    }

    for value in header.split(',') {
        let value = value.trim();
        let current = if value.eq_ignore_ascii_case("deny") {
            XFrameOptionsDisposition::Deny
        } else if value.eq_ignore_ascii_case("sameorigin") {
            XFrameOptionsDisposition::SameOrigin
        } else if value.eq_ignore_ascii_case("allowall") {
            XFrameOptionsDisposition::AllowAll
        } else {
            XFrameOptionsDisposition::Invalid
        };

        if result == XFrameOptionsDisposition::None {
            result = current;
        } else if result != current {
            return XFrameOptionsDisposition::Conflict;
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::XFrameOptionsDisposition;
    use super::parse_x_frame_options;

    #[test]
    fn parses_single_values() {
        assert_eq!(parse_x_frame_options("DENY"), XFrameOptionsDisposition::Deny);
        assert_eq!(
            parse_x_frame_options(" sameOrigin "),
            XFrameOptionsDisposition::SameOrigin
        );
        assert_eq!(parse_x_frame_options(""), XFrameOptionsDisposition::None);
        assert_eq!(
            parse_x_frame_options("allow-from https://a/"),
            XFrameOptionsDisposition::Invalid
        );
    }

    #[test]
    fn repeated_values_must_agree() {
        assert_eq!(
            parse_x_frame_options("deny, DENY"),
            XFrameOptionsDisposition::Deny
        );
        assert_eq!(
            parse_x_frame_options("deny, sameorigin"),
            XFrameOptionsDisposition::Conflict
        );
    }
}
