//! Iframe sandbox flags.

use bitflags::bitflags;

bitflags! {
    /// Restrictions applied to a sandboxed browsing context.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SandboxFlags: u32 {
        const NAVIGATION = 1;
        const PLUGINS = 1 << 1;
        const ORIGIN = 1 << 2;
        const FORMS = 1 << 3;
        const SCRIPTS = 1 << 4;
        const TOP_NAVIGATION = 1 << 5;
        const POPUPS = 1 << 6;
        const AUTOMATIC_FEATURES = 1 << 7;
        const POINTER_LOCK = 1 << 8;
    }
}

/// Parses a `sandbox` attribute value, returning the flags and any unknown tokens.
pub fn parse_sandbox_policy(policy: &str) -> (SandboxFlags, Vec<String>) {
    let mut flags = SandboxFlags::all();
    let mut invalid = Vec::new();

    for token in policy.split_ascii_whitespace() {
        match token.to_ascii_lowercase().as_str() {
            "allow-same-origin" => flags.remove(SandboxFlags::ORIGIN),
            "allow-forms" => flags.remove(SandboxFlags::FORMS),
            "allow-scripts" => {
                flags.remove(SandboxFlags::SCRIPTS);
                flags.remove(SandboxFlags::AUTOMATIC_FEATURES);
            }
            "allow-top-navigation" => flags.remove(SandboxFlags::TOP_NAVIGATION),
            "allow-popups" => flags.remove(SandboxFlags::POPUPS),
            "allow-pointer-lock" => flags.remove(SandboxFlags::POINTER_LOCK),
            _ => invalid.push(token.to_owned()),
        }
    }

    (flags, invalid)
}
