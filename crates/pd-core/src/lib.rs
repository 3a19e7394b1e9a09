//! Shared primitives used across PixelDust crates.

use core::fmt;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

/// Result alias used across the workspace.
pub type BrowserResult<T> = Result<T, BrowserError>;

/// Top-level error type shared by every crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserError {
    pub code: &'static str,
    pub message: String,
}

impl BrowserError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for BrowserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for BrowserError {}

/// Monotonically increasing 64-bit identifiers.
///
/// Seeded from wall-clock microseconds so identifiers stay unique across
/// restarts of a process that persists them (history sequence numbers,
/// form submission identifiers). One source is owned by each engine; there
/// is no process-wide static.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierSource {
    last: i64,
}

impl IdentifierSource {
    pub fn time_seeded() -> Self {
        let micros = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_micros())
            .unwrap_or(0);
        Self::starting_after(i64::try_from(micros).unwrap_or(i64::MAX / 2))
    }

    /// The first identifier handed out is `seed + 1`.
    pub fn starting_after(seed: i64) -> Self {
        Self { last: seed }
    }

    pub fn next_id(&mut self) -> i64 {
        self.last = self.last.saturating_add(1);
        self.last
    }

    pub fn last_issued(&self) -> i64 {
        self.last
    }
}

impl Default for IdentifierSource {
    fn default() -> Self {
        Self::time_seeded()
    }
}
