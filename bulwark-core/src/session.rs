//! Session settings exposed to other pipeline stages.
//!
//! Bulwark does not manage sessions. When an application runs a session
//! layer it can describe it here so that guards can align their own
//! lifetimes with the session's.

use std::time::Duration;

/// Default session timeout (30 minutes).
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Settings of the session layer in front of the guards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    /// Idle timeout of a session
    pub timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_SESSION_TIMEOUT,
        }
    }
}

impl SessionSettings {
    /// Create settings with the given session timeout.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}
