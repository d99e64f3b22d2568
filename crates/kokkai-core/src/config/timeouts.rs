//! Centralized timeout configuration
//!
//! Default timeout values for network operations. The stream timeout can be
//! overridden through [`Config`](super::Config).

use std::time::Duration;

/// Default timeout values for streaming operations
pub mod stream {
    use super::*;

    /// Hard wall-clock budget for one server-push stream (40 seconds).
    /// A stream that exceeds it is force-closed and silently abandoned.
    pub const HARD_SECS: u64 = 40;

    /// Get the hard stream timeout as Duration
    pub fn hard_timeout() -> Duration {
        Duration::from_secs(HARD_SECS)
    }
}

/// Default timeout values for plain HTTP requests
pub mod http {
    use super::*;

    /// Default timeout for the auth settings fetch (10 seconds)
    pub const AUTH_SETTINGS_SECS: u64 = 10;

    /// Get the auth settings fetch timeout as Duration
    pub fn auth_settings_timeout() -> Duration {
        Duration::from_secs(AUTH_SETTINGS_SECS)
    }
}
