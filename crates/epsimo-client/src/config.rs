//! Client configuration types.

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the platform client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Backend base URL (e.g., `http://localhost:8100`).
    pub backend_url: String,

    /// Where the session (token, anonymous id, project hint) is persisted.
    /// `None` selects the platform config directory.
    pub session_path: Option<PathBuf>,

    /// Credit counter refresh period in seconds.
    pub poll_interval_seconds: u64,
}

impl ClientConfig {
    fn default_backend_url() -> String {
        "http://localhost:8100".to_string()
    }

    const fn default_poll_interval() -> u64 {
        5
    }

    /// Get the credit poll period as a `Duration`.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds.max(1))
    }

    /// URL the user opens in a browser to start Google sign-in.
    #[must_use]
    pub fn google_login_url(&self) -> String {
        format!(
            "{}/auth/google/login",
            self.backend_url.trim_end_matches('/')
        )
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend_url: Self::default_backend_url(),
            session_path: None,
            poll_interval_seconds: Self::default_poll_interval(),
        }
    }
}
