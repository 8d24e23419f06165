//! Shell configuration.
//!
//! Connection and presentation settings live on one explicit struct that is
//! constructed once in `main` from flags and environment, then passed into
//! the session and command-tree builders.

use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ShellConfig {
    /// Base URL of the configuration API. Empty means unconfigured.
    pub api_url: String,
    /// API token sent as a bearer credential, if any.
    pub api_token: Option<String>,
    /// Default namespace override. Empty means unset.
    pub namespace: String,
    /// Timeout for dispatched API commands.
    pub request_timeout: Duration,
    /// Timeout for completion lookups; bounded so the prompt stays live.
    pub completion_timeout: Duration,
    /// Whether to emit color (banner, prompt).
    pub color: bool,
    /// Where history is persisted.
    pub history_path: PathBuf,
}

impl ShellConfig {
    pub fn history_path_default() -> PathBuf {
        match dirs::home_dir() {
            Some(home) => home.join(".edgesh_history"),
            None => PathBuf::from(".edgesh_history"),
        }
    }
}

impl Default for ShellConfig {
    fn default() -> Self {
        ShellConfig {
            api_url: String::new(),
            api_token: None,
            namespace: String::new(),
            request_timeout: Duration::from_secs(30),
            completion_timeout: Duration::from_secs(3),
            color: true,
            history_path: Self::history_path_default(),
        }
    }
}
