//! HTTP server configuration

use serde::Deserialize;

/// Configuration for the notification settings HTTP server
///
/// ```ron
/// http: (
///     listen_address: "[::]:8080",
///     enforce_test_gate: true,
/// ),
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HttpConfig {
    /// Address to bind to
    ///
    /// Default: `[::]:8080`
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// Refuse saves whose exact fields have not passed a test send for the
    /// same form.
    ///
    /// Default: `false`
    #[serde(default)]
    pub enforce_test_gate: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            enforce_test_gate: false,
        }
    }
}

fn default_listen_address() -> String {
    "[::]:8080".to_string()
}
