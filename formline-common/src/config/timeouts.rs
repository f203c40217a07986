//! Timeouts for each stage of an outbound SMTP conversation.
//!
//! A test send walks through connect, greeting, EHLO, STARTTLS, AUTH, the
//! envelope, DATA and QUIT. Each stage gets its own bound so a stalled server
//! fails the test instead of holding the request open.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Client-side SMTP timeout configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientTimeouts {
    /// Timeout for establishing the TCP (or implicit TLS) connection and
    /// reading the greeting.
    ///
    /// Default: 15 seconds
    #[serde(default = "defaults::connect_secs")]
    pub connect_secs: u64,

    /// Timeout for EHLO.
    ///
    /// Default: 15 seconds
    #[serde(default = "defaults::ehlo_secs")]
    pub ehlo_secs: u64,

    /// Timeout for STARTTLS and the TLS handshake.
    ///
    /// Default: 15 seconds
    #[serde(default = "defaults::starttls_secs")]
    pub starttls_secs: u64,

    /// Timeout for the whole AUTH exchange.
    ///
    /// Default: 20 seconds
    #[serde(default = "defaults::auth_secs")]
    pub auth_secs: u64,

    /// Timeout for MAIL FROM and RCPT TO.
    ///
    /// Default: 15 seconds
    #[serde(default = "defaults::envelope_secs")]
    pub envelope_secs: u64,

    /// Timeout for DATA and the message transfer.
    ///
    /// Default: 60 seconds
    #[serde(default = "defaults::data_secs")]
    pub data_secs: u64,

    /// Timeout for QUIT. A late QUIT does not fail the test.
    ///
    /// Default: 5 seconds
    #[serde(default = "defaults::quit_secs")]
    pub quit_secs: u64,
}

impl ClientTimeouts {
    #[must_use]
    pub const fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    #[must_use]
    pub const fn ehlo(&self) -> Duration {
        Duration::from_secs(self.ehlo_secs)
    }

    #[must_use]
    pub const fn starttls(&self) -> Duration {
        Duration::from_secs(self.starttls_secs)
    }

    #[must_use]
    pub const fn auth(&self) -> Duration {
        Duration::from_secs(self.auth_secs)
    }

    #[must_use]
    pub const fn envelope(&self) -> Duration {
        Duration::from_secs(self.envelope_secs)
    }

    #[must_use]
    pub const fn data(&self) -> Duration {
        Duration::from_secs(self.data_secs)
    }

    #[must_use]
    pub const fn quit(&self) -> Duration {
        Duration::from_secs(self.quit_secs)
    }
}

impl Default for ClientTimeouts {
    fn default() -> Self {
        Self {
            connect_secs: defaults::connect_secs(),
            ehlo_secs: defaults::ehlo_secs(),
            starttls_secs: defaults::starttls_secs(),
            auth_secs: defaults::auth_secs(),
            envelope_secs: defaults::envelope_secs(),
            data_secs: defaults::data_secs(),
            quit_secs: defaults::quit_secs(),
        }
    }
}

mod defaults {
    pub const fn connect_secs() -> u64 {
        15
    }
    pub const fn ehlo_secs() -> u64 {
        15
    }
    pub const fn starttls_secs() -> u64 {
        15
    }
    pub const fn auth_secs() -> u64 {
        20
    }
    pub const fn envelope_secs() -> u64 {
        15
    }
    pub const fn data_secs() -> u64 {
        60
    }
    pub const fn quit_secs() -> u64 {
        5
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_timeouts_defaults() {
        let timeouts = ClientTimeouts::default();
        assert_eq!(timeouts.connect(), Duration::from_secs(15));
        assert_eq!(timeouts.auth(), Duration::from_secs(20));
        assert_eq!(timeouts.data(), Duration::from_secs(60));
        assert_eq!(timeouts.quit(), Duration::from_secs(5));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let timeouts: ClientTimeouts = ron::from_str("(connect_secs: 3)").unwrap();
        assert_eq!(timeouts.connect_secs, 3);
        assert_eq!(timeouts.ehlo_secs, 15);
        assert_eq!(timeouts.quit_secs, 5);
    }
}
