//! TLS configuration for outbound SMTP connections.

use serde::{Deserialize, Serialize};

/// How TLS is negotiated on ports other than 465.
///
/// Port 465 always uses implicit TLS regardless of policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TlsPolicy {
    /// Upgrade with STARTTLS when the server offers it, continue in plaintext
    /// otherwise.
    Opportunistic,

    /// Fail the test when the server does not offer STARTTLS.
    ///
    /// Credentials are never sent over an unencrypted connection.
    #[default]
    Required,

    /// Never attempt TLS.
    ///
    /// **WARNING**: Only use against local test servers.
    Disabled,
}

/// TLS certificate validation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TlsCertificatePolicy {
    /// Whether to accept invalid TLS certificates (self-signed, expired, etc.).
    ///
    /// **SECURITY WARNING**: disables certificate validation.
    ///
    /// Default: `false`
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

/// Complete TLS configuration for an SMTP connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TlsConfig {
    /// Default: `Required`
    #[serde(default)]
    pub policy: TlsPolicy,

    /// Default: `accept_invalid_certs = false`
    #[serde(default)]
    pub certificate: TlsCertificatePolicy,
}

impl TlsConfig {
    /// TLS required, certificates validated.
    #[must_use]
    pub const fn required() -> Self {
        Self {
            policy: TlsPolicy::Required,
            certificate: TlsCertificatePolicy {
                accept_invalid_certs: false,
            },
        }
    }

    /// STARTTLS when offered.
    #[must_use]
    pub const fn opportunistic() -> Self {
        Self {
            policy: TlsPolicy::Opportunistic,
            certificate: TlsCertificatePolicy {
                accept_invalid_certs: false,
            },
        }
    }

    /// **WARNING**: Only use for testing.
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            policy: TlsPolicy::Disabled,
            certificate: TlsCertificatePolicy {
                accept_invalid_certs: false,
            },
        }
    }

    #[must_use]
    pub const fn is_required(&self) -> bool {
        matches!(self.policy, TlsPolicy::Required)
    }

    #[must_use]
    pub const fn is_disabled(&self) -> bool {
        matches!(self.policy, TlsPolicy::Disabled)
    }

    #[must_use]
    pub const fn accepts_invalid_certs(&self) -> bool {
        self.certificate.accept_invalid_certs
    }
}
