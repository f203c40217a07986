//! The notification settings model.
//!
//! A form owns at most one [`NotificationConfig`]. Requests carry a raw
//! [`Submission`] which only becomes [`SmtpSettings`] once it has been
//! validated; the persisted row is never handed out with its credential, read
//! paths use [`PersistedSettings`] instead.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Identifier of a form, as it appears in the request path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormId(String);

impl FormId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FormId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FormId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for FormId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Identifier of a stored notification configuration row.
///
/// ULIDs sort by creation time, which keeps rows in insertion order when listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigId(ulid::Ulid);

impl ConfigId {
    #[must_use]
    pub fn generate() -> Self {
        Self(ulid::Ulid::new())
    }
}

impl fmt::Display for ConfigId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ConfigId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ulid::Ulid::from_string(s).map(Self)
    }
}

/// Opaque SMTP secret (password or app password).
///
/// Never printed: `Debug` and `Display` are redacted.
#[derive(Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

/// Identifier handed back by the email test service for a successful send.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeliveryId(String);

impl DeliveryId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn generate() -> Self {
        Self(ulid::Ulid::new().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeliveryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The four fields a save or test request carries, exactly as submitted.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Submission {
    pub email: String,
    pub credential: String,
    pub host: String,
    pub port: String,
}

impl fmt::Debug for Submission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Submission")
            .field("email", &self.email)
            .field("credential", &"***")
            .field("host", &self.host)
            .field("port", &self.port)
            .finish()
    }
}

impl Submission {
    #[must_use]
    pub fn new(
        email: impl Into<String>,
        credential: impl Into<String>,
        host: impl Into<String>,
        port: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            credential: credential.into(),
            host: host.into(),
            port: port.into(),
        }
    }

    /// Check that every field is present and the port is a usable TCP port.
    ///
    /// Missing fields are reported together, before the port is parsed.
    pub fn validate(&self) -> Result<SmtpSettings, ValidationError> {
        let missing: Vec<&'static str> = [
            ("email", self.email.trim()),
            ("credential", self.credential.as_str()),
            ("host", self.host.trim()),
            ("port", self.port.trim()),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.is_empty().then_some(name))
        .collect();

        if !missing.is_empty() {
            return Err(ValidationError::MissingFields(missing));
        }

        let email = self.email.trim();
        let host = self.host.trim();
        for (name, value) in [("email", email), ("host", host)] {
            if value.chars().any(char::is_control) {
                return Err(ValidationError::ControlCharacter(name));
            }
        }

        let port = self
            .port
            .trim()
            .parse::<u16>()
            .ok()
            .filter(|port| *port != 0)
            .ok_or_else(|| ValidationError::InvalidPort(self.port.clone()))?;

        Ok(SmtpSettings {
            email: email.to_string(),
            credential: Credential::new(self.credential.clone()),
            host: host.to_string(),
            port,
        })
    }
}

/// A validated SMTP configuration, ready to be stored or tested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpSettings {
    pub email: String,
    pub credential: Credential,
    pub host: String,
    pub port: u16,
}

impl SmtpSettings {
    /// `host:port`, suitable for a TCP connect.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// A stored notification configuration row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationConfig {
    pub id: ConfigId,
    pub form_id: FormId,
    pub email: String,
    pub credential: Credential,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub secure: bool,
    pub updated_at: DateTime<Utc>,
}

impl NotificationConfig {
    /// The credential-free view returned by read paths.
    #[must_use]
    pub fn persisted(&self) -> PersistedSettings {
        PersistedSettings {
            email: self.email.clone(),
            smtp_host: self.smtp_host.clone(),
            smtp_port: self.smtp_port,
            secure: self.secure,
            updated_at: self.updated_at,
            has_credential: !self.credential.is_empty(),
        }
    }
}

/// Stored settings without the secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSettings {
    pub email: String,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub secure: bool,
    pub updated_at: DateTime<Utc>,
    pub has_credential: bool,
}
