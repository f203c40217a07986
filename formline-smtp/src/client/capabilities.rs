//! Extensions advertised in an EHLO reply.

use core::fmt::{self, Display};

use super::Response;

/// SASL mechanisms the client knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMechanism {
    Plain,
    Login,
}

impl AuthMechanism {
    fn from_keyword(keyword: &str) -> Option<Self> {
        if keyword.eq_ignore_ascii_case("PLAIN") {
            Some(Self::Plain)
        } else if keyword.eq_ignore_ascii_case("LOGIN") {
            Some(Self::Login)
        } else {
            None
        }
    }
}

impl Display for AuthMechanism {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str(match self {
            Self::Plain => "PLAIN",
            Self::Login => "LOGIN",
        })
    }
}

/// What the server said it supports in its last EHLO reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub starttls: bool,
    /// Supported mechanisms in the order the server listed them.
    pub auth: Vec<AuthMechanism>,
    /// `SIZE` limit in bytes, `Some(0)` when advertised without a limit.
    pub size: Option<usize>,
}

impl Capabilities {
    /// Read capabilities from an EHLO reply.
    ///
    /// The first line is the server's greeting and is skipped. Both `AUTH
    /// PLAIN LOGIN` and the older `AUTH=PLAIN LOGIN` spellings are accepted.
    #[must_use]
    pub fn from_ehlo(response: &Response) -> Self {
        let mut capabilities = Self::default();

        for line in response.lines.iter().skip(1) {
            let mut words = line.split(|c: char| c.is_ascii_whitespace() || c == '=');
            let Some(keyword) = words.next() else {
                continue;
            };

            if keyword.eq_ignore_ascii_case("STARTTLS") {
                capabilities.starttls = true;
            } else if keyword.eq_ignore_ascii_case("AUTH") {
                for mechanism in words.filter_map(AuthMechanism::from_keyword) {
                    if !capabilities.auth.contains(&mechanism) {
                        capabilities.auth.push(mechanism);
                    }
                }
            } else if keyword.eq_ignore_ascii_case("SIZE") {
                capabilities.size = Some(words.next().and_then(|n| n.parse().ok()).unwrap_or(0));
            }
        }

        capabilities
    }

    /// The mechanism to authenticate with: PLAIN when offered, then LOGIN.
    #[must_use]
    pub fn preferred_auth(&self) -> Option<AuthMechanism> {
        [AuthMechanism::Plain, AuthMechanism::Login]
            .into_iter()
            .find(|mechanism| self.auth.contains(mechanism))
    }
}
