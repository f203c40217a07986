//! Test sends against user-supplied SMTP settings.

use core::fmt::{self, Display};
use std::{future::Future, time::Duration};

use async_trait::async_trait;
use chrono::Utc;
use formline_common::{
    DeliveryId, SmtpSettings,
    config::{ClientTimeouts, TlsConfig, TlsPolicy},
    internal, tracing,
};
use serde::Deserialize;
use thiserror::Error;

use crate::client::{AuthMechanism, ClientError, Response, SmtpClient};

/// Port on which the connection starts with a TLS handshake.
pub const IMPLICIT_TLS_PORT: u16 = 465;

/// Sends a single test e-mail with a set of SMTP settings.
#[async_trait]
pub trait EmailTestService: Send + Sync + fmt::Debug {
    /// Deliver a test message to the configured address.
    ///
    /// Returns an opaque identifier for the delivery on success.
    async fn send_test(&self, settings: &SmtpSettings) -> Result<DeliveryId, TestFailure>;
}

/// Step of the SMTP session a failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Connect,
    Greeting,
    Ehlo,
    StartTls,
    Auth,
    MailFrom,
    RcptTo,
    Data,
    Message,
    Quit,
}

impl Display for Stage {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str(match self {
            Self::Connect => "connect",
            Self::Greeting => "greeting",
            Self::Ehlo => "EHLO",
            Self::StartTls => "STARTTLS",
            Self::Auth => "AUTH",
            Self::MailFrom => "MAIL FROM",
            Self::RcptTo => "RCPT TO",
            Self::Data => "DATA",
            Self::Message => "message",
            Self::Quit => "QUIT",
        })
    }
}

/// Why a test send failed.
///
/// The `Display` output carries server detail for logs; [`Self::user_message`]
/// is what callers may show.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TestFailure {
    #[error("could not connect to {address}: {detail}")]
    Connect { address: String, detail: String },

    #[error("{stage} timed out after {after:?}")]
    Timeout { stage: Stage, after: Duration },

    #[error("TLS failure: {0}")]
    Tls(String),

    #[error("server does not offer STARTTLS and TLS is required")]
    TlsUnavailable,

    #[error("server offers no supported AUTH mechanism")]
    AuthUnsupported,

    #[error("authentication rejected: {code} {message}")]
    AuthFailed { code: u16, message: String },

    #[error("{stage} rejected: {code} {message}")]
    Rejected {
        stage: Stage,
        code: u16,
        message: String,
    },

    #[error("protocol error during {stage}: {detail}")]
    Protocol { stage: Stage, detail: String },
}

impl TestFailure {
    /// Fixed message for the failure class.
    #[must_use]
    pub const fn user_message(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "Could not connect to the SMTP server. Check the host and port",
            Self::Timeout { .. } => "The SMTP server did not respond in time",
            Self::Tls(_) | Self::TlsUnavailable => {
                "Could not establish a secure connection with the SMTP server"
            }
            Self::AuthUnsupported => "The SMTP server does not support password authentication",
            Self::AuthFailed { .. } => {
                "Authentication failed. Check the email address and password"
            }
            Self::Rejected { .. } => "The SMTP server rejected the test email",
            Self::Protocol { .. } => "Unexpected response from the SMTP server",
        }
    }

    fn from_client(stage: Stage, error: ClientError) -> Self {
        match error {
            ClientError::TlsError(detail) => Self::Tls(detail),
            other => Self::Protocol {
                stage,
                detail: other.to_string(),
            },
        }
    }

    fn rejected(stage: Stage, response: &Response) -> Self {
        Self::Rejected {
            stage,
            code: response.code,
            message: response.message(),
        }
    }
}

fn default_helo_domain() -> String {
    "localhost".to_string()
}

/// Configuration for [`SmtpTester`].
///
/// ```ron
/// tester: (
///     helo_domain: "forms.example.com",
///     tls: (policy: required),
///     timeouts: (connect_secs: 10),
/// ),
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TesterConfig {
    /// Name sent in EHLO and used in the test `Message-ID`.
    #[serde(default = "default_helo_domain")]
    pub helo_domain: String,

    #[serde(default)]
    pub tls: TlsConfig,

    #[serde(default)]
    pub timeouts: ClientTimeouts,
}

impl Default for TesterConfig {
    fn default() -> Self {
        Self {
            helo_domain: default_helo_domain(),
            tls: TlsConfig::default(),
            timeouts: ClientTimeouts::default(),
        }
    }
}

/// [`EmailTestService`] that performs a real SMTP session.
///
/// The session connects (implicit TLS on port 465), upgrades with STARTTLS
/// according to the TLS policy, authenticates with the e-mail address and
/// credential, then sends one message from the address to itself. Each step is
/// bounded by the matching client timeout.
#[derive(Debug, Clone, Default)]
pub struct SmtpTester {
    config: TesterConfig,
}

impl SmtpTester {
    #[must_use]
    pub const fn new(config: TesterConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &TesterConfig {
        &self.config
    }

    async fn step<T, F>(stage: Stage, limit: Duration, operation: F) -> Result<T, TestFailure>
    where
        F: Future<Output = crate::client::Result<T>>,
    {
        match tokio::time::timeout(limit, operation).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(error)) => Err(TestFailure::from_client(stage, error)),
            Err(_) => Err(TestFailure::Timeout {
                stage,
                after: limit,
            }),
        }
    }

    async fn connect(&self, settings: &SmtpSettings) -> Result<SmtpClient, TestFailure> {
        let address = settings.address();
        let accept_invalid = self.config.tls.accepts_invalid_certs();

        if accept_invalid {
            tracing::warn!(
                server = %address,
                "SECURITY WARNING: TLS certificate validation is disabled for test sends"
            );
        }

        let connecting = async {
            if settings.port == IMPLICIT_TLS_PORT {
                SmtpClient::connect_tls(&address, &settings.host, accept_invalid).await
            } else {
                SmtpClient::connect(&address, &settings.host)
                    .await
                    .map(|client| client.accept_invalid_certs(accept_invalid))
            }
        };

        Self::step(Stage::Connect, self.config.timeouts.connect(), connecting)
            .await
            .map_err(|failure| match failure {
                TestFailure::Protocol { detail, .. } => TestFailure::Connect {
                    address: address.clone(),
                    detail,
                },
                other => other,
            })
    }

    async fn ehlo(&self, client: &mut SmtpClient) -> Result<(), TestFailure> {
        let response = Self::step(
            Stage::Ehlo,
            self.config.timeouts.ehlo(),
            client.ehlo(&self.config.helo_domain),
        )
        .await?;

        if response.is_success() {
            Ok(())
        } else {
            Err(TestFailure::rejected(Stage::Ehlo, &response))
        }
    }

    async fn negotiate_tls(&self, client: &mut SmtpClient) -> Result<(), TestFailure> {
        if client.is_tls() || self.config.tls.policy == TlsPolicy::Disabled {
            return Ok(());
        }

        if !client.capabilities().starttls {
            if self.config.tls.is_required() {
                return Err(TestFailure::TlsUnavailable);
            }
            internal!(
                level = WARN,
                "Server does not offer STARTTLS, continuing test send without TLS"
            );
            return Ok(());
        }

        let response = Self::step(
            Stage::StartTls,
            self.config.timeouts.starttls(),
            client.starttls(),
        )
        .await?;

        if !response.is_success() {
            if self.config.tls.is_required() {
                return Err(TestFailure::Tls(format!(
                    "STARTTLS rejected: {} {}",
                    response.code,
                    response.message()
                )));
            }
            internal!(
                level = WARN,
                "STARTTLS rejected with {}, continuing test send without TLS",
                response.code
            );
            return Ok(());
        }

        self.ehlo(client).await
    }

    async fn authenticate(
        &self,
        client: &mut SmtpClient,
        settings: &SmtpSettings,
    ) -> Result<(), TestFailure> {
        let mechanism = client
            .capabilities()
            .preferred_auth()
            .ok_or(TestFailure::AuthUnsupported)?;

        let username = settings.email.as_str();
        let password = settings.credential.expose();
        let limit = self.config.timeouts.auth();

        let response = match mechanism {
            AuthMechanism::Plain => {
                Self::step(Stage::Auth, limit, client.auth_plain(username, password)).await?
            }
            AuthMechanism::Login => {
                Self::step(Stage::Auth, limit, client.auth_login(username, password)).await?
            }
        };

        if response.is_success() {
            tracing::debug!(%mechanism, "Authenticated for test send");
            Ok(())
        } else {
            Err(TestFailure::AuthFailed {
                code: response.code,
                message: response.message(),
            })
        }
    }

    async fn send_message(
        &self,
        client: &mut SmtpClient,
        settings: &SmtpSettings,
        delivery: &DeliveryId,
    ) -> Result<(), TestFailure> {
        let envelope = self.config.timeouts.envelope();

        let response = Self::step(Stage::MailFrom, envelope, client.mail_from(&settings.email)).await?;
        if !response.is_success() {
            return Err(TestFailure::rejected(Stage::MailFrom, &response));
        }

        let response = Self::step(Stage::RcptTo, envelope, client.rcpt_to(&settings.email)).await?;
        if !response.is_success() {
            return Err(TestFailure::rejected(Stage::RcptTo, &response));
        }

        let data = self.config.timeouts.data();
        let response = Self::step(Stage::Data, data, client.data()).await?;
        if response.code != 354 {
            return Err(TestFailure::rejected(Stage::Data, &response));
        }

        let body = self.message(settings, delivery);
        let response = Self::step(Stage::Message, data, client.send_data(&body)).await?;
        if !response.is_success() {
            return Err(TestFailure::rejected(Stage::Message, &response));
        }

        Ok(())
    }

    fn message(&self, settings: &SmtpSettings, delivery: &DeliveryId) -> String {
        format!(
            "From: <{email}>\r\n\
             To: <{email}>\r\n\
             Subject: Formline test email\r\n\
             Date: {date}\r\n\
             Message-ID: <{delivery}@{domain}>\r\n\
             MIME-Version: 1.0\r\n\
             Content-Type: text/plain; charset=utf-8\r\n\
             \r\n\
             This is a test email from Formline.\r\n\
             Your notification settings for {host}:{port} are working.\r\n",
            email = settings.email,
            date = Utc::now().to_rfc2822(),
            domain = self.config.helo_domain,
            host = settings.host,
            port = settings.port,
        )
    }

    async fn run(&self, settings: &SmtpSettings) -> Result<DeliveryId, TestFailure> {
        let delivery = DeliveryId::generate();
        let mut client = self.connect(settings).await?;

        let greeting = Self::step(
            Stage::Greeting,
            self.config.timeouts.ehlo(),
            client.read_greeting(),
        )
        .await?;
        if !greeting.is_success() {
            return Err(TestFailure::rejected(Stage::Greeting, &greeting));
        }

        self.ehlo(&mut client).await?;
        self.negotiate_tls(&mut client).await?;
        self.authenticate(&mut client, settings).await?;
        self.send_message(&mut client, settings, &delivery).await?;

        // The message is accepted at this point, so QUIT problems are only logged.
        match tokio::time::timeout(self.config.timeouts.quit(), client.quit()).await {
            Ok(Ok(_)) => {}
            Ok(Err(error)) => {
                tracing::warn!(server = %settings.address(), %error, "QUIT failed after test send");
            }
            Err(_) => {
                tracing::warn!(server = %settings.address(), "QUIT timed out after test send");
            }
        }

        Ok(delivery)
    }
}

#[async_trait]
impl EmailTestService for SmtpTester {
    async fn send_test(&self, settings: &SmtpSettings) -> Result<DeliveryId, TestFailure> {
        let server = settings.address();
        tracing::info!(%server, "Starting test send");

        let result = self.run(settings).await;
        match &result {
            Ok(delivery) => tracing::info!(%server, %delivery, "Test send accepted"),
            Err(failure) => tracing::warn!(%server, %failure, "Test send failed"),
        }

        result
    }
}
