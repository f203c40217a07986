//! SMTP client connection with plain, STARTTLS and implicit TLS transports.

use std::sync::Arc;

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use formline_common::{incoming, outgoing, tracing};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};
use tokio_rustls::{
    TlsConnector,
    client::TlsStream,
    rustls::{
        ClientConfig, DigitallySignedStruct, Error as RustlsError, RootCertStore, SignatureScheme,
        client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
        pki_types::{CertificateDer, ServerName, UnixTime},
    },
};

use super::{
    capabilities::Capabilities,
    error::{ClientError, Result},
    response::Response,
};

/// Initial read buffer size.
const BUFFER_SIZE: usize = 4096;

/// Upper bound on a single reply (64 KiB).
const MAX_BUFFER_SIZE: usize = 64 * 1024;

enum ClientConnection {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl ClientConnection {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        match self {
            Self::Plain(stream) => stream.write_all(data).await?,
            Self::Tls(stream) => {
                stream.write_all(data).await?;
                stream.flush().await?;
            }
        }
        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = match self {
            Self::Plain(stream) => stream.read(buf).await?,
            Self::Tls(stream) => stream.read(buf).await?,
        };

        if n == 0 {
            return Err(ClientError::ConnectionClosed);
        }
        Ok(n)
    }

    const fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }

    async fn upgrade_to_tls(self, domain: &str, accept_invalid_certs: bool) -> Result<Self> {
        let Self::Plain(stream) = self else {
            return Err(ClientError::TlsError(
                "Connection is already TLS".to_string(),
            ));
        };

        let server_name = ServerName::try_from(domain.to_string())
            .map_err(|e| ClientError::TlsError(format!("Invalid server name {domain}: {e}")))?;

        let stream = tls_connector(accept_invalid_certs)
            .connect(server_name, stream)
            .await
            .map_err(|e| ClientError::TlsError(e.to_string()))?;

        Ok(Self::Tls(Box::new(stream)))
    }
}

fn tls_connector(accept_invalid_certs: bool) -> TlsConnector {
    let mut roots = RootCertStore::empty();

    let native = rustls_native_certs::load_native_certs();
    if !native.errors.is_empty() {
        tracing::warn!(errors = ?native.errors, "Some native certificates could not be loaded");
    }
    let (added, ignored) = roots.add_parsable_certificates(native.certs);
    tracing::trace!(added, ignored, "Loaded native root certificates");

    let mut config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();

    if accept_invalid_certs {
        config
            .dangerous()
            .set_certificate_verifier(Arc::new(AcceptAnyCertificate));
    }

    TlsConnector::from(Arc::new(config))
}

/// Certificate verifier used when `accept_invalid_certs` is set.
#[derive(Debug)]
struct AcceptAnyCertificate;

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, RustlsError> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, RustlsError> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, RustlsError> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::ED25519,
        ]
    }
}

/// A single SMTP session.
///
/// Replies with error codes are returned as [`Response`]s; only transport and
/// parse failures are errors.
pub struct SmtpClient {
    connection: Option<ClientConnection>,
    buffer: Vec<u8>,
    filled: usize,
    server_domain: String,
    accept_invalid_certs: bool,
    capabilities: Capabilities,
}

impl SmtpClient {
    fn with_connection(connection: ClientConnection, server_domain: &str) -> Self {
        Self {
            connection: Some(connection),
            buffer: vec![0u8; BUFFER_SIZE],
            filled: 0,
            server_domain: server_domain.to_string(),
            accept_invalid_certs: false,
            capabilities: Capabilities::default(),
        }
    }

    /// Open a plaintext connection to `addr`.
    ///
    /// `server_domain` is the name checked against the certificate if the
    /// session is later upgraded with STARTTLS.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Io` if the TCP connection fails.
    pub async fn connect(addr: &str, server_domain: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self::with_connection(
            ClientConnection::Plain(stream),
            server_domain,
        ))
    }

    /// Open a connection to `addr` that starts with a TLS handshake (port 465).
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Io` if the TCP connection fails and
    /// `ClientError::TlsError` if the handshake does.
    pub async fn connect_tls(
        addr: &str,
        server_domain: &str,
        accept_invalid_certs: bool,
    ) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        let connection = ClientConnection::Plain(stream)
            .upgrade_to_tls(server_domain, accept_invalid_certs)
            .await?;

        Ok(Self::with_connection(connection, server_domain).accept_invalid_certs(accept_invalid_certs))
    }

    /// Whether to accept invalid certificates on a later STARTTLS upgrade.
    #[must_use]
    pub const fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    /// Capabilities from the most recent EHLO.
    #[must_use]
    pub const fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    #[must_use]
    pub fn is_tls(&self) -> bool {
        self.connection.as_ref().is_some_and(ClientConnection::is_tls)
    }

    /// Read the `220` greeting.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails or the reply is malformed.
    pub async fn read_greeting(&mut self) -> Result<Response> {
        self.read_response().await
    }

    async fn write_line(&mut self, line: &str, redacted: bool) -> Result<()> {
        if line.contains(['\r', '\n']) {
            return Err(ClientError::LineBreakInCommand);
        }

        if redacted {
            outgoing!("<redacted>");
        } else {
            outgoing!("{line}");
        }

        self.connection
            .as_mut()
            .ok_or(ClientError::ConnectionClosed)?
            .send(format!("{line}\r\n").as_bytes())
            .await
    }

    /// Send `line` and read the reply.
    ///
    /// # Errors
    ///
    /// Returns an error if writing or reading fails.
    pub async fn command(&mut self, line: &str) -> Result<Response> {
        self.write_line(line, false).await?;
        self.read_response().await
    }

    async fn secret_command(&mut self, line: &str) -> Result<Response> {
        self.write_line(line, true).await?;
        self.read_response().await
    }

    /// Send EHLO and remember the advertised capabilities.
    ///
    /// # Errors
    ///
    /// Returns an error if the exchange fails.
    pub async fn ehlo(&mut self, domain: &str) -> Result<Response> {
        let response = self.command(&format!("EHLO {domain}")).await?;
        self.capabilities = if response.is_success() {
            Capabilities::from_ehlo(&response)
        } else {
            Capabilities::default()
        };
        Ok(response)
    }

    /// Send STARTTLS and, if the server agrees, upgrade the connection.
    ///
    /// Capabilities are cleared on upgrade; send EHLO again afterwards.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::TlsError` if the handshake fails.
    pub async fn starttls(&mut self) -> Result<Response> {
        let response = self.command("STARTTLS").await?;
        if !response.is_success() {
            return Ok(response);
        }

        let connection = self
            .connection
            .take()
            .ok_or(ClientError::ConnectionClosed)?;
        self.connection = Some(
            connection
                .upgrade_to_tls(&self.server_domain, self.accept_invalid_certs)
                .await?,
        );
        self.capabilities = Capabilities::default();
        self.filled = 0;

        Ok(response)
    }

    /// `AUTH PLAIN` with an initial response.
    ///
    /// # Errors
    ///
    /// Returns an error if the exchange fails.
    pub async fn auth_plain(&mut self, username: &str, password: &str) -> Result<Response> {
        let token = BASE64.encode(format!("\0{username}\0{password}"));
        self.secret_command(&format!("AUTH PLAIN {token}")).await
    }

    /// `AUTH LOGIN`, answering the username and password challenges.
    ///
    /// Returns early with the server's reply if it does not issue a `334`
    /// challenge.
    ///
    /// # Errors
    ///
    /// Returns an error if the exchange fails.
    pub async fn auth_login(&mut self, username: &str, password: &str) -> Result<Response> {
        let response = self.command("AUTH LOGIN").await?;
        if response.code != 334 {
            return Ok(response);
        }

        let response = self.secret_command(&BASE64.encode(username)).await?;
        if response.code != 334 {
            return Ok(response);
        }

        self.secret_command(&BASE64.encode(password)).await
    }

    /// # Errors
    ///
    /// Returns an error if the exchange fails.
    pub async fn mail_from(&mut self, from: &str) -> Result<Response> {
        self.command(&format!("MAIL FROM:<{from}>")).await
    }

    /// # Errors
    ///
    /// Returns an error if the exchange fails.
    pub async fn rcpt_to(&mut self, to: &str) -> Result<Response> {
        self.command(&format!("RCPT TO:<{to}>")).await
    }

    /// # Errors
    ///
    /// Returns an error if the exchange fails.
    pub async fn data(&mut self) -> Result<Response> {
        self.command("DATA").await
    }

    /// Send the message body and the terminating `.` line.
    ///
    /// Lines starting with `.` are dot-stuffed and bare `\n` line endings are
    /// normalised to CRLF.
    ///
    /// # Errors
    ///
    /// Returns an error if writing or reading fails.
    pub async fn send_data(&mut self, body: &str) -> Result<Response> {
        let mut payload = String::with_capacity(body.len() + 8);
        for line in body.lines() {
            if line.starts_with('.') {
                payload.push('.');
            }
            payload.push_str(line);
            payload.push_str("\r\n");
        }
        payload.push_str(".\r\n");

        outgoing!("<{} bytes of message data>", payload.len());

        self.connection
            .as_mut()
            .ok_or(ClientError::ConnectionClosed)?
            .send(payload.as_bytes())
            .await?;

        self.read_response().await
    }

    /// # Errors
    ///
    /// Returns an error if the exchange fails.
    pub async fn quit(&mut self) -> Result<Response> {
        self.command("QUIT").await
    }

    async fn read_response(&mut self) -> Result<Response> {
        loop {
            if let Some((response, consumed)) = Response::parse(&self.buffer[..self.filled])? {
                self.buffer.copy_within(consumed..self.filled, 0);
                self.filled -= consumed;

                incoming!("{} {}", response.code, response.message());
                return Ok(response);
            }

            if self.filled == self.buffer.len() {
                if self.buffer.len() >= MAX_BUFFER_SIZE {
                    return Err(ClientError::ParseError(format!(
                        "Reply exceeds {MAX_BUFFER_SIZE} bytes"
                    )));
                }
                let grown = (self.buffer.len() * 2).min(MAX_BUFFER_SIZE);
                self.buffer.resize(grown, 0);
            }

            let n = self
                .connection
                .as_mut()
                .ok_or(ClientError::ConnectionClosed)?
                .read(&mut self.buffer[self.filled..])
                .await?;
            self.filled += n;
        }
    }
}
