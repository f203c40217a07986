//! Scriptable SMTP server for exercising test sends.
//!
//! Every reply can be overridden through the builder, AUTH PLAIN and AUTH
//! LOGIN exchanges are decoded so tests can assert on the credentials that
//! were presented, and a command index can be made to hang to drive timeouts.
#![allow(dead_code)]

use std::{
    fmt::Write,
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream, tcp::WriteHalf},
    sync::RwLock,
    time::timeout,
};

/// What the mock server saw, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmtpCommand {
    Ehlo(String),
    StartTls,
    Auth {
        mechanism: String,
        username: String,
        password: String,
    },
    MailFrom(String),
    RcptTo(String),
    Data,
    MessageContent(String),
    Quit,
    Other(String),
}

#[derive(Debug, Clone)]
struct Reply {
    code: u16,
    text: String,
}

impl Reply {
    fn new(code: u16, text: impl Into<String>) -> Self {
        Self {
            code,
            text: text.into(),
        }
    }

    fn to_bytes(&self) -> Vec<u8> {
        format!("{} {}\r\n", self.code, self.text).into_bytes()
    }
}

#[derive(Debug, Clone)]
struct MockConfig {
    greeting: Reply,
    ehlo_code: u16,
    capabilities: Vec<String>,
    starttls: Option<Reply>,
    auth: Reply,
    mail_from: Reply,
    rcpt_to: Reply,
    data: Reply,
    data_end: Reply,
    quit: Reply,
    hang_on_command: Option<usize>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            greeting: Reply::new(220, "mock.example.com ESMTP ready"),
            ehlo_code: 250,
            capabilities: vec![
                "mock.example.com".to_string(),
                "SIZE 10240000".to_string(),
                "AUTH PLAIN LOGIN".to_string(),
            ],
            starttls: None,
            auth: Reply::new(235, "2.7.0 Authentication successful"),
            mail_from: Reply::new(250, "2.1.0 OK"),
            rcpt_to: Reply::new(250, "2.1.5 OK"),
            data: Reply::new(354, "Go ahead"),
            data_end: Reply::new(250, "2.0.0 OK queued"),
            quit: Reply::new(221, "2.0.0 Bye"),
            hang_on_command: None,
        }
    }
}

impl MockConfig {
    fn ehlo_bytes(&self) -> Vec<u8> {
        let mut reply = String::new();
        let last = self.capabilities.len().saturating_sub(1);
        for (index, capability) in self.capabilities.iter().enumerate() {
            let separator = if index == last { ' ' } else { '-' };
            let _ = write!(reply, "{}{separator}{capability}\r\n", self.ehlo_code);
        }
        reply.into_bytes()
    }
}

pub struct MockSmtpServer {
    addr: SocketAddr,
    commands: Arc<RwLock<Vec<SmtpCommand>>>,
    shutdown: Arc<AtomicBool>,
}

impl MockSmtpServer {
    #[must_use]
    pub fn builder() -> MockSmtpServerBuilder {
        MockSmtpServerBuilder {
            config: MockConfig::default(),
        }
    }

    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub async fn commands(&self) -> Vec<SmtpCommand> {
        self.commands.read().await.clone()
    }

    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    fn decode(encoded: &str) -> String {
        BASE64
            .decode(encoded.trim())
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .unwrap_or_default()
    }

    async fn reply(writer: &mut WriteHalf<'_>, bytes: &[u8]) -> std::io::Result<()> {
        writer.write_all(bytes).await?;
        writer.flush().await
    }

    async fn handle_client(
        mut stream: TcpStream,
        config: Arc<MockConfig>,
        commands: Arc<RwLock<Vec<SmtpCommand>>>,
    ) -> std::io::Result<()> {
        let (reader, mut writer) = stream.split();
        let mut reader = BufReader::new(reader);
        let mut line = String::new();
        let mut count = 0;

        Self::reply(&mut writer, &config.greeting.to_bytes()).await?;

        loop {
            if config.hang_on_command == Some(count) {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                return Ok(());
            }

            line.clear();
            let Ok(read) = timeout(Duration::from_secs(10), reader.read_line(&mut line)).await
            else {
                return Ok(());
            };
            if read? == 0 {
                return Ok(());
            }
            count += 1;

            let input = line.trim_end().to_string();
            let (verb, argument) = input.split_once(' ').unwrap_or((input.as_str(), ""));

            match verb.to_ascii_uppercase().as_str() {
                "EHLO" => {
                    commands.write().await.push(SmtpCommand::Ehlo(argument.to_string()));
                    Self::reply(&mut writer, &config.ehlo_bytes()).await?;
                }
                "STARTTLS" => {
                    commands.write().await.push(SmtpCommand::StartTls);
                    let reply = config
                        .starttls
                        .clone()
                        .unwrap_or_else(|| Reply::new(502, "5.5.1 Command not implemented"));
                    Self::reply(&mut writer, &reply.to_bytes()).await?;
                }
                "AUTH" => {
                    let (mechanism, initial) =
                        argument.split_once(' ').unwrap_or((argument, ""));
                    let mechanism = mechanism.to_ascii_uppercase();

                    let (username, password) = if mechanism == "LOGIN" {
                        Self::reply(&mut writer, b"334 VXNlcm5hbWU6\r\n").await?;
                        line.clear();
                        reader.read_line(&mut line).await?;
                        let username = Self::decode(&line);

                        Self::reply(&mut writer, b"334 UGFzc3dvcmQ6\r\n").await?;
                        line.clear();
                        reader.read_line(&mut line).await?;
                        (username, Self::decode(&line))
                    } else {
                        let decoded = Self::decode(initial);
                        let mut parts = decoded.split('\0').skip(1);
                        (
                            parts.next().unwrap_or_default().to_string(),
                            parts.next().unwrap_or_default().to_string(),
                        )
                    };

                    commands.write().await.push(SmtpCommand::Auth {
                        mechanism,
                        username,
                        password,
                    });
                    Self::reply(&mut writer, &config.auth.to_bytes()).await?;
                }
                "MAIL" => {
                    commands.write().await.push(SmtpCommand::MailFrom(argument.to_string()));
                    Self::reply(&mut writer, &config.mail_from.to_bytes()).await?;
                }
                "RCPT" => {
                    commands.write().await.push(SmtpCommand::RcptTo(argument.to_string()));
                    Self::reply(&mut writer, &config.rcpt_to.to_bytes()).await?;
                }
                "DATA" => {
                    commands.write().await.push(SmtpCommand::Data);
                    Self::reply(&mut writer, &config.data.to_bytes()).await?;
                    if config.data.code != 354 {
                        continue;
                    }

                    let mut content = String::new();
                    loop {
                        line.clear();
                        if reader.read_line(&mut line).await? == 0 {
                            return Ok(());
                        }
                        if line.trim_end() == "." {
                            break;
                        }
                        content.push_str(&line);
                    }

                    commands.write().await.push(SmtpCommand::MessageContent(content));
                    Self::reply(&mut writer, &config.data_end.to_bytes()).await?;
                }
                "QUIT" => {
                    commands.write().await.push(SmtpCommand::Quit);
                    Self::reply(&mut writer, &config.quit.to_bytes()).await?;
                    return Ok(());
                }
                _ => {
                    commands.write().await.push(SmtpCommand::Other(input.clone()));
                    Self::reply(&mut writer, b"500 5.5.2 Unknown command\r\n").await?;
                }
            }
        }
    }
}

pub struct MockSmtpServerBuilder {
    config: MockConfig,
}

impl MockSmtpServerBuilder {
    #[must_use]
    pub fn with_greeting(mut self, code: u16, text: impl Into<String>) -> Self {
        self.config.greeting = Reply::new(code, text);
        self
    }

    /// EHLO lines; the first is the server name.
    #[must_use]
    pub fn with_ehlo_response(mut self, code: u16, capabilities: Vec<String>) -> Self {
        self.config.ehlo_code = code;
        self.config.capabilities = capabilities;
        self
    }

    #[must_use]
    pub fn with_starttls_response(mut self, code: u16, text: impl Into<String>) -> Self {
        self.config.starttls = Some(Reply::new(code, text));
        self
    }

    /// Final reply to AUTH, for either mechanism.
    #[must_use]
    pub fn with_auth_response(mut self, code: u16, text: impl Into<String>) -> Self {
        self.config.auth = Reply::new(code, text);
        self
    }

    #[must_use]
    pub fn with_mail_from_response(mut self, code: u16, text: impl Into<String>) -> Self {
        self.config.mail_from = Reply::new(code, text);
        self
    }

    #[must_use]
    pub fn with_rcpt_to_response(mut self, code: u16, text: impl Into<String>) -> Self {
        self.config.rcpt_to = Reply::new(code, text);
        self
    }

    #[must_use]
    pub fn with_data_end_response(mut self, code: u16, text: impl Into<String>) -> Self {
        self.config.data_end = Reply::new(code, text);
        self
    }

    /// Stop answering before reading the Nth command (0-indexed).
    #[must_use]
    pub const fn with_hang_on_command(mut self, index: usize) -> Self {
        self.config.hang_on_command = Some(index);
        self
    }

    /// Bind to an ephemeral port on localhost and start accepting.
    ///
    /// # Errors
    ///
    /// Returns an error if binding fails.
    pub async fn build(self) -> std::io::Result<MockSmtpServer> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let config = Arc::new(self.config);
        let commands = Arc::new(RwLock::new(Vec::new()));
        let shutdown = Arc::new(AtomicBool::new(false));

        let accept_commands = Arc::clone(&commands);
        let accept_shutdown = Arc::clone(&shutdown);
        tokio::spawn(async move {
            while !accept_shutdown.load(Ordering::Relaxed) {
                let Ok(Ok((stream, _))) =
                    timeout(Duration::from_millis(100), listener.accept()).await
                else {
                    continue;
                };

                let config = Arc::clone(&config);
                let commands = Arc::clone(&accept_commands);
                tokio::spawn(async move {
                    if let Err(error) = MockSmtpServer::handle_client(stream, config, commands).await
                    {
                        tracing::debug!("Mock server client error: {error}");
                    }
                });
            }
        });

        Ok(MockSmtpServer {
            addr,
            commands,
            shutdown,
        })
    }
}
