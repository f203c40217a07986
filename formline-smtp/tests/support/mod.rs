//! Shared fixtures for SMTP integration tests.

pub mod mock_server;

pub use mock_server::{MockSmtpServer, SmtpCommand};
