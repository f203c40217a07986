//! Error types for the SMTP client.

use std::io;

use thiserror::Error;

/// Errors raised while talking to an SMTP server.
///
/// SMTP replies with error codes are not errors at this level; they come back
/// as a [`super::Response`] for the caller to judge.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Network failure while connecting, reading or writing.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The server sent something that is not an SMTP reply.
    #[error("Failed to parse SMTP response: {0}")]
    ParseError(String),

    /// TLS setup or handshake failed.
    #[error("TLS error: {0}")]
    TlsError(String),

    /// A command line held CR or LF and was not sent.
    #[error("Refusing to send command containing a line break")]
    LineBreakInCommand,

    /// The server closed the connection.
    #[error("Connection closed unexpectedly")]
    ConnectionClosed,

    #[error("UTF-8 error: {0}")]
    Utf8Error(#[from] std::str::Utf8Error),
}

pub type Result<T> = std::result::Result<T, ClientError>;
