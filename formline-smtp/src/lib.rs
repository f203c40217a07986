//! Outbound SMTP for Formline.
//!
//! [`client::SmtpClient`] speaks just enough SMTP to prove a set of
//! credentials works: plain or implicit-TLS connect, EHLO, STARTTLS, AUTH
//! PLAIN/LOGIN and a single message. [`SmtpTester`] drives it through one
//! test send and classifies whatever goes wrong.

pub mod client;
pub mod tester;

pub use tester::{EmailTestService, SmtpTester, Stage, TestFailure, TesterConfig};
