//! Test support utilities for end-to-end testing
//!
//! Starts the full service (SQLite store, SMTP tester, HTTP server) against a
//! mock SMTP server so tests can drive it over real HTTP.

pub mod harness;
#[path = "../../../formline-smtp/tests/support/mock_server.rs"]
pub mod mock_server;

pub use harness::TestHarness;
pub use mock_server::{MockSmtpServer, SmtpCommand};
