//! Minimal SMTP client used for test sends.
//!
//! ```no_run
//! use formline_smtp::client::SmtpClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut client = SmtpClient::connect("smtp.example.com:587", "smtp.example.com").await?;
//! client.read_greeting().await?;
//! client.ehlo("formline.local").await?;
//!
//! if client.capabilities().starttls {
//!     client.starttls().await?;
//!     client.ehlo("formline.local").await?;
//! }
//!
//! client.auth_plain("owner@example.com", "app-password").await?;
//! # Ok(())
//! # }
//! ```

mod capabilities;
mod error;
mod response;
mod smtp_client;

pub use capabilities::{AuthMechanism, Capabilities};
pub use error::{ClientError, Result};
pub use response::{Response, ResponseLine};
pub use smtp_client::SmtpClient;
