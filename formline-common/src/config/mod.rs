//! Configuration for outbound SMTP connections made by the test service.
//!
//! - [`timeouts`]: per-stage timeouts for the SMTP conversation
//! - [`tls`]: TLS policy and certificate validation settings

pub mod timeouts;
pub mod tls;

pub use timeouts::ClientTimeouts;
pub use tls::{TlsCertificatePolicy, TlsConfig, TlsPolicy};
