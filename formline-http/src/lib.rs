//! HTTP surface for Formline notification settings
//!
//! # Endpoints
//!
//! - `GET /forms/{formId}/settings/notifications`: stored settings, without the credential
//! - `POST /forms/{formId}/settings/notifications`: validate and save settings
//! - `DELETE /forms/{formId}/settings/notifications`: remove settings
//! - `POST /forms/{formId}/settings/notifications/test`: send a test e-mail
//! - `GET /health/live`: liveness probe
//!
//! Every action responds with JSON carrying `success` and, on failure, a
//! public `error` message.

mod body;
mod config;
mod error;
mod server;
mod service;

pub use body::SubmittedFields;
pub use config::HttpConfig;
pub use error::HttpError;
pub use server::{ActionFailure, HttpServer, router, status_for};
pub use service::NotificationService;
