//! Types shared by every Formline crate: the notification settings model, the
//! action error taxonomy, SMTP client configuration and logging setup.

pub mod config;
pub mod error;
pub mod logging;
pub mod notification;

pub use error::{ActionError, StoreOperation, ValidationError};
pub use notification::{
    ConfigId, Credential, DeliveryId, FormId, NotificationConfig, PersistedSettings, SmtpSettings,
    Submission,
};
pub use tracing;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Shutdown,
    Finalised,
}
