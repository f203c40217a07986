//! The notification settings workflow.
//!
//! A [`SettingsSession`] owns the editable SMTP fields for one form. It
//! suggests server settings from the e-mail domain ([`provider`]), runs save,
//! test and clear requests against a [`NotificationBackend`] and only allows a
//! save once a test send has succeeded with the current field values.

pub mod backend;
pub mod debounce;
pub mod error;
pub mod provider;
pub mod session;
pub mod state;

pub use backend::NotificationBackend;
pub use debounce::Debouncer;
pub use error::WorkflowError;
pub use provider::{Detection, ProviderProfile};
pub use session::{SessionOptions, SessionUpdate, SettingsSession};
pub use state::{Completion, Field, Fields, OperationKind, Outcome, SettingsView, WorkflowState};
