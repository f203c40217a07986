//! Errors raised by the settings workflow itself.

use formline_common::ActionError;
use thiserror::Error;

use crate::state::Field;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    /// Host and port are read-only while a provider profile is applied.
    #[error("{0} is set by the detected provider and cannot be edited")]
    FieldLocked(Field),

    /// Save was requested without a current successful test send.
    #[error("Send a successful test email before saving")]
    TestRequired,

    /// The persisted settings could not be loaded when opening a session.
    #[error("Failed to load notification settings: {0}")]
    Load(#[source] ActionError),
}
