//! Error taxonomy for the notification settings actions.
//!
//! Every failure an action can produce is an [`ActionError`]. Each variant has
//! a fixed public message; anything that could carry internal detail (store
//! errors, unexpected failures) keeps that detail for the log only.

use std::fmt;

use thiserror::Error;

use crate::FormId;

/// Problems with the fields of a save or test request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// One or more required fields were absent or blank.
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    /// The port was not a number in `1..=65535`.
    #[error("Invalid port {0:?}: must be a number between 1 and 65535")]
    InvalidPort(String),

    /// A field that ends up on the SMTP wire held a line break or another
    /// control character.
    #[error("Field {0} contains a control character")]
    ControlCharacter(&'static str),

    /// The form id in the request path could not be decoded.
    #[error("Invalid form id: {0}")]
    InvalidFormId(String),
}

impl ValidationError {
    /// Message shown to the user.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::MissingFields(_) => self.to_string(),
            Self::InvalidPort(_) => "Port must be a number between 1 and 65535".to_string(),
            Self::ControlCharacter(field) => {
                format!("The {field} must not contain line breaks or control characters")
            }
            Self::InvalidFormId(_) => "The form id is not valid".to_string(),
        }
    }
}

/// Which store operation failed, used to pick the public message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOperation {
    Load,
    Save,
    Clear,
    Lookup,
}

impl fmt::Display for StoreOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Load => "load",
            Self::Save => "save",
            Self::Clear => "clear",
            Self::Lookup => "lookup",
        })
    }
}

/// Errors returned by the save, clear, test and load actions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    /// The form named in the request does not exist.
    #[error("Form not found: {0}")]
    NotFound(FormId),

    /// The request fields were missing or malformed.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The action endpoint was called with the wrong verb.
    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    /// The settings store failed.
    #[error("Store failure during {operation}: {detail}")]
    Store {
        operation: StoreOperation,
        detail: String,
    },

    /// The test send was rejected; `reason` is already safe to show.
    #[error("Test send failed: {reason}")]
    TestService { reason: String },

    /// A save was attempted with settings that have not passed a test send.
    #[error("Settings for form {0} have not passed a test send")]
    Unverified(FormId),

    /// Anything else.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ActionError {
    #[must_use]
    pub fn store(operation: StoreOperation, detail: impl fmt::Display) -> Self {
        Self::Store {
            operation,
            detail: detail.to_string(),
        }
    }

    /// Message safe to return to the caller.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::NotFound(_) => "Form not found".to_string(),
            Self::Validation(err) => err.public_message(),
            Self::MethodNotAllowed(_) => "Method not allowed".to_string(),
            Self::Store { operation, .. } => match operation {
                StoreOperation::Load => "Failed to load notification settings".to_string(),
                StoreOperation::Save => "Failed to save notification settings".to_string(),
                StoreOperation::Clear => "Failed to clear notification settings".to_string(),
                StoreOperation::Lookup => "Failed to look up form".to_string(),
            },
            Self::TestService { reason } => reason.clone(),
            Self::Unverified(_) => {
                "Send a successful test email with these settings before saving".to_string()
            }
            Self::Internal(_) => "An unexpected error occurred".to_string(),
        }
    }

    /// Returns `true` when the detail must stay out of responses.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Store { .. } | Self::Internal(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_display() {
        let err = ValidationError::MissingFields(vec!["email", "port"]);
        assert_eq!(err.to_string(), "Missing required fields: email, port");
        assert_eq!(err.public_message(), "Missing required fields: email, port");
    }

    #[test]
    fn test_control_character_message_names_field() {
        let err = ValidationError::ControlCharacter("email");
        assert_eq!(
            err.public_message(),
            "The email must not contain line breaks or control characters"
        );
    }

    #[test]
    fn test_invalid_form_id_hides_reason() {
        let err = ValidationError::InvalidFormId("Invalid URL: invalid UTF-8".to_string());
        assert_eq!(err.public_message(), "The form id is not valid");
    }

    #[test]
    fn test_store_error_hides_detail() {
        let err = ActionError::store(StoreOperation::Save, "disk I/O error at /var/lib/formline.db");
        assert!(err.is_internal());
        assert_eq!(err.public_message(), "Failed to save notification settings");
        assert!(err.to_string().contains("/var/lib/formline.db"));
    }

    #[test]
    fn test_internal_error_hides_detail() {
        let err = ActionError::Internal("task panicked".to_string());
        assert!(err.is_internal());
        assert_eq!(err.public_message(), "An unexpected error occurred");
    }

    #[test]
    fn test_validation_conversion() {
        let err: ActionError = ValidationError::InvalidPort(String::new()).into();
        assert!(matches!(err, ActionError::Validation(_)));
        assert!(!err.is_internal());
        assert_eq!(err.public_message(), "Port must be a number between 1 and 65535");
    }

    #[test]
    fn test_test_service_reason_is_public() {
        let err = ActionError::TestService {
            reason: "Authentication failed".to_string(),
        };
        assert_eq!(err.public_message(), "Authentication failed");
    }
}
