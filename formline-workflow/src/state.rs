//! Workflow state and its transitions.
//!
//! [`WorkflowState`] is a plain reducer: every user action and every request
//! completion is a method call that updates the state synchronously. The
//! async plumbing lives in [`crate::session`].

use core::fmt::{self, Display};

use formline_common::{ActionError, DeliveryId, PersistedSettings, Submission};

use crate::{
    WorkflowError,
    provider::{self, Detection},
};

/// The four editable fields, held as typed.
pub type Fields = Submission;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Email,
    Credential,
    SmtpHost,
    SmtpPort,
}

impl Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Email => "email",
            Self::Credential => "credential",
            Self::SmtpHost => "SMTP host",
            Self::SmtpPort => "SMTP port",
        })
    }
}

fn slot(fields: &mut Fields, field: Field) -> &mut String {
    match field {
        Field::Email => &mut fields.email,
        Field::Credential => &mut fields.credential,
        Field::SmtpHost => &mut fields.host,
        Field::SmtpPort => &mut fields.port,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Save,
    Test,
    Clear,
}

impl Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Save => "save",
            Self::Test => "test",
            Self::Clear => "clear",
        })
    }
}

/// How the last request of an operation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Succeeded(T),
    /// Public error message.
    Failed(String),
}

impl<T> Outcome<T> {
    fn from_result(result: Result<T, ActionError>) -> Self {
        result.map_or_else(|err| Self::Failed(err.public_message()), Self::Succeeded)
    }

    fn error(&self) -> Option<&str> {
        match self {
            Self::Succeeded(_) => None,
            Self::Failed(message) => Some(message),
        }
    }
}

/// One request lifecycle: `idle -> submitting -> idle(outcome)`.
///
/// Each submission gets a ticket and only the newest ticket's completion is
/// accepted.
#[derive(Debug, Clone)]
struct Operation<T> {
    issued: u64,
    in_flight: Option<u64>,
    last: Option<Outcome<T>>,
}

impl<T> Default for Operation<T> {
    fn default() -> Self {
        Self {
            issued: 0,
            in_flight: None,
            last: None,
        }
    }
}

impl<T> Operation<T> {
    fn begin(&mut self) -> u64 {
        self.issued += 1;
        self.in_flight = Some(self.issued);
        self.issued
    }

    fn finish(&mut self, ticket: u64, outcome: Outcome<T>) -> bool {
        if self.in_flight != Some(ticket) {
            return false;
        }
        self.in_flight = None;
        self.last = Some(outcome);
        true
    }

    /// Forget the in-flight request and the last outcome. Tickets keep
    /// counting so late completions stay stale.
    fn reset(&mut self) {
        self.in_flight = None;
        self.last = None;
    }

    const fn is_submitting(&self) -> bool {
        self.in_flight.is_some()
    }
}

/// A request that finished, as delivered back to the state.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Save {
        ticket: u64,
        /// Fields as they were when the save was submitted.
        submitted: Fields,
        result: Result<(), ActionError>,
    },
    Test {
        ticket: u64,
        result: Result<DeliveryId, ActionError>,
    },
    Clear {
        ticket: u64,
        result: Result<(), ActionError>,
    },
}

impl Completion {
    #[must_use]
    pub const fn kind(&self) -> OperationKind {
        match self {
            Self::Save { .. } => OperationKind::Save,
            Self::Test { .. } => OperationKind::Test,
            Self::Clear { .. } => OperationKind::Clear,
        }
    }

    #[must_use]
    pub const fn succeeded(&self) -> bool {
        match self {
            Self::Save { result, .. } | Self::Clear { result, .. } => result.is_ok(),
            Self::Test { result, .. } => result.is_ok(),
        }
    }
}

/// Host, port and e-mail as last persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PersistedDefaults {
    email: String,
    host: String,
    port: String,
}

/// What a settings form renders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsView {
    pub fields: Fields,
    pub detected_domain: Option<String>,
    pub provider: Option<&'static str>,
    pub hint: Option<&'static str>,
    pub auto_detected: bool,
    pub unknown_provider: bool,
    pub host_port_locked: bool,
    pub smtp_fields_visible: bool,
    pub can_save: bool,
    pub saving: bool,
    pub testing: bool,
    pub clearing: bool,
    pub saved: bool,
    pub save_error: Option<String>,
    /// Only while the last test result matches the current fields.
    pub test_error: Option<String>,
    pub test_delivery: Option<DeliveryId>,
    pub clear_error: Option<String>,
    pub cleared: bool,
}

/// State of one settings session.
#[derive(Debug, Clone, Default)]
pub struct WorkflowState {
    fields: Fields,
    detection: Detection,
    test_passed: bool,
    test_result_is_current: bool,
    persisted: Option<PersistedDefaults>,
    save: Operation<()>,
    test: Operation<DeliveryId>,
    clear: Operation<()>,
}

impl WorkflowState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from stored settings. The credential is never returned by the
    /// store, so it starts empty.
    #[must_use]
    pub fn from_persisted(settings: Option<&PersistedSettings>) -> Self {
        let Some(settings) = settings else {
            return Self::default();
        };

        let defaults = PersistedDefaults {
            email: settings.email.clone(),
            host: settings.smtp_host.clone(),
            port: settings.smtp_port.to_string(),
        };

        Self {
            fields: Fields::new(
                defaults.email.clone(),
                String::new(),
                defaults.host.clone(),
                defaults.port.clone(),
            ),
            persisted: Some(defaults),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn fields(&self) -> &Fields {
        &self.fields
    }

    #[must_use]
    pub const fn detection(&self) -> &Detection {
        &self.detection
    }

    #[must_use]
    pub const fn test_passed(&self) -> bool {
        self.test_passed
    }

    #[must_use]
    pub const fn test_result_is_current(&self) -> bool {
        self.test_result_is_current
    }

    /// Save is allowed only after a successful test with the current fields.
    #[must_use]
    pub const fn can_save(&self) -> bool {
        self.test_passed
    }

    #[must_use]
    pub const fn host_port_locked(&self) -> bool {
        matches!(self.detection, Detection::Matched { .. })
    }

    #[must_use]
    pub const fn smtp_fields_visible(&self) -> bool {
        !matches!(self.detection, Detection::NoDomain)
    }

    #[must_use]
    pub fn has_persisted(&self) -> bool {
        self.persisted.is_some()
    }

    #[must_use]
    pub const fn is_submitting(&self, kind: OperationKind) -> bool {
        match kind {
            OperationKind::Save => self.save.is_submitting(),
            OperationKind::Test => self.test.is_submitting(),
            OperationKind::Clear => self.clear.is_submitting(),
        }
    }

    const fn invalidate_test(&mut self) {
        self.test_passed = false;
        self.test_result_is_current = false;
    }

    fn set_host_port(&mut self, host: String, port: String) -> bool {
        let changed = self.fields.host != host || self.fields.port != port;
        self.fields.host = host;
        self.fields.port = port;
        changed
    }

    /// Apply a user edit. Returns whether the value changed.
    ///
    /// A change to any field invalidates the last test result.
    pub fn edit(&mut self, field: Field, value: impl Into<String>) -> Result<bool, WorkflowError> {
        if matches!(field, Field::SmtpHost | Field::SmtpPort) && self.host_port_locked() {
            return Err(WorkflowError::FieldLocked(field));
        }

        let value = value.into();
        let current = slot(&mut self.fields, field);
        if *current == value {
            return Ok(false);
        }

        *current = value;
        self.invalidate_test();
        Ok(true)
    }

    /// Run provider detection on the current e-mail value.
    ///
    /// A match overwrites host and port with the profile. Entering the unknown
    /// state from any other state restores the persisted host and port, or
    /// clears them when nothing is persisted. Either overwrite counts as an
    /// edit when it changes a value.
    pub fn apply_detection(&mut self) -> &Detection {
        let detection = provider::detect(&self.fields.email);

        let changed = match &detection {
            Detection::NoDomain => false,
            Detection::Matched { profile, .. } => {
                self.set_host_port(profile.host.to_string(), profile.port.to_string())
            }
            Detection::Unknown { .. } if !self.detection.is_unknown() => {
                let (host, port) = self
                    .persisted
                    .as_ref()
                    .map(|defaults| (defaults.host.clone(), defaults.port.clone()))
                    .unwrap_or_default();
                self.set_host_port(host, port)
            }
            Detection::Unknown { .. } => false,
        };

        if changed {
            self.invalidate_test();
        }

        self.detection = detection;
        &self.detection
    }

    /// Start a save. Returns the ticket and the fields to submit.
    pub fn begin_save(&mut self) -> Result<(u64, Fields), WorkflowError> {
        if !self.can_save() {
            return Err(WorkflowError::TestRequired);
        }
        Ok((self.save.begin(), self.fields.clone()))
    }

    /// Start a test send. Marks the coming result as current.
    pub fn begin_test(&mut self) -> (u64, Fields) {
        self.test_result_is_current = true;
        (self.test.begin(), self.fields.clone())
    }

    pub fn begin_clear(&mut self) -> u64 {
        self.clear.begin()
    }

    /// Apply a finished request. Returns `false` when the completion was
    /// stale (superseded or abandoned) and has been dropped.
    pub fn complete(&mut self, completion: Completion) -> bool {
        match completion {
            Completion::Save {
                ticket,
                submitted,
                result,
            } => {
                let succeeded = result.is_ok();
                if !self.save.finish(ticket, Outcome::from_result(result)) {
                    return false;
                }
                if succeeded {
                    self.persisted = Some(PersistedDefaults {
                        email: submitted.email.trim().to_string(),
                        host: submitted.host.trim().to_string(),
                        port: submitted.port.trim().to_string(),
                    });
                }
                true
            }
            Completion::Test { ticket, result } => {
                let succeeded = result.is_ok();
                if !self.test.finish(ticket, Outcome::from_result(result)) {
                    return false;
                }
                if self.test_result_is_current {
                    self.test_passed = succeeded;
                }
                true
            }
            Completion::Clear { ticket, result } => {
                let succeeded = result.is_ok();
                if !self.clear.finish(ticket, Outcome::from_result(result)) {
                    return false;
                }
                if succeeded {
                    self.reset_after_clear();
                }
                true
            }
        }
    }

    fn reset_after_clear(&mut self) {
        self.fields = Fields::default();
        self.detection = Detection::NoDomain;
        self.invalidate_test();
        self.persisted = None;
        self.save.reset();
        self.test.reset();
    }

    #[must_use]
    pub fn view(&self) -> SettingsView {
        let profile = self.detection.profile();
        let current_test = self
            .test
            .last
            .as_ref()
            .filter(|_| self.test_result_is_current);

        SettingsView {
            fields: self.fields.clone(),
            detected_domain: self.detection.domain().map(ToString::to_string),
            provider: profile.map(|profile| profile.name),
            hint: profile.map(|profile| profile.hint),
            auto_detected: profile.is_some(),
            unknown_provider: self.detection.is_unknown(),
            host_port_locked: self.host_port_locked(),
            smtp_fields_visible: self.smtp_fields_visible(),
            can_save: self.can_save(),
            saving: self.save.is_submitting(),
            testing: self.test.is_submitting(),
            clearing: self.clear.is_submitting(),
            saved: matches!(self.save.last, Some(Outcome::Succeeded(()))),
            save_error: self.save.last.as_ref().and_then(Outcome::error).map(ToString::to_string),
            test_error: current_test.and_then(Outcome::error).map(ToString::to_string),
            test_delivery: current_test.and_then(|outcome| match outcome {
                Outcome::Succeeded(delivery) => Some(delivery.clone()),
                Outcome::Failed(_) => None,
            }),
            clear_error: self.clear.last.as_ref().and_then(Outcome::error).map(ToString::to_string),
            cleared: matches!(self.clear.last, Some(Outcome::Succeeded(()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn persisted(host: &str, port: u16) -> PersistedSettings {
        PersistedSettings {
            email: "owner@corp.example".to_string(),
            smtp_host: host.to_string(),
            smtp_port: port,
            secure: true,
            updated_at: Default::default(),
            has_credential: true,
        }
    }

    fn auth_failed() -> ActionError {
        ActionError::TestService {
            reason: "Authentication failed".to_string(),
        }
    }

    fn filled(email: &str) -> WorkflowState {
        let mut state = WorkflowState::new();
        state.edit(Field::Email, email).unwrap();
        state.apply_detection();
        state.edit(Field::Credential, "secret").unwrap();
        state
    }

    fn pass_test(state: &mut WorkflowState) {
        let (ticket, _) = state.begin_test();
        assert!(state.complete(Completion::Test {
            ticket,
            result: Ok(DeliveryId::new("d-1")),
        }));
    }

    #[test]
    fn test_matched_provider_locks_host_and_port() {
        let mut state = filled("user@gmail.com");

        assert_eq!(state.fields().host, "smtp.gmail.com");
        assert_eq!(state.fields().port, "587");
        assert!(state.host_port_locked());
        assert_eq!(
            state.edit(Field::SmtpHost, "smtp.other.example"),
            Err(WorkflowError::FieldLocked(Field::SmtpHost))
        );
        assert!(state.view().hint.unwrap().contains("App Password"));
    }

    #[test]
    fn test_unknown_resets_to_persisted_only_on_entry() {
        let mut state = WorkflowState::from_persisted(Some(&persisted("mail.corp.example", 2525)));
        state.apply_detection();
        assert!(state.detection().is_unknown());

        state.edit(Field::SmtpHost, "relay.corp.example").unwrap();
        state.edit(Field::Email, "owner@other.example").unwrap();
        state.apply_detection();
        assert_eq!(state.fields().host, "relay.corp.example");

        state.edit(Field::Email, "owner@gmail.com").unwrap();
        state.apply_detection();
        assert_eq!(state.fields().host, "smtp.gmail.com");

        state.edit(Field::Email, "owner@corp.example").unwrap();
        state.apply_detection();
        assert_eq!(state.fields().host, "mail.corp.example");
        assert_eq!(state.fields().port, "2525");
    }

    #[test]
    fn test_unknown_without_persisted_clears_host_and_port() {
        let mut state = filled("user@gmail.com");
        state.edit(Field::Email, "user@corp.example").unwrap();
        state.apply_detection();

        assert_eq!(state.fields().host, "");
        assert_eq!(state.fields().port, "");
        assert!(!state.host_port_locked());
    }

    #[test]
    fn test_no_domain_hides_but_keeps_smtp_fields() {
        let mut state = filled("user@gmail.com");
        state.edit(Field::Email, "user").unwrap();
        state.apply_detection();

        assert!(!state.smtp_fields_visible());
        assert_eq!(state.fields().host, "smtp.gmail.com");
        assert_eq!(state.detection(), &Detection::NoDomain);
    }

    #[test]
    fn test_edit_after_success_disables_save() {
        let mut state = filled("user@gmail.com");
        pass_test(&mut state);
        assert!(state.can_save());

        assert!(state.edit(Field::Credential, "secret2").unwrap());
        assert!(!state.can_save());
        assert!(!state.test_result_is_current());
        assert_eq!(state.begin_save(), Err(WorkflowError::TestRequired));
    }

    #[test]
    fn test_identical_value_is_not_an_edit() {
        let mut state = filled("user@gmail.com");
        pass_test(&mut state);

        assert!(!state.edit(Field::Credential, "secret").unwrap());
        assert!(state.can_save());
    }

    #[test]
    fn test_detection_without_change_keeps_gate() {
        let mut state = filled("user@corp.example");
        state.edit(Field::SmtpHost, "mail.corp.example").unwrap();
        state.edit(Field::SmtpPort, "587").unwrap();
        pass_test(&mut state);
        assert!(state.can_save());

        state.apply_detection();
        assert!(state.can_save());
    }

    #[test]
    fn test_superseded_test_response_is_dropped() {
        let mut state = filled("user@gmail.com");
        let (first, _) = state.begin_test();
        let (second, _) = state.begin_test();

        assert!(!state.complete(Completion::Test {
            ticket: first,
            result: Ok(DeliveryId::new("stale")),
        }));
        assert!(!state.can_save());
        assert!(state.is_submitting(OperationKind::Test));

        assert!(state.complete(Completion::Test {
            ticket: second,
            result: Err(auth_failed()),
        }));
        assert!(!state.can_save());
        assert_eq!(state.view().test_error.as_deref(), Some("Authentication failed"));
    }

    #[test]
    fn test_response_after_edit_is_recorded_but_hidden() {
        let mut state = filled("user@gmail.com");
        let (ticket, snapshot) = state.begin_test();
        assert_eq!(snapshot.credential, "secret");

        state.edit(Field::Credential, "typo").unwrap();
        assert!(state.complete(Completion::Test {
            ticket,
            result: Err(auth_failed()),
        }));

        let view = state.view();
        assert!(!view.can_save);
        assert!(!view.testing);
        assert_eq!(view.test_error, None);

        // Successful late response does not open the gate either.
        let (ticket, _) = state.begin_test();
        state.edit(Field::Credential, "typo2").unwrap();
        state.complete(Completion::Test {
            ticket,
            result: Ok(DeliveryId::new("late")),
        });
        assert!(!state.can_save());
    }

    #[test]
    fn test_save_success_refreshes_defaults_and_keeps_gate() {
        let mut state = filled("user@corp.example");
        state.edit(Field::SmtpHost, " mail.corp.example ").unwrap();
        state.edit(Field::SmtpPort, "2525").unwrap();
        pass_test(&mut state);

        let (ticket, submitted) = state.begin_save().unwrap();
        assert!(state.complete(Completion::Save {
            ticket,
            submitted,
            result: Ok(()),
        }));

        assert!(state.can_save());
        assert!(state.view().saved);
        assert!(state.has_persisted());

        // Leaving and re-entering the unknown state restores what was saved.
        state.edit(Field::Email, "user@gmail.com").unwrap();
        state.apply_detection();
        state.edit(Field::Email, "user@corp.example").unwrap();
        state.apply_detection();
        assert_eq!(state.fields().host, "mail.corp.example");
        assert_eq!(state.fields().port, "2525");
    }

    #[test]
    fn test_failed_save_keeps_fields_and_gate() {
        let mut state = filled("user@gmail.com");
        pass_test(&mut state);
        let before = state.fields().clone();

        let (ticket, submitted) = state.begin_save().unwrap();
        state.complete(Completion::Save {
            ticket,
            submitted,
            result: Err(ActionError::store(
                formline_common::StoreOperation::Save,
                "disk full",
            )),
        });

        assert_eq!(state.fields(), &before);
        assert!(state.can_save());
        assert_eq!(
            state.view().save_error.as_deref(),
            Some("Failed to save notification settings")
        );
    }

    #[test]
    fn test_clear_abandons_in_flight_requests() {
        let mut state = filled("user@gmail.com");
        pass_test(&mut state);
        let (save_ticket, submitted) = state.begin_save().unwrap();
        let (test_ticket, _) = state.begin_test();
        let clear_ticket = state.begin_clear();

        assert!(state.complete(Completion::Clear {
            ticket: clear_ticket,
            result: Ok(()),
        }));

        assert_eq!(state.fields(), &Fields::default());
        assert!(!state.test_passed());
        assert!(!state.test_result_is_current());
        assert!(!state.has_persisted());
        assert!(!state.is_submitting(OperationKind::Save));

        assert!(!state.complete(Completion::Test {
            ticket: test_ticket,
            result: Ok(DeliveryId::new("late")),
        }));
        assert!(!state.complete(Completion::Save {
            ticket: save_ticket,
            submitted,
            result: Ok(()),
        }));
        assert!(!state.can_save());
        assert!(state.view().cleared);
    }

    #[test]
    fn test_failed_clear_changes_nothing_else() {
        let mut state = filled("user@gmail.com");
        pass_test(&mut state);
        let ticket = state.begin_clear();

        state.complete(Completion::Clear {
            ticket,
            result: Err(ActionError::store(
                formline_common::StoreOperation::Clear,
                "locked",
            )),
        });

        assert_eq!(state.fields().email, "user@gmail.com");
        assert!(state.can_save());
        assert_eq!(
            state.view().clear_error.as_deref(),
            Some("Failed to clear notification settings")
        );
    }

    #[test]
    fn test_from_persisted_leaves_credential_empty() {
        let state = WorkflowState::from_persisted(Some(&persisted("mail.corp.example", 465)));

        assert_eq!(state.fields().email, "owner@corp.example");
        assert_eq!(state.fields().credential, "");
        assert_eq!(state.fields().port, "465");
        assert!(!state.can_save());
    }
}
