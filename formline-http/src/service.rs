//! The save, clear, test and load actions.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use formline_common::{
    ActionError, DeliveryId, FormId, PersistedSettings, SmtpSettings, StoreOperation, Submission,
};
use formline_smtp::EmailTestService;
use formline_store::{SettingsStore, StoreError};
use formline_workflow::NotificationBackend;
use sha2::{Digest, Sha256};

/// SHA-256 over the four fields, used to recognise settings that already
/// passed a test send without keeping the credential around.
fn fingerprint(settings: &SmtpSettings) -> String {
    let mut hasher = Sha256::new();
    for part in [
        settings.email.as_bytes(),
        settings.credential.expose().as_bytes(),
        settings.host.as_bytes(),
        &settings.port.to_be_bytes(),
    ] {
        hasher.update(part);
        hasher.update([0]);
    }
    hex::encode(hasher.finalize())
}

fn store_failure(operation: StoreOperation, form_id: &FormId, error: &StoreError) -> ActionError {
    tracing::error!(form = %form_id, %operation, %error, "Settings store failure");
    ActionError::store(operation, error)
}

/// Notification settings actions for every form.
///
/// Each action first checks that the form exists; a missing form is reported
/// before anything else is looked at and nothing is written.
pub struct NotificationService {
    store: Arc<dyn SettingsStore>,
    tester: Arc<dyn EmailTestService>,
    enforce_test_gate: bool,
    verified: DashMap<FormId, String>,
}

impl std::fmt::Debug for NotificationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationService")
            .field("tester", &self.tester)
            .field("enforce_test_gate", &self.enforce_test_gate)
            .field("verified", &self.verified.len())
            .finish_non_exhaustive()
    }
}

impl NotificationService {
    #[must_use]
    pub fn new(store: Arc<dyn SettingsStore>, tester: Arc<dyn EmailTestService>) -> Self {
        Self {
            store,
            tester,
            enforce_test_gate: false,
            verified: DashMap::new(),
        }
    }

    /// Refuse saves of settings that have not passed a test send.
    #[must_use]
    pub const fn with_test_gate(mut self, enforce: bool) -> Self {
        self.enforce_test_gate = enforce;
        self
    }

    #[must_use]
    pub const fn enforces_test_gate(&self) -> bool {
        self.enforce_test_gate
    }

    async fn require_form(&self, form_id: &FormId) -> Result<(), ActionError> {
        let exists = self
            .store
            .form_exists(form_id)
            .await
            .map_err(|e| store_failure(StoreOperation::Lookup, form_id, &e))?;

        if exists {
            Ok(())
        } else {
            tracing::debug!(form = %form_id, "Action on unknown form");
            Err(ActionError::NotFound(form_id.clone()))
        }
    }

    /// Stored settings for the form, without the credential.
    pub async fn load(&self, form_id: &FormId) -> Result<Option<PersistedSettings>, ActionError> {
        self.require_form(form_id).await?;

        let config = self
            .store
            .find_by_form_id(form_id)
            .await
            .map_err(|e| store_failure(StoreOperation::Load, form_id, &e))?;

        Ok(config.as_ref().map(formline_common::NotificationConfig::persisted))
    }

    /// Validate the submission and insert or replace the form's settings.
    pub async fn save(&self, form_id: &FormId, submission: &Submission) -> Result<(), ActionError> {
        self.require_form(form_id).await?;
        let settings = submission.validate()?;

        if self.enforce_test_gate {
            let tested = self
                .verified
                .get(form_id)
                .is_some_and(|entry| *entry == fingerprint(&settings));
            if !tested {
                tracing::info!(form = %form_id, "Refusing save of untested settings");
                return Err(ActionError::Unverified(form_id.clone()));
            }
        }

        let written = self
            .store
            .upsert(form_id, &settings)
            .await
            .map_err(|e| store_failure(StoreOperation::Save, form_id, &e))?;

        tracing::info!(form = %form_id, config = %written.id, host = %written.smtp_host, port = written.smtp_port, "Saved notification settings");
        Ok(())
    }

    /// Remove the form's settings. Succeeds when none are stored.
    pub async fn clear(&self, form_id: &FormId) -> Result<(), ActionError> {
        self.require_form(form_id).await?;

        let removed = self
            .store
            .delete_by_form_id(form_id)
            .await
            .map_err(|e| store_failure(StoreOperation::Clear, form_id, &e))?;
        self.verified.remove(form_id);

        tracing::info!(form = %form_id, removed, "Cleared notification settings");
        Ok(())
    }

    /// Validate the submission and send a test e-mail with it.
    pub async fn test(
        &self,
        form_id: &FormId,
        submission: &Submission,
    ) -> Result<DeliveryId, ActionError> {
        self.require_form(form_id).await?;
        let settings = submission.validate()?;

        match self.tester.send_test(&settings).await {
            Ok(delivery) => {
                self.verified.insert(form_id.clone(), fingerprint(&settings));
                Ok(delivery)
            }
            Err(failure) => {
                tracing::warn!(form = %form_id, %failure, "Test send for form failed");
                Err(ActionError::TestService {
                    reason: failure.user_message().to_string(),
                })
            }
        }
    }
}

#[async_trait]
impl NotificationBackend for NotificationService {
    async fn load(&self, form_id: &FormId) -> Result<Option<PersistedSettings>, ActionError> {
        Self::load(self, form_id).await
    }

    async fn save(&self, form_id: &FormId, submission: Submission) -> Result<(), ActionError> {
        Self::save(self, form_id, &submission).await
    }

    async fn test(
        &self,
        form_id: &FormId,
        submission: Submission,
    ) -> Result<DeliveryId, ActionError> {
        Self::test(self, form_id, &submission).await
    }

    async fn clear(&self, form_id: &FormId) -> Result<(), ActionError> {
        Self::clear(self, form_id).await
    }
}
