use async_trait::async_trait;
use formline_common::{ActionError, DeliveryId, FormId, PersistedSettings, Submission};

/// The persistence actions a settings session calls.
///
/// Implemented in-process by the HTTP service; tests provide their own.
#[async_trait]
pub trait NotificationBackend: Send + Sync + 'static {
    /// Stored settings for the form, without the credential.
    async fn load(&self, form_id: &FormId) -> Result<Option<PersistedSettings>, ActionError>;

    /// Validate and upsert the submitted fields.
    async fn save(&self, form_id: &FormId, submission: Submission) -> Result<(), ActionError>;

    /// Validate the submitted fields and send a test e-mail with them.
    async fn test(&self, form_id: &FormId, submission: Submission)
    -> Result<DeliveryId, ActionError>;

    /// Remove the stored settings. Succeeds when there are none.
    async fn clear(&self, form_id: &FormId) -> Result<(), ActionError>;
}
