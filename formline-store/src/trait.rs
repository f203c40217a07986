use async_trait::async_trait;
use formline_common::{FormId, NotificationConfig, SmtpSettings};

/// Persistence for per-form notification settings.
///
/// Every operation is keyed on the form id. A form has at most one
/// configuration; [`SettingsStore::upsert`] writes all fields at once and
/// stamps `updated_at`, and the stored row always has `secure = true`.
#[async_trait]
pub trait SettingsStore: Send + Sync + std::fmt::Debug {
    /// Whether the form is known to the store.
    async fn form_exists(&self, form_id: &FormId) -> crate::Result<bool>;

    /// Record a form id. Registering an existing form is a no-op.
    async fn register_form(&self, form_id: &FormId) -> crate::Result<()>;

    /// The configuration for a form, if one has been saved.
    async fn find_by_form_id(&self, form_id: &FormId) -> crate::Result<Option<NotificationConfig>>;

    /// Insert the configuration for a form, or replace every field of the
    /// existing one. The row id is kept across updates.
    async fn upsert(
        &self,
        form_id: &FormId,
        settings: &SmtpSettings,
    ) -> crate::Result<NotificationConfig>;

    /// Remove the configuration for a form.
    ///
    /// Returns whether a row was removed; absence is not an error.
    async fn delete_by_form_id(&self, form_id: &FormId) -> crate::Result<bool>;
}
