use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, RwLock},
};

use async_trait::async_trait;
use chrono::Utc;
use formline_common::{ConfigId, FormId, NotificationConfig, SmtpSettings};

use crate::r#trait::SettingsStore;

/// In-memory settings store
///
/// Forms and configurations are kept in `HashMap`s behind an `RwLock`. It is
/// used by tests and by deployments that do not need settings to survive a
/// restart.
///
/// # Concurrency
/// Each operation takes the lock once, so an upsert is atomic with respect to
/// other operations on the same store.
#[derive(Debug, Clone, Default)]
pub struct MemorySettingsStore {
    forms: Arc<RwLock<HashSet<FormId>>>,
    configs: Arc<RwLock<HashMap<FormId, NotificationConfig>>>,
}

impl MemorySettingsStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored configurations.
    ///
    /// Recovers gracefully if the lock is poisoned by accessing the underlying data.
    #[must_use]
    pub fn len(&self) -> usize {
        self.configs
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn form_exists(&self, form_id: &FormId) -> crate::Result<bool> {
        Ok(self.forms.read()?.contains(form_id))
    }

    async fn register_form(&self, form_id: &FormId) -> crate::Result<()> {
        self.forms.write()?.insert(form_id.clone());
        Ok(())
    }

    async fn find_by_form_id(&self, form_id: &FormId) -> crate::Result<Option<NotificationConfig>> {
        Ok(self.configs.read()?.get(form_id).cloned())
    }

    async fn upsert(
        &self,
        form_id: &FormId,
        settings: &SmtpSettings,
    ) -> crate::Result<NotificationConfig> {
        let mut configs = self.configs.write()?;

        let id = configs
            .get(form_id)
            .map_or_else(ConfigId::generate, |existing| existing.id);

        let config = NotificationConfig {
            id,
            form_id: form_id.clone(),
            email: settings.email.clone(),
            credential: settings.credential.clone(),
            smtp_host: settings.host.clone(),
            smtp_port: settings.port,
            secure: true,
            updated_at: Utc::now(),
        };

        configs.insert(form_id.clone(), config.clone());

        Ok(config)
    }

    async fn delete_by_form_id(&self, form_id: &FormId) -> crate::Result<bool> {
        Ok(self.configs.write()?.remove(form_id).is_some())
    }
}
