use std::{
    fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use formline_common::{ConfigId, Credential, FormId, NotificationConfig, SmtpSettings, tracing};
use rusqlite::{Connection, OptionalExtension, params};

use crate::{StoreError, r#trait::SettingsStore};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS forms (
        id TEXT PRIMARY KEY,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS notification_settings (
        id TEXT PRIMARY KEY,
        form_id TEXT NOT NULL UNIQUE REFERENCES forms(id) ON DELETE CASCADE,
        email TEXT NOT NULL,
        credential TEXT NOT NULL,
        smtp_host TEXT NOT NULL,
        smtp_port INTEGER NOT NULL,
        secure INTEGER NOT NULL,
        updated_at TEXT NOT NULL
    );
";

const SELECT_BY_FORM: &str = "
    SELECT id, form_id, email, credential, smtp_host, smtp_port, secure, updated_at
    FROM notification_settings
    WHERE form_id = ?1
";

/// Raw column values of a `notification_settings` row.
type SettingsRow = (String, String, String, String, String, i64, i64, String);

/// SQLite-backed settings store
///
/// One connection is shared behind a mutex and every statement runs on the
/// blocking thread pool. Upserts run inside a transaction and rely on the
/// `UNIQUE` constraint on `form_id`, so concurrent writers for the same form
/// resolve as last-write-wins.
#[derive(Debug, Clone)]
pub struct SqliteSettingsStore {
    path: Option<PathBuf>,
    connection: Arc<Mutex<Connection>>,
}

impl SqliteSettingsStore {
    /// Open (creating if needed) the database at `path` and apply the schema.
    pub fn open(path: &Path) -> crate::Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|source| StoreError::CreateParent {
                path: parent.display().to_string(),
                source,
            })?;
        }

        let connection = Connection::open(path).map_err(|source| StoreError::Open {
            path: path.display().to_string(),
            source,
        })?;
        connection.execute_batch("PRAGMA journal_mode=WAL;")?;

        tracing::info!(path = %path.display(), "Opened settings database");

        Self::with_connection(Some(path.to_path_buf()), connection)
    }

    /// A private in-memory database, mostly useful for tests.
    pub fn open_in_memory() -> crate::Result<Self> {
        let connection = Connection::open_in_memory().map_err(|source| StoreError::Open {
            path: ":memory:".to_string(),
            source,
        })?;

        Self::with_connection(None, connection)
    }

    fn with_connection(path: Option<PathBuf>, connection: Connection) -> crate::Result<Self> {
        connection.execute_batch("PRAGMA foreign_keys = ON;")?;
        connection.execute_batch(SCHEMA)?;

        Ok(Self {
            path,
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Location of the database file, `None` for in-memory databases.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    async fn run<T, F>(&self, f: F) -> crate::Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> crate::Result<T> + Send + 'static,
    {
        let connection = Arc::clone(&self.connection);
        tokio::task::spawn_blocking(move || {
            let mut guard = connection.lock()?;
            f(&mut guard)
        })
        .await?
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn select_by_form(connection: &Connection, form_id: &FormId) -> crate::Result<Option<NotificationConfig>> {
    connection
        .query_row(SELECT_BY_FORM, params![form_id.as_str()], |row| -> rusqlite::Result<SettingsRow> {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
                row.get(6)?,
                row.get(7)?,
            ))
        })
        .optional()?
        .map(decode_row)
        .transpose()
}

fn decode_row(row: SettingsRow) -> crate::Result<NotificationConfig> {
    let (id, form_id, email, credential, smtp_host, smtp_port, secure, updated_at) = row;

    let corrupted = |reason: String| StoreError::Corrupted {
        form_id: form_id.clone(),
        reason,
    };

    let id = id
        .parse::<ConfigId>()
        .map_err(|e| corrupted(format!("invalid id {id:?}: {e}")))?;
    let smtp_port = u16::try_from(smtp_port)
        .map_err(|_| corrupted(format!("port {smtp_port} out of range")))?;
    let updated_at = DateTime::parse_from_rfc3339(&updated_at)
        .map_err(|e| corrupted(format!("invalid updated_at {updated_at:?}: {e}")))?
        .with_timezone(&Utc);

    Ok(NotificationConfig {
        id,
        form_id: FormId::from(form_id),
        email,
        credential: Credential::new(credential),
        smtp_host,
        smtp_port,
        secure: secure != 0,
        updated_at,
    })
}

#[async_trait]
impl SettingsStore for SqliteSettingsStore {
    async fn form_exists(&self, form_id: &FormId) -> crate::Result<bool> {
        let form_id = form_id.clone();
        self.run(move |connection| {
            let found = connection
                .query_row(
                    "SELECT 1 FROM forms WHERE id = ?1",
                    params![form_id.as_str()],
                    |_| Ok(()),
                )
                .optional()?;
            Ok(found.is_some())
        })
        .await
    }

    async fn register_form(&self, form_id: &FormId) -> crate::Result<()> {
        let form_id = form_id.clone();
        self.run(move |connection| {
            connection.execute(
                "INSERT INTO forms (id, created_at) VALUES (?1, ?2) ON CONFLICT(id) DO NOTHING",
                params![form_id.as_str(), timestamp(Utc::now())],
            )?;
            Ok(())
        })
        .await
    }

    async fn find_by_form_id(&self, form_id: &FormId) -> crate::Result<Option<NotificationConfig>> {
        let form_id = form_id.clone();
        self.run(move |connection| select_by_form(connection, &form_id))
            .await
    }

    async fn upsert(
        &self,
        form_id: &FormId,
        settings: &SmtpSettings,
    ) -> crate::Result<NotificationConfig> {
        let form_id = form_id.clone();
        let settings = settings.clone();

        self.run(move |connection| {
            let tx = connection.transaction()?;
            tx.execute(
                "
                INSERT INTO notification_settings (
                    id, form_id, email, credential, smtp_host, smtp_port, secure, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7)
                ON CONFLICT(form_id) DO UPDATE SET
                    email = excluded.email,
                    credential = excluded.credential,
                    smtp_host = excluded.smtp_host,
                    smtp_port = excluded.smtp_port,
                    secure = excluded.secure,
                    updated_at = excluded.updated_at
                ",
                params![
                    ConfigId::generate().to_string(),
                    form_id.as_str(),
                    settings.email,
                    settings.credential.expose(),
                    settings.host,
                    i64::from(settings.port),
                    timestamp(Utc::now()),
                ],
            )?;

            let written = select_by_form(&tx, &form_id)?.ok_or_else(|| {
                StoreError::Internal(format!("row for form {form_id} vanished after upsert"))
            })?;
            tx.commit()?;

            Ok(written)
        })
        .await
    }

    async fn delete_by_form_id(&self, form_id: &FormId) -> crate::Result<bool> {
        let form_id = form_id.clone();
        self.run(move |connection| {
            let removed = connection.execute(
                "DELETE FROM notification_settings WHERE form_id = ?1",
                params![form_id.as_str()],
            )?;
            Ok(removed > 0)
        })
        .await
    }
}
