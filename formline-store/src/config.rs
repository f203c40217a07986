use std::{path::PathBuf, sync::Arc};

use serde::Deserialize;

use crate::{MemorySettingsStore, SettingsStore, SqliteSettingsStore};

/// Which backend holds notification settings.
///
/// ```ron
/// store: Sqlite(path: "/var/lib/formline/formline.db"),
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
pub enum StoreConfig {
    /// Settings live only for the lifetime of the process.
    #[default]
    Memory,

    /// Settings live in a SQLite database file.
    Sqlite { path: PathBuf },
}

impl StoreConfig {
    /// Build the configured store.
    pub fn build(&self) -> crate::Result<Arc<dyn SettingsStore>> {
        Ok(match self {
            Self::Memory => Arc::new(MemorySettingsStore::new()),
            Self::Sqlite { path } => Arc::new(SqliteSettingsStore::open(path)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_variants() {
        let memory: StoreConfig = ron::from_str("Memory").unwrap();
        assert_eq!(memory, StoreConfig::Memory);

        let sqlite: StoreConfig = ron::from_str(r#"Sqlite(path: "/tmp/formline.db")"#).unwrap();
        assert_eq!(
            sqlite,
            StoreConfig::Sqlite {
                path: PathBuf::from("/tmp/formline.db")
            }
        );
    }

    #[test]
    fn test_build_memory_store() {
        assert!(StoreConfig::Memory.build().is_ok());
    }
}
