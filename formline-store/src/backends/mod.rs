mod memory;
mod sqlite;

pub use memory::MemorySettingsStore;
pub use sqlite::SqliteSettingsStore;
