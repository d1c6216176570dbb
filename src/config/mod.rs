pub mod settings;
pub mod persistence;
pub mod store;

pub use settings::{ConfigurationRecord, SettingField, SettingValue, ValueKind, ALL_CAST};
pub use persistence::{SettingsPersistence, MemoryPersistence};
pub use store::{ConfigurationStore, PersistReceipt, PersistenceStats};
