use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use crate::config::settings::ConfigurationRecord;
use crate::utils::error_handling::{PluginResult, PluginError};

/// Storage collaborator supplied by the host.
///
/// `persist` always receives the whole record and overwrites whatever was stored before.
/// Calls may run concurrently; implementations decide whether to serialize them.
#[async_trait]
pub trait SettingsPersistence: Send + Sync {
    /// Fetch the stored settings document, `None` on first run
    async fn load(&self) -> PluginResult<Option<Value>>;

    /// Overwrite the stored settings with `record`
    async fn persist(&self, record: ConfigurationRecord) -> PluginResult<()>;
}

/// In-process persistence that keeps every written document
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    stored: Mutex<Option<Value>>,
    history: Mutex<Vec<Value>>,
    failing: AtomicBool,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a previously stored document
    pub fn with_document(document: Value) -> Self {
        MemoryPersistence {
            stored: Mutex::new(Some(document)),
            ..Self::default()
        }
    }

    /// Make subsequent `persist` calls fail until switched back
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Currently stored document
    pub fn stored(&self) -> Option<Value> {
        self.stored.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Every successfully written document, in completion order
    pub fn history(&self) -> Vec<Value> {
        self.history.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn write_count(&self) -> usize {
        self.history.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl SettingsPersistence for MemoryPersistence {
    async fn load(&self) -> PluginResult<Option<Value>> {
        Ok(self.stored())
    }

    async fn persist(&self, record: ConfigurationRecord) -> PluginResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PluginError::persistence("storage is unavailable"));
        }

        let document = record.to_document()?;
        *self.stored.lock().unwrap_or_else(|e| e.into_inner()) = Some(document.clone());
        self.history.lock().unwrap_or_else(|e| e.into_inner()).push(document);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_memory_persistence_starts_empty() {
        let persistence = MemoryPersistence::new();
        assert_eq!(assert_ok!(persistence.load().await), None);
        assert_eq!(persistence.write_count(), 0);
    }

    #[tokio::test]
    async fn test_memory_persistence_overwrites_whole_record() {
        let persistence = MemoryPersistence::with_document(json!({ "apiKey": "first" }));

        let mut record = ConfigurationRecord::default();
        record.cast_count = -1;
        assert_ok!(persistence.persist(record).await);

        let stored = persistence.stored().unwrap();
        assert_eq!(stored["castCount"], json!(-1));
        assert_eq!(stored["apiKey"], json!(""));
        assert_eq!(persistence.write_count(), 1);
    }

    #[tokio::test]
    async fn test_memory_persistence_failure_keeps_previous_document() {
        let persistence = MemoryPersistence::with_document(json!({ "apiKey": "kept" }));
        persistence.set_failing(true);

        assert_err!(persistence.persist(ConfigurationRecord::default()).await);
        assert_eq!(persistence.stored().unwrap()["apiKey"], json!("kept"));
        assert!(persistence.history().is_empty());
    }
}
