use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinSet;
use crate::config::persistence::SettingsPersistence;
use crate::config::settings::{ConfigurationRecord, SettingField, SettingValue};
use crate::utils::error_handling::{PluginResult, PluginError};

/// Holds the live settings record and issues a persistence write for every change.
///
/// The in-memory record is the source of truth. Each `set` updates it synchronously and
/// then spawns one write of the full record; writes are issued in call order but may
/// complete in any order.
pub struct ConfigurationStore {
    record: Mutex<ConfigurationRecord>,
    persistence: Arc<dyn SettingsPersistence>,
    runtime: Handle,
    in_flight: Mutex<JoinSet<()>>,
    next_sequence: AtomicU64,
    counters: Arc<PersistenceCounters>,
}

#[derive(Debug, Default)]
struct PersistenceCounters {
    issued: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
}

/// Snapshot of persistence activity since load
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistenceStats {
    pub issued: u64,
    pub succeeded: u64,
    pub failed: u64,
}

/// Handle to one issued persistence write
#[derive(Debug)]
pub struct PersistReceipt {
    sequence: u64,
    issued_at: DateTime<Utc>,
    outcome: oneshot::Receiver<PluginResult<()>>,
}

impl PersistReceipt {
    /// Issue order of this write, starting at 1
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// Wait for the write to finish and return its result
    pub async fn outcome(self) -> PluginResult<()> {
        self.outcome
            .await
            .map_err(|_| PluginError::persistence("write task ended without reporting a result"))?
    }
}

impl ConfigurationStore {
    /// Load stored settings, or defaults on first run.
    ///
    /// Must be called from within a tokio runtime; later writes are spawned on it.
    pub async fn load(persistence: Arc<dyn SettingsPersistence>) -> PluginResult<Arc<Self>> {
        let runtime = Handle::try_current()
            .map_err(|e| PluginError::config(&format!("No async runtime available: {}", e)))?;

        let record = match persistence.load().await? {
            Some(document) => {
                log::info!("Loaded stored settings");
                ConfigurationRecord::from_document(&document)?
            }
            None => {
                log::info!("No stored settings found, using defaults");
                ConfigurationRecord::default()
            }
        };

        Ok(Arc::new(Self::with_record(record, persistence, runtime)))
    }

    /// Build a store around an existing record
    pub fn with_record(
        record: ConfigurationRecord,
        persistence: Arc<dyn SettingsPersistence>,
        runtime: Handle,
    ) -> Self {
        ConfigurationStore {
            record: Mutex::new(record),
            persistence,
            runtime,
            in_flight: Mutex::new(JoinSet::new()),
            next_sequence: AtomicU64::new(1),
            counters: Arc::new(PersistenceCounters::default()),
        }
    }

    /// Get a copy of the current record
    pub fn get(&self) -> ConfigurationRecord {
        self.lock_record().clone()
    }

    /// Write one field and schedule persistence of the whole record.
    ///
    /// The change is visible to `get` as soon as this returns. The returned receipt may be
    /// dropped; write failures are logged either way.
    pub fn set(&self, field: SettingField, value: SettingValue) -> PluginResult<PersistReceipt> {
        let (snapshot, sequence) = {
            let mut record = self.lock_record();
            record.apply(field, value)?;
            (record.clone(), self.next_sequence.fetch_add(1, Ordering::SeqCst))
        };

        log::debug!("Setting {} updated, issuing write #{}", field, sequence);
        Ok(self.schedule_persist(snapshot, sequence))
    }

    /// Parse host text input for `field` and write it.
    ///
    /// Unparsable input is rejected and the previous value kept.
    pub fn set_from_text(&self, field: SettingField, text: &str) -> PluginResult<PersistReceipt> {
        let value = field.parse_text(text)?;
        self.set(field, value)
    }

    /// Wait for all outstanding writes, then persist the current record once more
    pub async fn flush(&self) -> PluginResult<()> {
        let mut pending = std::mem::take(&mut *self.lock_in_flight());
        while let Some(joined) = pending.join_next().await {
            if let Err(e) = joined {
                log::error!("Settings write task did not finish: {}", e);
            }
        }

        let (snapshot, sequence) = {
            let record = self.lock_record();
            (record.clone(), self.next_sequence.fetch_add(1, Ordering::SeqCst))
        };
        log::info!("Flushing settings (write #{})", sequence);
        self.schedule_persist(snapshot, sequence).outcome().await
    }

    /// Number of writes issued but not yet finished
    pub fn pending_writes(&self) -> usize {
        let mut in_flight = self.lock_in_flight();
        while in_flight.try_join_next().is_some() {}
        in_flight.len()
    }

    pub fn stats(&self) -> PersistenceStats {
        PersistenceStats {
            issued: self.counters.issued.load(Ordering::SeqCst),
            succeeded: self.counters.succeeded.load(Ordering::SeqCst),
            failed: self.counters.failed.load(Ordering::SeqCst),
        }
    }

    fn schedule_persist(&self, snapshot: ConfigurationRecord, sequence: u64) -> PersistReceipt {
        let (sender, receiver) = oneshot::channel();
        let persistence = Arc::clone(&self.persistence);
        let counters = Arc::clone(&self.counters);
        counters.issued.fetch_add(1, Ordering::SeqCst);

        let mut in_flight = self.lock_in_flight();
        // Reap finished writes so the set does not grow with every edit
        while in_flight.try_join_next().is_some() {}
        in_flight.spawn_on(
            async move {
                let outcome = persistence.persist(snapshot).await;
                match &outcome {
                    Ok(()) => {
                        counters.succeeded.fetch_add(1, Ordering::SeqCst);
                        log::debug!("Settings write #{} completed", sequence);
                    }
                    Err(e) => {
                        counters.failed.fetch_add(1, Ordering::SeqCst);
                        log::error!("Settings write #{} failed: {}", sequence, e);
                    }
                }
                // Receiver may have been dropped by a fire-and-forget caller
                let _ = sender.send(outcome);
            },
            &self.runtime,
        );

        PersistReceipt {
            sequence,
            issued_at: Utc::now(),
            outcome: receiver,
        }
    }

    fn lock_record(&self) -> MutexGuard<'_, ConfigurationRecord> {
        self.record.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.in_flight.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::persistence::MemoryPersistence;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use tokio::sync::Notify;
    use tokio_test::{assert_err, assert_ok};

    /// Persistence that holds writes whose api key starts with "slow" until released
    #[derive(Default)]
    struct GatedPersistence {
        gate: Notify,
        completed: Mutex<Vec<String>>,
    }

    impl GatedPersistence {
        fn completed(&self) -> Vec<String> {
            self.completed.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SettingsPersistence for GatedPersistence {
        async fn load(&self) -> PluginResult<Option<Value>> {
            Ok(None)
        }

        async fn persist(&self, record: ConfigurationRecord) -> PluginResult<()> {
            if record.api_key.starts_with("slow") {
                self.gate.notified().await;
            }
            self.completed.lock().unwrap().push(record.api_key);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_load_applies_defaults_to_missing_keys() {
        let persistence = Arc::new(MemoryPersistence::with_document(json!({ "castCount": 12 })));
        let store = ConfigurationStore::load(persistence).await.unwrap();

        let record = store.get();
        assert_eq!(record.cast_count, 12);
        assert_eq!(record.root_directory, "/");
        assert_eq!(store.stats(), PersistenceStats::default());
    }

    #[tokio::test]
    async fn test_set_is_visible_before_write_completes() {
        let persistence = Arc::new(GatedPersistence::default());
        let store = ConfigurationStore::load(persistence.clone()).await.unwrap();

        let receipt = store
            .set(SettingField::ApiKey, SettingValue::Text("slow-key".to_string()))
            .unwrap();

        assert_eq!(store.get().api_key, "slow-key");
        assert!(persistence.completed().is_empty());

        persistence.gate.notify_one();
        assert_ok!(receipt.outcome().await);
        assert_eq!(persistence.completed(), vec!["slow-key"]);
    }

    #[tokio::test]
    async fn test_every_set_issues_one_write() {
        let persistence = Arc::new(MemoryPersistence::new());
        let store = ConfigurationStore::load(persistence.clone()).await.unwrap();

        let receipts = vec![
            store.set(SettingField::UseBanner, SettingValue::Bool(true)).unwrap(),
            store.set(SettingField::ShowSeasons, SettingValue::Bool(true)).unwrap(),
            store.set(SettingField::CastCount, SettingValue::Integer(8)).unwrap(),
        ];

        let sequences: Vec<u64> = receipts.iter().map(PersistReceipt::sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3]);

        for receipt in receipts {
            assert_ok!(receipt.outcome().await);
        }

        assert_eq!(persistence.write_count(), 3);
        assert_eq!(store.stats(), PersistenceStats { issued: 3, succeeded: 3, failed: 0 });
        assert_eq!(persistence.stored().unwrap()["castCount"], json!(8));
    }

    #[tokio::test]
    async fn test_writes_may_complete_out_of_order() {
        let persistence = Arc::new(GatedPersistence::default());
        let store = ConfigurationStore::load(persistence.clone()).await.unwrap();

        let first = store
            .set(SettingField::ApiKey, SettingValue::Text("slow".to_string()))
            .unwrap();
        let second = store
            .set(SettingField::ApiKey, SettingValue::Text("fast".to_string()))
            .unwrap();

        assert_ok!(second.outcome().await);
        assert_eq!(persistence.completed(), vec!["fast"]);
        assert_eq!(store.get().api_key, "fast");

        persistence.gate.notify_one();
        assert_ok!(first.outcome().await);
        assert_eq!(persistence.completed(), vec!["fast", "slow"]);
        // The record is unaffected by the late write
        assert_eq!(store.get().api_key, "fast");
    }

    #[tokio::test]
    async fn test_flush_waits_for_outstanding_writes() {
        let persistence = Arc::new(GatedPersistence::default());
        let store = ConfigurationStore::load(persistence.clone()).await.unwrap();

        store.set(SettingField::ApiKey, SettingValue::Text("slow".to_string())).unwrap();
        store.set(SettingField::ApiKey, SettingValue::Text("done".to_string())).unwrap();
        assert!(store.pending_writes() > 0);

        let (flushed, _) = tokio::join!(store.flush(), async {
            tokio::task::yield_now().await;
            persistence.gate.notify_one();
        });

        assert_ok!(flushed);
        let completed = persistence.completed();
        assert_eq!(completed.len(), 3);
        assert!(completed[..2].contains(&"slow".to_string()));
        assert_eq!(completed[2], "done");
        assert_eq!(store.pending_writes(), 0);
    }

    #[tokio::test]
    async fn test_cast_count_text_input() {
        let persistence = Arc::new(MemoryPersistence::new());
        let store = ConfigurationStore::load(persistence.clone()).await.unwrap();
        assert_eq!(store.get().cast_count, 5);

        let receipt = store.set_from_text(SettingField::CastCount, "-1").unwrap();
        assert_eq!(store.get().cast_count, -1);
        assert_ok!(receipt.outcome().await);

        let rejected = store.set_from_text(SettingField::CastCount, "abc");
        assert!(matches!(rejected, Err(PluginError::InvalidValue { .. })));
        assert_eq!(store.get().cast_count, -1);
        assert_eq!(store.stats().issued, 1);
    }

    #[tokio::test]
    async fn test_type_mismatch_is_rejected_without_write() {
        let persistence = Arc::new(MemoryPersistence::new());
        let store = ConfigurationStore::load(persistence.clone()).await.unwrap();

        let result = store.set(SettingField::Formats, SettingValue::Bool(true));
        assert!(matches!(result, Err(PluginError::TypeMismatch { .. })));
        assert_eq!(store.get().formats, vec!["DVD", "Blu-ray", "Plex"]);
        assert_eq!(store.stats().issued, 0);
    }

    #[tokio::test]
    async fn test_empty_root_directory_is_rejected_without_write() {
        let persistence = Arc::new(MemoryPersistence::new());
        let store = ConfigurationStore::load(persistence.clone()).await.unwrap();

        let result = store.set(SettingField::RootDirectory, SettingValue::Text(String::new()));
        assert!(matches!(result, Err(PluginError::InvalidValue { .. })));
        assert!(store.set_from_text(SettingField::RootDirectory, "").is_err());
        assert_eq!(store.get().root_directory, "/");
        assert_eq!(store.stats().issued, 0);
    }

    #[tokio::test]
    async fn test_failed_write_keeps_in_memory_value() {
        let persistence = Arc::new(MemoryPersistence::new());
        let store = ConfigurationStore::load(persistence.clone()).await.unwrap();
        persistence.set_failing(true);

        let receipt = store
            .set(SettingField::RootDirectory, SettingValue::Text("Movies".to_string()))
            .unwrap();
        assert_err!(receipt.outcome().await);

        assert_eq!(store.get().root_directory, "Movies");
        assert_eq!(store.stats(), PersistenceStats { issued: 1, succeeded: 0, failed: 1 });

        persistence.set_failing(false);
        assert_ok!(store.flush().await);
        assert_eq!(persistence.stored().unwrap()["rootDirectory"], json!("Movies"));
    }

    #[tokio::test]
    async fn test_dropped_receipt_still_writes() {
        let persistence = Arc::new(MemoryPersistence::new());
        let store = ConfigurationStore::load(persistence.clone()).await.unwrap();

        drop(store.set(SettingField::ShowCast, SettingValue::Bool(false)).unwrap());
        assert_ok!(store.flush().await);

        let history = persistence.history();
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|document| document["showCast"] == json!(false)));
    }
}
