use async_trait::async_trait;
use serde_json::Value;
use std::sync::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use crate::communication::types::Response;
use crate::config::{ConfigurationRecord, SettingsPersistence};
use crate::utils::error_handling::{PluginResult, PluginError};

/// Persistence that hands every write to the host as a `persist` message
pub struct HostChannelPersistence {
    outbox: UnboundedSender<Response>,
    initial: Mutex<Option<Value>>,
}

impl HostChannelPersistence {
    pub fn new(outbox: UnboundedSender<Response>, initial: Option<Value>) -> Self {
        HostChannelPersistence {
            outbox,
            initial: Mutex::new(initial),
        }
    }
}

#[async_trait]
impl SettingsPersistence for HostChannelPersistence {
    async fn load(&self) -> PluginResult<Option<Value>> {
        // The host sends the stored document once, at startup
        Ok(self.initial.lock().unwrap_or_else(|e| e.into_inner()).take())
    }

    async fn persist(&self, record: ConfigurationRecord) -> PluginResult<()> {
        let settings = record.to_document()?;
        self.outbox
            .send(Response::Persist { settings })
            .map_err(|_| PluginError::persistence("host connection is closed"))
    }
}
