use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;
use crate::ui::ControlView;
use crate::utils::error_handling::{PluginResult, PluginError};

/// Requests read from the host, one JSON object per line
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Request {
    Ping,
    /// Stored settings document; only valid as the first request
    Load { settings: Value },
    GetSettings,
    SetField { field: String, value: Value },
    RenderSettings,
    OpenFormats,
    ToggleFormat { label: String, value: bool },
    ConfirmFormats,
    CloseFormats,
    Shutdown,
}

impl Request {
    pub fn parse(line: &str) -> PluginResult<Self> {
        serde_json::from_str(line)
            .map_err(|e| PluginError::protocol(&format!("Could not parse message: {}", e)))
    }
}

/// Messages written to the host
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Response {
    Startup { status: String },
    Pong,
    Settings { settings: Value },
    FieldUpdated { field: String, sequence: u64 },
    SettingsView { headings: Vec<String>, controls: Vec<ControlView> },
    FormatsDialog { dialog_id: Uuid, labels: Vec<String>, default: bool },
    FormatToggled { selection: Vec<String> },
    FormatsSelected { formats: String },
    FormatsClosed,
    /// Full settings document the host should store
    Persist { settings: Value },
    Shutdown,
    Error { message: String },
}

/// A response stamped with an id and creation time
#[derive(Debug, Clone)]
pub struct OutgoingMessage {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub payload: Response,
}

impl OutgoingMessage {
    pub fn new(payload: Response) -> Self {
        OutgoingMessage {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            payload,
        }
    }

    /// Serialize as a single protocol line (without the newline)
    pub fn to_line(&self) -> PluginResult<String> {
        let mut value = serde_json::to_value(&self.payload)?;
        if let Value::Object(object) = &mut value {
            object.insert("id".to_string(), Value::String(self.id.to_string()));
            object.insert("timestamp".to_string(), serde_json::to_value(self.timestamp)?);
        }
        Ok(serde_json::to_string(&value)?)
    }
}
