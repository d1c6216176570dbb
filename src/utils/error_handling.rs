use thiserror::Error;

/// Plugin-specific error types
#[derive(Error, Debug)]
pub enum PluginError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Type mismatch for {field}: expected {expected}, got {actual}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Dialog error: {0}")]
    Dialog(String),

    #[error("UI host error: {0}")]
    Ui(String),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// Result type alias for plugin operations
pub type PluginResult<T> = Result<T, PluginError>;

impl PluginError {
    /// Create a configuration error
    pub fn config(msg: &str) -> Self {
        PluginError::Configuration(msg.to_string())
    }

    pub fn invalid_value(field: &str, reason: &str) -> Self {
        PluginError::InvalidValue {
            field: field.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create a persistence error
    pub fn persistence(msg: &str) -> Self {
        PluginError::Persistence(msg.to_string())
    }

    /// Create a dialog state error
    pub fn dialog(msg: &str) -> Self {
        PluginError::Dialog(msg.to_string())
    }

    /// Create a UI host error
    pub fn ui(msg: &str) -> Self {
        PluginError::Ui(msg.to_string())
    }

    pub fn protocol(msg: &str) -> Self {
        PluginError::Protocol(msg.to_string())
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            PluginError::Io(e) => format!("Host communication failed: {}", e),
            PluginError::Configuration(msg) => format!("Configuration issue: {}", msg),
            PluginError::InvalidValue { field, reason } => {
                format!("The value for '{}' was not accepted: {}", field, reason)
            }
            PluginError::TypeMismatch { field, expected, .. } => {
                format!("'{}' expects a {} value", field, expected)
            }
            PluginError::Serialization(e) => format!("Data processing error: {}", e),
            PluginError::Persistence(msg) => format!("Settings could not be saved: {}", msg),
            PluginError::Dialog(msg) => format!("Dialog error: {}", msg),
            PluginError::Ui(msg) => format!("Display error: {}", msg),
            PluginError::Protocol(msg) => format!("Invalid request: {}", msg),
        }
    }

    /// Check if error is recoverable.
    ///
    /// A malformed or interrupted read still leaves the host connection usable.
    pub fn is_recoverable(&self) -> bool {
        match self {
            PluginError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::InvalidData | std::io::ErrorKind::Interrupted
            ),
            PluginError::Configuration(_) => true,
            PluginError::InvalidValue { .. } => true,
            PluginError::TypeMismatch { .. } => true,
            PluginError::Serialization(_) => true,
            PluginError::Persistence(_) => true,
            PluginError::Dialog(_) => true,
            PluginError::Ui(_) => true,
            PluginError::Protocol(_) => true,
        }
    }
}
