pub mod error_handling;

pub use error_handling::{PluginError, PluginResult};
