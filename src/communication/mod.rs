pub mod types;
pub mod handler;
pub mod host_persistence;

pub use types::{OutgoingMessage, Request, Response};
pub use handler::MessageHandler;
pub use host_persistence::HostChannelPersistence;
