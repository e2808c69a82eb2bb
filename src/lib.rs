// Public modules
pub mod catalog;
pub mod chat;
pub mod client;
pub mod controller;
pub mod conversation;
pub mod error;
pub mod exchange_logger;
pub mod render;
pub mod session;
pub mod telemetry;
pub mod types;

mod observability;

#[cfg(test)]
mod testing;

// Re-exports
pub use catalog::ModelCatalog;
pub use client::{DEFAULT_BASE_URL, InferenceBackend, InferenceClient, parse_loopback_url};
pub use controller::{ChatRequestController, Exchange, Phase, RequestSettings};
pub use conversation::ConversationStore;
pub use error::{Error, Result};
pub use exchange_logger::ExchangeLogger;
pub use observability::register_biometrics;
pub use session::{Session, SessionStats};
pub use telemetry::{TelemetrySnapshot, TokenTelemetry};
pub use types::*;
