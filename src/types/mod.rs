// Public modules
pub mod catalog_response;
pub mod chat_request;
pub mod chat_response;
pub mod generation_options;
pub mod role;
pub mod rolling_context;
pub mod turn;

// Re-exports
pub use catalog_response::{CatalogEntry, CatalogResponse};
pub use chat_request::ChatRequest;
pub use chat_response::{ChatResponse, ResponseMessage};
pub use generation_options::GenerationOptions;
pub use role::Role;
pub use rolling_context::RollingContext;
pub use turn::Turn;
