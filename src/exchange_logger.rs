//! Logging trait for inference server exchanges.
//!
//! This module provides the [`ExchangeLogger`] trait that allows users to capture every
//! payload passing through an [`InferenceClient`](crate::InferenceClient).

use crate::types::{CatalogResponse, ChatRequest, ChatResponse};

/// A trait for logging inference server exchanges.
///
/// Implement this trait to record the wire traffic of a session.  Loggers only observe
/// successfully encoded requests and successfully decoded responses; failures are reported
/// through the returned [`Error`](crate::Error).
///
/// # Example
///
/// ```rust,ignore
/// use lochat::{ChatRequest, ChatResponse, CatalogResponse, ExchangeLogger};
/// use std::io::Write;
/// use std::sync::Mutex;
///
/// struct FileLogger {
///     file: Mutex<std::fs::File>,
/// }
///
/// impl ExchangeLogger for FileLogger {
///     fn log_request(&self, request: &ChatRequest) {
///         let mut file = self.file.lock().unwrap();
///         writeln!(file, "> {}", serde_json::to_string(request).unwrap()).unwrap();
///     }
///
///     fn log_response(&self, response: &ChatResponse) {
///         let mut file = self.file.lock().unwrap();
///         writeln!(file, "< {}", serde_json::to_string(response).unwrap()).unwrap();
///     }
///
///     fn log_catalog(&self, catalog: &CatalogResponse) {
///         let mut file = self.file.lock().unwrap();
///         writeln!(file, "catalog {}", serde_json::to_string(catalog).unwrap()).unwrap();
///     }
/// }
/// ```
pub trait ExchangeLogger: Send + Sync {
    /// Log a chat request just before it is sent.
    fn log_request(&self, request: &ChatRequest);

    /// Log a decoded chat response.
    fn log_response(&self, response: &ChatResponse);

    /// Log a decoded catalog response.
    fn log_catalog(&self, catalog: &CatalogResponse);
}
