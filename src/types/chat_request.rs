use serde::{Deserialize, Serialize};

use crate::types::{GenerationOptions, RollingContext, Turn};

/// Body of a `POST /chat` request.
///
/// Requests are always non-streaming: the server answers with one complete JSON document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The model to run.
    pub model: String,

    /// The conversation so far, oldest first.
    pub messages: Vec<Turn>,

    /// Always `false`.
    pub stream: bool,

    /// The rolling context from the previous exchange, replayed verbatim.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<RollingContext>,

    /// Sampling options.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<GenerationOptions>,
}

impl ChatRequest {
    /// Create a new non-streaming `ChatRequest`.
    pub fn new(model: impl Into<String>, messages: Vec<Turn>) -> Self {
        Self {
            model: model.into(),
            messages,
            stream: false,
            context: None,
            options: None,
        }
    }

    /// Attach the rolling context, if any.
    pub fn with_context(mut self, context: Option<RollingContext>) -> Self {
        self.context = context;
        self
    }

    /// Attach sampling options; empty options are dropped from the payload.
    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = if options.is_empty() {
            None
        } else {
            Some(options)
        };
        self
    }
}
