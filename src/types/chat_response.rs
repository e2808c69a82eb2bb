use serde::{Deserialize, Serialize};

use crate::types::RollingContext;

/// The `message` object of a chat response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMessage {
    /// The assistant's reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Body of a successful `POST /chat` response.
///
/// Every field is optional; unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    /// The assistant message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<ResponseMessage>,

    /// Single-string reply used by servers that do not send `message`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,

    /// Rolling context to replay on the next request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<RollingContext>,

    /// Number of prompt tokens the server evaluated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_eval_count: Option<u64>,

    /// Number of tokens the server generated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eval_count: Option<u64>,
}

impl ChatResponse {
    /// The reply text: `message.content` when present, otherwise `response`.
    pub fn reply_text(&self) -> Option<&str> {
        match self.message.as_ref().and_then(|m| m.content.as_deref()) {
            Some(content) => Some(content),
            None => self.response.as_deref(),
        }
    }
}
