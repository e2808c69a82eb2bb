//! Token accounting derived from the latest successful exchange.

use serde::Serialize;

use crate::types::{ChatResponse, RollingContext};

/// Token counts reported for one exchange.
///
/// A field is `None` when the server did not report it, which is distinct from a reported
/// zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TelemetrySnapshot {
    /// Prompt tokens the server evaluated.
    pub prompt_tokens: Option<u64>,
    /// Tokens the server generated.
    pub completion_tokens: Option<u64>,
    /// Length of the rolling context after the exchange.
    pub context_tokens: Option<u64>,
}

impl TelemetrySnapshot {
    /// Derive a snapshot from a response and the rolling context in effect after it.
    pub fn derive(response: &ChatResponse, context: Option<&RollingContext>) -> Self {
        Self {
            prompt_tokens: response.prompt_eval_count,
            completion_tokens: response.eval_count,
            context_tokens: context.and_then(|c| c.len()).map(|n| n as u64),
        }
    }

    /// True when no count is present.
    pub fn is_absent(&self) -> bool {
        self.prompt_tokens.is_none()
            && self.completion_tokens.is_none()
            && self.context_tokens.is_none()
    }
}

/// Holds the snapshot for the most recent successful exchange and nothing older.
#[derive(Debug, Clone, Default)]
pub struct TokenTelemetry {
    latest: TelemetrySnapshot,
}

impl TokenTelemetry {
    /// Creates telemetry with every count absent.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the snapshot with one derived from a successful exchange.
    pub fn record(
        &mut self,
        response: &ChatResponse,
        context: Option<&RollingContext>,
    ) -> TelemetrySnapshot {
        self.latest = TelemetrySnapshot::derive(response, context);
        self.latest
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.latest
    }

    /// Reset every count to absent.
    pub fn clear(&mut self) {
        self.latest = TelemetrySnapshot::default();
    }
}
