//! The request lifecycle of a chat exchange.
//!
//! A [`ChatRequestController`] moves through `Idle → Sending → {Success, Failed} → Idle` once
//! per exchange.  It owns the conversation and telemetry so that the only writers of either are
//! its completion handlers and [`ChatRequestController::reset`].

use std::cell::{Cell, RefCell};

use crate::client::InferenceBackend;
use crate::conversation::ConversationStore;
use crate::error::{Error, Result};
use crate::telemetry::{TelemetrySnapshot, TokenTelemetry};
use crate::types::{ChatRequest, ChatResponse, GenerationOptions, RollingContext, Turn};

/////////////////////////////////////////////// Phase //////////////////////////////////////////////

/// Where the controller is in the request lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Phase {
    /// No request in flight.
    #[default]
    Idle,
    /// A request has been issued and has not completed.
    Sending,
    /// The last request completed and its response was applied.
    Success,
    /// The last request failed; only the user's turn was recorded.
    Failed,
}

impl Phase {
    /// A short lowercase label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Sending => "sending",
            Phase::Success => "success",
            Phase::Failed => "failed",
        }
    }
}

////////////////////////////////////////// RequestSettings /////////////////////////////////////////

/// Per-request settings that are not part of the conversation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestSettings {
    /// Sent as a leading system message on every request.  Never stored as a turn.
    pub system_prompt: Option<String>,
    /// Sampling options for the `options` object.
    pub options: GenerationOptions,
}

///////////////////////////////////////////// Exchange /////////////////////////////////////////////

/// The result of one successful exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct Exchange {
    /// The assistant reply appended to the conversation, if the server sent one.
    pub reply: Option<String>,
    /// Token counts for this exchange.
    pub telemetry: TelemetrySnapshot,
}

/////////////////////////////////////// ChatRequestController //////////////////////////////////////

/// Orchestrates chat exchanges against an [`InferenceBackend`].
///
/// State lives in `Cell`/`RefCell` and no borrow is held across an `.await`, so the
/// controller can be driven by several interleaved commands on one task while a request is in
/// flight.  The controller is `!Sync`.
#[derive(Debug, Default)]
pub struct ChatRequestController {
    store: RefCell<ConversationStore>,
    telemetry: RefCell<TokenTelemetry>,
    phase: Cell<Phase>,
    last_outcome: Cell<Option<Phase>>,
    exchanges: Cell<u64>,
    failures: Cell<u64>,
}

impl ChatRequestController {
    /// Creates a controller with an empty conversation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Send `prompt` to `backend` as the next user turn.
    ///
    /// Validation happens before anything else: a blank prompt or a missing model fails with
    /// [`Error::Validation`] and leaves every piece of state untouched.  Once validation passes
    /// the user turn is recorded permanently, even if the exchange later fails.
    ///
    /// On success the assistant reply (when non-empty) is appended, the rolling context is
    /// replaced when the server sent one, and telemetry is recomputed.  On failure nothing but
    /// the user turn changes and the error is returned as [`Error::Request`].
    pub async fn send<B: InferenceBackend + ?Sized>(
        &self,
        backend: &B,
        model: Option<&str>,
        settings: &RequestSettings,
        prompt: &str,
    ) -> Result<Exchange> {
        if self.is_sending() {
            return Err(Error::busy("a request is already in flight"));
        }
        if prompt.trim().is_empty() {
            return Err(Error::validation(
                "prompt must not be empty",
                Some("prompt".to_string()),
            ));
        }
        let model = match model.map(str::trim) {
            Some(model) if !model.is_empty() => model,
            _ => {
                return Err(Error::validation(
                    "no model selected",
                    Some("model".to_string()),
                ));
            }
        };

        let request = {
            let mut store = self.store.borrow_mut();
            store.append(Turn::user(prompt))?;
            build_request(&store, model, settings)
        };

        let in_flight = InFlight::begin(self);
        match backend.chat(&request).await {
            Ok(response) => {
                let exchange = self.apply_success(&response)?;
                in_flight.finish(Phase::Success);
                tracing::info!(
                    turns = self.store.borrow().len(),
                    prompt_tokens = ?exchange.telemetry.prompt_tokens,
                    completion_tokens = ?exchange.telemetry.completion_tokens,
                    context_tokens = ?exchange.telemetry.context_tokens,
                    "exchange complete"
                );
                Ok(exchange)
            }
            Err(err) => {
                in_flight.finish(Phase::Failed);
                tracing::warn!(error = %err, "exchange failed");
                if err.is_request() {
                    Err(err)
                } else {
                    Err(Error::request(
                        err.status_code(),
                        err.to_string(),
                        Some(Box::new(err)),
                    ))
                }
            }
        }
    }

    fn apply_success(&self, response: &ChatResponse) -> Result<Exchange> {
        let mut store = self.store.borrow_mut();
        let reply = response
            .reply_text()
            .filter(|text| !text.is_empty())
            .map(String::from);
        if let Some(reply) = &reply {
            store.append(Turn::assistant(reply.clone()))?;
        }
        if let Some(context) = &response.context {
            store.replace_context(context.clone());
        }
        let telemetry = self
            .telemetry
            .borrow_mut()
            .record(response, store.rolling_context());
        self.exchanges.set(self.exchanges.get() + 1);
        Ok(Exchange { reply, telemetry })
    }

    /// Empty the conversation, drop the rolling context and clear telemetry.
    ///
    /// All three change together or not at all.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Busy`] while a request is in flight.
    pub fn reset(&self) -> Result<()> {
        if self.is_sending() {
            return Err(Error::busy("cannot reset while a request is in flight"));
        }
        self.store.borrow_mut().clear();
        self.telemetry.borrow_mut().clear();
        self.last_outcome.set(None);
        Ok(())
    }

    /// The current lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.phase.get()
    }

    /// True while a request is in flight.
    pub fn is_sending(&self) -> bool {
        self.phase.get() == Phase::Sending
    }

    /// How the most recent exchange ended, if there was one since the last reset.
    pub fn last_outcome(&self) -> Option<Phase> {
        self.last_outcome.get()
    }

    /// A copy of the conversation, oldest first.
    pub fn conversation(&self) -> Vec<Turn> {
        self.store.borrow().all().to_vec()
    }

    /// The number of turns in the conversation.
    pub fn turn_count(&self) -> usize {
        self.store.borrow().len()
    }

    /// The rolling context from the latest successful exchange.
    pub fn rolling_context(&self) -> Option<RollingContext> {
        self.store.borrow().rolling_context().cloned()
    }

    /// Telemetry for the latest successful exchange.
    pub fn telemetry(&self) -> TelemetrySnapshot {
        self.telemetry.borrow().snapshot()
    }

    /// Successful exchanges over the controller's lifetime.
    pub fn exchanges(&self) -> u64 {
        self.exchanges.get()
    }

    /// Failed exchanges over the controller's lifetime.
    pub fn failures(&self) -> u64 {
        self.failures.get()
    }

    fn transition(&self, to: Phase) {
        let from = self.phase.replace(to);
        tracing::trace!(from = from.as_str(), to = to.as_str(), "phase transition");
    }
}

fn build_request(
    store: &ConversationStore,
    model: &str,
    settings: &RequestSettings,
) -> ChatRequest {
    let mut messages = Vec::with_capacity(store.len() + 1);
    if let Some(system) = settings
        .system_prompt
        .as_deref()
        .filter(|s| !s.trim().is_empty())
    {
        messages.push(Turn::system(system));
    }
    messages.extend_from_slice(store.all());
    ChatRequest::new(model, messages)
        .with_context(store.rolling_context().cloned())
        .with_options(settings.options)
}

////////////////////////////////////////////// InFlight ////////////////////////////////////////////

/// Holds the controller in `Sending` for the duration of one exchange.
///
/// If the exchange future is dropped before completion the controller returns to `Idle` and
/// the exchange counts as failed.
struct InFlight<'a> {
    controller: &'a ChatRequestController,
    finished: bool,
}

impl<'a> InFlight<'a> {
    fn begin(controller: &'a ChatRequestController) -> Self {
        controller.transition(Phase::Sending);
        Self {
            controller,
            finished: false,
        }
    }

    fn finish(mut self, outcome: Phase) {
        self.complete(outcome);
    }

    fn complete(&mut self, outcome: Phase) {
        self.finished = true;
        if outcome == Phase::Failed {
            let failures = &self.controller.failures;
            failures.set(failures.get() + 1);
        }
        self.controller.last_outcome.set(Some(outcome));
        self.controller.transition(outcome);
        self.controller.transition(Phase::Idle);
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.complete(Phase::Failed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedBackend;
    use serde_json::json;
    use std::future::{Future, poll_fn};
    use std::pin::Pin;
    use std::task::Poll;

    fn settings() -> RequestSettings {
        RequestSettings::default()
    }

    #[tokio::test]
    async fn successful_exchange_appends_reply() {
        let backend = ScriptedBackend::new().with_chat_json(json!({
            "message": {"content": "hello"},
            "prompt_eval_count": 3,
            "eval_count": 2,
            "context": [1, 2, 3]
        }));
        let controller = ChatRequestController::new();

        let exchange = controller
            .send(&backend, Some("llama3.1:8b"), &settings(), "hi")
            .await
            .unwrap();

        assert_eq!(exchange.reply.as_deref(), Some("hello"));
        assert_eq!(
            controller.conversation(),
            vec![Turn::user("hi"), Turn::assistant("hello")]
        );
        assert_eq!(
            controller.telemetry(),
            TelemetrySnapshot {
                prompt_tokens: Some(3),
                completion_tokens: Some(2),
                context_tokens: Some(3),
            }
        );
        assert_eq!(controller.phase(), Phase::Idle);
        assert_eq!(controller.last_outcome(), Some(Phase::Success));
        assert_eq!(controller.exchanges(), 1);
    }

    #[tokio::test]
    async fn validation_happens_before_mutation() {
        let backend = ScriptedBackend::new();
        let controller = ChatRequestController::new();

        let err = controller
            .send(&backend, Some("m"), &settings(), "   ")
            .await
            .unwrap_err();
        assert!(err.is_validation());

        let err = controller
            .send(&backend, None, &settings(), "hi")
            .await
            .unwrap_err();
        assert!(err.is_validation());

        let err = controller
            .send(&backend, Some(" "), &settings(), "hi")
            .await
            .unwrap_err();
        assert!(err.is_validation());

        assert!(controller.conversation().is_empty());
        assert!(backend.requests().is_empty());
        assert_eq!(controller.last_outcome(), None);
    }

    #[tokio::test]
    async fn failure_keeps_user_turn_only() {
        let backend = ScriptedBackend::new()
            .with_chat_json(json!({
                "message": {"content": "first"},
                "eval_count": 7,
                "context": [4, 5]
            }))
            .with_chat_error(Error::request(Some(500), "boom", None));
        let controller = ChatRequestController::new();

        controller
            .send(&backend, Some("m"), &settings(), "one")
            .await
            .unwrap();
        let context_before = controller.rolling_context();
        let telemetry_before = controller.telemetry();

        let err = controller
            .send(&backend, Some("m"), &settings(), "two")
            .await
            .unwrap_err();
        assert!(err.is_request());
        assert_eq!(err.status_code(), Some(500));

        assert_eq!(
            controller.conversation(),
            vec![
                Turn::user("one"),
                Turn::assistant("first"),
                Turn::user("two")
            ]
        );
        assert_eq!(controller.rolling_context(), context_before);
        assert_eq!(controller.telemetry(), telemetry_before);
        assert_eq!(controller.last_outcome(), Some(Phase::Failed));
        assert_eq!(controller.phase(), Phase::Idle);
        assert_eq!(controller.failures(), 1);
    }

    #[tokio::test]
    async fn foreign_errors_become_request_errors() {
        let backend = ScriptedBackend::new().with_chat_error(Error::config("weird backend"));
        let controller = ChatRequestController::new();
        let err = controller
            .send(&backend, Some("m"), &settings(), "hi")
            .await
            .unwrap_err();
        assert!(err.is_request());
    }

    #[tokio::test]
    async fn missing_reply_appends_nothing() {
        let backend = ScriptedBackend::new()
            .with_chat_json(json!({"message": {"content": ""}, "context": [1]}))
            .with_chat_json(json!({"done": true}));
        let controller = ChatRequestController::new();

        let exchange = controller
            .send(&backend, Some("m"), &settings(), "a")
            .await
            .unwrap();
        assert_eq!(exchange.reply, None);
        controller
            .send(&backend, Some("m"), &settings(), "b")
            .await
            .unwrap();

        assert_eq!(
            controller.conversation(),
            vec![Turn::user("a"), Turn::user("b")]
        );
        // The second response carried no context, so the first one is retained.
        assert_eq!(
            controller.rolling_context(),
            Some(RollingContext::new(json!([1])))
        );
        assert_eq!(controller.telemetry().context_tokens, Some(1));
        assert_eq!(controller.telemetry().prompt_tokens, None);
    }

    #[tokio::test]
    async fn payload_carries_history_context_and_settings() {
        let backend = ScriptedBackend::new()
            .with_chat_json(json!({"message": {"content": "r1"}, "context": [7, 8]}))
            .with_chat_json(json!({"message": {"content": "r2"}}));
        let controller = ChatRequestController::new();
        let settings = RequestSettings {
            system_prompt: Some("be terse".to_string()),
            options: GenerationOptions::default().with_temperature(Some(0.2)),
        };

        controller
            .send(&backend, Some("m"), &settings, "q1")
            .await
            .unwrap();
        controller
            .send(&backend, Some("m"), &settings, "q2")
            .await
            .unwrap();

        let requests = backend.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].context, None);
        assert_eq!(
            requests[0].messages,
            vec![Turn::system("be terse"), Turn::user("q1")]
        );
        assert_eq!(
            requests[1].context,
            Some(RollingContext::new(json!([7, 8])))
        );
        assert_eq!(
            requests[1].messages,
            vec![
                Turn::system("be terse"),
                Turn::user("q1"),
                Turn::assistant("r1"),
                Turn::user("q2")
            ]
        );
        assert!(!requests[1].stream);
        assert_eq!(requests[1].options.unwrap().temperature, Some(0.2));
        // The system prompt is never part of the stored conversation.
        assert_eq!(controller.turn_count(), 4);
    }

    #[tokio::test]
    async fn reset_clears_everything() {
        let backend = ScriptedBackend::new().with_chat_json(json!({
            "message": {"content": "x"},
            "prompt_eval_count": 1,
            "context": [1]
        }));
        let controller = ChatRequestController::new();
        controller
            .send(&backend, Some("m"), &settings(), "hi")
            .await
            .unwrap();

        controller.reset().unwrap();
        assert!(controller.conversation().is_empty());
        assert_eq!(controller.rolling_context(), None);
        assert!(controller.telemetry().is_absent());
        assert_eq!(controller.last_outcome(), None);
    }

    #[tokio::test]
    async fn dropped_exchange_returns_to_idle() {
        let backend = ScriptedBackend::new()
            .gated()
            .with_chat_json(json!({"message": {"content": "late"}}));
        let controller = ChatRequestController::new();
        let settings = settings();

        {
            let fut = controller.send(&backend, Some("m"), &settings, "hi");
            tokio::pin!(fut);
            let polled = futures_poll_once(fut.as_mut()).await;
            assert!(polled.is_none());
            assert_eq!(controller.phase(), Phase::Sending);
            assert!(controller.reset().unwrap_err().is_busy());
        }

        assert_eq!(controller.phase(), Phase::Idle);
        assert_eq!(controller.last_outcome(), Some(Phase::Failed));
        assert_eq!(controller.conversation(), vec![Turn::user("hi")]);
    }

    async fn futures_poll_once<F: Future + Unpin>(mut fut: F) -> Option<F::Output> {
        poll_fn(|cx| {
            Poll::Ready(match Pin::new(&mut fut).poll(cx) {
                Poll::Ready(out) => Some(out),
                Poll::Pending => None,
            })
        })
        .await
    }
}
