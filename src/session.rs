//! The top-level session.
//!
//! A [`Session`] owns exactly one conversation, rolling context, model selection and telemetry
//! snapshot.  Front ends drive it through three commands, [`Session::submit`],
//! [`Session::reset`] and [`Session::refresh_catalog`], plus a handful of setters.  Every
//! command takes `&self`, so a front end can keep reading state (or try another command) while
//! a submission is awaiting the server.

use std::cell::RefCell;

use crate::catalog::ModelCatalog;
use crate::client::{InferenceBackend, InferenceClient};
use crate::controller::{ChatRequestController, Exchange, Phase, RequestSettings};
use crate::error::{Error, Result};
use crate::observability::{SESSION_BUSY_REJECTIONS, SESSION_RESETS, SESSION_SUBMITS};
use crate::telemetry::TelemetrySnapshot;
use crate::types::{GenerationOptions, RollingContext, Turn};

/// A snapshot of session state for display.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStats {
    /// The selected model, if any.
    pub model: Option<String>,
    /// The number of turns in the conversation.
    pub turn_count: usize,
    /// The number of models in the last fetched catalog.
    pub catalog_size: usize,
    /// The configured system prompt, if any.
    pub system_prompt: Option<String>,
    /// The configured sampling options.
    pub options: GenerationOptions,
    /// Whether a rolling context is held.
    pub has_context: bool,
    /// Successful exchanges over the session's lifetime.
    pub exchanges: u64,
    /// Failed exchanges over the session's lifetime.
    pub failures: u64,
    /// Telemetry for the latest successful exchange.
    pub telemetry: TelemetrySnapshot,
}

/// A single chat session against one inference backend.
pub struct Session<B: InferenceBackend = InferenceClient> {
    backend: B,
    controller: ChatRequestController,
    catalog: RefCell<ModelCatalog>,
    settings: RefCell<RequestSettings>,
}

impl<B: InferenceBackend> Session<B> {
    /// Creates a session with an empty conversation and no model selected.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            controller: ChatRequestController::new(),
            catalog: RefCell::new(ModelCatalog::new()),
            settings: RefCell::new(RequestSettings::default()),
        }
    }

    /// Creates a session with initial request settings.
    pub fn with_settings(backend: B, settings: RequestSettings) -> Self {
        let session = Self::new(backend);
        *session.settings.borrow_mut() = settings;
        session
    }

    /// Submit `text` as the next user turn and wait for the reply.
    ///
    /// While another submission is in flight this returns [`Error::Busy`] and has no other
    /// effect.  Otherwise see [`ChatRequestController::send`].
    pub async fn submit(&self, text: &str) -> Result<Exchange> {
        SESSION_SUBMITS.click();
        if self.controller.is_sending() {
            SESSION_BUSY_REJECTIONS.click();
            tracing::debug!("submission rejected: request in flight");
            return Err(Error::busy("a request is already in flight"));
        }
        let model = self.catalog.borrow().selection().map(String::from);
        let settings = self.settings.borrow().clone();
        self.controller
            .send(&self.backend, model.as_deref(), &settings, text)
            .await
    }

    /// Clear the conversation, the rolling context and telemetry together.
    ///
    /// Model selection, catalog and settings are kept.  Rejected with [`Error::Busy`] while a
    /// request is in flight.
    pub fn reset(&self) -> Result<()> {
        if let Err(err) = self.controller.reset() {
            SESSION_BUSY_REJECTIONS.click();
            return Err(err);
        }
        SESSION_RESETS.click();
        tracing::info!("session reset");
        Ok(())
    }

    /// Fetch the catalog and return the model identifiers in server order.
    ///
    /// Selects the first model only when nothing is selected.  On failure the previous catalog
    /// and selection are kept and [`Error::CatalogFetch`] is returned.
    pub async fn refresh_catalog(&self) -> Result<Vec<String>> {
        let response = match self.backend.catalog().await {
            Ok(response) => response,
            Err(err) if err.is_catalog_fetch() => return Err(err),
            Err(err) => {
                return Err(Error::catalog_fetch(
                    err.status_code(),
                    err.to_string(),
                    Some(Box::new(err)),
                ));
            }
        };
        let models = self.catalog.borrow_mut().apply(&response);
        tracing::info!(
            models = models.len(),
            selection = ?self.catalog.borrow().selection(),
            "catalog refreshed"
        );
        Ok(models)
    }

    /// Choose the model for subsequent submissions.
    pub fn select_model(&self, name: &str) -> Result<()> {
        self.catalog.borrow_mut().select(name)
    }

    /// Set or clear the system prompt.
    pub fn set_system_prompt(&self, prompt: Option<String>) {
        self.settings.borrow_mut().system_prompt = prompt.filter(|p| !p.trim().is_empty());
    }

    /// Replace the sampling options.
    pub fn set_options(&self, options: GenerationOptions) {
        self.settings.borrow_mut().options = options;
    }

    /// Update the sampling options in place.
    pub fn update_options(&self, f: impl FnOnce(&mut GenerationOptions)) {
        f(&mut self.settings.borrow_mut().options);
    }

    /// A copy of the conversation, oldest first.
    pub fn conversation(&self) -> Vec<Turn> {
        self.controller.conversation()
    }

    /// The rolling context from the latest successful exchange.
    pub fn rolling_context(&self) -> Option<RollingContext> {
        self.controller.rolling_context()
    }

    /// Telemetry for the latest successful exchange.
    pub fn telemetry(&self) -> TelemetrySnapshot {
        self.controller.telemetry()
    }

    /// The selected model, if any.
    pub fn model(&self) -> Option<String> {
        self.catalog.borrow().selection().map(String::from)
    }

    /// The models from the last successful catalog refresh.
    pub fn catalog(&self) -> Vec<String> {
        self.catalog.borrow().models().to_vec()
    }

    /// The configured system prompt, if any.
    pub fn system_prompt(&self) -> Option<String> {
        self.settings.borrow().system_prompt.clone()
    }

    /// The configured sampling options.
    pub fn options(&self) -> GenerationOptions {
        self.settings.borrow().options
    }

    /// The current lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.controller.phase()
    }

    /// True while a submission is in flight.
    pub fn is_busy(&self) -> bool {
        self.controller.is_sending()
    }

    /// The backend this session talks to.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Returns the current session statistics snapshot.
    pub fn stats(&self) -> SessionStats {
        let settings = self.settings.borrow();
        let catalog = self.catalog.borrow();
        SessionStats {
            model: catalog.selection().map(String::from),
            turn_count: self.controller.turn_count(),
            catalog_size: catalog.models().len(),
            system_prompt: settings.system_prompt.clone(),
            options: settings.options,
            has_context: self.controller.rolling_context().is_some(),
            exchanges: self.controller.exchanges(),
            failures: self.controller.failures(),
            telemetry: self.controller.telemetry(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedBackend;
    use serde_json::json;

    fn ready_session(backend: ScriptedBackend) -> Session<ScriptedBackend> {
        let session = Session::new(backend);
        session.select_model("llama3.1:8b").unwrap();
        session
    }

    #[tokio::test]
    async fn catalog_then_submit() {
        let backend = ScriptedBackend::new()
            .with_catalog_json(json!({"models": [{"name": "llama3.1:8b"}]}))
            .with_chat_json(json!({
                "message": {"content": "hello"},
                "prompt_eval_count": 3,
                "eval_count": 2,
                "context": [1, 2, 3]
            }));
        let session = Session::new(backend);

        let models = session.refresh_catalog().await.unwrap();
        assert_eq!(models, vec!["llama3.1:8b"]);
        assert_eq!(session.model().as_deref(), Some("llama3.1:8b"));

        session.submit("hi").await.unwrap();
        assert_eq!(
            session.conversation(),
            vec![Turn::user("hi"), Turn::assistant("hello")]
        );
        assert_eq!(
            session.telemetry(),
            TelemetrySnapshot {
                prompt_tokens: Some(3),
                completion_tokens: Some(2),
                context_tokens: Some(3),
            }
        );
    }

    #[tokio::test]
    async fn submit_without_model_is_validation_error() {
        let backend = ScriptedBackend::new();
        let session = Session::new(backend);
        let err = session.submit("hi").await.unwrap_err();
        assert!(err.is_validation());
        assert!(session.conversation().is_empty());
        assert!(session.backend().requests().is_empty());
    }

    #[tokio::test]
    async fn concurrent_submit_is_rejected() {
        let backend = ScriptedBackend::new()
            .gated()
            .with_chat_json(json!({"message": {"content": "one"}}));
        let session = ready_session(backend);

        let (first, second) = tokio::join!(session.submit("first"), async {
            tokio::task::yield_now().await;
            assert!(session.is_busy());
            assert_eq!(session.phase(), Phase::Sending);
            let second = session.submit("second").await;
            let reset = session.reset();
            // Reads still work while the first request is pending.
            assert_eq!(session.conversation(), vec![Turn::user("first")]);
            session.backend().release();
            (second, reset)
        });

        assert_eq!(first.unwrap().reply.as_deref(), Some("one"));
        let (second, reset) = second;
        assert!(second.unwrap_err().is_busy());
        assert!(reset.unwrap_err().is_busy());
        assert_eq!(session.backend().requests().len(), 1);
        assert_eq!(
            session.conversation(),
            vec![Turn::user("first"), Turn::assistant("one")]
        );
        assert_eq!(session.phase(), Phase::Idle);
    }

    #[tokio::test]
    async fn failed_catalog_keeps_previous_state() {
        let backend = ScriptedBackend::new()
            .with_catalog_json(json!({"models": [{"name": "a"}, {"name": "b"}]}))
            .with_catalog_error(Error::catalog_fetch(Some(502), "bad gateway", None));
        let session = Session::new(backend);

        session.refresh_catalog().await.unwrap();
        session.select_model("b").unwrap();
        let err = session.refresh_catalog().await.unwrap_err();
        assert!(err.is_catalog_fetch());
        assert_eq!(err.status_code(), Some(502));
        assert_eq!(session.catalog(), vec!["a", "b"]);
        assert_eq!(session.model().as_deref(), Some("b"));
        assert_eq!(session.backend().catalog_calls(), 2);
    }

    #[tokio::test]
    async fn foreign_catalog_errors_become_catalog_errors() {
        let backend = ScriptedBackend::new().with_catalog_error(Error::config("odd"));
        let session = Session::new(backend);
        assert!(session.refresh_catalog().await.unwrap_err().is_catalog_fetch());
    }

    #[tokio::test]
    async fn reset_after_exchanges() {
        let backend = ScriptedBackend::new()
            .with_chat_json(json!({"message": {"content": "a"}, "eval_count": 1, "context": [1]}));
        let session = ready_session(backend);
        session.set_system_prompt(Some("be brief".to_string()));
        session.submit("q").await.unwrap();

        session.reset().unwrap();
        assert!(session.conversation().is_empty());
        assert_eq!(session.rolling_context(), None);
        assert!(session.telemetry().is_absent());
        // Selection and settings survive a reset.
        assert_eq!(session.model().as_deref(), Some("llama3.1:8b"));
        assert_eq!(session.system_prompt().as_deref(), Some("be brief"));
    }

    #[test]
    fn reset_on_fresh_session() {
        let session = Session::new(ScriptedBackend::new());
        tokio_test::block_on(async {
            session.reset().unwrap();
        });
        assert!(session.conversation().is_empty());
        assert!(session.telemetry().is_absent());
    }

    #[tokio::test]
    async fn resubmit_after_failure_duplicates_user_turn() {
        let backend = ScriptedBackend::new()
            .with_chat_error(Error::request(Some(500), "boom", None))
            .with_chat_json(json!({"message": {"content": "ok"}}));
        let session = ready_session(backend);

        assert!(session.submit("hi").await.unwrap_err().is_request());
        assert_eq!(session.conversation(), vec![Turn::user("hi")]);
        assert!(session.telemetry().is_absent());

        session.submit("hi").await.unwrap();
        assert_eq!(
            session.conversation(),
            vec![Turn::user("hi"), Turn::user("hi"), Turn::assistant("ok")]
        );
        let stats = session.stats();
        assert_eq!(stats.exchanges, 1);
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.turn_count, 3);
    }

    #[tokio::test]
    async fn options_flow_into_requests() {
        let backend = ScriptedBackend::new().with_chat_json(json!({"response": "ok"}));
        let session = Session::with_settings(
            backend,
            RequestSettings {
                system_prompt: None,
                options: GenerationOptions::default().with_num_ctx(Some(4096)),
            },
        );
        session.select_model("m").unwrap();
        session.update_options(|o| o.top_p = Some(0.9));
        session.submit("hi").await.unwrap();

        let requests = session.backend().requests();
        let options = requests[0].options.unwrap();
        assert_eq!(options.num_ctx, Some(4096));
        assert_eq!(options.top_p, Some(0.9));
    }

    #[test]
    fn blank_system_prompt_clears() {
        let session = Session::new(ScriptedBackend::new());
        session.set_system_prompt(Some("x".to_string()));
        session.set_system_prompt(Some("   ".to_string()));
        assert_eq!(session.system_prompt(), None);
    }
}
