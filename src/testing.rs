//! An in-memory [`InferenceBackend`] for unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::Notify;

use crate::client::InferenceBackend;
use crate::error::{Error, Result};
use crate::types::{CatalogResponse, ChatRequest, ChatResponse};

/// Answers requests from queues of scripted results and records every chat request.
#[derive(Default)]
pub(crate) struct ScriptedBackend {
    catalogs: Mutex<VecDeque<Result<CatalogResponse>>>,
    chats: Mutex<VecDeque<Result<ChatResponse>>>,
    requests: Mutex<Vec<ChatRequest>>,
    catalog_calls: Mutex<usize>,
    gate: Option<Arc<Notify>>,
}

impl ScriptedBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Hold every chat call until [`ScriptedBackend::release`] is called.
    pub(crate) fn gated(mut self) -> Self {
        self.gate = Some(Arc::new(Notify::new()));
        self
    }

    pub(crate) fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }

    pub(crate) fn with_chat_json(self, value: Value) -> Self {
        let response = serde_json::from_value(value).expect("scripted chat response");
        self.chats.lock().unwrap().push_back(Ok(response));
        self
    }

    pub(crate) fn with_chat_error(self, err: Error) -> Self {
        self.chats.lock().unwrap().push_back(Err(err));
        self
    }

    pub(crate) fn with_catalog_json(self, value: Value) -> Self {
        let response = serde_json::from_value(value).expect("scripted catalog response");
        self.catalogs.lock().unwrap().push_back(Ok(response));
        self
    }

    pub(crate) fn with_catalog_error(self, err: Error) -> Self {
        self.catalogs.lock().unwrap().push_back(Err(err));
        self
    }

    pub(crate) fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn catalog_calls(&self) -> usize {
        *self.catalog_calls.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl InferenceBackend for ScriptedBackend {
    async fn catalog(&self) -> Result<CatalogResponse> {
        *self.catalog_calls.lock().unwrap() += 1;
        self.catalogs
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::catalog_fetch(None, "no scripted catalog", None)))
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.chats
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::request(None, "no scripted response", None)))
    }
}
