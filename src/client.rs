use std::env;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response, StatusCode, header};
use serde::de::DeserializeOwned;
use url::{Host, Url};

use crate::error::{Error, Result};
use crate::exchange_logger::ExchangeLogger;
use crate::observability::{
    CATALOG_ERRORS, CATALOG_REFRESHES, CHAT_REQUEST_DURATION, CHAT_REQUEST_ERRORS, CHAT_REQUESTS,
};
use crate::types::{CatalogResponse, ChatRequest, ChatResponse};

/// Base URL used when neither the caller nor the environment provides one.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:11434/";

const CATALOG_PATH: &str = "catalog";
const CHAT_PATH: &str = "chat";

/// The two calls a session makes against an inference server.
///
/// [`InferenceClient`] is the HTTP implementation.  Alternate implementations let the session
/// run against anything that can answer a chat request.
#[async_trait::async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Fetch the model catalog.
    ///
    /// Fails with [`Error::CatalogFetch`] on any transport, status, or decoding problem.
    async fn catalog(&self) -> Result<CatalogResponse>;

    /// Perform one non-streaming chat exchange.
    ///
    /// Fails with [`Error::Request`] on any transport, status, or decoding problem.
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse>;
}

#[derive(Clone, Copy, Debug)]
enum Endpoint {
    Catalog,
    Chat,
}

impl Endpoint {
    fn path(self) -> &'static str {
        match self {
            Endpoint::Catalog => CATALOG_PATH,
            Endpoint::Chat => CHAT_PATH,
        }
    }

    fn error(
        self,
        status_code: Option<u16>,
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Error {
        match self {
            Endpoint::Catalog => Error::catalog_fetch(status_code, message, source),
            Endpoint::Chat => Error::request(status_code, message, source),
        }
    }
}

/// HTTP client for a local inference server.
///
/// The client only talks to loopback hosts, never sends credentials or cookies, and ignores
/// proxy settings from the environment.
#[derive(Clone)]
pub struct InferenceClient {
    client: ReqwestClient,
    base_url: Url,
    timeout: Option<Duration>,
    logger: Option<Arc<dyn ExchangeLogger>>,
}

impl fmt::Debug for InferenceClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InferenceClient")
            .field("base_url", &self.base_url.as_str())
            .field("timeout", &self.timeout)
            .field("logger", &self.logger.is_some())
            .finish()
    }
}

impl InferenceClient {
    /// Create a new client.
    ///
    /// The base URL is read from the LOCHAT_BASE_URL environment variable, falling back to
    /// [`DEFAULT_BASE_URL`].  No transport timeout is applied.
    pub fn new() -> Result<Self> {
        Self::with_options(None, None)
    }

    /// Create a new client with custom settings.
    pub fn with_options(base_url: Option<String>, timeout: Option<Duration>) -> Result<Self> {
        let base_url = match base_url {
            Some(url) => url,
            None => env::var("LOCHAT_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
        };
        let base_url = parse_loopback_url(&base_url)?;

        let mut builder = ReqwestClient::builder().no_proxy();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            timeout,
            logger: None,
        })
    }

    /// Attach a logger that observes every decoded exchange.
    pub fn with_logger(mut self, logger: Arc<dyn ExchangeLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// The normalized base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The transport timeout, if one was configured.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn default_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        headers
    }

    fn endpoint_url(&self, endpoint: Endpoint) -> Result<Url> {
        Ok(self.base_url.join(endpoint.path())?)
    }

    fn transport_error(&self, endpoint: Endpoint, e: reqwest::Error) -> Error {
        let message = if e.is_timeout() {
            match self.timeout {
                Some(timeout) => format!(
                    "request timed out after {} seconds: {}",
                    timeout.as_secs_f64(),
                    e
                ),
                None => format!("request timed out: {}", e),
            }
        } else if e.is_connect() {
            format!("connection error: {}", e)
        } else {
            format!("request failed: {}", e)
        };
        endpoint.error(None, message, Some(Box::new(e)))
    }

    /// Process a non-2xx response into the endpoint's error type.
    async fn process_error_response(endpoint: Endpoint, response: Response) -> Error {
        let status = response.status();
        let status_code = status.as_u16();

        let error_body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return endpoint.error(
                    Some(status_code),
                    format!("failed to read error response: {}", e),
                    Some(Box::new(e)),
                );
            }
        };

        endpoint.error(Some(status_code), error_message(status, &error_body), None)
    }

    async fn decode<T: DeserializeOwned>(endpoint: Endpoint, response: Response) -> Result<T> {
        let body = response.text().await.map_err(|e| {
            endpoint.error(
                None,
                format!("failed to read response: {}", e),
                Some(Box::new(e)),
            )
        })?;
        serde_json::from_str::<T>(&body).map_err(|e| {
            endpoint.error(
                None,
                format!("malformed response body: {}", e),
                Some(Box::new(e)),
            )
        })
    }

    async fn fetch_catalog(&self) -> Result<CatalogResponse> {
        let endpoint = Endpoint::Catalog;
        let url = self.endpoint_url(endpoint)?;
        tracing::debug!(url = %url, "fetching model catalog");

        let response = self
            .client
            .get(url)
            .headers(Self::default_headers())
            .send()
            .await
            .map_err(|e| self.transport_error(endpoint, e))?;

        if !response.status().is_success() {
            return Err(Self::process_error_response(endpoint, response).await);
        }

        let catalog: CatalogResponse = Self::decode(endpoint, response).await?;
        if let Some(logger) = &self.logger {
            logger.log_catalog(&catalog);
        }
        Ok(catalog)
    }

    async fn send_chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let endpoint = Endpoint::Chat;
        let url = self.endpoint_url(endpoint)?;
        tracing::debug!(
            url = %url,
            model = %request.model,
            messages = request.messages.len(),
            has_context = request.context.is_some(),
            "sending chat request"
        );
        if let Some(logger) = &self.logger {
            logger.log_request(request);
        }

        let response = self
            .client
            .post(url)
            .headers(Self::default_headers())
            .json(request)
            .send()
            .await
            .map_err(|e| self.transport_error(endpoint, e))?;

        if !response.status().is_success() {
            return Err(Self::process_error_response(endpoint, response).await);
        }

        let chat: ChatResponse = Self::decode(endpoint, response).await?;
        if let Some(logger) = &self.logger {
            logger.log_response(&chat);
        }
        Ok(chat)
    }
}

#[async_trait::async_trait]
impl InferenceBackend for InferenceClient {
    async fn catalog(&self) -> Result<CatalogResponse> {
        CATALOG_REFRESHES.click();
        let result = self.fetch_catalog().await;
        if let Err(err) = &result {
            CATALOG_ERRORS.click();
            tracing::warn!(error = %err, "catalog fetch failed");
        }
        result
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        CHAT_REQUESTS.click();
        let start = Instant::now();
        let result = self.send_chat(request).await;
        CHAT_REQUEST_DURATION.add(start.elapsed().as_secs_f64());
        if let Err(err) = &result {
            CHAT_REQUEST_ERRORS.click();
            tracing::warn!(error = %err, "chat request failed");
        }
        result
    }
}

/// Parse `base_url`, requiring an http(s) scheme and a loopback host.
///
/// The returned URL always ends in `/` so endpoint paths join beneath it.
pub fn parse_loopback_url(base_url: &str) -> Result<Url> {
    let mut url = Url::parse(base_url)?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(Error::config(format!(
            "base URL must use http or https, not {}",
            url.scheme()
        )));
    }
    let loopback = match url.host() {
        Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(Host::Ipv4(ip)) => IpAddr::V4(ip).is_loopback(),
        Some(Host::Ipv6(ip)) => IpAddr::V6(ip).is_loopback(),
        None => false,
    };
    if !loopback {
        return Err(Error::config(format!(
            "base URL {} is not a loopback address",
            base_url
        )));
    }
    if !url.username().is_empty() || url.password().is_some() {
        return Err(Error::config("base URL must not carry credentials"));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Pull a human-readable message out of an error body.
///
/// Servers answer either `{"error": "..."}` or `{"error": {"message": "..."}}`; anything else
/// is reported verbatim, and an empty body falls back to the status reason.
fn error_message(status: StatusCode, body: &str) -> String {
    let parsed = serde_json::from_str::<serde_json::Value>(body).ok();
    let from_json = parsed.as_ref().and_then(|v| match v.get("error") {
        Some(serde_json::Value::String(message)) => Some(message.clone()),
        Some(serde_json::Value::Object(obj)) => obj
            .get("message")
            .and_then(|m| m.as_str())
            .map(String::from),
        _ => None,
    });
    match from_json {
        Some(message) => message,
        None if !body.trim().is_empty() => body.trim().to_string(),
        None => status
            .canonical_reason()
            .unwrap_or("unexpected status")
            .to_string(),
    }
}
