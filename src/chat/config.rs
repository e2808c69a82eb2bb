//! Configuration types for the chat application.
//!
//! Settings are layered: built-in defaults, then an optional YAML file, then the environment
//! (`LOCHAT_BASE_URL`, `LOCHAT_MODEL`), then command-line arguments parsed via `arrrg`.

use std::path::Path;
use std::time::Duration;

use arrrg_derive::CommandLine;
use serde::{Deserialize, Serialize};

use crate::client::DEFAULT_BASE_URL;
use crate::controller::RequestSettings;
use crate::error::{Error, Result};
use crate::types::GenerationOptions;

/// Command-line arguments for the lochat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// YAML configuration file.
    #[arrrg(optional, "YAML configuration file", "FILE")]
    pub config: Option<String>,

    /// Base URL of the inference server.
    #[arrrg(optional, "Server base URL (default: http://127.0.0.1:11434/)", "URL")]
    pub base_url: Option<String>,

    /// Model to use for chat.
    #[arrrg(optional, "Model to use (default: first model in the catalog)", "MODEL")]
    pub model: Option<String>,

    /// System prompt to set context for the conversation.
    #[arrrg(optional, "System prompt for the conversation", "PROMPT")]
    pub system: Option<String>,

    /// Sampling temperature.
    #[arrrg(optional, "Sampling temperature", "TEMP")]
    pub temperature: Option<String>,

    /// Server-side context window.
    #[arrrg(optional, "Context window size in tokens", "TOKENS")]
    pub num_ctx: Option<u32>,

    /// Transport timeout.
    #[arrrg(optional, "Transport timeout in seconds (default: none)", "SECONDS")]
    pub timeout_secs: Option<u64>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// Configuration for a chat session.
///
/// This struct holds the resolved configuration values.  It is also the schema of the YAML
/// configuration file; every field may be omitted there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChatConfig {
    /// Base URL of the inference server.  Must be a loopback address.
    pub base_url: String,

    /// The model to select at start-up.  When unset the first catalog entry is used.
    pub model: Option<String>,

    /// Optional system prompt sent ahead of the conversation.
    pub system_prompt: Option<String>,

    /// Sampling options sent with every request.
    pub options: GenerationOptions,

    /// Transport timeout in seconds.  Unset means requests may take as long as they take.
    pub timeout_secs: Option<u64>,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// Defaults:
    /// - Base URL: http://127.0.0.1:11434/
    /// - Model: chosen from the catalog
    /// - Timeout: none
    /// - Color: enabled
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: None,
            system_prompt: None,
            options: GenerationOptions::default(),
            timeout_secs: None,
            use_color: true,
        }
    }

    /// Load a configuration from a YAML file.  Missing fields take their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|err| {
            Error::config(format!(
                "failed to read configuration {}: {err}",
                path.display()
            ))
        })?;
        Self::from_yaml(&content)
    }

    /// Parse a configuration from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::new());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Resolve the full configuration for a run of the binary.
    pub fn resolve(args: ChatArgs) -> Result<Self> {
        let base = match args.config.as_deref() {
            Some(path) => Self::from_file(path)?,
            None => Self::new(),
        };
        base.with_env(|key| std::env::var(key).ok()).with_args(args)
    }

    /// Overlay environment settings, reading variables through `lookup`.
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(base_url) = lookup("LOCHAT_BASE_URL").filter(|s| !s.is_empty()) {
            self.base_url = base_url;
        }
        if let Some(model) = lookup("LOCHAT_MODEL").filter(|s| !s.is_empty()) {
            self.model = Some(model);
        }
        self
    }

    /// Overlay command-line arguments.
    ///
    /// Fails with [`Error::Validation`] when `--temperature` is not a finite number.
    pub fn with_args(mut self, args: ChatArgs) -> Result<Self> {
        if let Some(base_url) = args.base_url {
            self.base_url = base_url;
        }
        if args.model.is_some() {
            self.model = args.model;
        }
        if args.system.is_some() {
            self.system_prompt = args.system;
        }
        if let Some(temperature) = args.temperature.as_deref() {
            self.options.temperature = Some(parse_temperature(temperature)?);
        }
        if args.num_ctx.is_some() {
            self.options.num_ctx = args.num_ctx;
        }
        if args.timeout_secs.is_some() {
            self.timeout_secs = args.timeout_secs;
        }
        if args.no_color {
            self.use_color = false;
        }
        Ok(self)
    }

    /// Sets the base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Sets the sampling options.
    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the transport timeout.
    pub fn with_timeout_secs(mut self, timeout_secs: Option<u64>) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }

    /// The transport timeout as a `Duration`.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// The per-request settings for a session.
    pub fn request_settings(&self) -> RequestSettings {
        RequestSettings {
            system_prompt: self.system_prompt.clone(),
            options: self.options,
        }
    }
}

fn parse_temperature(value: &str) -> Result<f32> {
    match value.trim().parse::<f32>() {
        Ok(temperature) if temperature.is_finite() && temperature >= 0.0 => Ok(temperature),
        _ => Err(Error::validation(
            format!("temperature must be a non-negative number, not {value:?}"),
            Some("temperature".to_string()),
        )),
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}
