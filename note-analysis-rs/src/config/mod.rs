//! Configuration management for the analysis pipeline
//!
//! This module provides utilities for loading and validating provider
//! profiles and analysis settings, with support for environment variables.
//!
//! Loading is pure: nothing here touches the network, and a missing API key
//! is not a loading error. An empty credential only fails when the first
//! request is attempted, or earlier when the caller opts into
//! [`ServiceConfig::validate`].

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Base trait for configuration providers
pub trait ConfigProvider: Send + Sync {
    /// Get a string configuration value
    fn get_string(&self, key: &str) -> Result<String>;
}

/// Extension methods for configuration providers
pub trait ConfigProviderExt: ConfigProvider {
    /// Get an integer configuration value
    fn get_int(&self, key: &str) -> Result<i64> {
        let value = self.get_string(key)?;
        value.trim().parse::<i64>().map_err(|e| {
            PipelineError::configuration(format!("Invalid integer for key {}: {}", key, e))
        })
    }

    /// Get a boolean configuration value
    fn get_bool(&self, key: &str) -> Result<bool> {
        let value = self.get_string(key)?;
        match value.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" | "on" => Ok(true),
            "false" | "no" | "0" | "off" => Ok(false),
            _ => Err(PipelineError::configuration(format!(
                "Invalid boolean value for key {}: {}",
                key, value
            ))),
        }
    }

    /// Get a string configuration value, treating blank values as absent
    fn get_non_empty(&self, key: &str) -> Option<String> {
        self.get_string(key)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Get a string configuration value with a default
    fn get_string_or(&self, key: &str, default: &str) -> String {
        self.get_non_empty(key).unwrap_or_else(|| default.to_string())
    }

    /// Get an integer configuration value with a default
    fn get_int_or(&self, key: &str, default: i64) -> i64 {
        self.get_int(key).unwrap_or(default)
    }

    /// Get a boolean configuration value with a default
    fn get_bool_or(&self, key: &str, default: bool) -> bool {
        self.get_bool(key).unwrap_or(default)
    }
}

impl<T: ConfigProvider + ?Sized> ConfigProviderExt for T {}

/// Environment variable based configuration provider
#[derive(Debug, Clone, Default)]
pub struct EnvConfigProvider {
    /// Optional prefix for environment variables
    prefix: Option<String>,

    /// Optional namespace for variables (e.g., "AI")
    namespace: Option<String>,
}

impl EnvConfigProvider {
    /// Create a new environment variable config provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a prefix for environment variables
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Set a namespace for environment variables
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Format a configuration key as an environment variable
    fn format_key(&self, key: &str) -> String {
        let mut env_key = String::new();

        if let Some(ref prefix) = self.prefix {
            env_key.push_str(prefix);
            env_key.push('_');
        }

        if let Some(ref namespace) = self.namespace {
            env_key.push_str(namespace);
            env_key.push('_');
        }

        env_key.push_str(
            &key.to_uppercase()
                .replace(|c: char| !c.is_ascii_alphanumeric(), "_"),
        );

        env_key
    }
}

impl ConfigProvider for EnvConfigProvider {
    fn get_string(&self, key: &str) -> Result<String> {
        let env_key = self.format_key(key);

        env::var(&env_key).map_err(|e| match e {
            env::VarError::NotPresent => PipelineError::configuration(format!(
                "Environment variable not set: {}",
                env_key
            )),
            env::VarError::NotUnicode(_) => PipelineError::configuration(format!(
                "Environment variable is not valid unicode: {}",
                env_key
            )),
        })
    }
}

/// In-memory config provider for testing or static configuration
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigProvider {
    values: HashMap<String, String>,
}

impl MemoryConfigProvider {
    /// Create a new empty memory config provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a memory config provider with initial values
    pub fn with_values(values: HashMap<String, String>) -> Self {
        Self { values }
    }

    /// Set a configuration value
    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: ToString,
    {
        self.values.insert(key.into(), value.to_string());
    }
}

impl ConfigProvider for MemoryConfigProvider {
    fn get_string(&self, key: &str) -> Result<String> {
        self.values.get(key).cloned().ok_or_else(|| {
            PipelineError::configuration(format!("Configuration key not found: {}", key))
        })
    }
}

/// A composite config provider that tries multiple providers in order
pub struct CompositeConfigProvider {
    providers: Vec<Box<dyn ConfigProvider>>,
}

impl CompositeConfigProvider {
    /// Create a new composite config provider
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    /// Add a provider to the end of the chain
    pub fn add_provider(&mut self, provider: impl ConfigProvider + 'static) {
        self.providers.push(Box::new(provider));
    }
}

impl Default for CompositeConfigProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigProvider for CompositeConfigProvider {
    fn get_string(&self, key: &str) -> Result<String> {
        self.providers
            .iter()
            .find_map(|provider| provider.get_string(key).ok())
            .ok_or_else(|| {
                PipelineError::configuration(format!(
                    "Configuration key not found in any provider: {}",
                    key
                ))
            })
    }
}

/// Process-wide, read-only environment provider (`NOTES_*` variables)
pub static DEFAULT_PROVIDER: Lazy<Arc<EnvConfigProvider>> =
    Lazy::new(|| Arc::new(EnvConfigProvider::new().with_prefix("NOTES")));

/// Trait for validated configuration records
pub trait ServiceConfig: fmt::Debug + Send + Sync {
    /// Validate this configuration
    fn validate(&self) -> Result<()>;

    /// Service name
    fn service_name(&self) -> &str;
}

/// Supported chat-completion providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    DeepSeek,
    OpenRouter,
    DashScope,
}

impl ProviderKind {
    /// Stable lowercase identifier, also used as the config key prefix
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::DeepSeek => "deepseek",
            ProviderKind::OpenRouter => "openrouter",
            ProviderKind::DashScope => "dashscope",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "https://api.openai.com/v1",
            ProviderKind::DeepSeek => "https://api.deepseek.com",
            ProviderKind::OpenRouter => "https://openrouter.ai/api/v1",
            ProviderKind::DashScope => "https://dashscope.aliyuncs.com/compatible-mode/v1",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "gpt-4o-mini",
            ProviderKind::DeepSeek => "deepseek-chat",
            ProviderKind::OpenRouter => "qwen/qwen3-vl-235b-a22b-instruct",
            ProviderKind::DashScope => "qwen3-vl-plus",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "deepseek" => Ok(ProviderKind::DeepSeek),
            "openrouter" => Ok(ProviderKind::OpenRouter),
            "dashscope" => Ok(ProviderKind::DashScope),
            other => Err(PipelineError::configuration(format!(
                "Unknown AI provider: {}",
                other
            ))),
        }
    }
}

/// Endpoint settings shared by every provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

impl EndpointConfig {
    /// Defaults for a provider with an empty credential
    pub fn defaults_for(kind: ProviderKind) -> Self {
        Self {
            base_url: kind.default_base_url().to_string(),
            api_key: String::new(),
            model: kind.default_model().to_string(),
        }
    }

    fn load<P: ConfigProvider + ?Sized>(kind: ProviderKind, provider: &P) -> Self {
        let key = |field: &str| format!("{}_{}", kind.as_str(), field);
        Self {
            base_url: provider.get_string_or(&key("base_url"), kind.default_base_url()),
            api_key: provider.get_non_empty(&key("api_key")).unwrap_or_default(),
            model: provider.get_string_or(&key("model"), kind.default_model()),
        }
    }
}

/// OpenRouter endpoint plus its optional attribution fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenRouterConfig {
    pub endpoint: EndpointConfig,
    pub site_url: Option<String>,
    pub site_name: Option<String>,
}

/// A provider profile: which vendor to talk to and how
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum ProviderProfile {
    OpenAi(EndpointConfig),
    DeepSeek(EndpointConfig),
    DashScope(EndpointConfig),
    OpenRouter(OpenRouterConfig),
}

impl ProviderProfile {
    /// Load a profile for `kind`, falling back to the provider defaults
    pub fn from_provider<P: ConfigProvider + ?Sized>(kind: ProviderKind, provider: &P) -> Self {
        let endpoint = EndpointConfig::load(kind, provider);
        match kind {
            ProviderKind::OpenAi => ProviderProfile::OpenAi(endpoint),
            ProviderKind::DeepSeek => ProviderProfile::DeepSeek(endpoint),
            ProviderKind::DashScope => ProviderProfile::DashScope(endpoint),
            ProviderKind::OpenRouter => ProviderProfile::OpenRouter(OpenRouterConfig {
                endpoint,
                site_url: provider.get_non_empty("openrouter_site_url"),
                site_name: provider.get_non_empty("openrouter_site_name"),
            }),
        }
    }

    /// Load the profile selected by `NOTES_AI_PROVIDER` from the environment
    pub fn from_env() -> Result<Self> {
        let kind = DEFAULT_PROVIDER
            .get_string_or("ai_provider", "deepseek")
            .parse::<ProviderKind>()?;
        Ok(Self::from_provider(kind, &**DEFAULT_PROVIDER))
    }

    pub fn kind(&self) -> ProviderKind {
        match self {
            ProviderProfile::OpenAi(_) => ProviderKind::OpenAi,
            ProviderProfile::DeepSeek(_) => ProviderKind::DeepSeek,
            ProviderProfile::DashScope(_) => ProviderKind::DashScope,
            ProviderProfile::OpenRouter(_) => ProviderKind::OpenRouter,
        }
    }

    pub fn endpoint(&self) -> &EndpointConfig {
        match self {
            ProviderProfile::OpenAi(endpoint)
            | ProviderProfile::DeepSeek(endpoint)
            | ProviderProfile::DashScope(endpoint) => endpoint,
            ProviderProfile::OpenRouter(config) => &config.endpoint,
        }
    }

    pub fn endpoint_mut(&mut self) -> &mut EndpointConfig {
        match self {
            ProviderProfile::OpenAi(endpoint)
            | ProviderProfile::DeepSeek(endpoint)
            | ProviderProfile::DashScope(endpoint) => endpoint,
            ProviderProfile::OpenRouter(config) => &mut config.endpoint,
        }
    }

    /// Extra request headers this provider wants on every call
    pub fn attribution_headers(&self) -> Vec<(&'static str, String)> {
        match self {
            ProviderProfile::OpenRouter(config) => {
                let mut headers = Vec::new();
                if let Some(url) = config.site_url.as_deref().filter(|v| !v.is_empty()) {
                    headers.push(("HTTP-Referer", url.to_string()));
                }
                if let Some(name) = config.site_name.as_deref().filter(|v| !v.is_empty()) {
                    headers.push(("X-Title", name.to_string()));
                }
                headers
            }
            ProviderProfile::OpenAi(_)
            | ProviderProfile::DeepSeek(_)
            | ProviderProfile::DashScope(_) => Vec::new(),
        }
    }
}

impl ServiceConfig for ProviderProfile {
    fn validate(&self) -> Result<()> {
        let endpoint = self.endpoint();

        if endpoint.api_key.trim().is_empty() {
            return Err(PipelineError::configuration(format!(
                "{} API key is required",
                self.kind()
            )));
        }

        if endpoint.base_url.trim().is_empty() {
            return Err(PipelineError::configuration(format!(
                "{} base URL is required",
                self.kind()
            )));
        }

        url::Url::parse(&endpoint.base_url).map_err(|e| {
            PipelineError::configuration(format!(
                "Invalid {} base URL {}: {}",
                self.kind(),
                endpoint.base_url,
                e
            ))
        })?;

        if endpoint.model.trim().is_empty() {
            return Err(PipelineError::configuration(format!(
                "{} model is required",
                self.kind()
            )));
        }

        Ok(())
    }

    fn service_name(&self) -> &str {
        self.kind().as_str()
    }
}

/// User-level switches for AI analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSettings {
    /// Analysis must be switched on before any agent call
    pub enabled: bool,

    /// Which provider profile to use
    pub provider: ProviderKind,

    /// Deadline for a single agent call, streaming included (doubled for the summary)
    pub call_timeout_seconds: u64,

    /// Deadline for establishing the HTTP connection
    pub connect_timeout_seconds: u64,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: ProviderKind::DeepSeek,
            call_timeout_seconds: 180,
            connect_timeout_seconds: 15,
        }
    }
}

impl AnalysisSettings {
    /// Load settings from a config provider
    pub fn from_provider<P: ConfigProvider + ?Sized>(provider: &P) -> Result<Self> {
        let defaults = Self::default();
        let settings = Self {
            enabled: provider.get_bool_or("ai_enabled", defaults.enabled),
            provider: match provider.get_non_empty("ai_provider") {
                Some(kind) => kind.parse()?,
                None => defaults.provider,
            },
            call_timeout_seconds: provider
                .get_int_or("ai_call_timeout_seconds", defaults.call_timeout_seconds as i64)
                .max(0) as u64,
            connect_timeout_seconds: provider
                .get_int_or(
                    "ai_connect_timeout_seconds",
                    defaults.connect_timeout_seconds as i64,
                )
                .max(0) as u64,
        };
        Ok(settings)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_seconds)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }
}

impl ServiceConfig for AnalysisSettings {
    fn validate(&self) -> Result<()> {
        if !self.enabled {
            return Err(PipelineError::configuration(
                "AI analysis is disabled; enable it in settings first",
            ));
        }

        if self.call_timeout_seconds == 0 || self.connect_timeout_seconds == 0 {
            return Err(PipelineError::configuration("Timeouts must be positive"));
        }

        Ok(())
    }

    fn service_name(&self) -> &str {
        "analysis"
    }
}
