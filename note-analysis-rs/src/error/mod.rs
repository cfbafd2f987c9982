//! Error handling for the analysis pipeline
//!
//! Every stage reports failures as [`PipelineError`]. Transport failures are
//! normalized from provider status codes and error bodies (see [`mapping`]),
//! and may be wrapped in [`ErrorContext`] layers naming the provider,
//! endpoint and status.
//!
//! A review gate that never passes is *not* an error; see
//! [`crate::pipeline::PipelineResult::review_passed`].

use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

pub mod mapping;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Main error type for the analysis pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Network or connection errors
    #[error("Network error: {0}")]
    Network(String),

    /// Authentication errors (bad or revoked credential)
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Authorization errors (permission or quota issues)
    #[error("Authorization error: {0}")]
    Authorization(String),

    /// Rate limiting errors
    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    /// Provider-side errors
    #[error("Service error: {0}")]
    Service(String),

    /// Request validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Response or stream parsing errors
    #[error("Parsing error: {0}")]
    Parsing(String),

    /// Configuration errors (missing credential, endpoint, disabled analysis)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A single agent call ran past its deadline
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// The caller aborted the run
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Unexpected or internal errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// Errors with additional context
    #[error("{inner}")]
    WithContext {
        inner: Box<PipelineError>,
        context: ErrorContext,
    },
}

impl PipelineError {
    /// Create a network error
    pub fn network(message: impl Into<String>) -> Self {
        PipelineError::Network(message.into())
    }

    /// Create an authentication error
    pub fn authentication(message: impl Into<String>) -> Self {
        PipelineError::Authentication(message.into())
    }

    /// Create an authorization error
    pub fn authorization(message: impl Into<String>) -> Self {
        PipelineError::Authorization(message.into())
    }

    /// Create a rate limit error
    pub fn rate_limit(message: impl Into<String>) -> Self {
        PipelineError::RateLimit(message.into())
    }

    /// Create a provider-side error
    pub fn service(message: impl Into<String>) -> Self {
        PipelineError::Service(message.into())
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        PipelineError::Validation(message.into())
    }

    /// Create a parsing error
    pub fn parsing(message: impl Into<String>) -> Self {
        PipelineError::Parsing(message.into())
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        PipelineError::Configuration(message.into())
    }

    /// Create a timeout error
    pub fn timeout(message: impl Into<String>) -> Self {
        PipelineError::Timeout(message.into())
    }

    /// Create a cancellation error
    pub fn cancelled(message: impl Into<String>) -> Self {
        PipelineError::Cancelled(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        PipelineError::Internal(message.into())
    }

    /// Add context to an existing error
    pub fn with_context(self, context: ErrorContext) -> Self {
        PipelineError::WithContext {
            inner: Box::new(self),
            context,
        }
    }

    /// The innermost error, with every context layer removed
    pub fn root(&self) -> &PipelineError {
        match self {
            PipelineError::WithContext { inner, .. } => inner.root(),
            other => other,
        }
    }

    /// Get the HTTP status code if available
    pub fn status_code(&self) -> Option<u16> {
        match self {
            PipelineError::WithContext { context, inner } => {
                context.status_code.or_else(|| inner.status_code())
            }
            _ => None,
        }
    }

    /// Check if this is a retryable error
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.root(),
            PipelineError::Network(_) | PipelineError::Timeout(_) | PipelineError::RateLimit(_)
        )
    }

    /// Check if this is a permanent error (not retryable)
    pub fn is_permanent(&self) -> bool {
        !self.is_retryable()
    }

    /// Coarse category used when reporting a failed run
    pub fn category(&self) -> &'static str {
        match self.root() {
            PipelineError::Configuration(_) => "configuration",
            PipelineError::Cancelled(_) => "cancelled",
            PipelineError::Internal(_) => "internal",
            _ => "transport",
        }
    }

    /// Actionable message for the presentation layer
    pub fn user_message(&self) -> String {
        match self.root() {
            PipelineError::Configuration(msg) => format!("请检查 AI 设置：{}", msg),
            PipelineError::Authentication(_) | PipelineError::Authorization(_) => {
                "API 密钥无效或没有权限，请在设置中检查 API 密钥".to_string()
            }
            PipelineError::RateLimit(_) => "请求过于频繁，请稍后再试".to_string(),
            PipelineError::Timeout(_) => "AI 服务响应超时，请稍后再试".to_string(),
            PipelineError::Network(_) => "网络连接失败，请检查网络连接和 API 地址".to_string(),
            PipelineError::Cancelled(_) => "分析已取消".to_string(),
            other => format!("分析失败：{}", other),
        }
    }
}

/// Error context information
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// Service that generated the error
    pub service: String,

    /// When the error was observed
    pub timestamp: Option<chrono::DateTime<chrono::Utc>>,

    /// HTTP status code if applicable
    pub status_code: Option<u16>,

    /// Provider-specific error code
    pub error_code: Option<String>,

    /// Endpoint that was called
    pub endpoint: Option<String>,

    /// Additional context data
    pub data: HashMap<String, String>,
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self {
            service: "unknown".to_string(),
            timestamp: Some(chrono::Utc::now()),
            status_code: None,
            error_code: None,
            endpoint: None,
            data: HashMap::new(),
        }
    }
}

impl ErrorContext {
    /// Create a new error context
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new error context for a specific service
    pub fn for_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            ..Self::default()
        }
    }

    /// Add an HTTP status code
    pub fn status_code(mut self, code: u16) -> Self {
        self.status_code = Some(code);
        self
    }

    /// Add an endpoint
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Add a context value
    pub fn add<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: fmt::Display,
    {
        self.data.insert(key.into(), value.to_string());
    }
}

/// Convert reqwest errors to PipelineError
impl From<reqwest::Error> for PipelineError {
    fn from(err: reqwest::Error) -> Self {
        let context = ErrorContext::for_service("http_client");

        let error = if err.is_timeout() {
            PipelineError::timeout(format!("Request timed out: {}", err))
        } else if err.is_connect() {
            PipelineError::network(format!("Connection error: {}", err))
        } else if err.is_request() {
            PipelineError::network(format!("Request failed: {}", err))
        } else if err.is_body() || err.is_decode() {
            PipelineError::network(format!("Response stream interrupted: {}", err))
        } else {
            PipelineError::internal(format!("HTTP client error: {}", err))
        };

        match err.status() {
            Some(status) => error.with_context(context.status_code(status.as_u16())),
            None => error.with_context(context),
        }
    }
}

/// Convert serde_json errors to PipelineError
impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::parsing(format!("JSON error: {}", err))
            .with_context(ErrorContext::for_service("json"))
    }
}
