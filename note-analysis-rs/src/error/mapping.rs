//! Error mapping for OpenAI-compatible chat-completion providers
//!
//! DeepSeek, DashScope, OpenRouter and OpenAI all answer with the same
//! `{"error": {"message", "type", "code"}}` envelope, sometimes with a bare
//! `{"message"}` or `{"error": "..."}` instead.

use reqwest::StatusCode;
use serde_json::Value;

use super::{ErrorContext, PipelineError};

/// Map a provider error body to a PipelineError
pub fn map_provider_error(
    status: StatusCode,
    json: &Value,
    context: &mut ErrorContext,
) -> PipelineError {
    let message = match json.get("error") {
        Some(Value::Object(error)) => {
            if let Some(error_type) = error.get("type").and_then(|t| t.as_str()) {
                context.add("error_type", error_type);
            }

            // Some providers send numeric codes
            match error.get("code") {
                Some(Value::String(code)) => context.error_code = Some(code.clone()),
                Some(Value::Number(code)) => context.error_code = Some(code.to_string()),
                _ => {}
            }

            error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("Unknown provider error")
                .to_string()
        }
        Some(Value::String(message)) => message.clone(),
        _ => json
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("Unknown provider error")
            .to_string(),
    };

    error_for_status(status, message)
}

/// Map a raw HTTP error response to a PipelineError
pub fn map_http_error(status: StatusCode, body: &str, context: &mut ErrorContext) -> PipelineError {
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        return map_provider_error(status, &json, context);
    }

    let message = if body.is_empty() {
        status.to_string()
    } else {
        format!("{}: {}", status, crate::util::truncate_string(body, 100))
    };

    error_for_status(status, message)
}

fn error_for_status(status: StatusCode, message: String) -> PipelineError {
    match status {
        StatusCode::UNAUTHORIZED => PipelineError::authentication(message),
        StatusCode::FORBIDDEN | StatusCode::PAYMENT_REQUIRED => {
            PipelineError::authorization(message)
        }
        StatusCode::TOO_MANY_REQUESTS => PipelineError::rate_limit(message),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            PipelineError::validation(message)
        }
        StatusCode::NOT_FOUND => PipelineError::service(format!("Resource not found: {}", message)),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => PipelineError::timeout(message),
        _ => PipelineError::service(message),
    }
}

/// Determine if an HTTP status code indicates a retryable error
pub fn is_retryable_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 408 | 429 | 500 | 502 | 503 | 504)
}
