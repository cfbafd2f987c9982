//! Single-purpose analysis agents
//!
//! Every agent is one streaming chat call with its own system prompt and
//! sampling settings. [`invoke`] is the shared call primitive; the
//! [`AnalysisAgents`] trait is the seam the pipeline stages run against.

pub mod llm;
pub mod prompts;
pub mod review;

use std::fmt;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::TryStreamExt;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::core::{CallOptions, ChatTransport, TokenSink};
use crate::error::{PipelineError, Result};
use crate::transport::models::{ChatCompletionRequest, ChatMessage, ContentBlock, MessageContent};

pub use llm::LlmAgents;
pub use prompts::SummaryInput;
pub use review::{parse_verdict, ReviewVerdict};

/// The five agents of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    Intent,
    Review,
    Original,
    Correction,
    Summary,
}

impl AgentRole {
    pub const ALL: [AgentRole; 5] = [
        AgentRole::Intent,
        AgentRole::Review,
        AgentRole::Original,
        AgentRole::Correction,
        AgentRole::Summary,
    ];

    /// Identifier reported to streaming observers
    pub fn id(&self) -> &'static str {
        match self {
            AgentRole::Intent => "intent",
            AgentRole::Review => "review",
            AgentRole::Original => "original",
            AgentRole::Correction => "correction",
            AgentRole::Summary => "summary",
        }
    }

    pub fn temperature(&self) -> f32 {
        match self {
            AgentRole::Intent => 0.3,
            AgentRole::Review => 0.2,
            AgentRole::Original | AgentRole::Correction => 0.4,
            AgentRole::Summary => 0.6,
        }
    }

    pub fn max_tokens(&self) -> u32 {
        match self {
            AgentRole::Intent | AgentRole::Review => 1024,
            AgentRole::Original | AgentRole::Correction => 2048,
            AgentRole::Summary => 4096,
        }
    }

    /// Multiplier applied to the configured per-call deadline
    ///
    /// The summary streams up to twice the tokens of any other agent.
    pub fn deadline_scale(&self) -> u32 {
        match self {
            AgentRole::Summary => 2,
            _ => 1,
        }
    }

    /// Deadline of one call by this agent under `options`
    pub fn deadline(&self, options: &CallOptions) -> Option<Duration> {
        options.timeout.map(|limit| limit * self.deadline_scale())
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Text produced by one agent call
#[derive(Debug, Clone, PartialEq)]
pub struct AgentResult {
    pub role: AgentRole,
    /// Concatenation of every delta, in arrival order
    pub text: String,
    pub elapsed: Duration,
}

/// Build the request of one agent call
pub fn build_request(
    model: &str,
    role: AgentRole,
    system_prompt: &str,
    user_content: impl Into<MessageContent>,
) -> ChatCompletionRequest {
    ChatCompletionRequest {
        model: model.to_string(),
        messages: vec![
            ChatMessage::system(system_prompt),
            ChatMessage::user(user_content),
        ],
        stream: true,
        temperature: Some(role.temperature()),
        max_tokens: Some(role.max_tokens()),
    }
}

/// Run one streaming agent call to completion
///
/// `on_token` receives the full accumulated text after every non-empty
/// delta, so the last snapshot always equals the returned text. Transport
/// errors are returned unchanged and partial text is discarded.
pub async fn invoke(
    transport: &dyn ChatTransport,
    model: &str,
    role: AgentRole,
    system_prompt: &str,
    user_content: impl Into<MessageContent>,
    on_token: Option<TokenSink<'_>>,
    options: &CallOptions,
) -> Result<AgentResult> {
    let request = build_request(model, role, system_prompt, user_content);
    let start_time = Instant::now();
    debug!("{} agent calling {} ({})", role, transport.name(), model);

    let call = async {
        let deltas = transport.stream_chat(request).await?;
        deltas
            .try_fold(String::new(), |mut text, delta| async move {
                if !delta.is_empty() {
                    text.push_str(&delta);
                    if let Some(sink) = on_token {
                        sink(&text);
                    }
                }
                Ok(text)
            })
            .await
    };

    let bounded = async {
        match role.deadline(options) {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => result,
                Err(_) => Err(PipelineError::timeout(format!(
                    "{} agent did not finish within {:?}",
                    role, limit
                ))),
            },
            None => call.await,
        }
    };

    let text = tokio::select! {
        biased;
        _ = options.cancel.cancelled() => {
            return Err(PipelineError::cancelled(format!("{} agent call cancelled", role)));
        }
        result = bounded => result?,
    };

    let elapsed = start_time.elapsed();
    debug!("{} agent finished: {} chars in {:?}", role, text.chars().count(), elapsed);

    Ok(AgentResult { role, text, elapsed })
}

/// The agent calls a pipeline run is made of
///
/// Each method performs exactly one model call and forwards accumulated
/// snapshots to `on_token`.
#[async_trait]
pub trait AnalysisAgents: Send + Sync {
    /// Extract the problems the learner wants to study
    ///
    /// `content` is the note's user content plus any feedback blocks of
    /// earlier failed reviews.
    async fn extract_intent(&self, content: &[ContentBlock], on_token: TokenSink<'_>) -> Result<String>;

    /// Judge an intent against the unmodified note content
    async fn review_intent(
        &self,
        intent: &str,
        note_content: &[ContentBlock],
        on_token: TokenSink<'_>,
    ) -> Result<ReviewVerdict>;

    /// Diagnose the learner's original attempt
    async fn analyze_original_record(
        &self,
        intent: &str,
        note_content: &[ContentBlock],
        on_token: TokenSink<'_>,
    ) -> Result<String>;

    /// Reconstruct the correct solution path
    async fn analyze_correction(
        &self,
        intent: &str,
        note_content: &[ContentBlock],
        on_token: TokenSink<'_>,
    ) -> Result<String>;

    /// Write the final study report
    async fn summarize(&self, input: SummaryInput<'_>, on_token: TokenSink<'_>) -> Result<String>;
}
