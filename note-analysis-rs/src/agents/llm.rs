//! Agents backed by a chat-completion transport

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::core::{CallOptions, ChatTransport, TokenSink};
use crate::error::Result;
use crate::transport::models::ContentBlock;

use super::prompts::{self, SummaryInput};
use super::review::{parse_verdict, ReviewVerdict};
use super::{invoke, AgentRole, AnalysisAgents};

/// All five agents sharing one transport and model
#[derive(Clone)]
pub struct LlmAgents {
    transport: Arc<dyn ChatTransport>,
    model: String,
    options: CallOptions,
}

impl LlmAgents {
    pub fn new(transport: Arc<dyn ChatTransport>, model: impl Into<String>) -> Self {
        Self {
            transport,
            model: model.into(),
            options: CallOptions::default(),
        }
    }

    /// Apply a deadline and cancellation token to every call
    pub fn with_options(mut self, options: CallOptions) -> Self {
        self.options = options;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn options(&self) -> &CallOptions {
        &self.options
    }

    async fn call(
        &self,
        role: AgentRole,
        system_prompt: &str,
        user_content: Vec<ContentBlock>,
        on_token: TokenSink<'_>,
    ) -> Result<String> {
        let result = invoke(
            self.transport.as_ref(),
            &self.model,
            role,
            system_prompt,
            user_content,
            Some(on_token),
            &self.options,
        )
        .await?;
        Ok(result.text)
    }
}

impl std::fmt::Debug for LlmAgents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmAgents")
            .field("transport", &self.transport.name())
            .field("model", &self.model)
            .finish()
    }
}

#[async_trait]
impl AnalysisAgents for LlmAgents {
    async fn extract_intent(&self, content: &[ContentBlock], on_token: TokenSink<'_>) -> Result<String> {
        self.call(AgentRole::Intent, prompts::INTENT_PROMPT, content.to_vec(), on_token)
            .await
    }

    async fn review_intent(
        &self,
        intent: &str,
        note_content: &[ContentBlock],
        on_token: TokenSink<'_>,
    ) -> Result<ReviewVerdict> {
        let mut content = Vec::with_capacity(note_content.len() + 2);
        content.push(ContentBlock::text(prompts::REVIEW_NOTE_HEADER));
        content.extend_from_slice(note_content);
        content.push(ContentBlock::text(prompts::review_intent_footer(intent)));

        let raw = self
            .call(AgentRole::Review, prompts::REVIEW_PROMPT, content, on_token)
            .await?;
        Ok(parse_verdict(&raw))
    }

    async fn analyze_original_record(
        &self,
        intent: &str,
        note_content: &[ContentBlock],
        on_token: TokenSink<'_>,
    ) -> Result<String> {
        let prompt = prompts::original_record_prompt(intent);
        self.call(AgentRole::Original, &prompt, note_content.to_vec(), on_token)
            .await
    }

    async fn analyze_correction(
        &self,
        intent: &str,
        note_content: &[ContentBlock],
        on_token: TokenSink<'_>,
    ) -> Result<String> {
        let prompt = prompts::correction_prompt(intent);
        self.call(AgentRole::Correction, &prompt, note_content.to_vec(), on_token)
            .await
    }

    async fn summarize(&self, input: SummaryInput<'_>, on_token: TokenSink<'_>) -> Result<String> {
        let prompt = prompts::summary_prompt(&input, Utc::now());
        let result = invoke(
            self.transport.as_ref(),
            &self.model,
            AgentRole::Summary,
            &prompt,
            prompts::SUMMARY_REQUEST,
            Some(on_token),
            &self.options,
        )
        .await?;
        Ok(result.text)
    }
}
