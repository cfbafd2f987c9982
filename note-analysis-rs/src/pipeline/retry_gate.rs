//! Intent extraction behind a bounded review loop
//!
//! The intent agent runs on a private working copy of the note content;
//! every failed review except the last appends a feedback block to that
//! copy. The reviewer always sees the unmodified note content.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::agents::{AgentRole, AnalysisAgents, ReviewVerdict};
use crate::context::{feedback_block, AnalysisContext};
use crate::error::Result;
use crate::transport::models::ContentBlock;

use super::progress::ProgressSink;

/// Upper bound on intent/review rounds per run
pub const MAX_ATTEMPTS: u32 = 3;

/// Result of the gated intent stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentOutcome {
    /// Intent text of the last attempt
    pub intent: String,
    pub review_passed: bool,
    /// Rounds performed, between 1 and [`MAX_ATTEMPTS`]
    pub attempts: u32,
    /// Feedback of the last failed review, if any
    pub last_feedback: Option<String>,
}

/// Mutable state of one gate run
#[derive(Debug, Clone)]
pub struct RetryState {
    attempts: u32,
    working_content: Vec<ContentBlock>,
    last_intent: String,
    last_verdict: Option<ReviewVerdict>,
}

impl RetryState {
    pub fn new(note_content: &[ContentBlock]) -> Self {
        Self {
            attempts: 0,
            working_content: note_content.to_vec(),
            last_intent: String::new(),
            last_verdict: None,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Content the next intent call will receive
    pub fn working_content(&self) -> &[ContentBlock] {
        &self.working_content
    }

    pub fn last_verdict(&self) -> Option<&ReviewVerdict> {
        self.last_verdict.as_ref()
    }

    pub fn passed(&self) -> bool {
        self.last_verdict.as_ref().map(|v| v.passed).unwrap_or(false)
    }

    pub fn should_continue(&self) -> bool {
        !self.passed() && self.attempts < MAX_ATTEMPTS
    }

    fn begin_attempt(&mut self) -> u32 {
        self.attempts += 1;
        self.attempts
    }

    /// Record one intent/review round
    ///
    /// Returns true when the review failed and another attempt will follow;
    /// only then is the feedback carried into the working copy.
    fn record(&mut self, intent: String, verdict: ReviewVerdict) -> bool {
        let retry = !verdict.passed && self.attempts < MAX_ATTEMPTS;
        if retry {
            self.working_content.push(feedback_block(&verdict.feedback));
        }
        self.last_intent = intent;
        self.last_verdict = Some(verdict);
        retry
    }

    fn into_outcome(self) -> IntentOutcome {
        let review_passed = self.passed();
        let last_feedback = self
            .last_verdict
            .filter(|v| !v.passed)
            .map(|v| v.feedback);
        IntentOutcome {
            intent: self.last_intent,
            review_passed,
            attempts: self.attempts,
            last_feedback,
        }
    }
}

/// Run intent extraction until a review passes or attempts run out
///
/// Exhausting the attempts is not an error; the outcome reports
/// `review_passed == false`. Any agent error aborts the gate immediately.
pub async fn run_retry_gate<A>(
    agents: &A,
    ctx: &AnalysisContext,
    sink: &dyn ProgressSink,
) -> Result<IntentOutcome>
where
    A: AnalysisAgents + ?Sized,
{
    let note_content = ctx.user_content();
    let mut state = RetryState::new(&note_content);

    let intent_tokens = |partial: &str| sink.on_agent_stream(AgentRole::Intent, partial);
    let review_tokens = |partial: &str| sink.on_agent_stream(AgentRole::Review, partial);

    while state.should_continue() {
        let attempt = state.begin_attempt();
        sink.on_progress(&format!("🔍 第 {} 次意图分析进行中...", attempt));

        let intent = agents
            .extract_intent(state.working_content(), &intent_tokens)
            .await?;
        debug!("Intent attempt {} produced {} chars", attempt, intent.chars().count());

        sink.on_progress("📋 意图分析完成，提交审查...");
        let verdict = agents
            .review_intent(&intent, &note_content, &review_tokens)
            .await?;
        let passed = verdict.passed;
        let feedback = verdict.feedback.clone();

        if state.record(intent, verdict) {
            warn!("Intent review failed on attempt {}/{}", attempt, MAX_ATTEMPTS);
            sink.on_progress(&format!("⚠️ 审查未通过：{}\n准备重新分析...", feedback));
        } else if passed {
            info!("Intent review passed on attempt {}/{}", attempt, MAX_ATTEMPTS);
            sink.on_progress("✅ 意图审查通过");
        } else {
            warn!("Intent review failed on final attempt {}/{}", attempt, MAX_ATTEMPTS);
        }
    }

    Ok(state.into_outcome())
}
