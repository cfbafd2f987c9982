//! Stubs shared by the test modules

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tokio::sync::Barrier;

use crate::agents::{parse_verdict, AgentRole, AnalysisAgents, ReviewVerdict, SummaryInput};
use crate::context::{AnalysisContext, NoteRecord};
use crate::core::{ChatTransport, DeltaStream, TokenSink};
use crate::error::{PipelineError, Result};
use crate::pipeline::{ProgressEvent, ProgressSink};
use crate::transport::models::{ChatCompletionRequest, ContentBlock};

pub fn sample_note() -> NoteRecord {
    NoteRecord {
        id: "note-1".to_string(),
        title: "函数单调性练习".to_string(),
        content: "第2题和第5题做错了".to_string(),
        images: vec!["data:image/png;base64,iVBORw0KGgo=".to_string()],
        category_name: "数学".to_string(),
        curve_name: "艾宾浩斯".to_string(),
        curve_intervals: vec![1, 2, 4, 7, 15],
        stage: 1,
        next_review_date: 1_700_000_000_000,
        created_at: 1_699_000_000_000,
    }
}

pub fn sample_context() -> AnalysisContext {
    AnalysisContext::from_note(&sample_note())
}

/// Emit `text` as a growing series of snapshots, two chars at a time
fn stream_snapshots(text: &str, on_token: TokenSink<'_>) {
    let chars: Vec<char> = text.chars().collect();
    let mut end = 0;
    while end < chars.len() {
        end = (end + 2).min(chars.len());
        let snapshot: String = chars[..end].iter().collect();
        on_token(&snapshot);
    }
}

/// Scripted agents that count calls and record their inputs
pub struct StubAgents {
    reviews: Mutex<VecDeque<String>>,
    pub intent_calls: AtomicUsize,
    pub review_calls: AtomicUsize,
    pub original_calls: AtomicUsize,
    pub correction_calls: AtomicUsize,
    pub summary_calls: AtomicUsize,
    pub intent_inputs: Mutex<Vec<Vec<ContentBlock>>>,
    pub review_inputs: Mutex<Vec<Vec<ContentBlock>>>,
    pub original_delay: Duration,
    pub correction_delay: Duration,
    pub fail_intent: bool,
    pub fail_review: bool,
    pub fail_original: bool,
    pub fail_correction: bool,
    pub fail_summary: bool,
    pub fan_in_finished: Mutex<Vec<(AgentRole, Instant)>>,
    pub summary_started: Mutex<Option<Instant>>,
    /// When set, both parallel agents must reach it before either returns
    pub fan_out_barrier: Option<Barrier>,
}

impl StubAgents {
    /// Reviews are answered from `reviews` in order, then `PASS`
    pub fn with_reviews(reviews: &[&str]) -> Self {
        Self {
            reviews: Mutex::new(reviews.iter().map(|r| r.to_string()).collect()),
            intent_calls: AtomicUsize::new(0),
            review_calls: AtomicUsize::new(0),
            original_calls: AtomicUsize::new(0),
            correction_calls: AtomicUsize::new(0),
            summary_calls: AtomicUsize::new(0),
            intent_inputs: Mutex::new(Vec::new()),
            review_inputs: Mutex::new(Vec::new()),
            original_delay: Duration::ZERO,
            correction_delay: Duration::ZERO,
            fail_intent: false,
            fail_review: false,
            fail_original: false,
            fail_correction: false,
            fail_summary: false,
            fan_in_finished: Mutex::new(Vec::new()),
            summary_started: Mutex::new(None),
            fan_out_barrier: None,
        }
    }

    pub fn always_failing() -> Self {
        Self::with_reviews(&["FAIL\n缺少题目", "FAIL\n缺少题目", "FAIL\n缺少题目"])
    }

    pub fn calls(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    pub fn downstream_calls(&self) -> usize {
        Self::calls(&self.original_calls)
            + Self::calls(&self.correction_calls)
            + Self::calls(&self.summary_calls)
    }

    async fn stage(
        &self,
        role: AgentRole,
        delay: Duration,
        fail: bool,
        on_token: TokenSink<'_>,
    ) -> Result<String> {
        if let Some(barrier) = &self.fan_out_barrier {
            barrier.wait().await;
        }
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if fail {
            return Err(PipelineError::network(format!("{} connection reset", role)));
        }
        let text = format!("{}分析结果", role);
        stream_snapshots(&text, on_token);
        self.fan_in_finished
            .lock()
            .unwrap()
            .push((role, Instant::now()));
        Ok(text)
    }
}

#[async_trait]
impl AnalysisAgents for StubAgents {
    async fn extract_intent(&self, content: &[ContentBlock], on_token: TokenSink<'_>) -> Result<String> {
        let n = self.intent_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.intent_inputs.lock().unwrap().push(content.to_vec());
        if self.fail_intent {
            return Err(PipelineError::authentication("Invalid API key"));
        }
        let text = format!("第{}次意图：第2题 单选题", n);
        stream_snapshots(&text, on_token);
        Ok(text)
    }

    async fn review_intent(
        &self,
        _intent: &str,
        note_content: &[ContentBlock],
        on_token: TokenSink<'_>,
    ) -> Result<ReviewVerdict> {
        self.review_calls.fetch_add(1, Ordering::SeqCst);
        self.review_inputs.lock().unwrap().push(note_content.to_vec());
        if self.fail_review {
            return Err(PipelineError::rate_limit("review quota exhausted"));
        }
        let raw = self
            .reviews
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| "PASS\n分析准确".to_string());
        stream_snapshots(&raw, on_token);
        Ok(parse_verdict(&raw))
    }

    async fn analyze_original_record(
        &self,
        _intent: &str,
        _note_content: &[ContentBlock],
        on_token: TokenSink<'_>,
    ) -> Result<String> {
        self.original_calls.fetch_add(1, Ordering::SeqCst);
        self.stage(AgentRole::Original, self.original_delay, self.fail_original, on_token)
            .await
    }

    async fn analyze_correction(
        &self,
        _intent: &str,
        _note_content: &[ContentBlock],
        on_token: TokenSink<'_>,
    ) -> Result<String> {
        self.correction_calls.fetch_add(1, Ordering::SeqCst);
        self.stage(
            AgentRole::Correction,
            self.correction_delay,
            self.fail_correction,
            on_token,
        )
        .await
    }

    async fn summarize(&self, input: SummaryInput<'_>, on_token: TokenSink<'_>) -> Result<String> {
        self.summary_calls.fetch_add(1, Ordering::SeqCst);
        *self.summary_started.lock().unwrap() = Some(Instant::now());
        if self.fail_summary {
            return Err(PipelineError::service("summary model overloaded"));
        }
        let text = format!(
            "总结：{} / {} / {}",
            input.intent, input.original, input.correction
        );
        stream_snapshots(&text, on_token);
        Ok(text)
    }
}

/// Records every event it receives
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ProgressEvent::Progress { message } => Some(message),
                ProgressEvent::AgentStream { .. } => None,
            })
            .collect()
    }

    pub fn snapshots(&self, agent: AgentRole) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ProgressEvent::AgentStream { agent: a, text } if a == agent => Some(text),
                _ => None,
            })
            .collect()
    }
}

impl ProgressSink for RecordingSink {
    fn on_progress(&self, message: &str) {
        self.events.lock().unwrap().push(ProgressEvent::Progress {
            message: message.to_string(),
        });
    }

    fn on_agent_stream(&self, agent: AgentRole, partial: &str) {
        self.events.lock().unwrap().push(ProgressEvent::AgentStream {
            agent,
            text: partial.to_string(),
        });
    }
}

/// A transport that replays fixed deltas and records requests
pub struct ScriptedTransport {
    deltas: Vec<String>,
    delta_delay: Duration,
    hang: bool,
    pub requests: Mutex<Vec<ChatCompletionRequest>>,
}

impl ScriptedTransport {
    pub fn new(deltas: &[&str]) -> Self {
        Self {
            deltas: deltas.iter().map(|d| d.to_string()).collect(),
            delta_delay: Duration::ZERO,
            hang: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A transport whose stream never produces anything
    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::new(&[])
        }
    }

    pub fn with_delta_delay(mut self, delay: Duration) -> Self {
        self.delta_delay = delay;
        self
    }
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn stream_chat(&self, request: ChatCompletionRequest) -> Result<DeltaStream> {
        self.requests.lock().unwrap().push(request);
        if self.hang {
            return Ok(stream::pending::<Result<String>>().boxed());
        }

        let delay = self.delta_delay;
        let deltas = self.deltas.clone();
        Ok(stream::iter(deltas)
            .then(move |delta| async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Ok::<_, PipelineError>(delta)
            })
            .boxed())
    }
}
