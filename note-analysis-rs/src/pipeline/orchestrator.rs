//! Top-level control flow of one analysis run
//!
//! ```text
//! RunningRetryGate ─┬─> Degraded
//!                   └─> RunningParallelStage ─> RunningSummary ─> Completed
//! ```
//!
//! Review exhaustion ends the run early with a friendly result. Agent errors
//! are never absorbed; they reach the caller unchanged.

use std::fmt;
use std::time::Instant;

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::agents::{AgentRole, AnalysisAgents, SummaryInput};
use crate::context::AnalysisContext;
use crate::error::Result;
use crate::util::generate_run_id;

use super::fan_out::run_parallel_stage;
use super::progress::ProgressSink;
use super::retry_gate::run_retry_gate;

/// Heading line of the degraded result, never produced by an agent
pub const DEGRADED_HEADING: &str = "## 😊 这份笔记暂时没能分析出来";

/// The fixed text returned in place of analysis when review never passes
pub fn degraded_message(attempts: u32) -> String {
    format!(
        "{DEGRADED_HEADING}

我尝试了 {attempts} 次，仍然没能准确理解这份笔记的重点。常见原因有：

- 📷 图片内容较复杂，或拍得不够清晰
- ✍️ 手写字迹不易辨认
- 🎯 需要分析的题目没有明显标记

### 💡 可以这样试试

1. **重新拍照**：换到光线充足的地方再拍一次
2. **标出重点**：用红笔圈出想分析的题目
3. **拆开分析**：内容较多时分成几份笔记分别分析

### 🤝 仍然不行？

- 在笔记正文里用文字说明是哪道题有问题
- 换一张更清晰的图片
- 描述一下具体卡在哪里

别灰心，遇到困难很正常，我们换个方式再来一次 💪"
    )
}

/// Stages of a run, logged on every transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    RunningRetryGate,
    Degraded,
    RunningParallelStage,
    RunningSummary,
    Completed,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::RunningRetryGate => "running_retry_gate",
            PipelineStage::Degraded => "degraded",
            PipelineStage::RunningParallelStage => "running_parallel_stage",
            PipelineStage::RunningSummary => "running_summary",
            PipelineStage::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// Outcome of a run that did not fail
///
/// When `review_passed` is false, `original` holds the degraded message and
/// `correction` and `summary` are empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResult {
    pub intent: String,
    pub original: String,
    pub correction: String,
    pub summary: String,
    pub review_passed: bool,
    pub attempts: u32,
}

impl PipelineResult {
    fn degraded(intent: String, attempts: u32) -> Self {
        Self {
            intent,
            original: degraded_message(attempts),
            correction: String::new(),
            summary: String::new(),
            review_passed: false,
            attempts,
        }
    }

    pub fn is_degraded(&self) -> bool {
        !self.review_passed
    }

    /// Markdown document the caller stores on the note
    pub fn to_markdown(&self) -> String {
        if self.is_degraded() {
            return self.original.clone();
        }
        format!(
            "## 🎯 意图分析\n\n{}\n\n## 📝 原始记录分析\n\n{}\n\n## ✅ 订正分析\n\n{}\n\n## ✨ 总结报告\n\n{}",
            self.intent.trim(),
            self.original.trim(),
            self.correction.trim(),
            self.summary.trim()
        )
    }

    pub fn to_note_analysis(&self, now: DateTime<Utc>) -> NoteAnalysis {
        NoteAnalysis {
            content: self.to_markdown(),
            generated_at: now.timestamp_millis(),
        }
    }
}

/// The analysis record written back onto a note
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteAnalysis {
    pub content: String,
    /// Unix epoch milliseconds
    pub generated_at: i64,
}

/// One configured pipeline; every call to [`AnalysisPipeline::run`] is an
/// independent run with its own state
#[derive(Debug, Clone)]
pub struct AnalysisPipeline<A> {
    agents: A,
}

impl<A: AnalysisAgents> AnalysisPipeline<A> {
    pub fn new(agents: A) -> Self {
        Self { agents }
    }

    pub fn agents(&self) -> &A {
        &self.agents
    }

    /// Run the full analysis of `ctx`
    pub async fn run(&self, ctx: &AnalysisContext, sink: &dyn ProgressSink) -> Result<PipelineResult> {
        let run_id = generate_run_id();
        let start_time = Instant::now();
        info!("[{}] analysis of \"{}\" started", run_id, ctx.title);

        let result = self.execute(&run_id, ctx, sink).await;
        match &result {
            Ok(outcome) => info!(
                "[{}] analysis finished in {:?} (review_passed={}, attempts={})",
                run_id,
                start_time.elapsed(),
                outcome.review_passed,
                outcome.attempts
            ),
            Err(e) => warn!(
                "[{}] analysis failed after {:?}: {}",
                run_id,
                start_time.elapsed(),
                e
            ),
        }
        result
    }

    async fn execute(
        &self,
        run_id: &str,
        ctx: &AnalysisContext,
        sink: &dyn ProgressSink,
    ) -> Result<PipelineResult> {
        enter(run_id, PipelineStage::RunningRetryGate);
        sink.on_progress("🎯 开始分析学习意图...");
        let gate = run_retry_gate(&self.agents, ctx, sink).await?;

        if !gate.review_passed {
            enter(run_id, PipelineStage::Degraded);
            sink.on_progress("⚠️ 多次审查仍未通过，返回提示信息");
            return Ok(PipelineResult::degraded(gate.intent, gate.attempts));
        }

        enter(run_id, PipelineStage::RunningParallelStage);
        sink.on_progress("📝 正在同时分析原始记录和订正答案...");
        let parallel = run_parallel_stage(&self.agents, &gate.intent, ctx, sink).await?;
        sink.on_progress("📊 原始记录与订正分析完成");

        enter(run_id, PipelineStage::RunningSummary);
        sink.on_progress("✨ 正在生成总结报告...");
        let summary_tokens = |partial: &str| sink.on_agent_stream(AgentRole::Summary, partial);
        let summary = self
            .agents
            .summarize(
                SummaryInput {
                    intent: &gate.intent,
                    original: &parallel.original,
                    correction: &parallel.correction,
                    context: ctx,
                },
                &summary_tokens,
            )
            .await?;

        enter(run_id, PipelineStage::Completed);
        sink.on_progress("✅ 分析完成！");

        Ok(PipelineResult {
            intent: gate.intent,
            original: parallel.original,
            correction: parallel.correction,
            summary,
            review_passed: true,
            attempts: gate.attempts,
        })
    }
}

fn enter(run_id: &str, stage: PipelineStage) {
    info!("[{}] stage -> {}", run_id, stage);
}
