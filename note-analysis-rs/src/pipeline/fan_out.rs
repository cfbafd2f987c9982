//! Concurrent original-record and correction analysis

use std::time::Instant;

use log::debug;

use crate::agents::{AgentRole, AnalysisAgents};
use crate::context::AnalysisContext;
use crate::error::Result;

use super::progress::ProgressSink;

/// Outputs of the parallel stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParallelOutcome {
    pub original: String,
    pub correction: String,
}

/// Run both agents concurrently on the confirmed intent
///
/// Both calls are in flight at the same time and the stage completes only
/// when both have. The first error wins and the sibling call is dropped.
pub async fn run_parallel_stage<A>(
    agents: &A,
    intent: &str,
    ctx: &AnalysisContext,
    sink: &dyn ProgressSink,
) -> Result<ParallelOutcome>
where
    A: AnalysisAgents + ?Sized,
{
    let note_content = ctx.user_content();
    let original_tokens = |partial: &str| sink.on_agent_stream(AgentRole::Original, partial);
    let correction_tokens = |partial: &str| sink.on_agent_stream(AgentRole::Correction, partial);

    let start_time = Instant::now();
    let (original, correction) = tokio::try_join!(
        agents.analyze_original_record(intent, &note_content, &original_tokens),
        agents.analyze_correction(intent, &note_content, &correction_tokens),
    )?;
    debug!("Parallel stage finished in {:?}", start_time.elapsed());

    Ok(ParallelOutcome {
        original,
        correction,
    })
}
