//! Review-gated multi-agent analysis of a note
//!
//! - `retry_gate`: intent extraction with up to three review rounds
//! - `fan_out`: original-record and correction analysis in parallel
//! - `orchestrator`: the full run, including the degraded early exit
//! - `progress`: status lines and streamed agent output for observers

pub mod fan_out;
pub mod orchestrator;
pub mod progress;
pub mod retry_gate;

use std::sync::Arc;

use log::debug;
use tokio_util::sync::CancellationToken;

use crate::agents::LlmAgents;
use crate::config::{AnalysisSettings, ProviderProfile, ServiceConfig};
use crate::context::{AnalysisContext, NoteRecord};
use crate::core::CallOptions;
use crate::error::{PipelineError, Result};
use crate::transport::ChatClient;

pub use fan_out::{run_parallel_stage, ParallelOutcome};
pub use orchestrator::{
    degraded_message, AnalysisPipeline, NoteAnalysis, PipelineResult, PipelineStage,
    DEGRADED_HEADING,
};
pub use progress::{CallbackSink, ChannelSink, NoopSink, ProgressEvent, ProgressSink};
pub use retry_gate::{run_retry_gate, IntentOutcome, RetryState, MAX_ATTEMPTS};

/// Build a pipeline over a live provider
///
/// Settings and profile are validated first, so configuration errors
/// surface before any agent call. The profile must belong to the provider
/// selected in `settings`.
pub fn build_pipeline(
    settings: &AnalysisSettings,
    profile: ProviderProfile,
    cancel: CancellationToken,
) -> Result<AnalysisPipeline<LlmAgents>> {
    settings.validate()?;
    profile.validate()?;

    let kind = profile.kind();
    if kind != settings.provider {
        return Err(PipelineError::configuration(format!(
            "Selected provider is {} but the profile is for {}",
            settings.provider, kind
        )));
    }
    let model = profile.endpoint().model.clone();
    let client = ChatClient::builder(profile)
        .connect_timeout(settings.connect_timeout())
        .build()?;
    debug!("Built {} client for model {}", kind, model);

    let options = CallOptions::new()
        .with_timeout(settings.call_timeout())
        .with_cancellation(cancel);
    let agents = LlmAgents::new(Arc::new(client), model).with_options(options);

    Ok(AnalysisPipeline::new(agents))
}

/// Analyze one note end to end
pub async fn analyze_note(
    settings: &AnalysisSettings,
    profile: ProviderProfile,
    note: &NoteRecord,
    sink: &dyn ProgressSink,
) -> Result<PipelineResult> {
    analyze_note_cancellable(settings, profile, note, sink, CancellationToken::new()).await
}

/// [`analyze_note`] with a caller-owned cancellation token
pub async fn analyze_note_cancellable(
    settings: &AnalysisSettings,
    profile: ProviderProfile,
    note: &NoteRecord,
    sink: &dyn ProgressSink,
    cancel: CancellationToken,
) -> Result<PipelineResult> {
    let pipeline = build_pipeline(settings, profile, cancel)?;
    let ctx = AnalysisContext::from_note(note);
    pipeline.run(&ctx, sink).await
}
