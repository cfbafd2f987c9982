//! Note persistence seam
//!
//! The pipeline never writes; callers that want the result on the note go
//! through [`analyze_stored_note`].

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use log::{info, warn};
use tokio::sync::RwLock;

use crate::agents::AnalysisAgents;
use crate::context::{AnalysisContext, NoteRecord};
use crate::error::{PipelineError, Result};
use crate::pipeline::{AnalysisPipeline, NoteAnalysis, PipelineResult, ProgressSink};

/// Key-value access to notes by id
#[async_trait]
pub trait NoteStore: Send + Sync {
    async fn load_note(&self, id: &str) -> Result<Option<NoteRecord>>;

    async fn save_analysis(&self, id: &str, analysis: NoteAnalysis) -> Result<()>;
}

/// In-process store for tests and demos
#[derive(Debug, Default)]
pub struct MemoryNoteStore {
    notes: RwLock<HashMap<String, NoteRecord>>,
    analyses: RwLock<HashMap<String, NoteAnalysis>>,
}

impl MemoryNoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, note: NoteRecord) {
        self.notes.write().await.insert(note.id.clone(), note);
    }

    pub async fn analysis(&self, id: &str) -> Option<NoteAnalysis> {
        self.analyses.read().await.get(id).cloned()
    }
}

#[async_trait]
impl NoteStore for MemoryNoteStore {
    async fn load_note(&self, id: &str) -> Result<Option<NoteRecord>> {
        Ok(self.notes.read().await.get(id).cloned())
    }

    async fn save_analysis(&self, id: &str, analysis: NoteAnalysis) -> Result<()> {
        if !self.notes.read().await.contains_key(id) {
            return Err(PipelineError::validation(format!("Unknown note: {}", id)));
        }
        self.analyses.write().await.insert(id.to_string(), analysis);
        Ok(())
    }
}

/// Load a note, analyze it and store the result on it
///
/// Degraded results are stored like any other. On a pipeline error nothing
/// is written. A failed save is logged and the finished result is still
/// returned, since the caller has already streamed it to the user.
pub async fn analyze_stored_note<A, S>(
    pipeline: &AnalysisPipeline<A>,
    store: &S,
    id: &str,
    sink: &dyn ProgressSink,
) -> Result<PipelineResult>
where
    A: AnalysisAgents,
    S: NoteStore + ?Sized,
{
    let note = store
        .load_note(id)
        .await?
        .ok_or_else(|| PipelineError::validation(format!("Unknown note: {}", id)))?;

    let result = pipeline.run(&AnalysisContext::from_note(&note), sink).await?;
    match store
        .save_analysis(id, result.to_note_analysis(Utc::now()))
        .await
    {
        Ok(()) => info!("Stored analysis for note {}", id),
        Err(e) => warn!("Failed to store analysis for note {}: {}", id, e),
    }

    Ok(result)
}
