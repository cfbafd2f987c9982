//! # Note Analysis
//!
//! A review-gated, multi-agent LLM pipeline that analyzes spaced-repetition
//! study notes.
//!
//! This crate provides:
//!
//! - A streaming transport for OpenAI-compatible chat-completion providers
//! - Five single-purpose agents built on one streaming call primitive
//! - An intent stage gated by an automated reviewer, with bounded retries
//! - Concurrent original-record and correction analysis, then a summary
//! - Progress and token streaming hooks for live rendering
//! - Configuration management and a typed error taxonomy
//!
//! ## Architecture
//!
//! - `ChatTransport`: issues one streaming chat-completion request
//! - `AnalysisAgents`: the five agent calls a run is made of
//! - `AnalysisPipeline`: composes the stages and owns the degraded exit
//! - `ProgressSink`: receives status lines and partial agent output
//! - `PipelineError`: configuration and transport failures
//!
//! Review exhaustion is not an error: the run resolves with
//! `review_passed == false` and a fixed explanatory message.

pub mod core;
pub use core::{CallOptions, ChatTransport, DeltaStream, TokenSink};

pub mod error;
pub use error::{ErrorContext, PipelineError, Result};

pub mod config;
pub use config::{AnalysisSettings, ConfigProvider, ProviderKind, ProviderProfile, ServiceConfig};

pub mod transport;
pub use transport::{ChatClient, ChatClientBuilder};

pub mod context;
pub use context::{AnalysisContext, NoteMetadata, NoteRecord};

pub mod agents;
pub use agents::{parse_verdict, AgentRole, AnalysisAgents, LlmAgents, ReviewVerdict};

pub mod pipeline;
pub use pipeline::{
    analyze_note, analyze_note_cancellable, AnalysisPipeline, CallbackSink, ChannelSink,
    NoopSink, NoteAnalysis, PipelineResult, ProgressEvent, ProgressSink, MAX_ATTEMPTS,
};

pub mod store;
pub use store::{analyze_stored_note, MemoryNoteStore, NoteStore};

// Utility module for common functionality
mod util;

#[cfg(test)]
mod tests;
