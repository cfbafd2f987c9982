//! Core abstractions for the analysis pipeline
//!
//! This module provides the trait interfaces every stage is written against:
//!
//! - `ChatTransport`: issues one streaming chat-completion request
//! - `DeltaStream`: the incremental text deltas of one response
//! - `TokenSink`: the per-snapshot callback of a single agent call
//! - `CallOptions`: per-call deadline and caller-driven cancellation

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::transport::models::ChatCompletionRequest;

/// A stream of non-empty text deltas, ending when the response completes
pub type DeltaStream = BoxStream<'static, Result<String>>;

/// Receives the full accumulated text after every delta
pub type TokenSink<'a> = &'a (dyn Fn(&str) + Send + Sync);

/// Trait responsible for executing streaming chat-completion requests
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Short provider name used in logs
    fn name(&self) -> &str;

    /// Send `request` and return its delta stream
    ///
    /// Fails before any network I/O when the transport is misconfigured.
    async fn stream_chat(&self, request: ChatCompletionRequest) -> Result<DeltaStream>;
}

/// Options applied to every agent call of one pipeline run
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Deadline for a single call, streaming included
    ///
    /// Scaled per agent, see [`crate::agents::AgentRole::deadline`].
    pub timeout: Option<Duration>,

    /// Aborts in-flight and pending calls when cancelled
    pub cancel: CancellationToken,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}
