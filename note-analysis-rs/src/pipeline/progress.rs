//! Progress reporting for pipeline runs

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::agents::AgentRole;

/// One observable step of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// A human-readable status line
    Progress { message: String },
    /// The accumulated output of one agent so far
    AgentStream { agent: AgentRole, text: String },
}

/// Receives progress lines and streamed agent output
///
/// Both hooks are called from the pipeline's task; during the parallel
/// stage snapshots of `original` and `correction` interleave.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, message: &str);

    fn on_agent_stream(&self, agent: AgentRole, partial: &str);
}

/// Ignores every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn on_progress(&self, _message: &str) {}

    fn on_agent_stream(&self, _agent: AgentRole, _partial: &str) {}
}

type ProgressFn = Box<dyn Fn(&str) + Send + Sync>;
type StreamFn = Box<dyn Fn(AgentRole, &str) + Send + Sync>;

/// Forwards events to optional closures
#[derive(Default)]
pub struct CallbackSink {
    on_progress: Option<ProgressFn>,
    on_agent_stream: Option<StreamFn>,
}

impl CallbackSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_progress(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Box::new(f));
        self
    }

    pub fn with_agent_stream(mut self, f: impl Fn(AgentRole, &str) + Send + Sync + 'static) -> Self {
        self.on_agent_stream = Some(Box::new(f));
        self
    }
}

impl ProgressSink for CallbackSink {
    fn on_progress(&self, message: &str) {
        if let Some(f) = &self.on_progress {
            f(message);
        }
    }

    fn on_agent_stream(&self, agent: AgentRole, partial: &str) {
        if let Some(f) = &self.on_agent_stream {
            f(agent, partial);
        }
    }
}

/// Sends events into an unbounded channel
///
/// A dropped receiver silently discards further events; the run itself is
/// unaffected.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<ProgressEvent>) -> Self {
        Self { tx }
    }

    /// A sink together with the receiving half of its channel
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressSink for ChannelSink {
    fn on_progress(&self, message: &str) {
        let _ = self.tx.send(ProgressEvent::Progress {
            message: message.to_string(),
        });
    }

    fn on_agent_stream(&self, agent: AgentRole, partial: &str) {
        let _ = self.tx.send(ProgressEvent::AgentStream {
            agent,
            text: partial.to_string(),
        });
    }
}
