use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A step of a multi-step operation, for the caller to render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// The 1-based step index.
    pub step: usize,

    /// The number of steps.
    pub total: usize,

    /// What the step does.
    pub description: String,
}

/// Receives progress events. Implementations must not block.
pub trait ProgressSink: Send + Sync {
    /// Called once per step, before the step runs.
    fn emit(&self, event: ProgressEvent);
}

/// Logs progress events with `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingProgress;

/// Forwards progress events into a channel.
#[derive(Debug, Clone)]
pub struct ChannelProgress {
    sender: mpsc::UnboundedSender<ProgressEvent>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ProgressEvent {
    /// Creates an event.
    pub fn new(step: usize, total: usize, description: impl Into<String>) -> Self {
        Self {
            step,
            total,
            description: description.into(),
        }
    }
}

impl ChannelProgress {
    /// Creates a sink and the receiving end of its channel.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl<F> ProgressSink for F
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn emit(&self, event: ProgressEvent) {
        self(event)
    }
}

impl ProgressSink for TracingProgress {
    fn emit(&self, event: ProgressEvent) {
        tracing::info!("[{}/{}] {}", event.step, event.total, event.description);
    }
}

impl ProgressSink for ChannelProgress {
    fn emit(&self, event: ProgressEvent) {
        // The receiver going away just means nobody is watching anymore.
        let _ = self.sender.send(event);
    }
}

impl Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}/{}] {}", self.step, self.total, self.description)
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[test]
    fn test_closure_sink() {
        let seen = Mutex::new(Vec::new());
        let sink = |event: ProgressEvent| seen.lock().unwrap().push(event.to_string());
        sink.emit(ProgressEvent::new(1, 3, "looking up container"));
        assert_eq!(seen.lock().unwrap().as_slice(), ["[1/3] looking up container"]);
    }

    #[tokio::test]
    async fn test_channel_sink() {
        let (sink, mut receiver) = ChannelProgress::new();
        sink.emit(ProgressEvent::new(2, 2, "done"));
        drop(sink);
        assert_eq!(receiver.recv().await.unwrap().step, 2);
        assert!(receiver.recv().await.is_none());
    }
}
