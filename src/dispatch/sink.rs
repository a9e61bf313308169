//! Where a turn's frames go.
//!
//! The stream path hands frames to the hub for the owning connection; the
//! single-shot path collects them and returns the lot in one response body.
//! Either way the dispatcher emits through the same trait, in production
//! order, one invocation at a time.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::gateway::{StreamFrame, StreamHub};

pub trait FrameSink: Send + Sync {
    fn emit(&self, frame: StreamFrame);
}

/// Delivers frames to a session's live stream connection. Frames emitted
/// after the connection starts draining are dropped by the hub.
pub struct HubSink {
    hub: Arc<StreamHub>,
    session_id: String,
}

impl HubSink {
    pub fn new(hub: Arc<StreamHub>, session_id: impl Into<String>) -> Self {
        HubSink {
            hub,
            session_id: session_id.into(),
        }
    }
}

impl FrameSink for HubSink {
    fn emit(&self, frame: StreamFrame) {
        self.hub.send(&self.session_id, frame);
    }
}

/// Buffers frames for a request/response caller.
#[derive(Default)]
pub struct FrameCollector {
    frames: Mutex<Vec<StreamFrame>>,
}

impl FrameCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<StreamFrame> {
        std::mem::take(&mut self.frames.lock())
    }
}

impl FrameSink for FrameCollector {
    fn emit(&self, frame: StreamFrame) {
        self.frames.lock().push(frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collector_preserves_order() {
        let collector = FrameCollector::new();
        collector.emit(StreamFrame::Progress {
            text: "one".to_string(),
        });
        collector.emit(StreamFrame::Done);

        let frames = collector.take();
        assert_eq!(frames.len(), 2);
        assert!(matches!(&frames[0], StreamFrame::Progress { text } if text == "one"));
        assert!(matches!(frames[1], StreamFrame::Done));
        assert!(collector.take().is_empty());
    }

    #[tokio::test]
    async fn test_hub_sink_routes_to_owning_session() {
        let hub = Arc::new(StreamHub::new());
        let (mut rx, _cancel, _gen) = hub.register("s1");
        hub.activate("s1");

        let sink = HubSink::new(hub.clone(), "s1");
        sink.emit(StreamFrame::Done);
        assert!(matches!(rx.recv().await, Some(StreamFrame::Done)));

        // Emitting for a dead connection is a no-op, not an error.
        hub.connection_closed("s1");
        sink.emit(StreamFrame::Done);
    }
}
