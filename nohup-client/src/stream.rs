//! Streamed response aggregation
//!
//! Chunks are appended to a buffer between a start and a finish event. The
//! aggregator is the only place that decides when a stream starts or ends,
//! which keeps finish events from being emitted twice.

use crate::events::UiEvent;

/// Aggregator state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum StreamState {
    #[default]
    Idle,
    Streaming,
}

/// Collects chunk frames into a single assistant message
#[derive(Debug, Default)]
pub struct StreamAggregator {
    state: StreamState,
    buffer: String,
}

impl StreamAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_streaming(&self) -> bool {
        self.state == StreamState::Streaming
    }

    /// Text accumulated so far in the active stream
    pub fn text(&self) -> &str {
        &self.buffer
    }

    /// Append a chunk, starting a stream if none is active
    pub fn chunk(&mut self, content: &str) -> Vec<UiEvent> {
        let mut events = Vec::with_capacity(2);
        if self.state == StreamState::Idle {
            self.state = StreamState::Streaming;
            self.buffer.clear();
            events.push(UiEvent::StreamStarted);
        }
        self.buffer.push_str(content);
        events.push(UiEvent::StreamAppend {
            content: content.to_string(),
        });
        events
    }

    /// Finish the active stream; `None` when idle
    pub fn end(&mut self) -> Option<UiEvent> {
        if self.state == StreamState::Idle {
            return None;
        }
        self.state = StreamState::Idle;
        Some(UiEvent::StreamFinished {
            text: std::mem::take(&mut self.buffer),
        })
    }

    /// Force-finish the active stream with its partial text
    ///
    /// Used when a non-chunk frame, a disconnect, or a session change
    /// interrupts streaming.
    pub fn abort(&mut self) -> Option<UiEvent> {
        let event = self.end();
        if event.is_some() {
            tracing::debug!("Stream interrupted before end frame");
        }
        event
    }
}
