//! Outbound frame construction
//!
//! All frames to the agent backend are built here. A send that cannot go out
//! because the connection is not open is reported to the UI as a toast and
//! to the caller as `false`; it is never queued for later.

use std::collections::BTreeMap;

use nohup_protocol::{encode_outbound, OutboundFrame, ToolResultEntry};

use crate::events::UiSink;

/// Anything that can carry an encoded frame to the backend
pub trait FrameSink {
    /// Queue one text frame; false when the transport is not open
    fn send_frame(&self, text: String) -> bool;
}

/// Session-level control messages
#[derive(Debug, Clone, PartialEq)]
pub enum ControlFrame {
    SetModel { model_name: String },
    AudioInput { audio_data: String, format: String },
    SetApiKeys { keys: BTreeMap<String, String> },
    Stop,
}

impl From<ControlFrame> for OutboundFrame {
    fn from(control: ControlFrame) -> Self {
        match control {
            ControlFrame::SetModel { model_name } => OutboundFrame::SetLlmModel { model_name },
            ControlFrame::AudioInput { audio_data, format } => {
                OutboundFrame::AudioInput { audio_data, format }
            }
            ControlFrame::SetApiKeys { keys } => OutboundFrame::SetApiKeys { keys },
            ControlFrame::Stop => OutboundFrame::Stop {},
        }
    }
}

/// Builds and sends outbound frames
#[derive(Debug, Clone)]
pub struct OutboundGateway {
    ui: UiSink,
}

impl OutboundGateway {
    pub fn new(ui: UiSink) -> Self {
        Self { ui }
    }

    pub fn send_user_text(
        &self,
        sink: &impl FrameSink,
        text: String,
        screenshot_data_url: Option<String>,
        context_text: Option<String>,
    ) -> bool {
        self.send(
            sink,
            OutboundFrame::UserMessage {
                text,
                screenshot_data_url,
                context_text,
            },
        )
    }

    /// Report one tool call result
    pub fn send_action_result(
        &self,
        sink: &impl FrameSink,
        tool_call_id: &str,
        content: &str,
    ) -> bool {
        self.send(
            sink,
            OutboundFrame::ToolResult {
                results: vec![ToolResultEntry {
                    tool_call_id: tool_call_id.to_string(),
                    content: content.to_string(),
                }],
            },
        )
    }

    pub fn send_control(&self, sink: &impl FrameSink, control: ControlFrame) -> bool {
        self.send(sink, control.into())
    }

    /// Answer an agent question
    pub fn send_user_answer(&self, sink: &impl FrameSink, request_id: &str, answer: String) -> bool {
        self.send(
            sink,
            OutboundFrame::UserResponse {
                request_id: request_id.to_string(),
                answer,
            },
        )
    }

    fn send(&self, sink: &impl FrameSink, frame: OutboundFrame) -> bool {
        let frame_type = frame.type_name();
        let text = match encode_outbound(&frame) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(frame_type, "Failed to encode frame: {}", e);
                self.ui.toast(format!("Could not encode {} message", frame_type));
                return false;
            }
        };

        if sink.send_frame(text) {
            tracing::debug!(frame_type, "Sent frame to agent backend");
            true
        } else {
            tracing::warn!(frame_type, "Not connected, frame dropped");
            self.ui
                .toast("Not connected to the agent backend. Message not sent.");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::UiEvent;
    use serde_json::{json, Value};
    use std::cell::RefCell;

    /// Records frames; `open` controls whether sends succeed
    struct RecordingSink {
        open: bool,
        sent: RefCell<Vec<String>>,
    }

    impl RecordingSink {
        fn open() -> Self {
            Self {
                open: true,
                sent: RefCell::new(Vec::new()),
            }
        }

        fn closed() -> Self {
            Self {
                open: false,
                sent: RefCell::new(Vec::new()),
            }
        }

        fn frames(&self) -> Vec<Value> {
            self.sent
                .borrow()
                .iter()
                .map(|text| serde_json::from_str(text).unwrap())
                .collect()
        }
    }

    impl FrameSink for RecordingSink {
        fn send_frame(&self, text: String) -> bool {
            if self.open {
                self.sent.borrow_mut().push(text);
            }
            self.open
        }
    }

    #[test]
    fn test_send_user_text() {
        let (ui, _rx) = UiSink::channel();
        let gateway = OutboundGateway::new(ui);
        let sink = RecordingSink::open();

        assert!(gateway.send_user_text(&sink, "hello".into(), None, Some("selected".into())));
        assert_eq!(
            sink.frames(),
            vec![json!({"type":"user_message","text":"hello","context_text":"selected"})]
        );
    }

    #[test]
    fn test_send_action_result() {
        let (ui, _rx) = UiSink::channel();
        let gateway = OutboundGateway::new(ui);
        let sink = RecordingSink::open();

        assert!(gateway.send_action_result(&sink, "a1", "hi\n"));
        assert_eq!(
            sink.frames(),
            vec![json!({"type":"tool_result","results":[{"tool_call_id":"a1","content":"hi\n"}]})]
        );
    }

    #[test]
    fn test_send_controls() {
        let (ui, _rx) = UiSink::channel();
        let gateway = OutboundGateway::new(ui);
        let sink = RecordingSink::open();

        gateway.send_control(&sink, ControlFrame::SetModel { model_name: "gpt-4o".into() });
        gateway.send_control(
            &sink,
            ControlFrame::AudioInput {
                audio_data: "AAAA".into(),
                format: "webm".into(),
            },
        );
        gateway.send_control(&sink, ControlFrame::Stop);

        assert_eq!(
            sink.frames(),
            vec![
                json!({"type":"set_llm_model","model_name":"gpt-4o"}),
                json!({"type":"audio_input","audio_data":"AAAA","format":"webm"}),
                json!({"type":"stop"}),
            ]
        );
    }

    #[test]
    fn test_send_user_answer() {
        let (ui, _rx) = UiSink::channel();
        let gateway = OutboundGateway::new(ui);
        let sink = RecordingSink::open();

        assert!(gateway.send_user_answer(&sink, "q1", "yes".into()));
        assert_eq!(
            sink.frames(),
            vec![json!({"type":"user_response","request_id":"q1","answer":"yes"})]
        );
    }

    #[test]
    fn test_not_connected_toasts() {
        let (ui, mut rx) = UiSink::channel();
        let gateway = OutboundGateway::new(ui);
        let sink = RecordingSink::closed();

        assert!(!gateway.send_user_text(&sink, "hello".into(), None, None));
        assert!(sink.frames().is_empty());
        match rx.try_recv().unwrap() {
            UiEvent::Toast { message } => assert!(message.contains("Not connected")),
            other => panic!("unexpected event {:?}", other),
        }
    }
}
