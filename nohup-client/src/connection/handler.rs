//! Inbound frame handling
//!
//! [`FrameHandler`] is the synchronous heart of the session: it owns the
//! stream aggregator, the pending action table and the set of open agent
//! questions, and maps each inbound frame to a list of [`Effect`]s. It never
//! touches the network or the desktop itself, which keeps every ordering
//! rule testable without a socket.

use std::collections::HashSet;
use std::time::Duration;

use tokio::time::Instant;

use nohup_protocol::{decode_inbound, CodecError, InboundFrame, ToolCall};

use crate::events::{NoticeLevel, UiEvent};
use crate::executor::Decision;
use crate::pending::{ApprovalPolicy, PendingActions};
use crate::stream::StreamAggregator;

/// Something the session core has to do as a result of a frame
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Forward an event to the UI
    Ui(UiEvent),
    /// Run (or refuse) a tool call and report its result
    Execute {
        call: ToolCall,
        decision: Decision,
        auto_approved: bool,
    },
}

/// Per-connection inbound state machine
#[derive(Debug)]
pub struct FrameHandler {
    stream: StreamAggregator,
    pending: PendingActions,
    policy: ApprovalPolicy,
    /// request_ids of agent questions not yet answered
    questions: HashSet<String>,
}

impl FrameHandler {
    pub fn new(policy: ApprovalPolicy) -> Self {
        Self {
            stream: StreamAggregator::new(),
            pending: PendingActions::new(),
            policy,
            questions: HashSet::new(),
        }
    }

    pub fn stream(&self) -> &StreamAggregator {
        &self.stream
    }

    pub fn pending(&self) -> &PendingActions {
        &self.pending
    }

    /// Decode and handle one text frame
    pub fn handle_text(&mut self, text: &str) -> Vec<Effect> {
        match decode_inbound(text) {
            Ok(frame) => self.handle_frame(frame),
            Err(e) => self.handle_decode_error(&e),
        }
    }

    /// Handle one decoded frame
    pub fn handle_frame(&mut self, frame: InboundFrame) -> Vec<Effect> {
        tracing::debug!(frame_type = frame.type_name(), "Handling inbound frame");

        match frame {
            InboundFrame::Chunk { content } => {
                self.stream.chunk(&content).into_iter().map(Effect::Ui).collect()
            }

            InboundFrame::End {} => self.stream.end().map(Effect::Ui).into_iter().collect(),

            InboundFrame::Error { content } => self.notice(NoticeLevel::Error, content),
            InboundFrame::Warning { content } => self.notice(NoticeLevel::Warning, content),
            InboundFrame::Info { content } => self.notice(NoticeLevel::Info, content),

            InboundFrame::ToolCallRequest { tool_calls } => self.tool_calls(tool_calls),

            InboundFrame::AskUserRequest { question } => {
                let mut effects = self.abort_stream();
                effects.push(Effect::Ui(UiEvent::AskUser { question }));
                effects
            }

            InboundFrame::TerminateRequest { reason } => {
                let mut effects = self.abort_stream();
                effects.push(Effect::Ui(UiEvent::Terminated { reason }));
                effects
            }

            InboundFrame::AgentQuestion {
                question,
                request_id,
            } => {
                self.questions.insert(request_id.clone());
                vec![Effect::Ui(UiEvent::AgentQuestion {
                    request_id,
                    question,
                })]
            }

            InboundFrame::AgentStepUpdate { data } => vec![Effect::Ui(UiEvent::StepUpdate(data))],

            InboundFrame::CostUpdate { total_cost } => {
                vec![Effect::Ui(UiEvent::CostUpdate { total_cost })]
            }

            InboundFrame::TranscriptionResult { text } => {
                vec![Effect::Ui(UiEvent::Transcription { text })]
            }

            InboundFrame::Unrecognized {
                frame_type,
                response,
            } => {
                tracing::warn!(?frame_type, "Unrecognized frame from agent backend");
                let mut effects = self.abort_stream();
                if let Some(content) = response {
                    effects.push(Effect::Ui(UiEvent::AssistantMessage { content }));
                }
                effects
            }
        }
    }

    /// A frame that could not be decoded aborts the stream and surfaces a
    /// generic error
    pub fn handle_decode_error(&mut self, error: &CodecError) -> Vec<Effect> {
        tracing::error!("Failed to decode frame from agent backend: {}", error);
        let mut effects = self.abort_stream();
        effects.push(Effect::Ui(UiEvent::Notice {
            level: NoticeLevel::Error,
            message: "Received a malformed message from the agent backend.".to_string(),
        }));
        effects
    }

    /// Apply the user's decision to a pending tool call
    ///
    /// Returns `None` when the id is unknown or already resolved.
    pub fn resolve(&mut self, id: &str, decision: Decision) -> Option<Effect> {
        let call = self.pending.remove(id)?;
        tracing::info!(id, ?decision, "Pending tool call resolved");
        Some(Effect::Execute {
            call,
            decision,
            auto_approved: false,
        })
    }

    /// Consume an open agent question; false if it was never asked or is
    /// already answered
    pub fn take_question(&mut self, request_id: &str) -> bool {
        self.questions.remove(request_id)
    }

    /// Drop pending calls older than `max_age`
    pub fn expire_pending(&mut self, max_age: Duration, now: Instant) -> Vec<ToolCall> {
        self.pending.take_expired(max_age, now)
    }

    /// Forget all per-connection state
    ///
    /// An active stream is finished with its partial text.
    pub fn reset(&mut self) -> Vec<Effect> {
        let effects = self.abort_stream();
        let dropped = self.pending.clear();
        if dropped > 0 {
            tracing::info!(dropped, "Discarded pending tool calls");
        }
        self.questions.clear();
        effects
    }

    fn abort_stream(&mut self) -> Vec<Effect> {
        self.stream.abort().map(Effect::Ui).into_iter().collect()
    }

    fn notice(&mut self, level: NoticeLevel, message: String) -> Vec<Effect> {
        let mut effects = self.abort_stream();
        effects.push(Effect::Ui(UiEvent::Notice { level, message }));
        effects
    }

    fn tool_calls(&mut self, tool_calls: Vec<ToolCall>) -> Vec<Effect> {
        if tool_calls.is_empty() {
            tracing::warn!("tool_call_request without tool calls");
        }

        let mut effects = Vec::with_capacity(tool_calls.len());
        for call in tool_calls {
            if self.policy.requires_approval(&call) {
                effects.push(Effect::Ui(UiEvent::ActionRequested {
                    id: call.id.clone(),
                    tool: call.name().to_string(),
                    arguments: call.function.arguments.clone(),
                }));
                if let Some(previous) = self.pending.put(call) {
                    tracing::warn!(id = %previous.id, "Tool call id reused, replacing pending entry");
                }
            } else {
                tracing::info!(id = %call.id, tool = %call.name(), "Auto-approving tool call");
                effects.push(Effect::Execute {
                    call,
                    decision: Decision::Approved,
                    auto_approved: true,
                });
            }
        }
        effects
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nohup_protocol::tools::{PASTE_AT_CURSOR, RUN_BASH_COMMAND};
    use serde_json::json;

    fn handler() -> FrameHandler {
        FrameHandler::new(ApprovalPolicy::default())
    }

    fn feed(handler: &mut FrameHandler, value: serde_json::Value) -> Vec<Effect> {
        handler.handle_text(&value.to_string())
    }

    fn ui(effects: Vec<Effect>) -> Vec<UiEvent> {
        effects
            .into_iter()
            .map(|effect| match effect {
                Effect::Ui(event) => event,
                other => panic!("expected UI effect, got {:?}", other),
            })
            .collect()
    }

    fn tool_request(calls: serde_json::Value) -> serde_json::Value {
        json!({"type":"tool_call_request","tool_calls":calls})
    }

    fn bash_call(id: &str, command: &str) -> serde_json::Value {
        json!({
            "id": id,
            "type": "function",
            "function": {
                "name": RUN_BASH_COMMAND,
                "arguments": json!({"command": command}).to_string()
            }
        })
    }

    // ==================== Streaming Tests ====================

    #[test]
    fn test_chunks_then_end() {
        let mut h = handler();
        let mut events = ui(feed(&mut h, json!({"type":"chunk","content":"Hel"})));
        events.extend(ui(feed(&mut h, json!({"type":"chunk","content":"lo"}))));
        events.extend(ui(feed(&mut h, json!({"type":"end","content":""}))));

        assert_eq!(
            events,
            vec![
                UiEvent::StreamStarted,
                UiEvent::StreamAppend { content: "Hel".into() },
                UiEvent::StreamAppend { content: "lo".into() },
                UiEvent::StreamFinished { text: "Hello".into() },
            ]
        );
    }

    #[test]
    fn test_end_while_idle_emits_nothing() {
        let mut h = handler();
        assert!(feed(&mut h, json!({"type":"end"})).is_empty());
    }

    #[test]
    fn test_consecutive_errors_finish_stream_once() {
        let mut h = handler();
        feed(&mut h, json!({"type":"chunk","content":"par"}));

        let first = ui(feed(&mut h, json!({"type":"error","content":"boom"})));
        assert_eq!(
            first,
            vec![
                UiEvent::StreamFinished { text: "par".into() },
                UiEvent::Notice {
                    level: NoticeLevel::Error,
                    message: "boom".into()
                },
            ]
        );

        let second = ui(feed(&mut h, json!({"type":"error","content":"again"})));
        assert_eq!(
            second,
            vec![UiEvent::Notice {
                level: NoticeLevel::Error,
                message: "again".into()
            }]
        );
    }

    #[test]
    fn test_consecutive_warnings_finish_stream_once() {
        let mut h = handler();
        feed(&mut h, json!({"type":"chunk","content":"par"}));

        let first = ui(feed(&mut h, json!({"type":"warning","content":"slow"})));
        assert_eq!(
            first,
            vec![
                UiEvent::StreamFinished { text: "par".into() },
                UiEvent::Notice {
                    level: NoticeLevel::Warning,
                    message: "slow".into()
                },
            ]
        );

        let second = ui(feed(&mut h, json!({"type":"warning","content":"slower"})));
        assert_eq!(
            second,
            vec![UiEvent::Notice {
                level: NoticeLevel::Warning,
                message: "slower".into()
            }]
        );
        assert!(!h.stream().is_streaming());
    }

    #[test]
    fn test_consecutive_unknown_frames_finish_stream_once() {
        let mut h = handler();
        feed(&mut h, json!({"type":"chunk","content":"par"}));

        let first = ui(feed(&mut h, json!({"type":"mystery"})));
        assert_eq!(first, vec![UiEvent::StreamFinished { text: "par".into() }]);

        let second = ui(feed(&mut h, json!({"type":"mystery","response":"hello"})));
        assert_eq!(
            second,
            vec![UiEvent::AssistantMessage {
                content: "hello".into()
            }]
        );

        assert!(ui(feed(&mut h, json!({"no_type": true}))).is_empty());
    }

    #[test]
    fn test_warning_and_info_levels() {
        let mut h = handler();
        assert_eq!(
            ui(feed(&mut h, json!({"type":"warning","content":"slow"}))),
            vec![UiEvent::Notice {
                level: NoticeLevel::Warning,
                message: "slow".into()
            }]
        );
        assert_eq!(
            ui(feed(&mut h, json!({"type":"info","content":"Stop signal received."}))),
            vec![UiEvent::Notice {
                level: NoticeLevel::Info,
                message: "Stop signal received.".into()
            }]
        );
    }

    #[test]
    fn test_ask_user_aborts_stream() {
        let mut h = handler();
        feed(&mut h, json!({"type":"chunk","content":"thinking"}));
        let events = ui(feed(&mut h, json!({"type":"ask_user_request","question":"Which file?"})));
        assert_eq!(
            events,
            vec![
                UiEvent::StreamFinished { text: "thinking".into() },
                UiEvent::AskUser { question: "Which file?".into() },
            ]
        );
    }

    #[test]
    fn test_terminate_aborts_stream() {
        let mut h = handler();
        feed(&mut h, json!({"type":"chunk","content":"bye"}));
        let events = ui(feed(&mut h, json!({"type":"terminate_request"})));
        assert_eq!(
            events,
            vec![
                UiEvent::StreamFinished { text: "bye".into() },
                UiEvent::Terminated { reason: "Task finished.".into() },
            ]
        );
    }

    #[test]
    fn test_non_aborting_frames_keep_stream_open() {
        let mut h = handler();
        feed(&mut h, json!({"type":"chunk","content":"a"}));
        feed(&mut h, json!({"type":"cost_update","total_cost":0.25}));
        feed(&mut h, json!({"type":"agent_step_update","data":{"thoughts":"t"}}));
        feed(&mut h, json!({"type":"transcription_result","text":"spoken"}));
        feed(&mut h, json!({"type":"agent_question","question":"q","request_id":"r1"}));
        assert!(h.stream().is_streaming());
        assert_eq!(h.stream().text(), "a");
    }

    #[test]
    fn test_unknown_frame_with_response() {
        let mut h = handler();
        feed(&mut h, json!({"type":"chunk","content":"x"}));
        let events = ui(feed(&mut h, json!({"type":"legacy","response":"Hi there"})));
        assert_eq!(
            events,
            vec![
                UiEvent::StreamFinished { text: "x".into() },
                UiEvent::AssistantMessage { content: "Hi there".into() },
            ]
        );
    }

    #[test]
    fn test_unknown_frame_without_response_is_silent() {
        let mut h = handler();
        assert!(feed(&mut h, json!({"type":"mystery"})).is_empty());
    }

    #[test]
    fn test_malformed_frame() {
        let mut h = handler();
        feed(&mut h, json!({"type":"chunk","content":"half"}));
        let events = ui(h.handle_text("{definitely not json"));
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], UiEvent::StreamFinished { text: "half".into() });
        assert!(matches!(
            events[1],
            UiEvent::Notice {
                level: NoticeLevel::Error,
                ..
            }
        ));
    }

    // ==================== Tool Call Tests ====================

    #[test]
    fn test_tool_call_goes_pending() {
        let mut h = handler();
        let events = ui(feed(&mut h, tool_request(json!([bash_call("a1", "echo hi")]))));
        assert_eq!(
            events,
            vec![UiEvent::ActionRequested {
                id: "a1".into(),
                tool: RUN_BASH_COMMAND.into(),
                arguments: r#"{"command":"echo hi"}"#.into(),
            }]
        );
        assert!(h.pending().get("a1").is_some());
    }

    #[test]
    fn test_resolve_once() {
        let mut h = handler();
        feed(&mut h, tool_request(json!([bash_call("a1", "echo hi")])));

        match h.resolve("a1", Decision::Approved) {
            Some(Effect::Execute {
                call,
                decision,
                auto_approved,
            }) => {
                assert_eq!(call.id, "a1");
                assert_eq!(decision, Decision::Approved);
                assert!(!auto_approved);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(h.resolve("a1", Decision::Approved).is_none());
        assert!(h.resolve("a1", Decision::Denied).is_none());
    }

    #[test]
    fn test_resolve_unknown_id() {
        let mut h = handler();
        assert!(h.resolve("ghost", Decision::Denied).is_none());
    }

    #[test]
    fn test_paste_is_auto_approved() {
        let mut h = handler();
        let effects = feed(
            &mut h,
            tool_request(json!([{
                "id": "p1",
                "type": "function",
                "function": {"name": PASTE_AT_CURSOR, "arguments": "{\"content_to_paste\":\"hi\"}"}
            }])),
        );
        assert_eq!(effects.len(), 1);
        match &effects[0] {
            Effect::Execute {
                call,
                decision,
                auto_approved,
            } => {
                assert_eq!(call.id, "p1");
                assert_eq!(*decision, Decision::Approved);
                assert!(*auto_approved);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(h.pending().is_empty());
    }

    #[test]
    fn test_mixed_batch_keeps_order() {
        let mut h = handler();
        let effects = feed(
            &mut h,
            tool_request(json!([
                bash_call("a1", "ls"),
                {"id":"p1","type":"function","function":{"name":PASTE_AT_CURSOR,"arguments":"{\"content_to_paste\":\"x\"}"}},
                bash_call("a2", "pwd"),
            ])),
        );
        assert_eq!(effects.len(), 3);
        assert!(matches!(&effects[0], Effect::Ui(UiEvent::ActionRequested { id, .. }) if id == "a1"));
        assert!(matches!(&effects[1], Effect::Execute { call, .. } if call.id == "p1"));
        assert!(matches!(&effects[2], Effect::Ui(UiEvent::ActionRequested { id, .. }) if id == "a2"));
        assert_eq!(h.pending().len(), 2);
    }

    #[test]
    fn test_tool_call_does_not_end_stream() {
        let mut h = handler();
        feed(&mut h, json!({"type":"chunk","content":"Let me check"}));
        feed(&mut h, tool_request(json!([bash_call("a1", "ls")])));
        assert!(h.stream().is_streaming());
    }

    #[test]
    fn test_expire_pending() {
        let mut h = handler();
        feed(&mut h, tool_request(json!([bash_call("a1", "ls")])));
        let later = Instant::now() + Duration::from_secs(120);
        let expired = h.expire_pending(Duration::from_secs(60), later);
        assert_eq!(expired.len(), 1);
        assert!(h.resolve("a1", Decision::Approved).is_none());
    }

    // ==================== Question Tests ====================

    #[test]
    fn test_agent_question_tracked_until_answered() {
        let mut h = handler();
        let events = ui(feed(
            &mut h,
            json!({"type":"agent_question","question":"Proceed?","request_id":"q1"}),
        ));
        assert_eq!(
            events,
            vec![UiEvent::AgentQuestion {
                request_id: "q1".into(),
                question: "Proceed?".into()
            }]
        );
        assert!(h.take_question("q1"));
        assert!(!h.take_question("q1"));
        assert!(!h.take_question("never-asked"));
    }

    // ==================== Reset Tests ====================

    #[test]
    fn test_reset_clears_everything() {
        let mut h = handler();
        feed(&mut h, json!({"type":"chunk","content":"partial"}));
        feed(&mut h, tool_request(json!([bash_call("a1", "ls")])));
        feed(
            &mut h,
            json!({"type":"agent_question","question":"?","request_id":"q1"}),
        );

        let events = ui(h.reset());
        assert_eq!(events, vec![UiEvent::StreamFinished { text: "partial".into() }]);
        assert!(h.pending().is_empty());
        assert!(!h.stream().is_streaming());
        assert!(!h.take_question("q1"));
        assert!(h.reset().is_empty());
    }
}
