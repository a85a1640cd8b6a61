//! Structured trace events. Each variant is a lifecycle transition a reader
//! of the logs cares about; `emit` is the only way one reaches the tracing
//! subscriber, so log lines never drift from this shape.

use serde::Serialize;

use crate::ids::{GenerationId, RunId, ThreadId, ToolCallId};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    RunAssigned {
        thread_id: ThreadId,
        run_id: RunId,
        was_injected: bool,
        input_count: usize,
    },
    RunCompleted {
        run_id: RunId,
        is_error: bool,
        was_forked: bool,
        turn_count: u32,
    },
    TurnStarted {
        run_id: RunId,
        generation_id: GenerationId,
        turn_index: u32,
    },
    ToolDispatched {
        run_id: RunId,
        tool_call_id: ToolCallId,
        function_name: String,
    },
    ToolCompleted {
        run_id: RunId,
        tool_call_id: ToolCallId,
        is_error: bool,
        duration_ms: u64,
    },
    UnknownToolRequested {
        run_id: RunId,
        function_name: String,
    },
    FilterRejected {
        function_name: String,
        rule: String,
    },
    FragmentParseFailed {
        tool_call_id: ToolCallId,
        reason: String,
    },
    BackpressureDrop {
        session_id: String,
        subscriber_id: String,
    },
    ProviderError {
        provider: String,
        message: String,
    },
    SubscriberConnected {
        session_id: String,
        transport: String,
    },
    SubscriberDisconnected {
        session_id: String,
        transport: String,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string());
        tracing::info!(trace_event = %json, "agentcore_event");
    }
}
