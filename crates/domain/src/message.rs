//! The normalized message model: every event the pipeline, loop, and
//! transports exchange is one of these tagged variants, wrapped in an
//! [`Envelope`] carrying the correlation identifiers from `ids`.

use serde::{Deserialize, Serialize};

use crate::ids::{GenerationId, MessageOrderIdx, RunId, ThreadId, ToolCallId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReasoningVisibility {
    Plain,
    Summary,
    Encrypted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExecutionTarget {
    LocalFunction,
    ProviderServer,
}

/// One structural update emitted by the streaming JSON fragment parser,
/// attached to a `ToolCallUpdateMessage` by the `JsonFragmentUpdate`
/// middleware stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonFragmentUpdate {
    pub path: String,
    pub kind: crate::fragment_kind::FragmentKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    pub tool_call_id: ToolCallId,
    pub function_name: String,
    pub function_args: String,
    pub execution_target: ExecutionTarget,
    pub index: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    pub tool_call_id: ToolCallId,
    pub tool_name: String,
    pub result: String,
    pub is_error: bool,
    pub execution_target: ExecutionTarget,
}

/// The tagged union of every message body. `Envelope` carries the identifier
/// fields that apply to all variants; lifecycle variants (`RunAssignment`,
/// `RunCompleted`, `SessionStarted`, `Error`) ignore fields that don't apply
/// to them (e.g. `toolCallId`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MessageBody {
    TextMessage {
        role: Role,
        text: String,
    },
    TextUpdateMessage {
        text: String,
    },
    ReasoningMessage {
        reasoning: String,
        visibility: ReasoningVisibility,
    },
    ReasoningUpdateMessage {
        reasoning: String,
        visibility: ReasoningVisibility,
    },
    ToolCallMessage {
        #[serde(flatten)]
        call: ToolCall,
    },
    ToolCallUpdateMessage {
        #[serde(flatten)]
        call: ToolCall,
        #[serde(skip_serializing_if = "Option::is_none")]
        json_fragment_updates: Option<Vec<JsonFragmentUpdate>>,
    },
    ToolCallResultMessage {
        #[serde(flatten)]
        result: ToolResult,
    },
    ToolsCallAggregateMessage {
        tool_calls: Vec<ToolCall>,
        results: Vec<ToolResult>,
    },
    UsageMessage {
        prompt_tokens: u32,
        completion_tokens: u32,
        total_tokens: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        reasoning_tokens: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        cached_tokens: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        cost: Option<f64>,
    },
    RunAssignment {
        run_id: RunId,
        generation_id: GenerationId,
        #[serde(skip_serializing_if = "Option::is_none")]
        input_ids: Option<Vec<String>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        parent_run_id: Option<RunId>,
        was_injected: bool,
    },
    RunCompleted {
        completed_run_id: RunId,
        was_forked: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        forked_to_run_id: Option<RunId>,
        has_pending_messages: bool,
        pending_message_count: u32,
        is_error: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error_message: Option<String>,
    },
    SessionStarted {
        session_id: String,
        started_at: chrono::DateTime<chrono::Utc>,
    },
    Error {
        code: String,
        message: String,
        recoverable: bool,
    },
}

impl MessageBody {
    /// True for the four `*UpdateMessage` streaming-delta variants that the
    /// `MessageUpdateJoiner` middleware groups and joins.
    pub fn is_update(&self) -> bool {
        matches!(
            self,
            MessageBody::TextUpdateMessage { .. }
                | MessageBody::ReasoningUpdateMessage { .. }
                | MessageBody::ToolCallUpdateMessage { .. }
        )
    }

    /// The `toolCallId` grouping key for update-joining, if this variant has one.
    pub fn tool_call_id(&self) -> Option<ToolCallId> {
        match self {
            MessageBody::ToolCallUpdateMessage { call, .. } => Some(call.tool_call_id),
            MessageBody::ToolCallMessage { call } => Some(call.tool_call_id),
            MessageBody::ToolCallResultMessage { result } => Some(result.tool_call_id),
            _ => None,
        }
    }
}

/// Every message carries the correlation identifiers for the run/generation
/// it belongs to, plus a dense per-generation ordering index assigned by the
/// `MessageTransformation` middleware stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub thread_id: ThreadId,
    pub run_id: RunId,
    pub generation_id: GenerationId,
    pub message_order_idx: MessageOrderIdx,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    #[serde(flatten)]
    pub body: MessageBody,
}

impl Envelope {
    pub fn new(
        thread_id: ThreadId,
        run_id: RunId,
        generation_id: GenerationId,
        message_order_idx: MessageOrderIdx,
        body: MessageBody,
    ) -> Self {
        Self {
            thread_id,
            run_id,
            generation_id,
            message_order_idx,
            timestamp: chrono::Utc::now(),
            body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_variants_report_is_update() {
        let body = MessageBody::TextUpdateMessage {
            text: "hi".into(),
        };
        assert!(body.is_update());
        let body = MessageBody::TextMessage {
            role: Role::Assistant,
            text: "hi".into(),
        };
        assert!(!body.is_update());
    }

    #[test]
    fn tool_messages_expose_tool_call_id() {
        let id = ToolCallId::new();
        let call = ToolCall {
            tool_call_id: id,
            function_name: "f".into(),
            function_args: "{}".into(),
            execution_target: ExecutionTarget::LocalFunction,
            index: 0,
        };
        let body = MessageBody::ToolCallMessage { call };
        assert_eq!(body.tool_call_id(), Some(id));
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&Role::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
    }

    #[test]
    fn envelope_roundtrips_through_json() {
        let env = Envelope::new(
            ThreadId::new(),
            RunId::new(),
            GenerationId::new(),
            0,
            MessageBody::TextMessage {
                role: Role::User,
                text: "hi".into(),
            },
        );
        let json = serde_json::to_string(&env).unwrap();
        let back: Envelope = serde_json::from_str(&json).unwrap();
        assert_eq!(back, env);
    }
}
