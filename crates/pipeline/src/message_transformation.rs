//! Upstream: aggregates consecutive `ToolCallMessage` + `ToolCallResultMessage`
//! pairs into a single `ToolsCallAggregateMessage` per tool call, the shape
//! providers expect when replaying tool results back into history.
//! Downstream: assigns the dense `messageOrderIdx` every envelope carries.

use std::collections::HashMap;

use agentcore_domain::ids::{MessageOrderIdx, ToolCallId};
use agentcore_domain::message::{MessageBody, ToolCall, ToolResult};

use crate::context::PipelineContext;

#[derive(Default)]
pub struct MessageTransformation {
    pending_calls: HashMap<ToolCallId, ToolCall>,
    pending_results: HashMap<ToolCallId, ToolResult>,
}

impl MessageTransformation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upstream: buffer tool call / result pairs as they pass, decomposing
    /// any existing `ToolsCallAggregateMessage` back into its identifiers
    /// (the symmetry the spec requires) for uniform downstream handling.
    pub fn apply_upstream(&mut self, messages: Vec<MessageBody>) -> Vec<MessageBody> {
        let mut out = Vec::new();
        for message in messages {
            match message {
                MessageBody::ToolsCallAggregateMessage { tool_calls, results } => {
                    for call in tool_calls {
                        out.push(MessageBody::ToolCallMessage { call });
                    }
                    for result in results {
                        out.push(MessageBody::ToolCallResultMessage { result });
                    }
                }
                other => out.push(other),
            }
        }
        self.aggregate(out)
    }

    fn aggregate(&mut self, messages: Vec<MessageBody>) -> Vec<MessageBody> {
        let mut out = Vec::new();
        for message in messages {
            match message {
                MessageBody::ToolCallMessage { call } => {
                    if let Some(result) = self.pending_results.remove(&call.tool_call_id) {
                        out.push(MessageBody::ToolsCallAggregateMessage {
                            tool_calls: vec![call],
                            results: vec![result],
                        });
                    } else {
                        self.pending_calls.insert(call.tool_call_id, call);
                    }
                }
                MessageBody::ToolCallResultMessage { result } => {
                    if let Some(call) = self.pending_calls.remove(&result.tool_call_id) {
                        out.push(MessageBody::ToolsCallAggregateMessage {
                            tool_calls: vec![call],
                            results: vec![result],
                        });
                    } else {
                        self.pending_results.insert(result.tool_call_id, result);
                    }
                }
                other => out.push(other),
            }
        }
        out
    }

    /// Downstream: stamp the dense order index on every message, wrapping
    /// it in the correlation identifiers carried by `ctx`.
    pub fn assign_order_idx(&self, ctx: &mut PipelineContext, message: MessageBody) -> (MessageOrderIdx, MessageBody) {
        (ctx.next_message_order_idx(), message)
    }
}
