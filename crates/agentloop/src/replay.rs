//! Turns stored history back into the flat `role + text` messages a
//! provider adapter consumes. Tool call/result pairs have no structured
//! representation in `ChatMessage` (see `agentcore_providers::ChatMessage`),
//! so a finished `ToolsCallAggregateMessage` is folded through
//! `agentcore_domain::nl_wire` into one `Role::Tool` message.

use agentcore_domain::message::{MessageBody, ReasoningVisibility, Role};
use agentcore_domain::nl_wire;
use agentcore_pipeline::message_publishing::Publish;
use agentcore_pipeline::Pipeline;
use agentcore_providers::ChatMessage;

/// `pipeline` is borrowed mutably only to run its upstream aggregation
/// stage, which has its own internal buffering state; it does not need to
/// be the same pipeline instance used for the next turn's downstream pass.
pub fn build_chat_messages<P: Publish>(pipeline: &mut Pipeline<P>, history: &[MessageBody]) -> Vec<ChatMessage> {
    let aggregated = pipeline.aggregate_for_replay(history.to_vec());
    aggregated.into_iter().filter_map(to_chat_message).collect()
}

fn to_chat_message(body: MessageBody) -> Option<ChatMessage> {
    match body {
        MessageBody::TextMessage { role, text } => Some(ChatMessage { role, text }),
        MessageBody::ReasoningMessage { reasoning, visibility: ReasoningVisibility::Plain } => {
            Some(ChatMessage { role: Role::Assistant, text: reasoning })
        }
        MessageBody::ReasoningMessage { .. } => None,
        MessageBody::ToolsCallAggregateMessage { tool_calls, results } => Some(ChatMessage {
            role: Role::Tool,
            text: nl_wire::to_nl_text(&tool_calls, &results),
        }),
        // Update messages, usage, and lifecycle events never belong in a
        // replayed prompt; an unpaired ToolCallMessage/ToolCallResultMessage
        // shouldn't occur post-aggregation, but is skipped defensively.
        _ => None,
    }
}
