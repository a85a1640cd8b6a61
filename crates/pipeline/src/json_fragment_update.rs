//! Downstream stage: owns one streaming [`FragmentParser`] per open tool
//! call and attaches the structural updates it produces to each
//! `ToolCallUpdateMessage` as it passes through. The provider adapters only
//! accumulate the cumulative argument text (see `agentcore_providers::state`);
//! this is the single place that text is ever fed through a fragment parser.

use std::collections::HashMap;

use agentcore_domain::ids::ToolCallId;
use agentcore_domain::message::MessageBody;
use agentcore_fragment::FragmentParser;

#[derive(Default)]
struct ToolCallFragmentState {
    parser: FragmentParser,
    consumed_len: usize,
}

#[derive(Default)]
pub struct JsonFragmentUpdate {
    per_call: HashMap<ToolCallId, ToolCallFragmentState>,
}

impl JsonFragmentUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process_downstream(&mut self, message: MessageBody) -> MessageBody {
        let MessageBody::ToolCallUpdateMessage { call, .. } = &message else {
            return message;
        };

        let state = self.per_call.entry(call.tool_call_id).or_default();
        let delta = &call.function_args[state.consumed_len..];
        if delta.is_empty() {
            return message;
        }
        let updates = match state.parser.add_fragment(delta) {
            Ok(updates) => updates,
            Err(_) => Vec::new(),
        };
        state.consumed_len = call.function_args.len();

        let json_fragment_updates = if updates.is_empty() {
            None
        } else {
            Some(
                updates
                    .into_iter()
                    .map(|u| agentcore_domain::message::JsonFragmentUpdate {
                        path: u.path,
                        kind: u.kind,
                        text_value: u.text_value,
                    })
                    .collect(),
            )
        };

        let MessageBody::ToolCallUpdateMessage { call, .. } = message else {
            unreachable!()
        };
        MessageBody::ToolCallUpdateMessage {
            call,
            json_fragment_updates,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentcore_domain::message::{ExecutionTarget, ToolCall};

    fn update(id: ToolCallId, args: &str) -> MessageBody {
        MessageBody::ToolCallUpdateMessage {
            call: ToolCall {
                tool_call_id: id,
                function_name: "get_weather".into(),
                function_args: args.into(),
                execution_target: ExecutionTarget::LocalFunction,
                index: 0,
            },
            json_fragment_updates: None,
        }
    }

    #[test]
    fn attaches_structural_updates_from_cumulative_buffer() {
        let mut stage = JsonFragmentUpdate::new();
        let id = ToolCallId::new();
        let m1 = stage.process_downstream(update(id, "{\"city\":"));
        match m1 {
            MessageBody::ToolCallUpdateMessage { json_fragment_updates, .. } => {
                assert!(json_fragment_updates.is_some());
            }
            other => panic!("unexpected {:?}", other),
        }
        let m2 = stage.process_downstream(update(id, "{\"city\":\"SF\"}"));
        match m2 {
            MessageBody::ToolCallUpdateMessage { json_fragment_updates, .. } => {
                let updates = json_fragment_updates.unwrap();
                assert!(updates.iter().any(|u| u.text_value.as_deref() == Some("SF")));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn non_tool_call_messages_pass_through_untouched() {
        let mut stage = JsonFragmentUpdate::new();
        let msg = MessageBody::TextUpdateMessage { text: "hi".into() };
        let out = stage.process_downstream(msg.clone());
        assert_eq!(out, msg);
    }

    #[test]
    fn two_tool_calls_get_independent_parsers() {
        let mut stage = JsonFragmentUpdate::new();
        let id_a = ToolCallId::new();
        let id_b = ToolCallId::new();
        stage.process_downstream(update(id_a, "{\"x\":1"));
        let out = stage.process_downstream(update(id_b, "{\"y\":2"));
        match out {
            MessageBody::ToolCallUpdateMessage { json_fragment_updates, .. } => {
                assert!(json_fragment_updates.is_some());
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
