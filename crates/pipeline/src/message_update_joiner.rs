//! Downstream stage: groups contiguous `*UpdateMessage`s sharing the same
//! join key — `toolCallId` for tool-call updates, `None` for a single text
//! or reasoning stream — and finalizes them into one full message the
//! moment a different key arrives or the stream ends. The finalized
//! message is handed back for history/persistence; every update is still
//! forwarded to the caller as it arrives (see [`JoinerOutput`]).

use agentcore_domain::message::{MessageBody, ReasoningVisibility, Role};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum JoinKey {
    Text,
    Reasoning,
    ToolCall(agentcore_domain::ids::ToolCallId),
}

enum Buffer {
    Text { text: String },
    Reasoning { reasoning: String, visibility: ReasoningVisibility },
    ToolCall { call: agentcore_domain::message::ToolCall },
}

pub struct JoinerOutput {
    /// Every message that should reach the live caller/subscriber stream,
    /// in order: the raw update(s) first, then the joined full message if
    /// this call finalized a run.
    pub for_caller: Vec<MessageBody>,
    /// The finalized full message for history, if one was produced.
    pub for_history: Option<MessageBody>,
}

impl JoinerOutput {
    fn updates_only(msg: MessageBody) -> Self {
        Self {
            for_caller: vec![msg],
            for_history: None,
        }
    }
}

#[derive(Default)]
pub struct MessageUpdateJoiner {
    current_key: Option<JoinKey>,
    buffer: Option<Buffer>,
}

impl MessageUpdateJoiner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one message through the joiner. Non-update messages pass
    /// through untouched (and flush any in-progress join first, since a
    /// non-update message can only appear between logical update runs).
    pub fn process_downstream(&mut self, message: MessageBody) -> JoinerOutput {
        if !message.is_update() {
            let mut out = self.flush();
            out.for_caller.push(message);
            return out;
        }

        let key = match &message {
            MessageBody::TextUpdateMessage { .. } => JoinKey::Text,
            MessageBody::ReasoningUpdateMessage { .. } => JoinKey::Reasoning,
            MessageBody::ToolCallUpdateMessage { call, .. } => JoinKey::ToolCall(call.tool_call_id),
            _ => unreachable!("is_update() only returns true for the three arms above"),
        };

        let mut flushed = if self.current_key.as_ref().is_some_and(|k| *k != key) {
            self.flush()
        } else {
            JoinerOutput {
                for_caller: Vec::new(),
                for_history: None,
            }
        };

        self.current_key = Some(key);
        self.accumulate(&message);
        flushed.for_caller.push(message);
        flushed
    }

    /// Finalize and clear any buffered run, e.g. at generation end.
    pub fn flush(&mut self) -> JoinerOutput {
        self.current_key = None;
        match self.buffer.take() {
            None => JoinerOutput {
                for_caller: Vec::new(),
                for_history: None,
            },
            Some(Buffer::Text { text }) => {
                let full = MessageBody::TextMessage { role: Role::Assistant, text };
                JoinerOutput {
                    for_caller: vec![full.clone()],
                    for_history: Some(full),
                }
            }
            Some(Buffer::Reasoning { reasoning, visibility }) => {
                let full = MessageBody::ReasoningMessage { reasoning, visibility };
                JoinerOutput {
                    for_caller: vec![full.clone()],
                    for_history: Some(full),
                }
            }
            Some(Buffer::ToolCall { call }) => {
                let full = MessageBody::ToolCallMessage { call };
                JoinerOutput {
                    for_caller: vec![full.clone()],
                    for_history: Some(full),
                }
            }
        }
    }

    fn accumulate(&mut self, message: &MessageBody) {
        match message {
            MessageBody::TextUpdateMessage { text } => match &mut self.buffer {
                Some(Buffer::Text { text: acc }) => acc.push_str(text),
                _ => self.buffer = Some(Buffer::Text { text: text.clone() }),
            },
            MessageBody::ReasoningUpdateMessage { reasoning, visibility } => match &mut self.buffer {
                Some(Buffer::Reasoning { reasoning: acc, .. }) => acc.push_str(reasoning),
                _ => {
                    self.buffer = Some(Buffer::Reasoning {
                        reasoning: reasoning.clone(),
                        visibility: *visibility,
                    })
                }
            },
            MessageBody::ToolCallUpdateMessage { call, .. } => {
                self.buffer = Some(Buffer::ToolCall { call: call.clone() });
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentcore_domain::ids::ToolCallId;
    use agentcore_domain::message::ExecutionTarget;

    #[test]
    fn contiguous_text_updates_join_into_one_full_message_on_flush() {
        let mut joiner = MessageUpdateJoiner::new();
        let out1 = joiner.process_downstream(MessageBody::TextUpdateMessage { text: "Hel".into() });
        assert!(out1.for_history.is_none());
        let out2 = joiner.process_downstream(MessageBody::TextUpdateMessage { text: "lo".into() });
        assert!(out2.for_history.is_none());
        let flushed = joiner.flush();
        match flushed.for_history.unwrap() {
            MessageBody::TextMessage { text, .. } => assert_eq!(text, "Hello"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn switching_tool_call_id_finalizes_the_previous_run() {
        let mut joiner = MessageUpdateJoiner::new();
        let call_a = agentcore_domain::message::ToolCall {
            tool_call_id: ToolCallId::new(),
            function_name: "a".into(),
            function_args: "{}".into(),
            execution_target: ExecutionTarget::LocalFunction,
            index: 0,
        };
        let call_b = agentcore_domain::message::ToolCall {
            tool_call_id: ToolCallId::new(),
            function_name: "b".into(),
            function_args: "{}".into(),
            execution_target: ExecutionTarget::LocalFunction,
            index: 1,
        };
        joiner.process_downstream(MessageBody::ToolCallUpdateMessage {
            call: call_a,
            json_fragment_updates: None,
        });
        let out = joiner.process_downstream(MessageBody::ToolCallUpdateMessage {
            call: call_b,
            json_fragment_updates: None,
        });
        assert!(out.for_history.is_some());
    }

    #[test]
    fn updates_are_forwarded_to_caller_before_the_joined_message() {
        let mut joiner = MessageUpdateJoiner::new();
        joiner.process_downstream(MessageBody::TextUpdateMessage { text: "hi".into() });
        let flushed = joiner.flush();
        assert_eq!(flushed.for_caller.len(), 1);
        assert!(matches!(flushed.for_caller[0], MessageBody::TextMessage { .. }));
    }
}
