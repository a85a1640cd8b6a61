//! Tool executor bridge. Inspects emitted `ToolCallMessage`s and marks every
//! call with `executionTarget = localFunction` for scheduling by the agent
//! loop on the next turn. Calls targeting `providerServer` are observed but
//! never scheduled — the provider already executes those itself.
//!
//! Whether a local call's name is actually registered is not this stage's
//! concern: every local call is handed to the dispatcher, which is the
//! single authority that distinguishes a registered tool from a hallucinated
//! one and emits the self-correcting error for the latter. Filtering here on
//! the declared-contract set would let a hallucinated call vanish silently
//! before the dispatcher ever saw it.

use agentcore_domain::message::{ExecutionTarget, MessageBody, ToolCall};

#[derive(Debug, Clone, Copy, Default)]
pub struct FunctionCall;

impl FunctionCall {
    pub fn new() -> Self {
        Self
    }

    /// Returns the calls from this message batch that should be scheduled
    /// for local execution on the next turn.
    pub fn calls_to_schedule<'a>(&self, messages: &'a [MessageBody]) -> Vec<&'a ToolCall> {
        messages
            .iter()
            .filter_map(|m| match m {
                MessageBody::ToolCallMessage { call } => Some(call),
                _ => None,
            })
            .filter(|call| call.execution_target == ExecutionTarget::LocalFunction)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentcore_domain::ids::ToolCallId;

    fn call(target: ExecutionTarget, name: &str) -> ToolCall {
        ToolCall {
            tool_call_id: ToolCallId::new(),
            function_name: name.to_string(),
            function_args: "{}".into(),
            execution_target: target,
            index: 0,
        }
    }

    #[test]
    fn schedules_local_function_calls() {
        let stage = FunctionCall::new();
        let messages = vec![MessageBody::ToolCallMessage {
            call: call(ExecutionTarget::LocalFunction, "get_weather"),
        }];
        assert_eq!(stage.calls_to_schedule(&messages).len(), 1);
    }

    #[test]
    fn ignores_provider_server_executed_calls() {
        let stage = FunctionCall::new();
        let messages = vec![MessageBody::ToolCallMessage {
            call: call(ExecutionTarget::ProviderServer, "get_weather"),
        }];
        assert!(stage.calls_to_schedule(&messages).is_empty());
    }

    #[test]
    fn schedules_hallucinated_local_function_calls_for_the_dispatcher_to_reject() {
        let stage = FunctionCall::new();
        let messages = vec![MessageBody::ToolCallMessage {
            call: call(ExecutionTarget::LocalFunction, "mystery_tool"),
        }];
        assert_eq!(stage.calls_to_schedule(&messages).len(), 1);
    }
}
