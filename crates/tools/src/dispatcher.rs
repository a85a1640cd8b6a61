//! Dispatches a batch of `ToolCallMessage`s concurrently against the
//! registry, publishing each `ToolCallResultMessage` as soon as its own call
//! finishes rather than waiting for the whole batch. Before the registry is
//! consulted, each call's function name passes through a [`FunctionFilter`];
//! a blocked name self-corrects into an error result the same way an
//! unknown tool name does, listing the available functions instead of
//! failing the run. A handler error (or panic) becomes `isError = true` the
//! same way.

use std::sync::Arc;

use agentcore_domain::message::{ExecutionTarget, ToolCall, ToolResult};
use tokio::task::JoinSet;

use crate::filter::{FunctionFilter, ProviderFilterConfig};
use crate::registry::ToolRegistry;

pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    max_concurrency: usize,
    filter: FunctionFilter,
}

impl Dispatcher {
    pub fn new(registry: Arc<ToolRegistry>, max_concurrency: usize) -> Self {
        Self::with_filter(registry, max_concurrency, FunctionFilter::default())
    }

    /// Build a dispatcher that rejects calls `filter` disallows before the
    /// registry is ever consulted.
    pub fn with_filter(registry: Arc<ToolRegistry>, max_concurrency: usize, filter: FunctionFilter) -> Self {
        Self {
            registry,
            max_concurrency: max_concurrency.max(1),
            filter,
        }
    }

    /// Execute every call concurrently (bounded by `max_concurrency`),
    /// invoking `on_result` immediately as each individual call completes.
    /// Only calls with `executionTarget = localFunction` are dispatched;
    /// others are returned unexecuted for the caller to observe.
    pub async fn dispatch<F>(&self, calls: Vec<ToolCall>, mut on_result: F) -> Vec<ToolResult>
    where
        F: FnMut(&ToolResult),
    {
        let mut results = Vec::with_capacity(calls.len());
        let mut local_calls = Vec::new();
        for call in calls {
            if call.execution_target == ExecutionTarget::LocalFunction {
                local_calls.push(call);
            }
        }

        let mut join_set = JoinSet::new();
        let mut in_flight = 0usize;
        let mut queue = local_calls.into_iter();

        loop {
            while in_flight < self.max_concurrency {
                let Some(call) = queue.next() else { break };
                let registry = self.registry.clone();
                let filter = self.filter.clone();
                join_set.spawn(async move { run_one(&registry, &filter, call).await });
                in_flight += 1;
            }
            let Some(joined) = join_set.join_next().await else {
                break;
            };
            in_flight -= 1;
            let result = match joined {
                Ok(result) => result,
                Err(join_err) => ToolResult {
                    tool_call_id: agentcore_domain::ids::ToolCallId::new(),
                    tool_name: "unknown".to_string(),
                    result: format!("tool execution task failed: {}", join_err),
                    is_error: true,
                    execution_target: ExecutionTarget::LocalFunction,
                },
            };
            on_result(&result);
            results.push(result);
        }

        results
    }
}

async fn run_one(registry: &ToolRegistry, filter: &FunctionFilter, call: ToolCall) -> ToolResult {
    if !filter.is_allowed(&ProviderFilterConfig::default(), &call.function_name) {
        let available = registry.names().join(", ");
        return ToolResult {
            tool_call_id: call.tool_call_id,
            tool_name: call.function_name.clone(),
            result: format!(
                "function '{}' is blocked by configured tool filtering policy. available functions: {}",
                call.function_name, available
            ),
            is_error: true,
            execution_target: call.execution_target,
        };
    }

    let Some((_, handler)) = registry.get(&call.function_name) else {
        let available = registry.names().join(", ");
        return ToolResult {
            tool_call_id: call.tool_call_id,
            tool_name: call.function_name,
            result: format!(
                "unknown tool '{}'. available functions: {}",
                call.function_name, available
            ),
            is_error: true,
            execution_target: call.execution_target,
        };
    };

    let args: serde_json::Value = match serde_json::from_str(&call.function_args) {
        Ok(v) => v,
        Err(e) => {
            return ToolResult {
                tool_call_id: call.tool_call_id,
                tool_name: call.function_name,
                result: format!("invalid function arguments: {}", e),
                is_error: true,
                execution_target: call.execution_target,
            }
        }
    };

    match handler.call(args).await {
        Ok(value) => ToolResult {
            tool_call_id: call.tool_call_id,
            tool_name: call.function_name,
            result: value.to_string(),
            is_error: false,
            execution_target: call.execution_target,
        },
        Err(message) => ToolResult {
            tool_call_id: call.tool_call_id,
            tool_name: call.function_name,
            result: message,
            is_error: true,
            execution_target: call.execution_target,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentcore_domain::contract::FunctionContract;
    use agentcore_domain::ids::ToolCallId;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct Echo;
    #[async_trait]
    impl crate::registry::ToolHandler for Echo {
        async fn call(&self, args: serde_json::Value) -> Result<serde_json::Value, String> {
            Ok(args)
        }
    }

    struct AlwaysFails;
    #[async_trait]
    impl crate::registry::ToolHandler for AlwaysFails {
        async fn call(&self, _args: serde_json::Value) -> Result<serde_json::Value, String> {
            Err("boom".to_string())
        }
    }

    fn call(name: &str, args: &str) -> ToolCall {
        ToolCall {
            tool_call_id: ToolCallId::new(),
            function_name: name.to_string(),
            function_args: args.to_string(),
            execution_target: ExecutionTarget::LocalFunction,
            index: 0,
        }
    }

    #[tokio::test]
    async fn unknown_tool_self_corrects_with_available_functions() {
        let registry = Arc::new(ToolRegistry::new());
        registry.register(FunctionContract::new("echo", "echoes"), Arc::new(Echo));
        let dispatcher = Dispatcher::new(registry, 4);
        let results = dispatcher.dispatch(vec![call("mystery", "{}")], |_| {}).await;
        assert_eq!(results.len(), 1);
        assert!(results[0].is_error);
        assert!(results[0].result.contains("echo"));
    }

    #[tokio::test]
    async fn handler_error_becomes_is_error_result() {
        let registry = Arc::new(ToolRegistry::new());
        registry.register(FunctionContract::new("fails", "always fails"), Arc::new(AlwaysFails));
        let dispatcher = Dispatcher::new(registry, 4);
        let results = dispatcher.dispatch(vec![call("fails", "{}")], |_| {}).await;
        assert!(results[0].is_error);
        assert_eq!(results[0].result, "boom");
    }

    #[tokio::test]
    async fn results_are_published_as_each_call_completes() {
        let registry = Arc::new(ToolRegistry::new());
        registry.register(FunctionContract::new("echo", "echoes"), Arc::new(Echo));
        let dispatcher = Dispatcher::new(registry, 4);
        let published = Arc::new(AtomicUsize::new(0));
        let published_clone = published.clone();
        let calls = vec![call("echo", "{}"), call("echo", "{}"), call("echo", "{}")];
        let results = dispatcher
            .dispatch(calls, move |_| {
                published_clone.fetch_add(1, Ordering::SeqCst);
            })
            .await;
        assert_eq!(published.load(Ordering::SeqCst), 3);
        assert_eq!(results.len(), 3);
    }

    #[tokio::test]
    async fn non_local_execution_targets_are_not_dispatched() {
        let registry = Arc::new(ToolRegistry::new());
        let dispatcher = Dispatcher::new(registry, 4);
        let mut remote_call = call("remote_tool", "{}");
        remote_call.execution_target = ExecutionTarget::ProviderServer;
        let results = dispatcher.dispatch(vec![remote_call], |_| {}).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn blocked_function_name_self_corrects_without_reaching_the_registry() {
        let registry = Arc::new(ToolRegistry::new());
        registry.register(FunctionContract::new("danger_delete_all", "deletes everything"), Arc::new(Echo));
        let filter = FunctionFilter::new(vec!["danger_*".to_string()], vec![]);
        let dispatcher = Dispatcher::with_filter(registry, 4, filter);
        let results = dispatcher.dispatch(vec![call("danger_delete_all", "{}")], |_| {}).await;
        assert!(results[0].is_error);
        assert!(results[0].result.contains("blocked"));
    }

    #[tokio::test]
    async fn invalid_json_arguments_are_reported_as_an_error_not_a_panic() {
        let registry = Arc::new(ToolRegistry::new());
        registry.register(FunctionContract::new("echo", "echoes"), Arc::new(Echo));
        let dispatcher = Dispatcher::new(registry, 4);
        let results = dispatcher.dispatch(vec![call("echo", "not json")], |_| {}).await;
        assert!(results[0].is_error);
    }

    #[test]
    fn results_log_is_thread_safe_smoke_check() {
        let log: Mutex<Vec<i32>> = Mutex::new(Vec::new());
        log.lock().unwrap().push(1);
        assert_eq!(log.lock().unwrap().len(), 1);
    }
}
