//! The per-thread state machine: one task, owning one thread's [`History`],
//! driving runs to completion against its input channel. See the module's
//! run-drive algorithm in `run()`/`drive_run()` — `Idle → Draining →
//! Assigning → Turning (↔ Executing) → Completing → Idle`, with `Forking`
//! folded into the finalization step of `Completing` and any per-run
//! exception contained into `RunCompleted{isError=true}`.

use std::collections::VecDeque;
use std::sync::Arc;

use agentcore_domain::contract::FunctionContract;
use agentcore_domain::ids::{GenerationId, MessageOrderIdx, RunId, ThreadId};
use agentcore_domain::message::{Envelope, MessageBody};
use agentcore_persistence::Store;
use agentcore_pipeline::{Pipeline, PipelineContext};
use agentcore_providers::{ChatOptions, ChatRequest, LlmProvider};
use agentcore_pubsub::Publisher;
use agentcore_tools::Dispatcher;
use tokio::sync::mpsc;

use crate::cancel::CancelMap;
use crate::history::History;
use crate::publish::NoopPublish;
use crate::replay::build_chat_messages;
use crate::session_lock::SessionLockMap;
use crate::turn::{run_turn, TurnContext};
use crate::types::QueuedInput;

/// Static per-thread configuration that doesn't change across runs: which
/// model to call, the functions to declare, and the system prompt to
/// prepend ahead of replayed history.
pub struct ThreadOptions {
    pub model: String,
    pub functions: Vec<FunctionContract>,
    pub system_prompt: Option<String>,
    pub max_turns_per_run: u32,
}

pub struct ThreadLoop {
    thread_id: ThreadId,
    input_rx: mpsc::Receiver<QueuedInput>,
    pending: VecDeque<QueuedInput>,
    history: History,
    provider: Arc<dyn LlmProvider>,
    publisher: Arc<Publisher>,
    dispatcher: Arc<Dispatcher>,
    store: Arc<Store>,
    cancel_map: Arc<CancelMap>,
    session_lock: Arc<SessionLockMap>,
    options: ThreadOptions,
}

impl ThreadLoop {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        thread_id: ThreadId,
        input_rx: mpsc::Receiver<QueuedInput>,
        provider: Arc<dyn LlmProvider>,
        publisher: Arc<Publisher>,
        dispatcher: Arc<Dispatcher>,
        store: Arc<Store>,
        cancel_map: Arc<CancelMap>,
        session_lock: Arc<SessionLockMap>,
        options: ThreadOptions,
    ) -> Self {
        Self {
            thread_id,
            input_rx,
            pending: VecDeque::new(),
            history: History::new(),
            provider,
            publisher,
            dispatcher,
            store,
            cancel_map,
            session_lock,
            options,
        }
    }

    /// Runs until the input channel closes. Each iteration drains one
    /// batch and drives it to a complete run; `drive_run` may hand back a
    /// leftover batch (a fork request observed at finalization time) to be
    /// driven immediately, without waiting on a fresh `recv()`.
    pub async fn run(mut self) {
        loop {
            let batch = match self.next_batch().await {
                Some(batch) => batch,
                None => break,
            };
            let mut next = self.drive_run(batch, None).await;
            while let Some((forced_run_id, batch)) = next.take() {
                next = self.drive_run(batch, Some(forced_run_id)).await;
            }
        }
        let _ = self.store.end_session(self.thread_id, agentcore_persistence::SessionStatus::Completed);
    }

    async fn next_batch(&mut self) -> Option<Vec<QueuedInput>> {
        if let Some(first) = self.pending.pop_front() {
            let mut batch = vec![first];
            batch.extend(self.pending.drain(..));
            self.drain_channel_into(&mut batch);
            return Some(batch);
        }
        let first = self.input_rx.recv().await?;
        let mut batch = vec![first];
        self.drain_channel_into(&mut batch);
        Some(batch)
    }

    fn drain_channel_into(&mut self, batch: &mut Vec<QueuedInput>) {
        while let Ok(next) = self.input_rx.try_recv() {
            batch.push(next);
        }
    }

    /// Drives one run to completion. Returns `Some(batch)` when the final
    /// scheduling point observed a fork request targeting this run — the
    /// caller should immediately drive that batch as the next run, rather
    /// than returning to `Idle` in between.
    async fn drive_run(&mut self, batch: Vec<QueuedInput>, forced_run_id: Option<RunId>) -> Option<(RunId, Vec<QueuedInput>)> {
        let _permit = self.session_lock.acquire(self.thread_id).await;

        let fork_parent = batch.iter().find_map(|q| q.input.parent_run_id);
        if let Some(parent) = fork_parent {
            self.history.truncate_after_run(parent);
        }

        let run_id = forced_run_id.unwrap_or_else(RunId::new);
        let generation_id = GenerationId::new();
        let cancel = self.cancel_map.issue(run_id);

        let input_ids: Vec<String> = batch.iter().map(|q| q.receipt_id.to_string()).collect();
        self.emit_run_assignment(run_id, generation_id, input_ids, false, fork_parent, &cancel).await;
        for queued in &batch {
            for message in &queued.input.messages {
                self.append_to_history(run_id, message.clone());
            }
        }

        let mut turn_count = 0u32;
        let mut is_error = false;
        let mut error_message = None;

        'turns: loop {
            turn_count += 1;
            match self.run_one_turn(run_id, generation_id, &cancel).await {
                Ok(had_tool_calls) => {
                    if !had_tool_calls {
                        break 'turns;
                    }
                }
                Err(err) => {
                    tracing::warn!(thread_id = %self.thread_id, run_id = %run_id, error = %err, "provider error mid-turn");
                    is_error = true;
                    error_message = Some(err.to_string());
                    break 'turns;
                }
            }
            if cancel.is_cancelled() {
                is_error = true;
                error_message = Some("run cancelled".to_string());
                break 'turns;
            }
            if turn_count >= self.options.max_turns_per_run {
                tracing::warn!(thread_id = %self.thread_id, run_id = %run_id, "max_turns_per_run reached");
                break 'turns;
            }

            // Between-turn injection point: drain anything queued so far
            // into this same run before issuing the next turn.
            let mut injected = Vec::new();
            self.drain_channel_into(&mut injected);
            if !injected.is_empty() {
                let fork_request = injected.iter().position(|q| q.input.parent_run_id.is_some());
                if let Some(idx) = fork_request {
                    // A fork request arrived mid-run: queue it (and anything
                    // after it) for the next run rather than folding it in,
                    // since a fork must not happen mid-turn.
                    let rest = injected.split_off(idx);
                    for queued in rest {
                        self.pending.push_back(queued);
                    }
                }
                if !injected.is_empty() {
                    let ids: Vec<String> = injected.iter().map(|q| q.receipt_id.to_string()).collect();
                    self.emit_run_assignment(run_id, generation_id, ids, true, None, &cancel).await;
                    for queued in &injected {
                        for message in &queued.input.messages {
                            self.append_to_history(run_id, message.clone());
                        }
                    }
                }
            }
        }

        self.cancel_map.retire(run_id);

        // Finalization scheduling point: check for a fork request targeting
        // this run before announcing completion, and for anything else
        // still queued (reported as pending, not silently dropped).
        let mut trailing = Vec::new();
        self.drain_channel_into(&mut trailing);
        trailing.extend(self.pending.drain(..));

        let fork_idx = trailing.iter().position(|q| q.input.parent_run_id == Some(run_id));
        let (was_forked, forked_to_run_id, leftover) = if let Some(idx) = fork_idx {
            let fork_batch = vec![trailing.remove(idx)];
            for queued in trailing {
                self.pending.push_back(queued);
            }
            let fork_run_id = RunId::new();
            (true, Some(fork_run_id), Some((fork_run_id, fork_batch)))
        } else {
            for queued in trailing {
                self.pending.push_back(queued);
            }
            (false, None, None)
        };

        let has_pending = !self.pending.is_empty();
        let pending_count = self.pending.len() as u32;
        self.emit_run_completed(run_id, was_forked, forked_to_run_id, has_pending, pending_count, is_error, error_message)
            .await;

        leftover
    }

    async fn run_one_turn(&mut self, run_id: RunId, generation_id: GenerationId, cancel: &tokio_util::sync::CancellationToken) -> agentcore_domain::Result<bool> {
        let mut pipeline = Pipeline::new(self.options.functions.clone(), NoopPublish);
        let mut pctx = PipelineContext::new(self.thread_id, run_id, generation_id);
        pctx.options.functions = self.options.functions.clone();

        let mut messages = Vec::new();
        if let Some(prompt) = &self.options.system_prompt {
            messages.push(agentcore_providers::ChatMessage {
                role: agentcore_domain::message::Role::System,
                text: prompt.clone(),
            });
        }
        messages.extend(build_chat_messages(&mut pipeline, &self.history.bodies()));

        let request = ChatRequest {
            model: self.options.model.clone(),
            messages,
            options: ChatOptions {
                functions: self.options.functions.clone(),
                ..Default::default()
            },
        };

        let turn_ctx = TurnContext {
            thread_id: self.thread_id,
            run_id,
            generation_id,
            publisher: &self.publisher,
            dispatcher: &self.dispatcher,
            cancel,
        };

        let outcome = run_turn(&mut pctx, &mut pipeline, self.provider.as_ref(), request, &turn_ctx).await?;
        for message in outcome.history_appends {
            self.append_to_history(run_id, message);
        }
        Ok(outcome.had_tool_calls)
    }

    fn append_to_history(&mut self, run_id: RunId, message: MessageBody) {
        let type_name = message_type_name(&message);
        if let Ok(json) = serde_json::to_value(&message) {
            let _ = self.store.append_message(self.thread_id, &json, type_name);
        }
        self.history.append(run_id, message);
    }

    #[allow(clippy::too_many_arguments)]
    async fn emit_run_assignment(
        &self,
        run_id: RunId,
        generation_id: GenerationId,
        input_ids: Vec<String>,
        was_injected: bool,
        parent_run_id: Option<RunId>,
        cancel: &tokio_util::sync::CancellationToken,
    ) {
        let _ = self.store.append_event(self.thread_id, "RunAssignment");
        let body = MessageBody::RunAssignment {
            run_id,
            generation_id,
            input_ids: Some(input_ids),
            parent_run_id,
            was_injected,
        };
        self.publish(run_id, generation_id, body, cancel).await;
    }

    #[allow(clippy::too_many_arguments)]
    async fn emit_run_completed(
        &self,
        run_id: RunId,
        was_forked: bool,
        forked_to_run_id: Option<RunId>,
        has_pending_messages: bool,
        pending_message_count: u32,
        is_error: bool,
        error_message: Option<String>,
    ) {
        let _ = self.store.append_event(self.thread_id, "RunCompleted");
        let body = MessageBody::RunCompleted {
            completed_run_id: run_id,
            was_forked,
            forked_to_run_id,
            has_pending_messages,
            pending_message_count,
            is_error,
            error_message,
        };
        let cancel = tokio_util::sync::CancellationToken::new();
        self.publish(run_id, GenerationId::new(), body, &cancel).await;
    }

    async fn publish(&self, run_id: RunId, generation_id: GenerationId, body: MessageBody, cancel: &tokio_util::sync::CancellationToken) {
        let envelope = Envelope::new(self.thread_id, run_id, generation_id, LIFECYCLE_ORDER_IDX, body);
        self.publisher.publish(self.thread_id, envelope, cancel).await;
    }
}

/// `RunAssignment`/`RunCompleted` are lifecycle events outside any
/// generation's message stream; they carry a fixed sentinel order index
/// rather than one drawn from `PipelineContext`, which is scoped to a
/// single generation's downstream pass.
const LIFECYCLE_ORDER_IDX: MessageOrderIdx = 0;

fn message_type_name(body: &MessageBody) -> &'static str {
    match body {
        MessageBody::TextMessage { .. } => "TextMessage",
        MessageBody::TextUpdateMessage { .. } => "TextUpdateMessage",
        MessageBody::ReasoningMessage { .. } => "ReasoningMessage",
        MessageBody::ReasoningUpdateMessage { .. } => "ReasoningUpdateMessage",
        MessageBody::ToolCallMessage { .. } => "ToolCallMessage",
        MessageBody::ToolCallUpdateMessage { .. } => "ToolCallUpdateMessage",
        MessageBody::ToolCallResultMessage { .. } => "ToolCallResultMessage",
        MessageBody::ToolsCallAggregateMessage { .. } => "ToolsCallAggregateMessage",
        MessageBody::UsageMessage { .. } => "UsageMessage",
        MessageBody::RunAssignment { .. } => "RunAssignment",
        MessageBody::RunCompleted { .. } => "RunCompleted",
        MessageBody::SessionStarted { .. } => "SessionStarted",
        MessageBody::Error { .. } => "Error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentcore_domain::capability::ModelCapabilities;
    use agentcore_domain::config::BackpressurePolicy;
    use agentcore_domain::ids::{ReceiptId, ToolCallId};
    use agentcore_domain::message::{ExecutionTarget, Role, ToolCall};
    use agentcore_tools::ToolRegistry;
    use async_trait::async_trait;
    use futures_core::stream::BoxStream;
    use futures_util::stream;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Yields one `ToolCallUpdateMessage` on every call, so a loop driven
    /// against it never naturally completes a run without hitting
    /// `maxTurnsPerRun`.
    struct AlwaysCallsToolProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LlmProvider for AlwaysCallsToolProvider {
        fn provider_id(&self) -> &str {
            "always-tool"
        }
        fn capabilities(&self) -> &ModelCapabilities {
            static CAPS: std::sync::OnceLock<ModelCapabilities> = std::sync::OnceLock::new();
            CAPS.get_or_init(ModelCapabilities::default)
        }
        async fn chat_stream(&self, _request: ChatRequest) -> agentcore_domain::Result<BoxStream<'static, agentcore_domain::Result<MessageBody>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let call = ToolCall {
                tool_call_id: ToolCallId::new(),
                function_name: "echo".into(),
                function_args: "{}".into(),
                execution_target: ExecutionTarget::LocalFunction,
                index: 0,
            };
            let events = vec![Ok(MessageBody::ToolCallUpdateMessage { call, json_fragment_updates: None })];
            Ok(Box::pin(stream::iter(events)))
        }
    }

    struct TextOnlyProvider;

    #[async_trait]
    impl LlmProvider for TextOnlyProvider {
        fn provider_id(&self) -> &str {
            "text-only"
        }
        fn capabilities(&self) -> &ModelCapabilities {
            static CAPS: std::sync::OnceLock<ModelCapabilities> = std::sync::OnceLock::new();
            CAPS.get_or_init(ModelCapabilities::default)
        }
        async fn chat_stream(&self, _request: ChatRequest) -> agentcore_domain::Result<BoxStream<'static, agentcore_domain::Result<MessageBody>>> {
            let events = vec![Ok(MessageBody::TextUpdateMessage { text: "hi back".into() })];
            Ok(Box::pin(stream::iter(events)))
        }
    }

    struct EchoTool;
    #[async_trait]
    impl agentcore_tools::ToolHandler for EchoTool {
        async fn call(&self, args: serde_json::Value) -> Result<serde_json::Value, String> {
            Ok(args)
        }
    }

    fn test_loop(provider: Arc<dyn LlmProvider>, max_turns_per_run: u32) -> (ThreadLoop, mpsc::Sender<QueuedInput>, Arc<Publisher>) {
        let (tx, rx) = mpsc::channel(100);
        let publisher = Arc::new(Publisher::new(16, BackpressurePolicy::Block));
        let registry = Arc::new(ToolRegistry::new());
        registry.register(FunctionContract::new("echo", "echoes"), Arc::new(EchoTool));
        let dispatcher = Arc::new(Dispatcher::new(registry, 4));
        let store = Arc::new(Store::open_in_memory().unwrap());
        let cancel_map = Arc::new(CancelMap::new());
        let session_lock = Arc::new(SessionLockMap::new());
        let options = ThreadOptions {
            model: "test-model".into(),
            functions: vec![FunctionContract::new("echo", "echoes")],
            system_prompt: None,
            max_turns_per_run,
        };
        let thread_id = ThreadId::new();
        store.create_session(thread_id, None, None).unwrap();
        let thread_loop = ThreadLoop::new(thread_id, rx, provider, publisher.clone(), dispatcher, store, cancel_map, session_lock, options);
        (thread_loop, tx, publisher)
    }

    #[tokio::test]
    async fn single_turn_no_tools_emits_assignment_then_completion() {
        let (thread_loop, tx, publisher) = test_loop(Arc::new(TextOnlyProvider), 25);
        let thread_id_for_sub = thread_loop_thread_id(&thread_loop);
        let mut subscription = publisher.subscribe(thread_id_for_sub);

        let queued = QueuedInput {
            receipt_id: ReceiptId::new(),
            input: UserInputForTest::new(vec![MessageBody::TextMessage { role: Role::User, text: "hi".into() }]),
        };
        tx.send(queued).await.unwrap();
        drop(tx);

        let handle = tokio::spawn(thread_loop.run());

        let assignment = subscription.recv().await.unwrap();
        assert!(matches!(assignment.body, MessageBody::RunAssignment { was_injected: false, .. }));

        let mut saw_text = false;
        let mut saw_completed = false;
        while let Some(envelope) = subscription.recv().await {
            match envelope.body {
                MessageBody::TextMessage { .. } => saw_text = true,
                MessageBody::RunCompleted { is_error, .. } => {
                    saw_completed = true;
                    assert!(!is_error);
                    break;
                }
                _ => {}
            }
        }
        assert!(saw_text);
        assert!(saw_completed);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn max_turns_per_run_stops_a_tool_calling_loop_without_error() {
        let provider = Arc::new(AlwaysCallsToolProvider { calls: AtomicUsize::new(0) });
        let (thread_loop, tx, publisher) = test_loop(provider.clone(), 1);
        let thread_id_for_sub = thread_loop_thread_id(&thread_loop);
        let mut subscription = publisher.subscribe(thread_id_for_sub);

        let queued = QueuedInput {
            receipt_id: ReceiptId::new(),
            input: UserInputForTest::new(vec![MessageBody::TextMessage { role: Role::User, text: "go".into() }]),
        };
        tx.send(queued).await.unwrap();
        drop(tx);

        let handle = tokio::spawn(thread_loop.run());

        let mut saw_completed_without_error = false;
        while let Some(envelope) = subscription.recv().await {
            if let MessageBody::RunCompleted { is_error, .. } = envelope.body {
                saw_completed_without_error = !is_error;
                break;
            }
        }
        assert!(saw_completed_without_error);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        handle.await.unwrap();
    }

    fn thread_loop_thread_id(thread_loop: &ThreadLoop) -> ThreadId {
        thread_loop.thread_id
    }

    type UserInputForTest = crate::types::UserInput;
}
