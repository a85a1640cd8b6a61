//! Public entry point: spawns and tracks one [`ThreadLoop`] task per
//! `ThreadId`, and exposes the non-blocking `submit` a transport adapter
//! calls on every inbound message.

use std::collections::HashMap;
use std::sync::Arc;

use agentcore_domain::config::AgentLoopConfig;
use agentcore_domain::contract::FunctionContract;
use agentcore_domain::ids::{ReceiptId, RunId, ThreadId};
use agentcore_persistence::Store;
use agentcore_providers::LlmProvider;
use agentcore_pubsub::Publisher;
use agentcore_tools::Dispatcher;
use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::cancel::CancelMap;
use crate::session_lock::SessionLockMap;
use crate::thread_loop::{ThreadLoop, ThreadOptions};
use crate::types::{QueuedInput, SendReceipt, SubmitError, UserInput};

/// The per-thread configuration a caller provides the first time it
/// addresses a given `ThreadId`. Later submissions against an already-running
/// thread ignore this — the thread's model/functions/system prompt are fixed
/// for the life of the loop, matching how a single conversation sticks to
/// the agent it was started with.
#[derive(Debug, Clone)]
pub struct ThreadSpec {
    pub model: String,
    pub functions: Vec<FunctionContract>,
    pub system_prompt: Option<String>,
}

pub struct AgentLoopManager {
    config: AgentLoopConfig,
    providers: Arc<dyn ProviderLookup>,
    dispatcher: Arc<Dispatcher>,
    store: Arc<Store>,
    publisher: Arc<Publisher>,
    cancel_map: Arc<CancelMap>,
    session_lock: Arc<SessionLockMap>,
    threads: Mutex<HashMap<ThreadId, mpsc::Sender<QueuedInput>>>,
}

/// Resolves a provider id to a live `LlmProvider`, kept as a trait so the
/// manager doesn't need to know about `agentcore_providers::ProviderRegistry`
/// directly and tests can supply a single fixed provider.
pub trait ProviderLookup: Send + Sync {
    fn resolve(&self, provider_id: &str) -> Option<Arc<dyn LlmProvider>>;
}

impl ProviderLookup for agentcore_providers::ProviderRegistry {
    fn resolve(&self, provider_id: &str) -> Option<Arc<dyn LlmProvider>> {
        self.get(provider_id)
    }
}

impl AgentLoopManager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: AgentLoopConfig,
        providers: Arc<dyn ProviderLookup>,
        dispatcher: Arc<Dispatcher>,
        store: Arc<Store>,
        publisher: Arc<Publisher>,
    ) -> Self {
        Self {
            config,
            providers,
            dispatcher,
            store,
            publisher,
            cancel_map: Arc::new(CancelMap::new()),
            session_lock: Arc::new(SessionLockMap::new()),
            threads: Mutex::new(HashMap::new()),
        }
    }

    /// Enqueue `input` for `thread_id`, spawning the thread's loop task on
    /// first use with `spec` as its fixed options and `provider_id` as the
    /// model source for every turn. Returns immediately; a full channel or a
    /// thread whose loop has already exited is reported rather than awaited.
    pub fn submit(
        &self,
        thread_id: ThreadId,
        provider_id: &str,
        spec: &ThreadSpec,
        input: UserInput,
    ) -> Result<SendReceipt, SubmitError> {
        let sender = self.sender_for(thread_id, provider_id, spec)?;
        let receipt_id = ReceiptId::new();
        let queued = QueuedInput { receipt_id, input: input.clone() };
        sender.try_send(queued).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => SubmitError::Full,
            mpsc::error::TrySendError::Closed(_) => SubmitError::Closed,
        })?;
        Ok(SendReceipt {
            receipt_id,
            input_id: input.input_id,
            queued_at: Utc::now(),
        })
    }

    /// Request cancellation of an in-flight run.
    pub fn cancel(&self, run_id: RunId) -> bool {
        self.cancel_map.cancel(run_id)
    }

    /// Subscribe to every event published for `thread_id`.
    pub fn subscribe(&self, thread_id: ThreadId) -> agentcore_pubsub::Subscription {
        self.publisher.subscribe(thread_id)
    }

    fn sender_for(
        &self,
        thread_id: ThreadId,
        provider_id: &str,
        spec: &ThreadSpec,
    ) -> Result<mpsc::Sender<QueuedInput>, SubmitError> {
        let mut threads = self.threads.lock();
        if let Some(sender) = threads.get(&thread_id) {
            if !sender.is_closed() {
                return Ok(sender.clone());
            }
        }

        let provider = self.providers.resolve(provider_id).ok_or(SubmitError::Closed)?;
        let (tx, rx) = mpsc::channel(self.config.input_channel_capacity);
        let options = ThreadOptions {
            model: spec.model.clone(),
            functions: spec.functions.clone(),
            system_prompt: spec.system_prompt.clone(),
            max_turns_per_run: self.config.max_turns_per_run,
        };
        let thread_loop = ThreadLoop::new(
            thread_id,
            rx,
            provider,
            self.publisher.clone(),
            self.dispatcher.clone(),
            self.store.clone(),
            self.cancel_map.clone(),
            self.session_lock.clone(),
            options,
        );
        let _ = self.store.create_session(thread_id, None, None);
        tokio::spawn(thread_loop.run());

        threads.insert(thread_id, tx.clone());
        Ok(tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentcore_domain::capability::ModelCapabilities;
    use agentcore_domain::config::BackpressurePolicy;
    use agentcore_domain::message::{MessageBody, Role};
    use async_trait::async_trait;
    use futures_core::stream::BoxStream;
    use futures_util::stream;
    use agentcore_tools::ToolRegistry;

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
        async fn chat_stream(
            &self,
            _request: agentcore_providers::ChatRequest,
        ) -> agentcore_domain::Result<BoxStream<'static, agentcore_domain::Result<MessageBody>>> {
            let events = vec![Ok(MessageBody::TextUpdateMessage { text: "hi".into() })];
            Ok(Box::pin(stream::iter(events)))
        }
    }

    struct FixedProvider(Arc<dyn LlmProvider>);
    impl ProviderLookup for FixedProvider {
        fn resolve(&self, _provider_id: &str) -> Option<Arc<dyn LlmProvider>> {
            Some(self.0.clone())
        }
    }

    fn manager() -> AgentLoopManager {
        let providers: Arc<dyn ProviderLookup> = Arc::new(FixedProvider(Arc::new(TextOnlyProvider)));
        let registry = Arc::new(ToolRegistry::new());
        let dispatcher = Arc::new(Dispatcher::new(registry, 4));
        let store = Arc::new(Store::open_in_memory().unwrap());
        let publisher = Arc::new(Publisher::new(16, BackpressurePolicy::Block));
        AgentLoopManager::new(AgentLoopConfig::default(), providers, dispatcher, store, publisher)
    }

    fn spec() -> ThreadSpec {
        ThreadSpec { model: "test-model".into(), functions: vec![], system_prompt: None }
    }

    #[tokio::test]
    async fn submit_spawns_a_thread_loop_and_returns_a_receipt() {
        let mgr = manager();
        let thread_id = ThreadId::new();
        let input = UserInput::new(vec![MessageBody::TextMessage { role: Role::User, text: "hi".into() }]);
        let receipt = mgr.submit(thread_id, "any", &spec(), input).unwrap();
        assert!(receipt.input_id.is_none());
    }

    #[tokio::test]
    async fn submit_against_an_unknown_provider_id_fails_without_spawning() {
        let providers: Arc<dyn ProviderLookup> = Arc::new(NoProviders);
        let registry = Arc::new(ToolRegistry::new());
        let dispatcher = Arc::new(Dispatcher::new(registry, 4));
        let store = Arc::new(Store::open_in_memory().unwrap());
        let publisher = Arc::new(Publisher::new(16, BackpressurePolicy::Block));
        let mgr = AgentLoopManager::new(AgentLoopConfig::default(), providers, dispatcher, store, publisher);
        let input = UserInput::new(vec![MessageBody::TextMessage { role: Role::User, text: "hi".into() }]);
        let result = mgr.submit(ThreadId::new(), "missing", &spec(), input);
        assert_eq!(result.unwrap_err(), SubmitError::Closed);
    }

    struct NoProviders;
    impl ProviderLookup for NoProviders {
        fn resolve(&self, _provider_id: &str) -> Option<Arc<dyn LlmProvider>> {
            None
        }
    }

    #[tokio::test]
    async fn repeated_submits_to_the_same_thread_reuse_its_loop() {
        let mgr = manager();
        let thread_id = ThreadId::new();
        let input = |text: &str| UserInput::new(vec![MessageBody::TextMessage { role: Role::User, text: text.into() }]);
        mgr.submit(thread_id, "any", &spec(), input("a")).unwrap();
        mgr.submit(thread_id, "any", &spec(), input("b")).unwrap();
        assert_eq!(mgr.threads.lock().len(), 1);
    }
}
