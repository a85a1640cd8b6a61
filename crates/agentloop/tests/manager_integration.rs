//! Integration tests for `AgentLoopManager` — full round-trip across
//! manager + thread loop + pubsub + persistence, no provider network calls.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use agentcore_agentloop::{AgentLoopManager, ProviderLookup, ThreadSpec, UserInput};
use agentcore_domain::capability::ModelCapabilities;
use agentcore_domain::config::{AgentLoopConfig, BackpressurePolicy};
use agentcore_domain::ids::ThreadId;
use agentcore_domain::message::{MessageBody, Role};
use agentcore_persistence::Store;
use agentcore_providers::{ChatRequest, LlmProvider};
use agentcore_pubsub::Publisher;
use agentcore_tools::{Dispatcher, ToolRegistry};
use async_trait::async_trait;
use futures_core::stream::BoxStream;
use futures_util::stream;

struct EchoProvider {
    calls: AtomicUsize,
}

#[async_trait]
impl LlmProvider for EchoProvider {
    fn provider_id(&self) -> &str {
        "echo"
    }

    fn capabilities(&self) -> &ModelCapabilities {
        static CAPS: std::sync::OnceLock<ModelCapabilities> = std::sync::OnceLock::new();
        CAPS.get_or_init(ModelCapabilities::default)
    }

    async fn chat_stream(
        &self,
        _request: ChatRequest,
    ) -> agentcore_domain::Result<BoxStream<'static, agentcore_domain::Result<MessageBody>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let events = vec![Ok(MessageBody::TextUpdateMessage { text: "ack".into() })];
        Ok(Box::pin(stream::iter(events)))
    }
}

struct FixedProvider(Arc<dyn LlmProvider>);

impl ProviderLookup for FixedProvider {
    fn resolve(&self, provider_id: &str) -> Option<Arc<dyn LlmProvider>> {
        (provider_id == "echo").then(|| self.0.clone())
    }
}

fn test_manager(provider: Arc<dyn LlmProvider>) -> AgentLoopManager {
    let lookup: Arc<dyn ProviderLookup> = Arc::new(FixedProvider(provider));
    let registry = Arc::new(ToolRegistry::new());
    let dispatcher = Arc::new(Dispatcher::new(registry, 4));
    let store = Arc::new(Store::open_in_memory().unwrap());
    let publisher = Arc::new(Publisher::new(32, BackpressurePolicy::Block));
    let config = AgentLoopConfig { input_channel_capacity: 50, max_turns_per_run: 25 };
    AgentLoopManager::new(config, lookup, dispatcher, store, publisher)
}

fn spec() -> ThreadSpec {
    ThreadSpec { model: "echo-1".into(), functions: vec![], system_prompt: None }
}

#[tokio::test]
async fn two_independent_threads_each_complete_their_own_run() {
    let provider = Arc::new(EchoProvider { calls: AtomicUsize::new(0) });
    let manager = Arc::new(test_manager(provider));

    let thread_a = ThreadId::new();
    let thread_b = ThreadId::new();

    let mut sub_a = manager.subscribe(thread_a);
    let mut sub_b = manager.subscribe(thread_b);

    let input = |text: &str| UserInput::new(vec![MessageBody::TextMessage { role: Role::User, text: text.into() }]);

    manager.submit(thread_a, "echo", &spec(), input("hello a")).unwrap();
    manager.submit(thread_b, "echo", &spec(), input("hello b")).unwrap();

    let completed = |sub: &mut agentcore_pubsub::Subscription| async move {
        loop {
            let envelope = sub.recv().await.expect("subscription closed before completion");
            if let MessageBody::RunCompleted { is_error, .. } = envelope.body {
                return is_error;
            }
        }
    };

    let (err_a, err_b) = tokio::join!(completed(&mut sub_a), completed(&mut sub_b));
    assert!(!err_a);
    assert!(!err_b);
}

#[tokio::test]
async fn repeated_submission_to_the_same_thread_is_serialized_not_duplicated() {
    let provider = Arc::new(EchoProvider { calls: AtomicUsize::new(0) });
    let manager = Arc::new(test_manager(provider));
    let thread_id = ThreadId::new();
    let mut sub = manager.subscribe(thread_id);

    let input = |text: &str| UserInput::new(vec![MessageBody::TextMessage { role: Role::User, text: text.into() }]);
    manager.submit(thread_id, "echo", &spec(), input("first")).unwrap();
    manager.submit(thread_id, "echo", &spec(), input("second")).unwrap();

    let mut completions = 0;
    while completions < 2 {
        let envelope = sub.recv().await.expect("subscription closed early");
        if matches!(envelope.body, MessageBody::RunCompleted { .. }) {
            completions += 1;
        }
    }
    assert_eq!(completions, 2);
}

#[tokio::test]
async fn cancelling_an_unknown_run_id_is_reported_as_a_no_op() {
    let provider = Arc::new(EchoProvider { calls: AtomicUsize::new(0) });
    let manager = test_manager(provider);
    assert!(!manager.cancel(agentcore_domain::ids::RunId::new()));
}
