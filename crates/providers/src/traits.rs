use agentcore_domain::capability::ModelCapabilities;
use agentcore_domain::contract::FunctionContract;
use agentcore_domain::message::{MessageBody, Role};
use agentcore_domain::Result;
use async_trait::async_trait;
use futures_core::stream::BoxStream;

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: Role,
    pub text: String,
}

#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub json_mode: bool,
    pub functions: Vec<FunctionContract>,
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub options: ChatOptions,
}

/// A streaming language-model provider. `chat_stream` is the sole entry
/// point the agent loop uses — it returns a boxed stream of already
/// normalized message bodies (`TextUpdateMessage`, `ToolCallUpdateMessage`,
/// `UsageMessage`, …), built per-provider on top of [`crate::sse`].
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn provider_id(&self) -> &str;

    fn capabilities(&self) -> &ModelCapabilities;

    async fn chat_stream(&self, request: ChatRequest) -> Result<BoxStream<'static, Result<MessageBody>>>;
}
