//! Anthropic Messages API streaming adapter.
//!
//! Translates Anthropic's content-block SSE shape into the normalized
//! message stream per the six transitions in the provider stream contract:
//! `message_start`, `content_block_start`, `content_block_delta`,
//! `content_block_stop`, `message_delta`/`message_stop`, `ping`/`error`.

use std::sync::Arc;

use agentcore_domain::ids::ToolCallId;
use agentcore_domain::message::{ExecutionTarget, MessageBody, ReasoningVisibility, Role};
use agentcore_domain::{Error, Result};
use async_trait::async_trait;
use futures_core::stream::BoxStream;
use serde::Deserialize;
use serde_json::Value;

use crate::capability_presets::anthropic_capabilities;
use crate::sse::sse_response_stream;
use crate::state::StreamState;
use crate::traits::{ChatRequest, LlmProvider};
use crate::util::{from_reqwest, resolve_api_key};

pub struct AnthropicProvider {
    id: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
    capabilities: agentcore_domain::capability::ModelCapabilities,
}

impl AnthropicProvider {
    pub fn new(id: impl Into<String>, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
            capabilities: anthropic_capabilities(),
        }
    }

    pub fn from_config(entry: &agentcore_domain::config::ProviderEntry) -> Result<Self> {
        let api_key = resolve_api_key(&entry.api_key, &entry.api_key_env)?;
        Ok(Self::new(entry.id.clone(), entry.base_url.clone(), api_key))
    }

    fn build_body(&self, request: &ChatRequest) -> Value {
        let mut system_prompt = String::new();
        let mut messages = Vec::new();
        for msg in &request.messages {
            if msg.role == Role::System {
                if !system_prompt.is_empty() {
                    system_prompt.push('\n');
                }
                system_prompt.push_str(&msg.text);
                continue;
            }
            let role = match msg.role {
                Role::User | Role::Tool => "user",
                Role::Assistant => "assistant",
                Role::System => unreachable!(),
            };
            messages.push(serde_json::json!({ "role": role, "content": msg.text }));
        }

        let mut body = serde_json::json!({
            "model": request.model,
            "messages": messages,
            "stream": true,
            "max_tokens": request.options.max_tokens.unwrap_or(4096),
        });
        if !system_prompt.is_empty() {
            body["system"] = Value::String(system_prompt);
        }
        if let Some(t) = request.options.temperature {
            body["temperature"] = serde_json::json!(t);
        }
        if !request.options.functions.is_empty() {
            let tools: Vec<Value> = request
                .options
                .functions
                .iter()
                .map(|f| {
                    serde_json::json!({
                        "name": f.name,
                        "description": f.description,
                        "input_schema": f.to_json_schema(),
                    })
                })
                .collect();
            body["tools"] = Value::Array(tools);
        }
        body
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn provider_id(&self) -> &str {
        &self.id
    }

    fn capabilities(&self) -> &agentcore_domain::capability::ModelCapabilities {
        &self.capabilities
    }

    async fn chat_stream(&self, request: ChatRequest) -> Result<BoxStream<'static, Result<MessageBody>>> {
        let body = self.build_body(&request);
        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Provider {
                provider: self.id.clone(),
                message: format!("http {}: {}", status, text),
            });
        }

        let state = Arc::new(parking_lot::Mutex::new(StreamState::new()));
        Ok(sse_response_stream(response, move |data| {
            let mut state = state.lock();
            parse_anthropic_sse(data, &mut state)
        }))
    }
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum AnthropicEvent {
    #[serde(rename = "message_start")]
    MessageStart { message: Value },
    #[serde(rename = "content_block_start")]
    ContentBlockStart { index: u64, content_block: Value },
    #[serde(rename = "content_block_delta")]
    ContentBlockDelta { index: u64, delta: Value },
    #[serde(rename = "content_block_stop")]
    ContentBlockStop { index: u64 },
    #[serde(rename = "message_delta")]
    MessageDelta { delta: Value, usage: Option<Value> },
    #[serde(rename = "message_stop")]
    MessageStop {},
    #[serde(rename = "ping")]
    Ping {},
    #[serde(rename = "error")]
    Error { error: Value },
}

/// Parse one Anthropic SSE `data:` payload into zero or more normalized
/// messages, mutating `state` across calls for the lifetime of one generation.
pub fn parse_anthropic_sse(data: &str, state: &mut StreamState) -> Vec<Result<MessageBody>> {
    if data == "[DONE]" {
        return Vec::new();
    }
    let event: AnthropicEvent = match serde_json::from_str(data) {
        Ok(e) => e,
        Err(_) => return vec![Err(Error::Parser(format!("unrecognized anthropic event: {}", data)))],
    };

    match event {
        AnthropicEvent::MessageStart { .. } | AnthropicEvent::Ping {} => Vec::new(),
        AnthropicEvent::ContentBlockStart { index, content_block } => {
            if content_block.get("type").and_then(Value::as_str) == Some("tool_use") {
                let tool_call_id = ToolCallId::new();
                let name = content_block
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                state.open_tool_call(index, tool_call_id, name);
            }
            Vec::new()
        }
        AnthropicEvent::ContentBlockDelta { index, delta } => {
            let delta_type = delta.get("type").and_then(Value::as_str).unwrap_or_default();
            match delta_type {
                "text_delta" => {
                    let text = delta.get("text").and_then(Value::as_str).unwrap_or_default();
                    vec![Ok(MessageBody::TextUpdateMessage { text: text.to_string() })]
                }
                "thinking_delta" => {
                    let text = delta.get("thinking").and_then(Value::as_str).unwrap_or_default();
                    vec![Ok(MessageBody::ReasoningUpdateMessage {
                        reasoning: text.to_string(),
                        visibility: ReasoningVisibility::Plain,
                    })]
                }
                "input_json_delta" => {
                    let partial = delta.get("partial_json").and_then(Value::as_str).unwrap_or_default();
                    emit_tool_call_update(state, index, partial)
                }
                _ => Vec::new(),
            }
        }
        AnthropicEvent::ContentBlockStop { index } => {
            // Finalizing is a no-op if the accumulator never opened (text/reasoning
            // blocks have no accumulator to finalize).
            let _ = state.tool_calls.get(&index);
            Vec::new()
        }
        AnthropicEvent::MessageDelta { usage, .. } => usage
            .map(|u| vec![Ok(usage_message(&u, state))])
            .unwrap_or_default(),
        AnthropicEvent::MessageStop {} => vec![Ok(MessageBody::UsageMessage {
            prompt_tokens: state.prompt_tokens,
            completion_tokens: state.completion_tokens,
            total_tokens: state.prompt_tokens + state.completion_tokens,
            reasoning_tokens: None,
            cached_tokens: None,
            cost: None,
        })],
        AnthropicEvent::Error { error } => {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown anthropic error")
                .to_string();
            vec![Ok(MessageBody::Error {
                code: "PROVIDER_ERROR".to_string(),
                message,
                recoverable: true,
            })]
        }
    }
}

/// Append the next `partial_json` delta to the tool call's cumulative
/// argument buffer and emit the update. Structural `jsonFragmentUpdates` are
/// attached later by the pipeline's `JsonFragmentUpdate` stage, not here —
/// feeding the same delta through a fragment parser twice would desync it.
fn emit_tool_call_update(state: &mut StreamState, index: u64, partial: &str) -> Vec<Result<MessageBody>> {
    let Some(acc) = state.tool_calls.get_mut(&index) else {
        return Vec::new();
    };
    acc.args_buffer.push_str(partial);
    vec![Ok(MessageBody::ToolCallUpdateMessage {
        call: agentcore_domain::message::ToolCall {
            tool_call_id: acc.tool_call_id,
            function_name: acc.function_name.clone(),
            function_args: acc.args_buffer.clone(),
            execution_target: ExecutionTarget::LocalFunction,
            index: acc.index,
        },
        json_fragment_updates: None,
    })]
}

fn usage_message(usage: &Value, state: &mut StreamState) -> MessageBody {
    let input = usage.get("input_tokens").and_then(Value::as_u64).unwrap_or(0) as u32;
    let output = usage.get("output_tokens").and_then(Value::as_u64).unwrap_or(0) as u32;
    state.prompt_tokens = input;
    state.completion_tokens = output;
    MessageBody::UsageMessage {
        prompt_tokens: input,
        completion_tokens: output,
        total_tokens: input + output,
        reasoning_tokens: None,
        cached_tokens: usage.get("cache_read_input_tokens").and_then(Value::as_u64).map(|v| v as u32),
        cost: None,
    }
}
