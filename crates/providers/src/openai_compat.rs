//! OpenAI-compatible chat-completions streaming adapter (also used for any
//! provider that mirrors the `/v1/chat/completions` chunk shape).
//!
//! Folds the `delta.content` / `delta.tool_calls[].function.arguments` chunk
//! shape onto the same six abstract transitions the Anthropic adapter
//! implements: a `tool_calls[].id` first appearing maps to
//! `contentBlockStart(tool_use)`, `delta.content`/`.arguments` map to
//! `contentBlockDelta`, and a non-null `finish_reason` maps to `messageDelta`.

use std::sync::Arc;

use agentcore_domain::ids::ToolCallId;
use agentcore_domain::message::{ExecutionTarget, MessageBody};
use agentcore_domain::{Error, Result};
use async_trait::async_trait;
use futures_core::stream::BoxStream;
use serde_json::Value;

use crate::capability_presets::openai_compat_capabilities;
use crate::sse::sse_response_stream;
use crate::state::StreamState;
use crate::traits::{ChatRequest, LlmProvider};
use crate::util::{from_reqwest, resolve_api_key};

pub struct OpenAiCompatProvider {
    id: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
    capabilities: agentcore_domain::capability::ModelCapabilities,
}

impl OpenAiCompatProvider {
    pub fn new(id: impl Into<String>, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
            capabilities: openai_compat_capabilities(),
        }
    }

    pub fn from_config(entry: &agentcore_domain::config::ProviderEntry) -> Result<Self> {
        let api_key = resolve_api_key(&entry.api_key, &entry.api_key_env)?;
        Ok(Self::new(entry.id.clone(), entry.base_url.clone(), api_key))
    }

    fn build_body(&self, request: &ChatRequest) -> Value {
        let messages: Vec<Value> = request
            .messages
            .iter()
            .map(|m| {
                let role = match m.role {
                    agentcore_domain::message::Role::System => "system",
                    agentcore_domain::message::Role::User => "user",
                    agentcore_domain::message::Role::Assistant => "assistant",
                    agentcore_domain::message::Role::Tool => "tool",
                };
                serde_json::json!({ "role": role, "content": m.text })
            })
            .collect();

        let mut body = serde_json::json!({
            "model": request.model,
            "messages": messages,
            "stream": true,
        });
        if let Some(t) = request.options.temperature {
            body["temperature"] = serde_json::json!(t);
        }
        if let Some(mt) = request.options.max_tokens {
            body["max_tokens"] = serde_json::json!(mt);
        }
        if request.options.json_mode {
            body["response_format"] = serde_json::json!({ "type": "json_object" });
        }
        if !request.options.functions.is_empty() {
            let tools: Vec<Value> = request
                .options
                .functions
                .iter()
                .map(|f| {
                    serde_json::json!({
                        "type": "function",
                        "function": {
                            "name": f.name,
                            "description": f.description,
                            "parameters": f.to_json_schema(),
                        }
                    })
                })
                .collect();
            body["tools"] = Value::Array(tools);
        }
        body
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatProvider {
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
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
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
            parse_openai_sse(data, &mut state)
        }))
    }
}

/// Parse one OpenAI-compatible SSE `data:` payload. A literal `[DONE]`
/// sentinel terminates the stream (handled by the caller recognizing it
/// produces no events and letting the response close naturally).
pub fn parse_openai_sse(data: &str, state: &mut StreamState) -> Vec<Result<MessageBody>> {
    if data == "[DONE]" {
        return Vec::new();
    }
    let chunk: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(_) => return vec![Err(Error::Parser(format!("unrecognized openai chunk: {}", data)))],
    };

    if let Some(err) = chunk.get("error") {
        let message = err
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown provider error")
            .to_string();
        return vec![Ok(MessageBody::Error {
            code: "PROVIDER_ERROR".to_string(),
            message,
            recoverable: true,
        })];
    }

    let mut out = Vec::new();
    let Some(choice) = chunk.get("choices").and_then(|c| c.get(0)) else {
        if let Some(usage) = chunk.get("usage") {
            out.push(Ok(usage_message(usage)));
        }
        return out;
    };
    let delta = choice.get("delta").cloned().unwrap_or(Value::Null);

    if let Some(text) = delta.get("content").and_then(Value::as_str) {
        if !text.is_empty() {
            out.push(Ok(MessageBody::TextUpdateMessage { text: text.to_string() }));
        }
    }

    if let Some(tool_calls) = delta.get("tool_calls").and_then(Value::as_array) {
        for tc in tool_calls {
            let index = tc.get("index").and_then(Value::as_u64).unwrap_or(0);
            if let Some(func) = tc.get("function") {
                if let Some(name) = func.get("name").and_then(Value::as_str) {
                    if !state.tool_calls.contains_key(&index) {
                        state.open_tool_call(index, ToolCallId::new(), name.to_string());
                    }
                }
                if let Some(args_delta) = func.get("arguments").and_then(Value::as_str) {
                    out.extend(emit_tool_call_update(state, index, args_delta));
                }
            }
        }
    }

    if let Some(finish_reason) = choice.get("finish_reason").and_then(Value::as_str) {
        if !finish_reason.is_empty() {
            let usage = chunk.get("usage").cloned();
            out.push(Ok(usage.map(|u| usage_message(&u)).unwrap_or(MessageBody::UsageMessage {
                prompt_tokens: state.prompt_tokens,
                completion_tokens: state.completion_tokens,
                total_tokens: state.prompt_tokens + state.completion_tokens,
                reasoning_tokens: None,
                cached_tokens: None,
                cost: None,
            })));
        }
    }

    out
}

/// Append the next `arguments` delta to the tool call's cumulative argument
/// buffer and emit the update; see the matching note in `anthropic.rs` for
/// why fragment parsing is deferred to the pipeline layer.
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

fn usage_message(usage: &Value) -> MessageBody {
    let prompt = usage.get("prompt_tokens").and_then(Value::as_u64).unwrap_or(0) as u32;
    let completion = usage.get("completion_tokens").and_then(Value::as_u64).unwrap_or(0) as u32;
    MessageBody::UsageMessage {
        prompt_tokens: prompt,
        completion_tokens: completion,
        total_tokens: prompt + completion,
        reasoning_tokens: None,
        cached_tokens: None,
        cost: None,
    }
}
