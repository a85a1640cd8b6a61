//! `POST /v1/chat/stream` — the SSE turn endpoint. One request drives one
//! run to completion: every message the loop publishes is forwarded as an
//! SSE event until a terminal `RunCompleted` closes the stream.

use axum::extract::State;
use axum::http::header::{CACHE_CONTROL, HeaderValue};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use agentcore_agentloop::ThreadSpec;
use agentcore_domain::ids::{RunId, ThreadId};
use agentcore_domain::message::{MessageBody, Role};

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StreamRequest {
    #[serde(default)]
    pub thread_id: Option<ThreadId>,
    /// A prior run to fork from; forwarded as `UserInput.parent_run_id`.
    #[serde(default)]
    pub run_id: Option<RunId>,
    pub messages: Vec<WireMessage>,
    /// Selects which configured provider id drives this thread.
    #[serde(default)]
    pub agent: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WireMessage {
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Wraps an SSE stream into a response carrying the headers proxies need to
/// leave the stream unbuffered: `cache-control: no-cache` (already implied
/// by `Sse`'s content-type but made explicit here) and `x-accel-buffering:
/// no`, which `Sse` does not set on its own.
fn sse_response<S>(stream: S) -> Response
where
    S: futures_core::Stream<Item = Result<Event, std::convert::Infallible>> + Send + 'static,
{
    let mut response = Sse::new(stream).keep_alive(KeepAlive::default()).into_response();
    let headers = response.headers_mut();
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert("x-accel-buffering", HeaderValue::from_static("no"));
    response
}

pub async fn chat_stream(State(state): State<AppState>, Json(body): Json<StreamRequest>) -> impl IntoResponse {
    let provider_id = body.agent.clone().unwrap_or_else(|| "default".to_string());

    if state.providers.get(&provider_id).is_none() {
        let error = serde_json::json!({ "type": "RUN_ERROR", "error": format!("unknown agent '{provider_id}'") });
        let stream = futures_util::stream::once(async move {
            Ok::<_, std::convert::Infallible>(Event::default().data(error.to_string()))
        });
        return sse_response(stream);
    }
    let default_model = state.providers.default_model(&provider_id).unwrap_or(&provider_id).to_string();

    let thread_id = body.thread_id.unwrap_or_else(ThreadId::new);
    let spec = ThreadSpec { model: default_model, functions: vec![], system_prompt: None };

    let messages: Vec<MessageBody> = body
        .messages
        .into_iter()
        .map(|m| MessageBody::TextMessage { role: m.role, text: m.content })
        .collect();
    let mut input = agentcore_agentloop::UserInput::new(messages);
    input.parent_run_id = body.run_id;

    let mut subscription = state.manager.subscribe(thread_id);
    if let Err(err) = state.manager.submit(thread_id, &provider_id, &spec, input) {
        let error = serde_json::json!({ "type": "RUN_ERROR", "error": err.to_string() });
        let stream = futures_util::stream::once(async move {
            Ok::<_, std::convert::Infallible>(Event::default().data(error.to_string()))
        });
        return sse_response(stream);
    }

    let stream = async_stream::stream! {
        while let Some(envelope) = subscription.recv().await {
            let is_terminal = matches!(envelope.body, MessageBody::RunCompleted { .. });
            let data = serde_json::to_string(&envelope).unwrap_or_default();
            yield Ok::<_, std::convert::Infallible>(Event::default().data(data));
            if is_terminal {
                break;
            }
        }
    };

    sse_response(stream)
}

/// Request cancellation of an in-flight run.
pub async fn cancel_run(State(state): State<AppState>, axum::extract::Path(run_id): axum::extract::Path<RunId>) -> impl IntoResponse {
    if state.manager.cancel(run_id) {
        axum::http::StatusCode::ACCEPTED
    } else {
        axum::http::StatusCode::NOT_FOUND
    }
}
