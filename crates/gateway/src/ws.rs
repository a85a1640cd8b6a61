//! `GET /v1/ws` — bidirectional socket endpoint. One connection maps to one
//! thread: it mints (or reuses) a `sessionId`, announces it, then behaves
//! like the SSE endpoint in both directions — inbound text frames submit
//! further turns, outbound frames are the same envelopes SSE would emit.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use agentcore_agentloop::ThreadSpec;
use agentcore_domain::ids::ThreadId;
use agentcore_domain::message::{MessageBody, Role};

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    #[serde(default)]
    pub thread_id: Option<ThreadId>,
    #[serde(default)]
    pub agent: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InboundFrame {
    messages: Vec<InboundMessage>,
    #[serde(default)]
    run_id: Option<agentcore_domain::ids::RunId>,
}

#[derive(Debug, Deserialize)]
struct InboundMessage {
    role: Role,
    content: String,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, query))
}

async fn handle_socket(socket: WebSocket, state: AppState, query: WsQuery) {
    let (mut ws_sink, mut ws_stream) = socket.split();

    let thread_id = query.thread_id.unwrap_or_else(ThreadId::new);
    let provider_id = query.agent.unwrap_or_else(|| "default".to_string());
    let session_id = ThreadId::new();

    let started = serde_json::json!({
        "type": "SessionStarted",
        "sessionId": session_id,
        "startedAt": Utc::now(),
    });
    if send_ws_text(&mut ws_sink, &started).await.is_err() {
        return;
    }

    let mut subscription = state.manager.subscribe(thread_id);

    // Writer task: forwards every published envelope (and inline error
    // frames from the reader loop below) to the socket.
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<serde_json::Value>(64);
    let writer = tokio::spawn(async move {
        while let Some(value) = outbound_rx.recv().await {
            if send_ws_text(&mut ws_sink, &value).await.is_err() {
                break;
            }
        }
    });

    let forward_tx = outbound_tx.clone();
    let forward = tokio::spawn(async move {
        while let Some(envelope) = subscription.recv().await {
            let value = serde_json::to_value(&envelope).unwrap_or(serde_json::Value::Null);
            if forward_tx.send(value).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = ws_stream.next().await {
        match msg {
            Message::Text(text) => match serde_json::from_str::<InboundFrame>(&text) {
                Ok(frame) => {
                    let messages: Vec<MessageBody> = frame
                        .messages
                        .into_iter()
                        .map(|m| MessageBody::TextMessage { role: m.role, text: m.content })
                        .collect();
                    let mut input = agentcore_agentloop::UserInput::new(messages);
                    input.parent_run_id = frame.run_id;
                    let spec = ThreadSpec { model: provider_id.clone(), functions: vec![], system_prompt: None };
                    if state.manager.submit(thread_id, &provider_id, &spec, input).is_err() {
                        tracing::warn!(%thread_id, "dropped submission on closed or full input channel");
                    }
                }
                Err(_) => {
                    let error = serde_json::json!({
                        "type": "RUN_ERROR",
                        "code": "INVALID_JSON",
                        "recoverable": true,
                    });
                    if outbound_tx.send(error).await.is_err() {
                        break;
                    }
                }
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    forward.abort();
    writer.abort();
}

async fn send_ws_text(
    sink: &mut (impl SinkExt<Message> + Unpin),
    value: &impl serde::Serialize,
) -> Result<(), ()> {
    let json = serde_json::to_string(value).map_err(|_| ())?;
    sink.send(Message::Text(json)).await.map_err(|_| ())
}
