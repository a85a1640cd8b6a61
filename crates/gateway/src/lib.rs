//! HTTP/WS transport adapter in front of the agent loop: turns external
//! requests into `AgentLoopManager::submit` calls and streams published
//! envelopes back out as SSE or WebSocket frames.

pub mod api;
pub mod auth;
pub mod bootstrap;
pub mod cli;
pub mod state;
pub mod ws;
