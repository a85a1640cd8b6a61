//! Provider stream parsers: per-vendor adapters that translate a streaming
//! chat-completion response into the normalized [`agentcore_domain::message::MessageBody`]
//! stream the rest of the system consumes.

pub mod anthropic;
pub mod capability_presets;
pub mod openai_compat;
pub mod registry;
pub mod sse;
pub mod state;
pub mod traits;
pub mod util;

pub use registry::ProviderRegistry;
pub use traits::{ChatMessage, ChatOptions, ChatRequest, LlmProvider};
