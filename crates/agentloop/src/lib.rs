//! Owns the agent run-drive loop: one task per thread, state machine
//! `Idle → Draining → Assigning → Turning (↔ Executing) → Completing →
//! Idle`, driven against a bounded per-thread input channel and publishing
//! every emitted message to `agentcore-pubsub` subscribers as it happens.

mod cancel;
mod history;
mod manager;
mod publish;
mod replay;
mod session_lock;
mod thread_loop;
mod turn;
mod types;

pub use cancel::CancelMap;
pub use manager::{AgentLoopManager, ProviderLookup, ThreadSpec};
pub use session_lock::SessionLockMap;
pub use thread_loop::{ThreadLoop, ThreadOptions};
pub use types::{QueuedInput, SendReceipt, SubmitError, UserInput};
