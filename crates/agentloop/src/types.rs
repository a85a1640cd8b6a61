//! Wire-adjacent types for the loop's public entry point.

use agentcore_domain::ids::{InputId, ReceiptId, RunId};
use agentcore_domain::message::MessageBody;
use chrono::{DateTime, Utc};

/// One batch of messages a caller wants appended to a thread, optionally
/// requesting a fork from `parent_run_id`.
#[derive(Debug, Clone)]
pub struct UserInput {
    pub messages: Vec<MessageBody>,
    pub input_id: Option<InputId>,
    pub parent_run_id: Option<RunId>,
}

impl UserInput {
    pub fn new(messages: Vec<MessageBody>) -> Self {
        Self {
            messages,
            input_id: None,
            parent_run_id: None,
        }
    }
}

/// Acknowledgement returned immediately from `submit`; does not guarantee
/// run assignment.
#[derive(Debug, Clone)]
pub struct SendReceipt {
    pub receipt_id: ReceiptId,
    pub input_id: Option<InputId>,
    pub queued_at: DateTime<Utc>,
}

/// Why a `submit` call could not enqueue its input. `submit` returns
/// immediately, so a full channel is reported rather than awaited.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    #[error("input channel closed")]
    Closed,
    #[error("input channel full")]
    Full,
}

/// A `UserInput` tagged with the receipt it was given at submission time,
/// so the loop can report `RunAssignment.inputIds` using the identifier the
/// caller already has, not a second one.
#[derive(Debug, Clone)]
pub struct QueuedInput {
    pub receipt_id: ReceiptId,
    pub input: UserInput,
}
