//! Downstream stage: forwards every message to a publish callback before it
//! reaches the caller. Runs after `JsonFragmentUpdate` in the composition
//! order, so subscribers see structural fragment updates attached, not the
//! bare delta text.
//!
//! `publish` is async because the real publisher (`agentcore-pubsub`) awaits
//! a per-subscriber bounded channel under the `Block` backpressure policy —
//! that wait is meant to be a suspension point of the loop task driving this
//! pipeline, not something hidden behind a non-blocking relay queue.

use agentcore_domain::message::MessageBody;
use async_trait::async_trait;

#[async_trait]
pub trait Publish: Send + Sync {
    async fn publish(&self, message: &MessageBody);
}

pub struct MessagePublishing<P: Publish> {
    publisher: P,
}

impl<P: Publish> MessagePublishing<P> {
    pub fn new(publisher: P) -> Self {
        Self { publisher }
    }

    pub async fn process_downstream(&self, message: MessageBody) -> MessageBody {
        self.publisher.publish(&message).await;
        message
    }
}
