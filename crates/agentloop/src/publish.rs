//! The `Pipeline`'s internal `Publish` stage runs before `messageOrderIdx`
//! is assigned (see `agentcore_pipeline::pipeline`), so it cannot build a
//! correct envelope for real subscriber fan-out. The loop wires it to this
//! no-op instead and publishes to `agentcore_pubsub::Publisher` itself once
//! `Pipeline::process_downstream`/`finish` has returned the ordered result —
//! avoiding both a placeholder order index and a double-publish of the
//! joined message.

use agentcore_domain::message::MessageBody;
use agentcore_pipeline::message_publishing::Publish;
use async_trait::async_trait;

pub struct NoopPublish;

#[async_trait]
impl Publish for NoopPublish {
    async fn publish(&self, _message: &MessageBody) {}
}
