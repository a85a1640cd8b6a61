//! Composes the six middleware stages in the fixed order: `ToolCallInjection`
//! → `MessageUpdateJoiner` → `JsonFragmentUpdate` → `MessagePublishing` →
//! `MessageTransformation` → `FunctionCall`. Rather than a literal recursive
//! `invoke(context, next)` continuation chain, downstream processing of each
//! provider event is one straight pass through the stages in that order —
//! observably equivalent for this fixed, non-reentrant composition, and far
//! simpler to reason about without a compiler to catch continuation bugs.
//!
//! The joiner runs before fragment decoration and publishing (not after) so
//! that both the raw per-delta update *and*, once a join boundary closes,
//! the finalized full message pass through `JsonFragmentUpdate` (a no-op on
//! an already-finalized message) and `MessagePublishing` — subscribers see
//! updates, fragment-decorated updates, and joined messages alike; only the
//! joined form is kept in durable history.

use agentcore_domain::contract::FunctionContract;
use agentcore_domain::ids::MessageOrderIdx;
use agentcore_domain::message::MessageBody;

use crate::context::PipelineContext;
use crate::function_call::FunctionCall;
use crate::json_fragment_update::JsonFragmentUpdate;
use crate::message_publishing::{MessagePublishing, Publish};
use crate::message_transformation::MessageTransformation;
use crate::message_update_joiner::MessageUpdateJoiner;
use crate::tool_call_injection::ToolCallInjection;

pub struct DownstreamResult {
    /// Every message the live caller/subscriber stream should see, in order,
    /// paired with the dense `messageOrderIdx` assigned to it so the caller
    /// can build envelopes without re-deriving the sequence.
    pub for_caller: Vec<(MessageOrderIdx, MessageBody)>,
    /// The finalized message for durable history, if this event completed a join.
    pub for_history: Option<(MessageOrderIdx, MessageBody)>,
}

pub struct Pipeline<P: Publish> {
    tool_call_injection: ToolCallInjection,
    joiner: MessageUpdateJoiner,
    fragment: JsonFragmentUpdate,
    publishing: MessagePublishing<P>,
    transformation: MessageTransformation,
    function_call: FunctionCall,
}

impl<P: Publish> Pipeline<P> {
    pub fn new(configured_functions: Vec<FunctionContract>, publisher: P) -> Self {
        Self {
            tool_call_injection: ToolCallInjection::new(configured_functions),
            joiner: MessageUpdateJoiner::new(),
            fragment: JsonFragmentUpdate::new(),
            publishing: MessagePublishing::new(publisher),
            transformation: MessageTransformation::new(),
            function_call: FunctionCall::new(),
        }
    }

    /// Upstream pass: prepares generation options before the provider call.
    pub fn prepare_upstream(&mut self, ctx: &mut PipelineContext) {
        self.tool_call_injection.apply_upstream(ctx);
    }

    /// Runs a message that the joiner emitted through fragment decoration and
    /// then publishing, in that order.
    async fn decorate_and_publish(&mut self, message: MessageBody) -> MessageBody {
        let decorated = self.fragment.process_downstream(message);
        self.publishing.process_downstream(decorated).await
    }

    /// Downstream pass over one raw message emitted by the provider adapter.
    pub async fn process_downstream(&mut self, ctx: &mut PipelineContext, raw: MessageBody) -> DownstreamResult {
        let joined = self.joiner.process_downstream(raw);
        self.settle(ctx, joined.for_caller, joined.for_history.is_some()).await
    }

    /// Flush any in-progress update join at generation end (e.g. after the
    /// provider's terminal `UsageMessage`).
    pub async fn finish(&mut self, ctx: &mut PipelineContext) -> DownstreamResult {
        let joined = self.joiner.flush();
        self.settle(ctx, joined.for_caller, joined.for_history.is_some()).await
    }

    /// Runs every message the joiner emitted through fragment decoration,
    /// publishing, and order-idx assignment exactly once. The joiner places
    /// a finalized join (when one occurred) at index 0 of `for_caller`
    /// followed by any new raw update, so that same decorated/published/
    /// ordered copy is reused for `for_history` rather than reprocessed.
    async fn settle(&mut self, ctx: &mut PipelineContext, raw_for_caller: Vec<MessageBody>, has_history: bool) -> DownstreamResult {
        let mut for_caller = Vec::with_capacity(raw_for_caller.len());
        for message in raw_for_caller {
            let published = self.decorate_and_publish(message).await;
            for_caller.push(self.transformation.assign_order_idx(ctx, published));
        }

        let for_history = has_history.then(|| for_caller[0].clone());

        DownstreamResult { for_caller, for_history }
    }

    /// Calls from this batch that the agent loop should schedule for local
    /// execution on the next turn.
    pub fn calls_to_schedule<'a>(&self, messages: &'a [MessageBody]) -> Vec<&'a agentcore_domain::message::ToolCall> {
        self.function_call.calls_to_schedule(messages)
    }

    /// Aggregate a batch of tool call/result messages for provider replay
    /// (upstream `MessageTransformation` behavior), e.g. when rebuilding the
    /// message list for the next turn from stored history.
    pub fn aggregate_for_replay(&mut self, messages: Vec<MessageBody>) -> Vec<MessageBody> {
        self.transformation.apply_upstream(messages)
    }
}
