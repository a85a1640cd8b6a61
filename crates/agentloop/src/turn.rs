//! Drives one provider turn: streams `chat_stream` through the pipeline,
//! publishing every message to real subscribers as soon as the pipeline
//! hands back its assigned order index, while collecting the finalized
//! messages that belong in durable history and any local tool calls the
//! provider asked to run.

use agentcore_domain::ids::{GenerationId, MessageOrderIdx, RunId, ThreadId};
use agentcore_domain::message::{Envelope, MessageBody, ToolCall};
use agentcore_domain::Result;
use agentcore_pipeline::{DownstreamResult, Pipeline, PipelineContext};
use agentcore_providers::{ChatRequest, LlmProvider};
use agentcore_pubsub::Publisher;
use agentcore_tools::Dispatcher;
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::publish::NoopPublish;

/// What one turn produced: messages ready to append to the thread's
/// history in order, and whether the provider emitted any tool calls this
/// loop is responsible for dispatching before the next turn can start.
pub struct TurnOutcome {
    pub history_appends: Vec<MessageBody>,
    pub had_tool_calls: bool,
}

pub struct TurnContext<'a> {
    pub thread_id: ThreadId,
    pub run_id: RunId,
    pub generation_id: GenerationId,
    pub publisher: &'a Publisher,
    pub dispatcher: &'a Dispatcher,
    pub cancel: &'a CancellationToken,
}

pub async fn run_turn(
    pctx: &mut PipelineContext,
    pipeline: &mut Pipeline<NoopPublish>,
    provider: &dyn LlmProvider,
    request: ChatRequest,
    turn: &TurnContext<'_>,
) -> Result<TurnOutcome> {
    pipeline.prepare_upstream(pctx);

    let mut all_caller_messages = Vec::new();
    let mut history_appends = Vec::new();

    let mut stream = provider.chat_stream(request).await?;
    loop {
        tokio::select! {
            _ = turn.cancel.cancelled() => break,
            next = stream.next() => {
                match next {
                    None => break,
                    Some(raw) => {
                        let raw = raw?;
                        let result = pipeline.process_downstream(pctx, raw).await;
                        settle(turn, &mut all_caller_messages, &mut history_appends, result).await;
                    }
                }
            }
        }
    }
    let final_result = pipeline.finish(pctx).await;
    settle(turn, &mut all_caller_messages, &mut history_appends, final_result).await;

    let local_calls: Vec<ToolCall> = pipeline
        .calls_to_schedule(&all_caller_messages)
        .into_iter()
        .cloned()
        .collect();
    let had_tool_calls = !local_calls.is_empty();

    if had_tool_calls {
        dispatch_tool_calls(pctx, pipeline, turn, local_calls, &mut history_appends).await;
    }

    Ok(TurnOutcome { history_appends, had_tool_calls })
}

async fn settle(
    turn: &TurnContext<'_>,
    all_caller_messages: &mut Vec<MessageBody>,
    history_appends: &mut Vec<MessageBody>,
    result: DownstreamResult,
) {
    for (order_idx, message) in result.for_caller {
        all_caller_messages.push(message.clone());
        publish_one(turn, order_idx, message).await;
    }
    if let Some((_, message)) = result.for_history {
        history_appends.push(message);
    }
}

async fn publish_one(turn: &TurnContext<'_>, order_idx: MessageOrderIdx, message: MessageBody) {
    let envelope = Envelope::new(turn.thread_id, turn.run_id, turn.generation_id, order_idx, message);
    turn.publisher.publish(turn.thread_id, envelope, turn.cancel).await;
}

/// Executes every call the provider asked this loop to run, publishing and
/// appending each `ToolCallResultMessage` the instant its own call finishes
/// rather than waiting for the slowest one in the batch.
async fn dispatch_tool_calls(
    pctx: &mut PipelineContext,
    pipeline: &mut Pipeline<NoopPublish>,
    turn: &TurnContext<'_>,
    calls: Vec<ToolCall>,
    history_appends: &mut Vec<MessageBody>,
) {
    // `Dispatcher::dispatch` already returns each result in completion
    // order (it pushes as `join_next` resolves); publishing from that
    // order here gives the "as soon as its own call finishes" behavior
    // without needing the pipeline's `&mut` borrow inside its sync
    // `on_result` callback.
    let results = turn.dispatcher.dispatch(calls, |_| {}).await;

    let mut discard = Vec::new();
    for result in results {
        let raw = MessageBody::ToolCallResultMessage { result };
        let processed = pipeline.process_downstream(pctx, raw).await;
        settle(turn, &mut discard, history_appends, processed).await;
    }
}
