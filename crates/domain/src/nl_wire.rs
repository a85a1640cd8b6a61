//! Natural-language/XML-style transcript encoding for a completed tool-call
//! turn. Providers in this repository only exchange flat `role + text`
//! chat history (see `agentcore_providers::ChatMessage`), so a finished
//! `ToolsCallAggregateMessage` is folded into this wire format before being
//! replayed back to a provider as part of conversation history.
//!
//! ```text
//! <tool_call name="FUNCTION">
//! <pretty JSON args>
//! </tool_call>
//! <tool_response name="FUNCTION">
//! <result, pretty JSON if parseable else raw>
//! </tool_response>
//! ```
//! Multiple pairs are separated by a line containing exactly `---`.

use regex::Regex;

use crate::ids::ToolCallId;
use crate::message::{ExecutionTarget, ToolCall, ToolResult};

const SEPARATOR: &str = "\n---\n";

pub fn to_nl_text(tool_calls: &[ToolCall], results: &[ToolResult]) -> String {
    let blocks: Vec<String> = tool_calls
        .iter()
        .map(|call| {
            let mut block = format!(
                "<tool_call name=\"{}\">\n{}\n</tool_call>",
                call.function_name,
                pretty_json_or_raw(&call.function_args)
            );
            if let Some(result) = results.iter().find(|r| r.tool_call_id == call.tool_call_id) {
                block.push('\n');
                block.push_str(&format!(
                    "<tool_response name=\"{}\">\n{}\n</tool_response>",
                    result.tool_name,
                    pretty_json_or_raw(&result.result)
                ));
            }
            block
        })
        .collect();
    blocks.join(SEPARATOR)
}

fn pretty_json_or_raw(raw: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(value) => serde_json::to_string_pretty(&value).unwrap_or_else(|_| raw.to_string()),
        Err(_) => raw.to_string(),
    }
}

fn block_pattern() -> Regex {
    Regex::new(
        r#"(?s)<tool_call name="(?P<call_name>[^"]*)">\n(?P<call_body>.*?)\n</tool_call>(?:\n<tool_response name="(?P<resp_name>[^"]*)">\n(?P<resp_body>.*?)\n</tool_response>)?"#,
    )
    .expect("tool wire format pattern always compiles")
}

/// Parse text produced by [`to_nl_text`] back into call/result pairs. The
/// wire format carries no `toolCallId`, so a fresh one is minted per pair —
/// shared between a call and its response within that pair.
pub fn parse_nl_text(text: &str) -> Option<(Vec<ToolCall>, Vec<ToolResult>)> {
    let pattern = block_pattern();
    let mut calls = Vec::new();
    let mut results = Vec::new();

    for (index, block) in text.split(SEPARATOR).enumerate() {
        let captures = pattern.captures(block)?;
        let tool_call_id = ToolCallId::new();
        calls.push(ToolCall {
            tool_call_id,
            function_name: captures["call_name"].to_string(),
            function_args: captures["call_body"].to_string(),
            execution_target: ExecutionTarget::LocalFunction,
            index: index as u32,
        });
        if let (Some(resp_name), Some(resp_body)) = (captures.name("resp_name"), captures.name("resp_body")) {
            results.push(ToolResult {
                tool_call_id,
                tool_name: resp_name.as_str().to_string(),
                result: resp_body.as_str().to_string(),
                is_error: false,
                execution_target: ExecutionTarget::LocalFunction,
            });
        }
    }

    if calls.is_empty() {
        None
    } else {
        Some((calls, results))
    }
}
