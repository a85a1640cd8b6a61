//! Provider capability profile — what a model can do, used by the pipeline
//! and the gateway to decide whether a request is even meaningful to send.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolSupport {
    None,
    Basic,
    StrictJson,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningKind {
    None,
    Anthropic,
    Deepseek,
    Openai,
    Custom,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelCapabilities {
    pub max_context_tokens: u32,
    pub max_output_tokens: u32,
    pub supports_vision: bool,
    pub supports_tools: ToolSupport,
    pub supports_parallel_tool_calls: bool,
    pub supports_tool_choice: bool,
    pub supports_nested_params: bool,
    pub supports_json_mode: bool,
    pub supports_json_schema: bool,
    pub reasoning: ReasoningKind,
    pub supports_streaming: bool,
    pub preview: bool,
    pub deprecated: bool,
}

impl Default for ModelCapabilities {
    fn default() -> Self {
        Self {
            max_context_tokens: 8_192,
            max_output_tokens: 4_096,
            supports_vision: false,
            supports_tools: ToolSupport::None,
            supports_parallel_tool_calls: false,
            supports_tool_choice: false,
            supports_nested_params: false,
            supports_json_mode: false,
            supports_json_schema: false,
            reasoning: ReasoningKind::None,
            supports_streaming: true,
            preview: false,
            deprecated: false,
        }
    }
}

impl ModelCapabilities {
    /// Evaluate a comma-separated list of capability names conjunctively:
    /// `"tools,streaming"` is true iff every named capability holds.
    pub fn has_capability(&self, names: &str) -> bool {
        names
            .split(',')
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .all(|name| self.has_single_capability(name))
    }

    fn has_single_capability(&self, name: &str) -> bool {
        match name {
            "vision" => self.supports_vision,
            "tools" => !matches!(self.supports_tools, ToolSupport::None),
            "tools.strict_json" => matches!(self.supports_tools, ToolSupport::StrictJson),
            "tools.parallel" => self.supports_parallel_tool_calls,
            "tools.choice" => self.supports_tool_choice,
            "tools.nested_params" => self.supports_nested_params,
            "json_mode" => self.supports_json_mode,
            "json_schema" => self.supports_json_schema,
            "streaming" => self.supports_streaming,
            "reasoning" => !matches!(self.reasoning, ReasoningKind::None),
            "preview" => self.preview,
            "deprecated" => self.deprecated,
            _ => false,
        }
    }
}

/// The role a model plays when the router selects a provider for a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelRole {
    Planner,
    Executor,
    Summarizer,
    Embedder,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps() -> ModelCapabilities {
        ModelCapabilities {
            supports_vision: true,
            supports_tools: ToolSupport::StrictJson,
            supports_streaming: true,
            ..ModelCapabilities::default()
        }
    }

    #[test]
    fn single_capability_matches() {
        assert!(caps().has_capability("vision"));
        assert!(!caps().has_capability("json_mode"));
    }

    #[test]
    fn comma_separated_is_conjunctive() {
        assert!(caps().has_capability("vision,tools,streaming"));
        assert!(!caps().has_capability("vision,json_mode"));
    }

    #[test]
    fn unknown_capability_name_is_false() {
        assert!(!caps().has_capability("teleportation"));
    }

    #[test]
    fn empty_list_is_vacuously_true() {
        assert!(caps().has_capability(""));
    }

    #[test]
    fn strict_json_implies_tools() {
        assert!(caps().has_capability("tools"));
        assert!(caps().has_capability("tools.strict_json"));
    }
}
