use agentcore_domain::capability::{ModelCapabilities, ReasoningKind, ToolSupport};

pub fn anthropic_capabilities() -> ModelCapabilities {
    ModelCapabilities {
        max_context_tokens: 200_000,
        max_output_tokens: 8_192,
        supports_vision: true,
        supports_tools: ToolSupport::StrictJson,
        supports_parallel_tool_calls: true,
        supports_tool_choice: true,
        supports_nested_params: true,
        supports_json_mode: false,
        supports_json_schema: false,
        reasoning: ReasoningKind::Anthropic,
        supports_streaming: true,
        preview: false,
        deprecated: false,
    }
}

pub fn openai_compat_capabilities() -> ModelCapabilities {
    ModelCapabilities {
        max_context_tokens: 128_000,
        max_output_tokens: 4_096,
        supports_vision: true,
        supports_tools: ToolSupport::Basic,
        supports_parallel_tool_calls: true,
        supports_tool_choice: true,
        supports_nested_params: true,
        supports_json_mode: true,
        supports_json_schema: true,
        reasoning: ReasoningKind::Openai,
        supports_streaming: true,
        preview: false,
        deprecated: false,
    }
}
