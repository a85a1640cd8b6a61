//! Declarative tool shape: a `FunctionContract` is the provider-agnostic
//! description of one callable function; `to_json_schema` renders it into the
//! wire shape providers expect for tool/function declarations.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterSpec {
    pub name: String,
    pub schema_type: String,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Full JSON Schema fragment for this parameter (enum, items, properties,
    /// etc). When present it is used verbatim instead of `schema_type` alone.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
}

impl ParameterSpec {
    pub fn new(name: impl Into<String>, schema_type: impl Into<String>, required: bool) -> Self {
        Self {
            name: name.into(),
            schema_type: schema_type.into(),
            required,
            default: None,
            description: None,
            schema: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    fn property_schema(&self) -> Value {
        if let Some(schema) = &self.schema {
            return schema.clone();
        }
        let mut obj = json!({ "type": self.schema_type });
        if let Some(desc) = &self.description {
            obj["description"] = json!(desc);
        }
        if let Some(default) = &self.default {
            obj["default"] = default.clone();
        }
        obj
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionContract {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParameterSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_description: Option<String>,
}

impl FunctionContract {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
            return_type: None,
            return_description: None,
        }
    }

    pub fn with_parameter(mut self, param: ParameterSpec) -> Self {
        self.parameters.push(param);
        self
    }

    /// Render this contract's parameters into a JSON Schema object suitable
    /// for a provider's `tools[].input_schema` / `function.parameters` field.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();
        for param in &self.parameters {
            properties.insert(param.name.clone(), param.property_schema());
            if param.required {
                required.push(param.name.clone());
            }
        }
        json!({
            "type": "object",
            "properties": Value::Object(properties),
            "required": required,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_lists_required_params() {
        let contract = FunctionContract::new("get_weather", "Look up the weather")
            .with_parameter(ParameterSpec::new("city", "string", true))
            .with_parameter(ParameterSpec::new("units", "string", false));
        let schema = contract.to_json_schema();
        assert_eq!(schema["required"], json!(["city"]));
        assert_eq!(schema["properties"]["city"]["type"], json!("string"));
        assert_eq!(schema["properties"]["units"]["type"], json!("string"));
    }

    #[test]
    fn schema_with_no_parameters_has_empty_properties() {
        let contract = FunctionContract::new("ping", "no-op");
        let schema = contract.to_json_schema();
        assert_eq!(schema["properties"], json!({}));
        assert_eq!(schema["required"], json!([]));
    }

    #[test]
    fn explicit_schema_overrides_type_inference() {
        let param = ParameterSpec::new("mode", "string", true).with_description("mode");
        let mut param = param;
        param.schema = Some(json!({ "type": "string", "enum": ["fast", "slow"] }));
        let contract = FunctionContract::new("set_mode", "set mode").with_parameter(param);
        let schema = contract.to_json_schema();
        assert_eq!(schema["properties"]["mode"]["enum"], json!(["fast", "slow"]));
    }
}
