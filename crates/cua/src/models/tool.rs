use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// A tool declared to the model.
///
/// Computer use tools are defined by the endpoint itself and only need a versioned type
/// and a name, plus a few options such as the display size. Custom tools carry their own
/// JSON schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Tool {
    Custom {
        name: String,
        description: String,
        input_schema: Value,
    },
    BuiltIn {
        #[serde(rename = "type")]
        api_type: String,
        name: String,
        #[serde(flatten)]
        options: Map<String, Value>,
    },
}

impl Tool {
    /// Declare an endpoint-defined tool such as `bash_20250124`
    pub fn builtin<T: Into<String>, N: Into<String>>(api_type: T, name: N) -> Self {
        Tool::BuiltIn {
            api_type: api_type.into(),
            name: name.into(),
            options: Map::new(),
        }
    }

    /// Declare a tool by its input schema
    pub fn custom<N, D>(name: N, description: D, input_schema: Value) -> Self
    where
        N: Into<String>,
        D: Into<String>,
    {
        Tool::Custom {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }

    /// Attach an extra declaration field. Ignored for custom tools, whose shape is fixed.
    pub fn with_option<K: Into<String>>(mut self, key: K, value: Value) -> Self {
        if let Tool::BuiltIn { options, .. } = &mut self {
            options.insert(key.into(), value);
        }
        self
    }

    pub fn name(&self) -> &str {
        match self {
            Tool::Custom { name, .. } | Tool::BuiltIn { name, .. } => name,
        }
    }

    /// The declaration as sent in the `tools` array of a request
    pub fn to_params(&self) -> Value {
        match self {
            Tool::Custom {
                name,
                description,
                input_schema,
            } => json!({
                "name": name,
                "description": description,
                "input_schema": input_schema,
            }),
            Tool::BuiltIn {
                api_type,
                name,
                options,
            } => {
                let mut params = options.clone();
                params.insert("type".to_string(), json!(api_type));
                params.insert("name".to_string(), json!(name));
                Value::Object(params)
            }
        }
    }
}

/// The outcome of a single tool invocation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Base64 encoded PNG, typically a screenshot taken after the action
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base64_image: Option<String>,
    /// Out of band notice for the model, rendered ahead of the output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
}

impl ToolResult {
    pub fn output<S: Into<String>>(output: S) -> Self {
        Self {
            output: Some(output.into()),
            ..Default::default()
        }
    }

    pub fn error<S: Into<String>>(error: S) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn with_image<S: Into<String>>(mut self, base64_image: S) -> Self {
        self.base64_image = Some(base64_image.into());
        self
    }

    pub fn with_system<S: Into<String>>(mut self, system: S) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.output.is_none()
            && self.error.is_none()
            && self.base64_image.is_none()
            && self.system.is_none()
    }

    /// Prefix text with the system notice, if any
    pub(crate) fn with_system_prefix(&self, text: &str) -> String {
        match &self.system {
            Some(system) => format!("<system>{}</system>\n{}", system, text),
            None => text.to_string(),
        }
    }
}
