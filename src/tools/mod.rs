//! # Tools
//!
//! Table-driven tool descriptions, argument access and the [`ToolSet`] trait
//! implemented by every API client and by the playbook tools.

pub mod playbooks;
pub mod registry;

pub use playbooks::PlaybookTools;
pub use registry::ClientRegistry;

use crate::client::ApiResponse;
use crate::{Error, Result};
use async_trait::async_trait;
use serde_json::{json, Map, Value};

/// JSON type of a tool parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Integer,
    Boolean,
    /// Array of strings; a comma-separated string is accepted too
    StringList,
    Object,
}

impl ParamKind {
    fn schema(self) -> Value {
        match self {
            Self::String => json!({"type": "string"}),
            Self::Integer => json!({"type": "integer"}),
            Self::Boolean => json!({"type": "boolean"}),
            Self::StringList => json!({"type": "array", "items": {"type": "string"}}),
            Self::Object => json!({"type": "object"}),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
    pub description: &'static str,
}

impl ParamSpec {
    #[must_use]
    pub const fn required(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: true,
            description,
        }
    }

    #[must_use]
    pub const fn optional(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: false,
            description,
        }
    }
}

/// Name, description and parameters of one callable tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub params: Vec<ParamSpec>,
}

impl ToolSpec {
    #[must_use]
    pub const fn new(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            params: Vec::new(),
        }
    }

    #[must_use]
    pub fn param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    #[must_use]
    pub fn required(self, name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        self.param(ParamSpec::required(name, kind, description))
    }

    #[must_use]
    pub fn optional(self, name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        self.param(ParamSpec::optional(name, kind, description))
    }

    /// JSON Schema object describing the tool's arguments
    #[must_use]
    pub fn input_schema(&self) -> Map<String, Value> {
        let mut properties = Map::new();
        for param in &self.params {
            let mut schema = param.kind.schema();
            if let Value::Object(ref mut fields) = schema {
                fields.insert("description".to_string(), Value::from(param.description));
            }
            properties.insert(param.name.to_string(), schema);
        }

        let required: Vec<Value> = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| Value::from(p.name))
            .collect();

        let mut schema = Map::new();
        schema.insert("type".to_string(), Value::from("object"));
        schema.insert("properties".to_string(), Value::Object(properties));
        if !required.is_empty() {
            schema.insert("required".to_string(), Value::Array(required));
        }
        schema
    }
}

/// Typed access to a tool call's JSON arguments
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolArgs(Map<String, Value>);

impl ToolArgs {
    #[must_use]
    pub const fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Accept an object or `null`
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::default()),
            other => Err(Error::invalid_input(
                "arguments",
                format!("expected a JSON object, got {other}"),
            )),
        }
    }

    #[must_use]
    pub fn raw(&self, name: &str) -> Option<&Value> {
        self.0.get(name).filter(|v| !v.is_null())
    }

    /// Required, non-empty string
    pub fn str(&self, name: &str) -> Result<String> {
        self.opt_str(name)?
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| Error::invalid_input(name, "missing required argument"))
    }

    pub fn opt_str(&self, name: &str) -> Result<Option<String>> {
        match self.raw(name) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(Value::Number(n)) => Ok(Some(n.to_string())),
            Some(other) => Err(Error::invalid_input(
                name,
                format!("expected a string, got {other}"),
            )),
        }
    }

    pub fn str_or(&self, name: &str, default: &str) -> Result<String> {
        Ok(self.opt_str(name)?.unwrap_or_else(|| default.to_string()))
    }

    /// Non-negative integer; numeric strings are accepted
    pub fn opt_int(&self, name: &str) -> Result<Option<u64>> {
        match self.raw(name) {
            None => Ok(None),
            Some(Value::Number(n)) => n
                .as_u64()
                .map(Some)
                .ok_or_else(|| Error::invalid_input(name, "expected a non-negative integer")),
            Some(Value::String(s)) => s
                .trim()
                .parse::<u64>()
                .map(Some)
                .map_err(|_| Error::invalid_input(name, format!("expected an integer, got '{s}'"))),
            Some(other) => Err(Error::invalid_input(
                name,
                format!("expected an integer, got {other}"),
            )),
        }
    }

    pub fn int_or(&self, name: &str, default: u64) -> Result<u64> {
        Ok(self.opt_int(name)?.unwrap_or(default))
    }

    pub fn opt_bool(&self, name: &str) -> Result<Option<bool>> {
        match self.raw(name) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(Value::String(s)) if s.eq_ignore_ascii_case("true") => Ok(Some(true)),
            Some(Value::String(s)) if s.eq_ignore_ascii_case("false") => Ok(Some(false)),
            Some(other) => Err(Error::invalid_input(
                name,
                format!("expected a boolean, got {other}"),
            )),
        }
    }

    /// Array of strings or a comma-separated string; empty entries are dropped
    pub fn opt_list(&self, name: &str) -> Result<Option<Vec<String>>> {
        let items: Vec<String> = match self.raw(name) {
            None => return Ok(None),
            Some(Value::String(s)) => s.split(',').map(|p| p.trim().to_string()).collect(),
            Some(Value::Array(values)) => values
                .iter()
                .map(|v| match v {
                    Value::String(s) => Ok(s.trim().to_string()),
                    Value::Number(n) => Ok(n.to_string()),
                    other => Err(Error::invalid_input(
                        name,
                        format!("expected a list of strings, found {other}"),
                    )),
                })
                .collect::<Result<_>>()?,
            Some(other) => {
                return Err(Error::invalid_input(
                    name,
                    format!("expected a list of strings, got {other}"),
                ))
            }
        };
        Ok(Some(items.into_iter().filter(|s| !s.is_empty()).collect()))
    }

    /// Required, non-empty list
    pub fn list(&self, name: &str) -> Result<Vec<String>> {
        self.opt_list(name)?
            .filter(|items| !items.is_empty())
            .ok_or_else(|| Error::invalid_input(name, "missing required argument"))
    }

    /// Any JSON object argument
    pub fn opt_object(&self, name: &str) -> Result<Option<Map<String, Value>>> {
        match self.raw(name) {
            None => Ok(None),
            Some(Value::Object(map)) => Ok(Some(map.clone())),
            Some(other) => Err(Error::invalid_input(
                name,
                format!("expected an object, got {other}"),
            )),
        }
    }
}

impl From<Map<String, Value>> for ToolArgs {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// A group of tools served by one owner, typically an API client.
///
/// Implementations are not expected to tolerate concurrent calls; the
/// [`ClientRegistry`] serializes access to each set.
#[async_trait]
pub trait ToolSet: Send {
    /// Group name used in logs
    fn name(&self) -> &str;

    /// Every tool this set answers
    fn tool_specs(&self) -> Vec<ToolSpec>;

    /// Run one tool. Unknown names yield [`Error::UnknownTool`].
    async fn call_tool(&mut self, name: &str, args: &ToolArgs) -> Result<ApiResponse>;

    /// Release held resources
    fn close(&mut self) {}
}

/// Clamp a caller-supplied page size to an upstream maximum
#[must_use]
pub fn clamp_limit(limit: u64, max: u64) -> u64 {
    limit.clamp(1, max)
}
