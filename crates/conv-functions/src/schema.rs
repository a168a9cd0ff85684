// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::FunctionsError;

/// JSON-Schema keyword vocabulary a parameter annotation can produce
/// (spec §4.4): `type`, `enum`, `items`, `anyOf`/`allOf`/`oneOf`/`not`,
/// `minimum`/`maximum`, `minLength`/`maxLength`, `pattern`, `format`,
/// `minItems`/`maxItems`, `required`, `additionalProperties`, `default`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Prop {
    #[serde(rename = "string")]
    String {
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        r#enum: Option<Vec<String>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        min_length: Option<usize>,
        #[serde(skip_serializing_if = "Option::is_none")]
        max_length: Option<usize>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pattern: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        format: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        default: Option<Value>,
    },
    #[serde(rename = "number")]
    Number {
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        minimum: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        maximum: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        default: Option<Value>,
    },
    #[serde(rename = "boolean")]
    Boolean {
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        default: Option<Value>,
    },
    #[serde(rename = "null")]
    Null {
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    #[serde(rename = "array")]
    Array {
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        items: Option<Box<Prop>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        min_items: Option<usize>,
        #[serde(skip_serializing_if = "Option::is_none")]
        max_items: Option<usize>,
    },
    #[serde(rename = "object")]
    Object(PropObject),
    #[serde(rename = "anyOf")]
    AnyOf { any_of: Vec<Prop> },
    #[serde(rename = "allOf")]
    AllOf { all_of: Vec<Prop> },
    #[serde(rename = "oneOf")]
    OneOf { one_of: Vec<Prop> },
    #[serde(rename = "not")]
    Not { not: Box<Prop> },
}

/// The parameters object itself: `{ type: "object", properties, required,
/// additionalProperties: false }` (spec §4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropObject {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub properties: BTreeMap<String, Prop>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub required: Vec<String>,
    #[serde(default = "default_false")]
    pub additional_properties: bool,
}

fn default_false() -> bool {
    false
}

impl PropObject {
    pub fn new() -> Self {
        Self {
            description: None,
            properties: BTreeMap::new(),
            required: Vec::new(),
            additional_properties: false,
        }
    }

    pub fn any_object() -> Self {
        let mut obj = Self::new();
        obj.additional_properties = true;
        obj
    }

    pub fn with_property(mut self, name: impl Into<String>, prop: Prop, required: bool) -> Self {
        let name = name.into();
        if required {
            self.required.push(name.clone());
        }
        self.properties.insert(name, prop);
        self
    }
}

impl Default for PropObject {
    fn default() -> Self {
        Self::new()
    }
}

/// Wire form handed to the LLM client: `{name, description, parameters}`
/// (spec §4.4, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolSchema {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: &PropObject) -> Self {
        let parameters = flatten_refs(serde_json::to_value(parameters).unwrap_or(Value::Null));
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// Flattens `$ref` indirections out of a produced schema before it leaves
/// the registry (spec §4.4). Schemas built directly from [`Prop`] never
/// contain `$ref`s, so this degenerates to inlining any that a caller
/// nonetheless embeds in a hand-built `Value`.
pub fn flatten_refs(schema: Value) -> Value {
    fn walk(value: &mut Value, defs: &Map<String, Value>) {
        match value {
            Value::Object(map) => {
                if let Some(Value::String(r)) = map.get("$ref").cloned() {
                    if let Some(name) = r.strip_prefix("#/$defs/").or_else(|| r.strip_prefix("#/definitions/")) {
                        if let Some(target) = defs.get(name) {
                            *value = target.clone();
                            walk(value, defs);
                            return;
                        }
                    }
                }
                for v in map.values_mut() {
                    walk(v, defs);
                }
            }
            Value::Array(items) => {
                for v in items.iter_mut() {
                    walk(v, defs);
                }
            }
            _ => {}
        }
    }

    let defs = schema
        .get("$defs")
        .or_else(|| schema.get("definitions"))
        .and_then(|v| v.as_object())
        .cloned()
        .unwrap_or_default();

    let mut schema = schema;
    walk(&mut schema, &defs);
    if let Value::Object(map) = &mut schema {
        map.remove("$defs");
        map.remove("definitions");
    }
    schema
}

/// Minimal structural validation against a [`PropObject`]: presence of
/// required properties and, where declared, `type` agreement. Not a full
/// JSON-Schema validator — the repair loop in `conv-parser` is what
/// actually recovers from malformed model output; this guards native
/// invocation against obviously-wrong shapes.
pub fn validate(schema: &PropObject, value: &Value) -> Result<(), FunctionsError> {
    let obj = value
        .as_object()
        .ok_or_else(|| FunctionsError::Validation("arguments must be a JSON object".into()))?;

    for name in &schema.required {
        if !obj.contains_key(name) {
            return Err(FunctionsError::Validation(format!("missing required argument '{name}'")));
        }
    }

    for (name, value) in obj {
        if let Some(prop) = schema.properties.get(name) {
            validate_prop(name, prop, value)?;
        } else if !schema.additional_properties {
            return Err(FunctionsError::Validation(format!("unexpected argument '{name}'")));
        }
    }

    Ok(())
}

fn validate_prop(name: &str, prop: &Prop, value: &Value) -> Result<(), FunctionsError> {
    let ok = match prop {
        Prop::String { r#enum, .. } => {
            value.is_string()
                && r#enum
                    .as_ref()
                    .map(|allowed| allowed.iter().any(|e| Some(e.as_str()) == value.as_str()))
                    .unwrap_or(true)
        }
        Prop::Number { .. } => value.is_number(),
        Prop::Boolean { .. } => value.is_boolean(),
        Prop::Null { .. } => value.is_null(),
        Prop::Array { .. } => value.is_array(),
        Prop::Object(inner) => return validate(inner, value).map_err(|e| {
            FunctionsError::Validation(format!("argument '{name}': {e}"))
        }),
        Prop::AnyOf { any_of } => any_of.iter().any(|p| validate_prop(name, p, value).is_ok()),
        Prop::AllOf { all_of } => all_of.iter().all(|p| validate_prop(name, p, value).is_ok()),
        Prop::OneOf { one_of } => {
            one_of.iter().filter(|p| validate_prop(name, p, value).is_ok()).count() == 1
        }
        Prop::Not { not } => validate_prop(name, not, value).is_err(),
    };

    if ok {
        Ok(())
    } else {
        Err(FunctionsError::Validation(format!("argument '{name}' has the wrong type")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> PropObject {
        PropObject::new()
            .with_property(
                "a",
                Prop::Number {
                    description: None,
                    minimum: None,
                    maximum: None,
                    default: None,
                },
                true,
            )
            .with_property(
                "b",
                Prop::String {
                    description: None,
                    r#enum: None,
                    min_length: None,
                    max_length: None,
                    pattern: None,
                    format: None,
                    default: Some(json!("test")),
                },
                false,
            )
    }

    #[test]
    fn validates_required_and_types() {
        assert!(validate(&schema(), &json!({"a": 1})).is_ok());
        assert!(validate(&schema(), &json!({"b": "x"})).is_err());
        assert!(validate(&schema(), &json!({"a": "x"})).is_err());
    }

    #[test]
    fn rejects_unexpected_property_when_closed() {
        assert!(validate(&schema(), &json!({"a": 1, "c": 2})).is_err());
    }

    #[test]
    fn flattens_simple_ref() {
        let raw = json!({
            "$defs": {"Foo": {"type": "string"}},
            "type": "object",
            "properties": {"x": {"$ref": "#/$defs/Foo"}}
        });
        let flat = flatten_refs(raw);
        assert_eq!(flat["properties"]["x"]["type"], "string");
        assert!(flat.get("$defs").is_none());
    }
}
