// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use conv_types::FinishReason;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `{ message }` — mirrors `lalia.functions.types.Error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Error {
    pub message: String,
}

/// `{ name, arguments, value?, error?, finish_reason }` (spec §3).
/// Invariant: exactly one of `value`/`error` is populated, enforced by the
/// `ok`/`error` constructors rather than by the type system, matching the
/// source's runtime-checked `to_string` branch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCallResult {
    pub name: String,
    pub arguments: Map<String, Value>,
    pub value: Option<Value>,
    pub error: Option<Error>,
    pub finish_reason: FinishReason,
}

impl FunctionCallResult {
    pub fn ok(name: impl Into<String>, arguments: Map<String, Value>, value: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
            value: Some(value),
            error: None,
            finish_reason: FinishReason::Delegate,
        }
    }

    pub fn error(
        name: impl Into<String>,
        arguments: Map<String, Value>,
        error: Error,
        finish_reason: FinishReason,
    ) -> Self {
        Self {
            name: name.into(),
            arguments,
            value: None,
            error: Some(error),
            finish_reason,
        }
    }

    /// Renders the outcome as message content: the value as a string (JSON
    /// values are pretty-printed unless already a plain string), or
    /// `"Error: {message}"` (mirrors `FunctionCallResult.to_string`).
    pub fn to_content_string(&self) -> String {
        match (&self.error, &self.value) {
            (None, Some(Value::String(s))) => s.clone(),
            (None, Some(v)) => serde_json::to_string_pretty(v).unwrap_or_default(),
            (None, None) => String::new(),
            (Some(e), None) => format!("Error: {}", e.message),
            (Some(_), Some(_)) => unreachable!("FunctionCallResult carries both value and error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_value_passes_through() {
        let r = FunctionCallResult::ok("f", Map::new(), Value::String("hi".into()));
        assert_eq!(r.to_content_string(), "hi");
    }

    #[test]
    fn object_values_are_pretty_printed() {
        let r = FunctionCallResult::ok("f", Map::new(), serde_json::json!({"a": 1}));
        assert_eq!(r.to_content_string(), "{\n  \"a\": 1\n}");
    }

    #[test]
    fn error_is_prefixed() {
        let r = FunctionCallResult::error(
            "f",
            Map::new(),
            Error { message: "bad".into() },
            FinishReason::FunctionCallError,
        );
        assert_eq!(r.to_content_string(), "Error: bad");
    }
}
