// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod error;
mod registry;
mod result;
mod schema;

pub use error::FunctionsError;
pub use registry::{CallableRef, CallableRegistry, FunctionRegistry};
pub use result::{Error, FunctionCallResult};
pub use schema::{flatten_refs, validate, Prop, PropObject, ToolSchema};

use std::sync::Arc;

use serde_json::Value;

/// A registered, invocable tool (spec §4.4). `NativeFunction` and
/// `CallableInstance`-backed tools both implement this.
pub trait Function: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters_schema(&self) -> &PropObject;
    fn invoke(&self, arguments: Value) -> Result<Value, FunctionsError>;
}

/// Wraps a plain Rust closure as a [`Function`]. Rust has no runtime
/// doc-string reflection, so name/description/schema are supplied at
/// registration time rather than derived from source (see DESIGN.md).
pub struct NativeFunction {
    name: String,
    description: String,
    parameters: PropObject,
    callback: Box<dyn Fn(Value) -> Result<Value, FunctionsError> + Send + Sync>,
}

impl NativeFunction {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: PropObject,
        callback: impl Fn(Value) -> Result<Value, FunctionsError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            callback: Box::new(callback),
        }
    }
}

impl Function for NativeFunction {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> &PropObject {
        &self.parameters
    }

    fn invoke(&self, arguments: Value) -> Result<Value, FunctionsError> {
        (self.callback)(arguments)
    }
}

/// A "callable-like" tool: a struct whose invocation operator exposes the
/// instance type's class name as the function's name (spec §4.4).
pub trait CallableInstance: Send + Sync {
    fn type_name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters_schema(&self) -> &PropObject;
    fn call(&self, arguments: Value) -> Result<Value, FunctionsError>;
}

struct CallableInstanceAdapter<C: CallableInstance>(C);

impl<C: CallableInstance> Function for CallableInstanceAdapter<C> {
    fn name(&self) -> &str {
        self.0.type_name()
    }

    fn description(&self) -> &str {
        self.0.description()
    }

    fn parameters_schema(&self) -> &PropObject {
        self.0.parameters_schema()
    }

    fn invoke(&self, arguments: Value) -> Result<Value, FunctionsError> {
        self.0.call(arguments)
    }
}

pub fn adapt_callable_instance(instance: impl CallableInstance + 'static) -> Arc<dyn Function> {
    Arc::new(CallableInstanceAdapter(instance))
}

/// Validates `arguments` against `function`'s schema, invokes it, and maps
/// the outcome to a [`FunctionCallResult`] exactly as
/// `lalia.functions.execute_function_call` does: string results pass
/// through, other JSON values are pretty-printed, and invocation errors
/// become a `FunctionCallResult` carrying `Error` with
/// `FinishReason::FunctionCallError`.
pub fn execute_function_call(
    function: &dyn Function,
    arguments: Value,
) -> FunctionCallResult {
    use conv_types::FinishReason;

    let args_map = arguments
        .as_object()
        .cloned()
        .unwrap_or_default();

    if let Err(e) = schema::validate(function.parameters_schema(), &arguments) {
        return FunctionCallResult::error(
            function.name(),
            args_map,
            Error { message: e.to_string() },
            FinishReason::FunctionCallError,
        );
    }

    match function.invoke(arguments) {
        Ok(Value::String(s)) => {
            FunctionCallResult::ok(function.name(), args_map, Value::String(s))
        }
        Ok(value) => FunctionCallResult::ok(function.name(), args_map, value),
        Err(e) => FunctionCallResult::error(
            function.name(),
            args_map,
            Error { message: e.to_string() },
            FinishReason::FunctionCallError,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn echo_fn() -> NativeFunction {
        NativeFunction::new(
            "echo",
            "echoes its input",
            PropObject::any_object(),
            |args| Ok(args),
        )
    }

    #[test]
    fn execute_success_wraps_value() {
        let f = echo_fn();
        let result = execute_function_call(&f, json!({"a": 1}));
        assert_eq!(result.name, "echo");
        assert!(result.error.is_none());
        assert_eq!(result.value, Some(json!({"a": 1})));
    }

    #[test]
    fn execute_failure_wraps_error() {
        let f = NativeFunction::new(
            "boom",
            "always fails",
            PropObject::any_object(),
            |_| Err(FunctionsError::Invocation("kaboom".into())),
        );
        let result = execute_function_call(&f, json!({}));
        assert!(result.value.is_none());
        assert_eq!(result.error.unwrap().message, "kaboom");
    }
}
