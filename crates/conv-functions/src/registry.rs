// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::FunctionsError;
use crate::schema::ToolSchema;
use crate::Function;

/// Process-wide, insert-if-absent map from function name to implementation
/// (spec §4.4, §5 "Shared resources").
#[derive(Default)]
pub struct FunctionRegistry {
    functions: RwLock<HashMap<String, Arc<dyn Function>>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, function: Arc<dyn Function>) {
        let mut map = self.functions.write().expect("function registry poisoned");
        map.entry(function.name().to_string()).or_insert(function);
    }

    pub fn resolve(&self, name: &str) -> Option<Arc<dyn Function>> {
        self.functions
            .read()
            .expect("function registry poisoned")
            .get(name)
            .cloned()
    }

    pub fn describe(&self, name: &str) -> Result<ToolSchema, FunctionsError> {
        let function = self
            .resolve(name)
            .ok_or_else(|| FunctionsError::UnknownFunction(name.to_string()))?;
        Ok(ToolSchema::new(
            function.name(),
            function.description(),
            function.parameters_schema(),
        ))
    }

    pub fn describe_all(&self) -> Vec<ToolSchema> {
        self.functions
            .read()
            .expect("function registry poisoned")
            .values()
            .map(|f| ToolSchema::new(f.name(), f.description(), f.parameters_schema()))
            .collect()
    }
}

/// Stable `(module, qualified-name)` reference to a callable, for
/// persistence (spec §4.4, §6 "Callable serialization"). Rust has no
/// runtime dynamic import; `resolve` looks the pair up in a
/// [`FunctionRegistry`] that must already hold an entry registered under
/// that name (documented in DESIGN.md as the Rust analogue of Python's
/// `importlib` resolution).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallableRef {
    pub module: String,
    pub name: String,
}

pub struct CallableRegistry<'a> {
    functions: &'a FunctionRegistry,
}

impl<'a> CallableRegistry<'a> {
    pub fn new(functions: &'a FunctionRegistry) -> Self {
        Self { functions }
    }

    pub fn resolve_ref(&self, reference: &CallableRef) -> Option<Arc<dyn Function>> {
        self.functions.resolve(&reference.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NativeFunction, PropObject};

    fn register_echo(registry: &FunctionRegistry) {
        registry.register(Arc::new(NativeFunction::new(
            "echo",
            "echoes",
            PropObject::any_object(),
            |v| Ok(v),
        )));
    }

    #[test]
    fn register_then_resolve() {
        let registry = FunctionRegistry::new();
        register_echo(&registry);
        assert!(registry.resolve("echo").is_some());
        assert!(registry.resolve("missing").is_none());
    }

    #[test]
    fn register_is_insert_if_absent() {
        let registry = FunctionRegistry::new();
        register_echo(&registry);
        register_echo(&registry);
        assert_eq!(registry.describe_all().len(), 1);
    }

    #[test]
    fn callable_ref_resolves_through_registry() {
        let registry = FunctionRegistry::new();
        register_echo(&registry);
        let callables = CallableRegistry::new(&registry);
        let reference = CallableRef {
            module: "tools".into(),
            name: "echo".into(),
        };
        assert!(callables.resolve_ref(&reference).is_some());
    }
}
