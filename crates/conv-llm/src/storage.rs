// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;

use crate::error::LlmError;

/// `exists(id) -> bool`, `load(id) -> map`, `save(obj, id)` (spec §6
/// "Session persistence"). Out of scope per spec §1 ("a persistent session
/// store" is an external collaborator); this crate only needs to provide
/// the contract and a default in-process stub.
pub trait StorageBackend: Send + Sync {
    fn exists(&self, id: &str) -> bool;
    fn load(&self, id: &str) -> Result<Value, LlmError>;
    fn save(&self, id: &str, value: Value) -> Result<(), LlmError>;
}

/// Mirrors `lalia.io.storage.DictStorageBackend`: a process-local dict
/// keyed by id.
#[derive(Default)]
pub struct InMemoryStorageBackend {
    entries: Mutex<HashMap<String, Value>>,
}

impl InMemoryStorageBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for InMemoryStorageBackend {
    fn exists(&self, id: &str) -> bool {
        self.entries.lock().expect("storage poisoned").contains_key(id)
    }

    fn load(&self, id: &str) -> Result<Value, LlmError> {
        self.entries
            .lock()
            .expect("storage poisoned")
            .get(id)
            .cloned()
            .ok_or_else(|| LlmError::Load(format!("no session stored under '{id}'")))
    }

    fn save(&self, id: &str, value: Value) -> Result<(), LlmError> {
        self.entries.lock().expect("storage poisoned").insert(id.to_string(), value);
        Ok(())
    }
}
