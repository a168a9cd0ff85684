// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Mutex;

use async_trait::async_trait;

use crate::client::{ChatRequest, LlmClient};
use crate::error::LlmError;
use crate::wire::ChatCompletionResponse;

/// A scripted test double returning a pre-seeded queue of responses in
/// order (mirrors `sven_model::mock::ScriptedMockProvider`). Errors with
/// [`LlmError::Transport`] once the queue is exhausted.
pub struct MockLlmClient {
    responses: Mutex<Vec<ChatCompletionResponse>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl MockLlmClient {
    pub fn new(responses: Vec<ChatCompletionResponse>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().expect("mock client poisoned").clone()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, request: ChatRequest) -> Result<ChatCompletionResponse, LlmError> {
        self.requests.lock().expect("mock client poisoned").push(request.clone());
        let mut responses = self.responses.lock().expect("mock client poisoned");
        if responses.is_empty() {
            return Err(LlmError::Transport("mock response queue exhausted".into()));
        }
        Ok(responses.remove(0))
    }
}
