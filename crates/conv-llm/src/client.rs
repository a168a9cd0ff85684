// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::BTreeSet;

use async_trait::async_trait;
use conv_functions::ToolSchema;
use conv_messages::Message;
use conv_types::{FunctionCallPolicy, TagPattern};

use crate::error::LlmError;
use crate::wire::ChatCompletionResponse;

/// `complete(messages, context?, model?, functions?, function_call, …)`
/// (spec §4.8). Implementations render to the wire format and surface
/// transport errors as [`LlmError`]; they never swallow them. Budgeting and
/// parser-repair splicing are the caller's (`conv-core::Session`'s)
/// responsibility, invoked through `conv-budget`/`conv-parser` — this trait
/// is deliberately only the vendor transport seam (spec §1 "Out of scope").
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: ChatRequest) -> Result<ChatCompletionResponse, LlmError>;
}

/// The full request shape of spec §4.8.
#[derive(Clone)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    pub context: BTreeSet<TagPattern>,
    pub model: Option<String>,
    pub functions: Vec<ToolSchema>,
    pub function_call: FunctionCallPolicy,
    pub logit_bias: Option<std::collections::HashMap<String, f32>>,
    pub max_tokens: Option<usize>,
    pub n_choices: usize,
    pub presence_penalty: Option<f32>,
    pub seed: Option<i64>,
    pub stop: Option<Vec<String>>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub user: Option<String>,
    pub timeout: Option<std::time::Duration>,
}

impl ChatRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            context: BTreeSet::new(),
            model: None,
            functions: Vec::new(),
            function_call: FunctionCallPolicy::Auto,
            logit_bias: None,
            max_tokens: None,
            n_choices: 1,
            presence_penalty: None,
            seed: None,
            stop: None,
            temperature: None,
            top_p: None,
            user: None,
            timeout: None,
        }
    }
}
