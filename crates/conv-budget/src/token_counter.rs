// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use conv_functions::ToolSchema;
use conv_messages::Message;
use conv_types::FunctionCallPolicy;

use crate::overhead::Overhead;

/// Counts tokens in a string. The default [`CharHeuristicCounter`]
/// approximates a byte-pair-encoding tokenizer at 4 characters per token
/// (mirrors `sven_model::Message::approx_tokens`); a real BPE table can be
/// plugged in via [`TableCounter`] without this crate depending on a
/// tokenizer crate (see DESIGN.md).
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;
}

pub struct CharHeuristicCounter;

impl TokenCounter for CharHeuristicCounter {
    fn count(&self, text: &str) -> usize {
        text.chars().count().div_ceil(4)
    }
}

pub struct TableCounter<F: Fn(&str) -> usize + Send + Sync> {
    f: F,
}

impl<F: Fn(&str) -> usize + Send + Sync> TableCounter<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F: Fn(&str) -> usize + Send + Sync> TokenCounter for TableCounter<F> {
    fn count(&self, text: &str) -> usize {
        (self.f)(text)
    }
}

pub(crate) fn message_tokens(message: &Message, counter: &dyn TokenCounter) -> i64 {
    let mut cost = Overhead::MESSAGE_INSTANCE;
    cost += counter.count(message.text().unwrap_or("")) as i64;
    match message {
        Message::System(_) => cost += Overhead::SYSTEM_ROLE,
        Message::Function(fm) => {
            cost += Overhead::FUNCTION_ROLE + Overhead::MESSAGE_NAME;
            cost += counter.count(&fm.name) as i64;
        }
        Message::Assistant(am) => {
            if let Some(fc) = &am.function_call {
                let args_json = fc
                    .arguments
                    .as_ref()
                    .map(|a| serde_json::to_string(a).unwrap_or_default())
                    .unwrap_or_default();
                cost += counter.count(&fc.name) as i64;
                cost += counter.count(&args_json) as i64;
                cost += Overhead::FUNCTION_CALL;
            }
        }
        Message::User(_) => {}
    }
    cost
}

pub(crate) fn functions_tokens(functions: &[ToolSchema], counter: &dyn TokenCounter) -> i64 {
    functions
        .iter()
        .map(|f| {
            let params_json = serde_json::to_string(&f.parameters).unwrap_or_default();
            counter.count(&f.name) as i64
                + counter.count(&f.description) as i64
                + counter.count(&params_json) as i64
                + Overhead::FUNCTION_NAME
        })
        .sum()
}

/// `calculate_tokens(messages, functions, function_call_policy, counter)`
/// (spec §4.5). Monotone in the message set (Testable Property 6).
pub fn calculate_tokens(
    messages: &[Message],
    functions: &[ToolSchema],
    function_call_policy: &FunctionCallPolicy,
    counter: &dyn TokenCounter,
) -> usize {
    let mut total: i64 = messages.iter().map(|m| message_tokens(m, counter)).sum();
    total += functions_tokens(functions, counter);
    total += Overhead::COMPLETION;
    if matches!(function_call_policy, FunctionCallPolicy::None) {
        total += Overhead::NONE_DIRECTIVE;
    }
    total.max(0) as usize
}
