// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::{BTreeSet, VecDeque};

use conv_functions::ToolSchema;
use conv_messages::MessageBuffer;
use conv_types::{FinishReason, FunctionCallPolicy, TagPattern};

/// Per-turn policy chosen by a [`Dispatcher`] (spec §4.7). The callback a
/// `DispatchCall` selects is always the session's configured LLM client;
/// none of the source's concrete dispatchers ever swap it for another one,
/// so this port fixes that part and exposes only the parts that vary
/// (documented in DESIGN.md).
pub struct DispatchCall {
    pub context: BTreeSet<TagPattern>,
    pub functions: Vec<ToolSchema>,
    pub function_call: FunctionCallPolicy,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    /// `None` means "delegate to the model's own claim" (spec §4.7 `Delegate`).
    pub finish_reason_override: Option<FinishReason>,
}

impl Default for DispatchCall {
    fn default() -> Self {
        Self {
            context: BTreeSet::new(),
            functions: Vec::new(),
            function_call: FunctionCallPolicy::Auto,
            model: None,
            temperature: None,
            finish_reason_override: None,
        }
    }
}

/// Two-method interface, not a base class (spec §9 "Dispatcher as interface").
pub trait Dispatcher: Send + Sync {
    fn dispatch(&mut self, buffer: &MessageBuffer) -> DispatchCall;
    fn reset(&mut self);
}

/// `(llm.complete, session.buffer, ∅, {}, Delegate)` (spec §4.7).
#[derive(Default)]
pub struct DefaultDispatcher;

impl Dispatcher for DefaultDispatcher {
    fn dispatch(&mut self, _buffer: &MessageBuffer) -> DispatchCall {
        DispatchCall::default()
    }

    fn reset(&mut self) {}
}

/// Forces one named function per turn, in order, until the queue is
/// exhausted, then falls back to `Auto` (spec §4.7 "a sequential scheduler
/// that forces one named function per turn until exhausted").
pub struct SequentialDispatcher {
    order: Vec<String>,
    queue: VecDeque<String>,
}

impl SequentialDispatcher {
    pub fn new(order: Vec<String>) -> Self {
        let queue = order.iter().cloned().collect();
        Self { order, queue }
    }
}

impl Dispatcher for SequentialDispatcher {
    fn dispatch(&mut self, _buffer: &MessageBuffer) -> DispatchCall {
        match self.queue.pop_front() {
            Some(name) => DispatchCall {
                function_call: FunctionCallPolicy::ByName(name),
                ..DispatchCall::default()
            },
            None => DispatchCall::default(),
        }
    }

    fn reset(&mut self) {
        self.queue = self.order.iter().cloned().collect();
    }
}
