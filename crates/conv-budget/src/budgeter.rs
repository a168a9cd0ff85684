// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use conv_functions::ToolSchema;
use conv_messages::Message;
use conv_types::{FunctionCallPolicy, Predicate};

use crate::error::BudgetError;
use crate::token_counter::{calculate_tokens, functions_tokens, message_tokens, TokenCounter};

/// `{ token_threshold, completion_buffer, counter }` (spec §4.5). Invariant:
/// `completion_buffer <= token_threshold`.
pub struct Budgeter {
    pub token_threshold: usize,
    pub completion_buffer: usize,
    counter: Box<dyn TokenCounter>,
}

impl Budgeter {
    pub fn new(
        token_threshold: usize,
        completion_buffer: usize,
        counter: Box<dyn TokenCounter>,
    ) -> Result<Self, BudgetError> {
        if completion_buffer > token_threshold {
            return Err(BudgetError::BudgetTooTight {
                base: completion_buffer,
                threshold: token_threshold,
            });
        }
        Ok(Self {
            token_threshold,
            completion_buffer,
            counter,
        })
    }

    pub fn count_tokens(
        &self,
        messages: &[Message],
        functions: &[ToolSchema],
        function_call_policy: &FunctionCallPolicy,
    ) -> usize {
        calculate_tokens(messages, functions, function_call_policy, self.counter.as_ref())
    }

    /// Truncation per spec §4.5: partition by `exclude_tags` (protected
    /// messages are never dropped), fail `BudgetTooTight` if the protected
    /// + function + completion-buffer cost alone exceeds the threshold,
    /// then walk the remaining messages newest-to-oldest accumulating
    /// tokens and stopping at first exclusion.
    pub fn truncate(
        &self,
        messages: &[Message],
        functions: &[ToolSchema],
        exclude_tags: &Predicate,
    ) -> Result<Vec<Message>, BudgetError> {
        let mut protected: Vec<(usize, &Message)> = Vec::new();
        let mut rest: Vec<(usize, &Message)> = Vec::new();
        for (i, m) in messages.iter().enumerate() {
            if exclude_tags.call(m.tags()) {
                protected.push((i, m));
            } else {
                rest.push((i, m));
            }
        }

        let protected_tokens: usize = protected
            .iter()
            .map(|(_, m)| message_tokens(m, self.counter.as_ref()).max(0) as usize)
            .sum();
        let functions_cost = functions_tokens(functions, self.counter.as_ref()).max(0) as usize;
        let base = protected_tokens + functions_cost + self.completion_buffer;

        if base > self.token_threshold {
            return Err(BudgetError::BudgetTooTight {
                base,
                threshold: self.token_threshold,
            });
        }

        let mut running = 0usize;
        let mut kept_rest: Vec<(usize, &Message)> = Vec::new();
        for (i, m) in rest.iter().rev() {
            let cost = message_tokens(m, self.counter.as_ref()).max(0) as usize;
            if base + running + cost <= self.token_threshold {
                running += cost;
                kept_rest.push((*i, m));
            } else {
                break;
            }
        }
        kept_rest.reverse();

        let mut combined: Vec<(usize, &Message)> =
            protected.into_iter().chain(kept_rest).collect();
        combined.sort_by_key(|(i, _)| *i);
        Ok(combined.into_iter().map(|(_, m)| m.clone()).collect())
    }
}
