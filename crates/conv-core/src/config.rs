// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use conv_types::{Predicate, TagPattern};

/// `Session.config` (spec §3). Defaults mirror the source's
/// `SessionConfig` dataclass.
#[derive(Clone)]
pub struct SessionConfig {
    /// Promote `pending` to `committed` immediately after a terminal
    /// assistant message (spec GLOSSARY "Autocommit").
    pub autocommit: bool,
    /// Whether prior turns remain in the buffer across `submit` calls.
    pub memory: bool,
    pub max_iterations: usize,
    pub max_function_call_attempts: usize,
    pub rollback_on_error: bool,
    pub default_fold_tags: Predicate,
    pub completion_buffer: usize,
    /// Cap on `Parser` repair attempts per LLM (spec §4.6 `max_retries`).
    /// Not part of spec §3's literal `Session.config` field list, but
    /// needed to assemble the composed client ([`crate::Client`]); kept
    /// here so a caller configures one struct instead of two.
    pub max_parser_retries: usize,
}

impl SessionConfig {
    pub fn new() -> Self {
        Self {
            autocommit: true,
            memory: true,
            max_iterations: 10,
            max_function_call_attempts: 3,
            rollback_on_error: true,
            default_fold_tags: Predicate::from_pattern(
                &TagPattern::new("error", ".*").expect("static pattern is always valid"),
            ),
            completion_buffer: 256,
            max_parser_retries: 3,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = SessionConfig::new();
        assert!(config.autocommit);
        assert!(config.memory);
        assert_eq!(config.max_iterations, 10);
        assert_eq!(config.max_function_call_attempts, 3);
        assert!(config.rollback_on_error);
        assert_eq!(config.completion_buffer, 256);
        assert_eq!(config.max_parser_retries, 3);
    }
}
