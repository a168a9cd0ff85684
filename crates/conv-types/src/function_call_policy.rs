// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT

/// `function_call = Auto | None | {name}` on an LLM Client request
/// (spec §4.8). Shared between `conv-budget` (token accounting for the
/// directive) and `conv-llm` (request shape) to keep the dependency DAG
/// acyclic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FunctionCallPolicy {
    Auto,
    None,
    ByName(String),
}
