// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT

/// Fallback used when a model name is absent from the catalog
/// (mirrors `lalia.llm.models.MINIMUM_CONTEXT_WINDOW`).
pub const MINIMUM_CONTEXT_WINDOW: usize = 32_000;

/// A small name -> context-window catalog, supplementing spec.md with the
/// per-model bookkeeping `lalia.llm.models.ChatModel` provides.
pub struct ModelProfile {
    pub name: String,
    pub context_window: usize,
}

impl ModelProfile {
    pub fn new(name: impl Into<String>, context_window: usize) -> Self {
        Self {
            name: name.into(),
            context_window,
        }
    }

    /// Looks `name` up in a small built-in catalog of well-known models,
    /// falling back to [`MINIMUM_CONTEXT_WINDOW`] with a logged warning —
    /// exactly the fallback behaviour of the source catalog.
    pub fn lookup(name: &str) -> ModelProfile {
        let context_window = match name {
            "gpt-4" | "gpt-4-0613" => 8_192,
            "gpt-4-32k" | "gpt-4-32k-0613" => 32_768,
            "gpt-4-turbo" | "gpt-4-turbo-preview" | "gpt-4o" => 128_000,
            "gpt-3.5-turbo" | "gpt-3.5-turbo-0613" => 4_096,
            "gpt-3.5-turbo-16k" | "gpt-3.5-turbo-16k-0613" => 16_384,
            _ => {
                tracing::warn!(model = name, "unknown model, falling back to minimum context window");
                MINIMUM_CONTEXT_WINDOW
            }
        };
        ModelProfile::new(name, context_window)
    }
}
