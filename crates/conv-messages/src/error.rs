// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MessagesError {
    #[error("an assistant message needs content or a function call")]
    EmptyAssistantMessage,
}
