// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error(transparent)]
    Budget(#[from] conv_budget::BudgetError),

    #[error("load error: {0}")]
    Load(String),
}
