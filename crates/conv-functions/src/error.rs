// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FunctionsError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("unknown function: {0}")]
    UnknownFunction(String),

    #[error("{0}")]
    Invocation(String),

    #[error("bad argument: {0}")]
    BadArgument(String),
}
