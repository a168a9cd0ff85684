// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use thiserror::Error;

/// Errors raised while constructing tags, tag patterns or predicates.
#[derive(Debug, Error)]
pub enum TypesError {
    #[error("tag key must be non-empty")]
    EmptyKey,

    #[error("unsupported shape for tag-like value: {0}")]
    BadArgument(String),

    #[error("invalid regex pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}
