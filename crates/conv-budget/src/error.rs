// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BudgetError {
    #[error("budget too tight: base cost {base} exceeds threshold {threshold}")]
    BudgetTooTight { base: usize, threshold: usize },
}
