// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod budgeter;
mod error;
mod overhead;
mod token_counter;

pub use budgeter::Budgeter;
pub use error::BudgetError;
pub use overhead::Overhead;
pub use token_counter::{calculate_tokens, CharHeuristicCounter, TableCounter, TokenCounter};
