// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod error;
mod finish_reason;
mod function_call_policy;
mod predicate;
mod role;
mod tag;

pub use error::TypesError;
pub use finish_reason::FinishReason;
pub use function_call_policy::FunctionCallPolicy;
pub use predicate::{Predicate, PredicateRegistry};
pub use role::Role;
pub use tag::{Tag, TagLike, TagPattern};
