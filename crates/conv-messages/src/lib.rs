// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod buffer;
mod error;
mod fold_state;
mod folds;
mod message;

pub use buffer::{ExpandGuard, MessageBuffer};
pub use error::MessagesError;
pub use fold_state::FoldState;
pub use folds::{Fold, Folds};
pub use message::{AssistantMessage, FunctionCall, FunctionMessage, Message, SystemMessage, UserMessage};
