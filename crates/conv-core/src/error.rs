// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Types(#[from] conv_types::TypesError),

    #[error(transparent)]
    Messages(#[from] conv_messages::MessagesError),

    #[error(transparent)]
    Budget(#[from] conv_budget::BudgetError),

    #[error(transparent)]
    Llm(#[from] conv_llm::LlmError),

    #[error("function '{0}' is not registered")]
    UnknownFunction(String),

    #[error("the model returned no choices for this turn")]
    EmptyResponse,

    #[error("expected an assistant message in this choice, got a {0} message")]
    UnexpectedChoiceRole(conv_types::Role),

    #[error("maximum iterations ({0}) reached without a terminal response")]
    IterationsExceeded(usize),
}
