// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde::{Deserialize, Serialize};

/// Wire-level finish-reason enumeration (spec §6). Carries `Error` in
/// addition to the source enum's `Failure`, for transport-level failures
/// that never reach a completed turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    FunctionCall,
    ContentFilter,
    Delegate,
    Null,
    FunctionCallFailure,
    FunctionCallError,
    Failure,
    Error,
}

impl FinishReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinishReason::Stop => "stop",
            FinishReason::Length => "length",
            FinishReason::FunctionCall => "function_call",
            FinishReason::ContentFilter => "content_filter",
            FinishReason::Delegate => "delegate",
            FinishReason::Null => "null",
            FinishReason::FunctionCallFailure => "function_call_failure",
            FinishReason::FunctionCallError => "function_call_error",
            FinishReason::Failure => "failure",
            FinishReason::Error => "error",
        }
    }

    /// Whether this finish reason concludes the session's loop (spec §4.9
    /// `Stopping`/`Failing` states).
    pub fn is_terminal(&self) -> bool {
        !matches!(self, FinishReason::Delegate)
    }
}

impl std::fmt::Display for FinishReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_strings_match_spec() {
        assert_eq!(FinishReason::FunctionCallError.as_str(), "function_call_error");
        assert_eq!(FinishReason::Error.as_str(), "error");
    }

    #[test]
    fn delegate_is_not_terminal() {
        assert!(!FinishReason::Delegate.is_terminal());
        assert!(FinishReason::Stop.is_terminal());
    }
}
