// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Progress reporting is an out-of-scope external collaborator (spec §1);
//! this is the stub contract a reference implementation must still provide.

/// Mirrors the state machine of spec §4.9.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressState {
    Generating,
    Executing,
    Repairing,
    Stopping,
    Failing,
}

#[derive(Debug, Clone)]
pub struct Progress {
    pub state: ProgressState,
    pub iteration: usize,
    pub detail: Option<String>,
}

impl Progress {
    pub fn new(state: ProgressState, iteration: usize) -> Self {
        Self {
            state,
            iteration,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

pub trait ProgressHandler: Send + Sync {
    fn on_progress(&self, progress: &Progress);
}

/// Default handler: discards everything.
#[derive(Default)]
pub struct NopProgressHandler;

impl ProgressHandler for NopProgressHandler {
    fn on_progress(&self, _progress: &Progress) {}
}
