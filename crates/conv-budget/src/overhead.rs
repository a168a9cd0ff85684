// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT

/// Fixed structural overheads the token counter adds on top of raw string
/// token counts, so that `calculate_tokens` approximates what the remote
/// endpoint bills within a ~5% relative tolerance (spec §4.5). These are
/// spec's stated source-of-truth defaults; a model-specific counter may
/// override them but must document the change (see DESIGN.md).
pub struct Overhead;

impl Overhead {
    pub const MESSAGE_INSTANCE: i64 = 4;
    pub const SYSTEM_ROLE: i64 = -4;
    pub const FUNCTION_ROLE: i64 = -2;
    pub const MESSAGE_NAME: i64 = -1;
    pub const FUNCTION_CALL: i64 = 3;
    pub const FUNCTION_NAME: i64 = 4;
    pub const NONE_DIRECTIVE: i64 = 1;
    pub const COMPLETION: i64 = 3;
}
