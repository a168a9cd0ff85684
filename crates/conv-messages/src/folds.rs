// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::BTreeSet;

use conv_types::{Predicate, Tag, TagPattern};

use crate::fold_state::FoldState;

/// A single entry on the fold stack (spec §3, §4.3).
#[derive(Clone)]
pub struct Fold {
    pub predicate: Predicate,
    pub state: FoldState,
}

impl PartialEq for Fold {
    fn eq(&self, other: &Self) -> bool {
        self.predicate == other.predicate && self.state == other.state
    }
}

/// Decides each message's visibility by walking the fold stack newest to
/// oldest, falling through to the default fold (spec §4.3). Keeps
/// `message_states`/`pending_states` as dense parallel arrays rather than
/// per-message fields (spec §9 "Arena + indices").
pub struct Folds {
    stack: Vec<Fold>,
    default_fold: Predicate,
    pub message_states: Vec<FoldState>,
    pub pending_states: Vec<FoldState>,
}

impl Folds {
    /// `DEFAULT_FOLD_TAGS = {TagPattern("error", ".*")}` (source default).
    pub fn default_fold_predicate() -> Predicate {
        Predicate::from_pattern(&TagPattern::new("error", ".*").expect("static pattern"))
    }

    pub fn new() -> Self {
        Self {
            stack: Vec::new(),
            default_fold: Self::default_fold_predicate(),
            message_states: Vec::new(),
            pending_states: Vec::new(),
        }
    }

    pub fn with_default_fold(default_fold: Predicate) -> Self {
        Self {
            stack: Vec::new(),
            default_fold,
            message_states: Vec::new(),
            pending_states: Vec::new(),
        }
    }

    pub fn get_fold_state(&self, tags: &BTreeSet<Tag>) -> FoldState {
        for fold in self.stack.iter().rev() {
            if fold.predicate.call(tags) {
                return fold.state;
            }
        }
        if self.default_fold.call(tags) {
            FoldState::Folded
        } else {
            FoldState::Unfolded
        }
    }

    /// Pushes a `Folded` entry, de-duplicating only an *identical* prior
    /// entry; never removes an opposite-state (unfold) entry (spec §4.3,
    /// `folds.py::fold`). Always ends with a `Folded` entry on top.
    fn push_fold(&mut self, predicate: Predicate) {
        if let Some(pos) = self
            .stack
            .iter()
            .position(|f| f.predicate == predicate && f.state == FoldState::Folded)
        {
            self.stack.remove(pos);
        }
        self.stack.push(Fold {
            predicate,
            state: FoldState::Folded,
        });
    }

    /// Toggles an `Unfolded` entry against its inverse: if a `Folded` entry
    /// for the same predicate is on the stack it is popped (net effect:
    /// neither entry remains); otherwise an `Unfolded` entry is pushed
    /// (spec §4.3, `folds.py::unfold`).
    fn toggle_unfold(&mut self, predicate: Predicate) {
        if let Some(pos) = self
            .stack
            .iter()
            .position(|f| f.predicate == predicate && f.state == FoldState::Folded)
        {
            self.stack.remove(pos);
        } else {
            self.stack.push(Fold {
                predicate,
                state: FoldState::Unfolded,
            });
        }
    }

    pub fn fold(&mut self, predicate: Option<Predicate>) {
        match predicate {
            None => self.stack.clear(),
            Some(p) => self.push_fold(p),
        }
    }

    pub fn unfold(&mut self, predicate: Option<Predicate>) {
        match predicate {
            None => self.stack.clear(),
            Some(p) => self.toggle_unfold(p),
        }
    }

    pub fn clear_stack(&mut self) {
        self.stack.clear();
    }

    /// Recomputes both arrays from scratch in O(n) (spec §4.3).
    pub fn recompute(&mut self, committed_tags: &[BTreeSet<Tag>], pending_tags: &[BTreeSet<Tag>]) {
        self.message_states = committed_tags.iter().map(|t| self.get_fold_state(t)).collect();
        self.pending_states = pending_tags.iter().map(|t| self.get_fold_state(t)).collect();
    }

    pub fn push_pending(&mut self, tags: &BTreeSet<Tag>) {
        self.pending_states.push(self.get_fold_state(tags));
    }

    /// `commit()`: append `pending_states` onto `message_states`.
    pub fn commit(&mut self) {
        self.message_states.append(&mut self.pending_states);
    }

    pub fn rollback(&mut self, pending_len: usize) {
        self.pending_states.truncate(self.pending_states.len() - pending_len);
    }

    pub fn clear(&mut self) {
        self.stack.clear();
        self.message_states.clear();
        self.pending_states.clear();
    }

    /// `revert(s, e)`: moves `message_states[s..e]` to the head of
    /// `pending_states`, truncating `message_states` at `s` (spec §4.2, §4.3).
    pub fn revert(&mut self, start: usize, end: usize) {
        let moved: Vec<FoldState> = self.message_states.drain(start..end).collect();
        let mut new_pending = moved;
        new_pending.extend(self.pending_states.drain(..));
        self.pending_states = new_pending;
    }
}

impl Default for Folds {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conv_types::Tag;

    fn tags(pairs: &[(&str, &str)]) -> BTreeSet<Tag> {
        pairs.iter().map(|(k, v)| Tag::new(*k, *v).unwrap()).collect()
    }

    #[test]
    fn default_fold_folds_error_tags() {
        let folds = Folds::new();
        assert_eq!(folds.get_fold_state(&tags(&[("error", "validation")])), FoldState::Folded);
        assert_eq!(folds.get_fold_state(&tags(&[("kind", "greeting")])), FoldState::Unfolded);
    }

    #[test]
    fn fold_then_unfold_is_involution() {
        let mut folds = Folds::new();
        let user_tag = Tag::new("role", "user").unwrap();
        let p = Predicate::from_tag(&user_tag);
        let before = folds.get_fold_state(&tags(&[("role", "user")]));
        folds.fold(Some(p.clone()));
        folds.unfold(Some(p));
        let after = folds.get_fold_state(&tags(&[("role", "user")]));
        assert_eq!(before, after);
    }

    #[test]
    fn fold_unfold_pipeline_over_role_tags() {
        // Exercises the newest-to-oldest walk and the toggle/de-dup rule
        // against a buffer tagged {system, user, assistant, user}: only
        // messages matching the live predicate are folded, the rest fall
        // through to the (here: disabled) default fold.
        let system = tags(&[("role", "system")]);
        let user = tags(&[("role", "user")]);
        let assistant = tags(&[("role", "assistant")]);

        let mut folds = Folds::with_default_fold(Predicate::Always(false));
        let p_user = Predicate::from_tag(&Tag::new("role", "user").unwrap());
        let p_assistant = Predicate::from_tag(&Tag::new("role", "assistant").unwrap());

        folds.fold(Some(p_user.clone() | p_assistant.clone()));
        let states: Vec<_> = [&system, &user, &assistant, &user]
            .iter()
            .map(|t| folds.get_fold_state(t))
            .collect();
        assert_eq!(states, vec![FoldState::Unfolded, FoldState::Folded, FoldState::Folded, FoldState::Folded]);

        folds.unfold(Some(p_user));
        let states: Vec<_> = [&system, &user, &assistant, &user]
            .iter()
            .map(|t| folds.get_fold_state(t))
            .collect();
        assert_eq!(states, vec![FoldState::Unfolded, FoldState::Unfolded, FoldState::Folded, FoldState::Unfolded]);

        folds.unfold(Some(p_assistant));
        let states: Vec<_> = [&system, &user, &assistant, &user]
            .iter()
            .map(|t| folds.get_fold_state(t))
            .collect();
        assert_eq!(states, vec![FoldState::Unfolded, FoldState::Unfolded, FoldState::Unfolded, FoldState::Unfolded]);
    }

    #[test]
    fn fold_after_unfold_of_same_predicate_pushes_a_new_entry() {
        // unfold(P) cancels nothing (P was never folded), so it pushes
        // Fold(P, Unfolded). A later fold(P) must not treat that as an
        // inverse to cancel: it pushes Fold(P, Folded) on top, and the net
        // visible state is Folded.
        let p = Predicate::from_tag(&Tag::new("role", "user").unwrap());
        let mut folds = Folds::with_default_fold(Predicate::Always(false));

        folds.unfold(Some(p.clone()));
        assert_eq!(folds.get_fold_state(&tags(&[("role", "user")])), FoldState::Unfolded);

        folds.fold(Some(p));
        assert_eq!(folds.get_fold_state(&tags(&[("role", "user")])), FoldState::Folded);
    }
}
