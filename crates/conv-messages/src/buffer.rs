// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use conv_types::Predicate;

use crate::fold_state::FoldState;
use crate::folds::Folds;
use crate::message::Message;

/// Two-segment transactional log: `committed` then `pending`, with fold
/// metadata mirrored on each segment (spec §4.2).
pub struct MessageBuffer {
    committed: Vec<Message>,
    pending: Vec<Message>,
    folds: Folds,
    transactional_bounds: Vec<(usize, usize)>,
}

impl MessageBuffer {
    pub fn new() -> Self {
        Self {
            committed: Vec::new(),
            pending: Vec::new(),
            folds: Folds::new(),
            transactional_bounds: Vec::new(),
        }
    }

    /// Same as [`MessageBuffer::new`] but with a caller-supplied default
    /// fold predicate in place of the source's `{TagPattern("error", ".*")}`
    /// (spec §3 `default_fold_tags`).
    pub fn with_default_fold(default_fold: Predicate) -> Self {
        Self {
            committed: Vec::new(),
            pending: Vec::new(),
            folds: Folds::with_default_fold(default_fold),
            transactional_bounds: Vec::new(),
        }
    }

    /// `add(m)`: append to `pending`. `add(None)` is a no-op, letting
    /// callers pipe optional messages (spec §4.2).
    pub fn add(&mut self, message: Option<Message>) {
        if let Some(m) = message {
            self.folds.push_pending(m.tags());
            self.pending.push(m);
        }
    }

    pub fn add_all(&mut self, messages: impl IntoIterator<Item = Message>) {
        for m in messages {
            self.add(Some(m));
        }
    }

    /// Records `(len(committed), len(committed)+len(pending))` on the
    /// transactional stack, splices `pending` into `committed`, clears
    /// `pending`, and moves fold states accordingly (spec §4.2).
    pub fn commit(&mut self) {
        let start = self.committed.len();
        let end = start + self.pending.len();
        self.transactional_bounds.push((start, end));
        self.committed.append(&mut self.pending);
        self.folds.commit();
    }

    /// Discards `pending` and its fold states.
    pub fn rollback(&mut self) {
        let pending_len = self.pending.len();
        self.pending.clear();
        self.folds.rollback(pending_len);
    }

    /// Pops the last transactional bound `(s, e)` and moves
    /// `committed[s..e]` to the front of `pending`, truncating `committed`
    /// at `s`. Reverts compose; an empty bound stack is a no-op (spec §4.2).
    pub fn revert(&mut self) {
        if let Some((start, end)) = self.transactional_bounds.pop() {
            let moved: Vec<Message> = self.committed.drain(start..end).collect();
            let mut new_pending = moved;
            new_pending.extend(self.pending.drain(..));
            self.pending = new_pending;
            self.folds.revert(start, end);
        }
    }

    pub fn clear(&mut self) {
        self.committed.clear();
        self.pending.clear();
        self.transactional_bounds.clear();
        self.folds.clear();
    }

    /// Mutates the buffer in place to retain only messages where both
    /// `pred(m)` and `tag_predicate(m.tags)` hold (spec §4.2; resolves
    /// Open Question (b) in favour of in-place mutation).
    pub fn filter(&mut self, pred: impl Fn(&Message) -> bool, tag_predicate: &Predicate) {
        self.committed.retain(|m| pred(m) && tag_predicate.call(m.tags()));
        self.pending.retain(|m| pred(m) && tag_predicate.call(m.tags()));
        self.transactional_bounds.clear();
        let committed_tags: Vec<_> = self.committed.iter().map(|m| m.tags().clone()).collect();
        let pending_tags: Vec<_> = self.pending.iter().map(|m| m.tags().clone()).collect();
        self.folds.recompute(&committed_tags, &pending_tags);
    }

    /// `tags = None` clears the fold stack (Open Question (a): clear and
    /// reapply the default fold).
    pub fn fold(&mut self, predicate: Option<Predicate>) {
        self.folds.fold(predicate);
        self.recompute_fold_states();
    }

    pub fn unfold(&mut self, predicate: Option<Predicate>) {
        self.folds.unfold(predicate);
        self.recompute_fold_states();
    }

    fn recompute_fold_states(&mut self) {
        let committed_tags: Vec<_> = self.committed.iter().map(|m| m.tags().clone()).collect();
        let pending_tags: Vec<_> = self.pending.iter().map(|m| m.tags().clone()).collect();
        self.folds.recompute(&committed_tags, &pending_tags);
    }

    /// Scoped unfold: `unfold(tags)` now, `fold(tags)` when the guard
    /// drops — the close step runs even if the enclosed computation panics
    /// via unwinding, because `Drop::drop` still executes (spec §4.2,
    /// §9 "Scoped resources").
    pub fn expand(&mut self, predicate: Option<Predicate>) -> ExpandGuard<'_> {
        self.unfold(predicate.clone());
        ExpandGuard {
            buffer: self,
            predicate,
        }
    }

    /// Iterates committed-then-pending in order, yielding only messages
    /// whose fold state is `Unfolded` (spec §4.2).
    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        let committed_visible = self
            .committed
            .iter()
            .zip(self.folds.message_states.iter())
            .filter(|(_, state)| matches!(state, FoldState::Unfolded))
            .map(|(m, _)| m);
        let pending_visible = self
            .pending
            .iter()
            .zip(self.folds.pending_states.iter())
            .filter(|(_, state)| matches!(state, FoldState::Unfolded))
            .map(|(m, _)| m);
        committed_visible.chain(pending_visible)
    }

    /// Counts all messages regardless of fold state.
    pub fn len(&self) -> usize {
        self.committed.len() + self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Random access over the full sequence (committed then pending),
    /// regardless of fold state (spec §4.2).
    pub fn get(&self, index: usize) -> Option<&Message> {
        if index < self.committed.len() {
            self.committed.get(index)
        } else {
            self.pending.get(index - self.committed.len())
        }
    }

    /// Adds `tag` to the message at absolute index `index` (as returned by
    /// [`MessageBuffer::get`]/[`MessageBuffer::len`]) and recomputes fold
    /// states, since a tag can change a message's fold visibility (e.g. the
    /// default `(error, .*)` fold). Used to retag an already-buffered
    /// message during error handling, after its outcome is known (spec
    /// §4.9, Lifecycle invariant "accretive tag additions ... during error
    /// handling"). A no-op if `index` is out of range.
    pub fn tag_at(&mut self, index: usize, tag: conv_types::Tag) {
        let message = if index < self.committed.len() {
            self.committed.get_mut(index)
        } else {
            self.pending.get_mut(index - self.committed.len())
        };
        if let Some(m) = message {
            m.tags_mut().insert(tag);
        }
        self.recompute_fold_states();
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn committed_len(&self) -> usize {
        self.committed.len()
    }
}

impl Default for MessageBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard returned by [`MessageBuffer::expand`]. Re-folds on drop,
/// exactly once, even on unwind.
pub struct ExpandGuard<'a> {
    buffer: &'a mut MessageBuffer,
    predicate: Option<Predicate>,
}

impl Drop for ExpandGuard<'_> {
    fn drop(&mut self) {
        self.buffer.fold(self.predicate.clone());
    }
}

impl ExpandGuard<'_> {
    pub fn buffer(&self) -> &MessageBuffer {
        self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut MessageBuffer {
        self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conv_types::Tag;

    #[test]
    fn add_commit_revert_round_trips() {
        let mut buf = MessageBuffer::new();
        buf.add(Some(Message::user("hi")));
        buf.commit();
        assert_eq!(buf.committed_len(), 1);
        assert_eq!(buf.pending_len(), 0);
        buf.revert();
        assert_eq!(buf.committed_len(), 0);
        assert_eq!(buf.pending_len(), 1);
    }

    #[test]
    fn add_then_rollback_is_pre_add_state() {
        let mut buf = MessageBuffer::new();
        buf.add(Some(Message::user("hi")));
        buf.rollback();
        assert_eq!(buf.len(), 0);
    }

    #[test]
    fn add_none_is_noop() {
        let mut buf = MessageBuffer::new();
        buf.add(None);
        assert_eq!(buf.len(), 0);
    }

    #[test]
    fn revert_stack_well_formedness() {
        // revert() un-commits, it doesn't discard: popping both
        // transactional bounds moves both messages back to `pending`, in
        // their original order, with nothing left in `committed`.
        let mut buf = MessageBuffer::new();
        buf.add(Some(Message::user("m1")));
        buf.commit();
        buf.add(Some(Message::user("m2")));
        buf.commit();
        buf.revert();
        buf.revert();
        assert_eq!(buf.committed_len(), 0);
        assert_eq!(buf.pending_len(), 2);
        assert_eq!(buf.get(0).unwrap().text(), Some("m1"));
        assert_eq!(buf.get(1).unwrap().text(), Some("m2"));
    }

    #[test]
    fn revert_on_empty_stack_is_noop() {
        let mut buf = MessageBuffer::new();
        buf.add(Some(Message::user("hi")));
        buf.revert();
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn iteration_skips_folded_messages() {
        let mut buf = MessageBuffer::new();
        let error_tag = Tag::new("error", "validation").unwrap();
        buf.add(Some(Message::user("hi")));
        buf.add(Some(Message::function("f", "oops").with_tag(error_tag)));
        buf.commit();
        let visible: Vec<_> = buf.iter().collect();
        assert_eq!(visible.len(), 1);
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn expand_refolds_on_drop() {
        let mut buf = MessageBuffer::new();
        let error_tag = Tag::new("error", "validation").unwrap();
        buf.add(Some(Message::function("f", "oops").with_tag(error_tag.clone())));
        buf.commit();
        assert_eq!(buf.iter().count(), 0);
        {
            let predicate = conv_types::Predicate::from_tag(&error_tag);
            let guard = buf.expand(Some(predicate));
            assert_eq!(guard.buffer().iter().count(), 1);
        }
        assert_eq!(buf.iter().count(), 0);
    }

    #[test]
    fn tag_at_retags_an_already_buffered_message_and_can_fold_it() {
        let mut buf = MessageBuffer::new();
        buf.add(Some(Message::user("hi")));
        let index = buf.len();
        buf.add(Some(Message::assistant_text("calling a tool")));

        assert_eq!(buf.iter().count(), 2);

        buf.tag_at(index, Tag::new("error", "function_call").unwrap());

        let retagged = buf.get(index).unwrap();
        assert!(retagged.tags().contains(&Tag::new("error", "function_call").unwrap()));
        // The default `(error, .*)` fold now hides the retagged message.
        assert_eq!(buf.iter().count(), 1);
    }
}
