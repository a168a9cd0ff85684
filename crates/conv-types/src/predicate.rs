// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::{BTreeSet, HashMap};
use std::ops::{BitAnd, BitOr, Not as StdNot};
use std::sync::{Arc, Mutex, OnceLock};

use crate::error::TypesError;
use crate::tag::{Tag, TagLike, TagPattern};

/// A memoised leaf: `derive(Tag)` or `derive(TagPattern)` over a tag set.
/// `pub`, not private: it appears in the public `Predicate::Leaf` variant,
/// so it must be at least as visible as `Predicate` itself. Its field
/// stays private and there is no public constructor, so callers outside
/// this crate can still only obtain one through `Predicate::from_tag`/
/// `from_pattern`.
pub struct Leaf {
    eval: Box<dyn Fn(&BTreeSet<Tag>) -> bool + Send + Sync>,
}

#[derive(Clone, PartialEq, Eq, Hash)]
enum RegistryKey {
    Tag(Tag),
    Pattern(String, String),
}

/// A pure function `set<Tag> -> bool` built from `&`/`|`/`!` combinators
/// over tag- or tag-pattern-derived leaves (spec §3, §4.1).
///
/// Leaves are memoised through [`PredicateRegistry`] so that two derivations
/// from an equal `Tag`/`TagPattern` share the same leaf instance, and
/// composite predicates therefore compare by component identity.
#[derive(Clone)]
pub enum Predicate {
    Leaf(Arc<Leaf>),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
    /// A degenerate always-true/false predicate, used for empty collection
    /// shapes accepted by [`TagLike`].
    Always(bool),
}

impl Predicate {
    pub fn call(&self, tags: &BTreeSet<Tag>) -> bool {
        match self {
            Predicate::Leaf(leaf) => (leaf.eval)(tags),
            Predicate::And(ps) => ps.iter().all(|p| p.call(tags)),
            Predicate::Or(ps) => ps.iter().any(|p| p.call(tags)),
            Predicate::Not(p) => !p.call(tags),
            Predicate::Always(b) => *b,
        }
    }

    pub fn from_tag(tag: &Tag) -> Predicate {
        PredicateRegistry::global().derive_tag(tag)
    }

    pub fn from_pattern(pattern: &TagPattern) -> Predicate {
        PredicateRegistry::global().derive_pattern(pattern)
    }

    /// Normalises every shape [`TagLike`] accepts into one predicate,
    /// Or-combining set/collection shapes (spec §4.1).
    pub fn from_tag_like(like: TagLike) -> Result<Predicate, TypesError> {
        match like {
            TagLike::Tag(t) => Ok(Predicate::from_tag(&t)),
            TagLike::TagPattern(p) => Ok(Predicate::from_pattern(&p)),
            TagLike::Pair(k, v) => Ok(Predicate::from_tag(&Tag::new(k, v)?)),
            TagLike::Map(m) => Ok(Predicate::from_tag(&Tag::from_map(&m)?)),
            TagLike::TagSet(tags) => Ok(or_over(tags.iter().map(Predicate::from_tag))),
            TagLike::PatternSet(patterns) => {
                Ok(or_over(patterns.iter().map(Predicate::from_pattern)))
            }
            TagLike::PairSet(pairs) => {
                let tags = pairs
                    .into_iter()
                    .map(|(k, v)| Tag::new(k, v))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(or_over(tags.iter().map(Predicate::from_tag)))
            }
            TagLike::MapSet(maps) => {
                let tags = maps
                    .iter()
                    .map(Tag::from_map)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(or_over(tags.iter().map(Predicate::from_tag)))
            }
        }
    }
}

fn or_over(mut preds: impl Iterator<Item = Predicate>) -> Predicate {
    match preds.next() {
        None => Predicate::Always(false),
        Some(first) => preds.fold(first, |acc, p| acc | p),
    }
}

impl PartialEq for Predicate {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Predicate::Leaf(a), Predicate::Leaf(b)) => Arc::ptr_eq(a, b),
            (Predicate::And(a), Predicate::And(b)) => unordered_eq(a, b),
            (Predicate::Or(a), Predicate::Or(b)) => unordered_eq(a, b),
            (Predicate::Not(a), Predicate::Not(b)) => a == b,
            (Predicate::Always(a), Predicate::Always(b)) => a == b,
            _ => false,
        }
    }
}

fn unordered_eq(a: &[Predicate], b: &[Predicate]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut used = vec![false; b.len()];
    'outer: for pa in a {
        for (i, pb) in b.iter().enumerate() {
            if !used[i] && pa == pb {
                used[i] = true;
                continue 'outer;
            }
        }
        return false;
    }
    true
}

impl BitAnd for Predicate {
    type Output = Predicate;

    fn bitand(self, rhs: Predicate) -> Predicate {
        Predicate::And(vec![self, rhs])
    }
}

impl BitOr for Predicate {
    type Output = Predicate;

    fn bitor(self, rhs: Predicate) -> Predicate {
        Predicate::Or(vec![self, rhs])
    }
}

impl StdNot for Predicate {
    type Output = Predicate;

    fn not(self) -> Predicate {
        Predicate::Not(Box::new(self))
    }
}

/// Process-wide, monotonically growing cache of derived leaf predicates
/// (spec §5 "Shared resources", §9 "Identity-based predicate memoisation").
pub struct PredicateRegistry {
    tags: Mutex<HashMap<RegistryKey, Arc<Leaf>>>,
}

impl PredicateRegistry {
    pub fn global() -> &'static PredicateRegistry {
        static REGISTRY: OnceLock<PredicateRegistry> = OnceLock::new();
        REGISTRY.get_or_init(|| PredicateRegistry {
            tags: Mutex::new(HashMap::new()),
        })
    }

    pub fn derive_tag(&self, tag: &Tag) -> Predicate {
        let key = RegistryKey::Tag(tag.clone());
        let mut map = self.tags.lock().expect("predicate registry poisoned");
        let leaf = map.entry(key).or_insert_with(|| {
            let target = tag.clone();
            Arc::new(Leaf {
                eval: Box::new(move |tags: &BTreeSet<Tag>| tags.contains(&target)),
            })
        });
        Predicate::Leaf(Arc::clone(leaf))
    }

    pub fn derive_pattern(&self, pattern: &TagPattern) -> Predicate {
        let key = RegistryKey::Pattern(
            pattern.key_source().to_string(),
            pattern.value_source().to_string(),
        );
        let mut map = self.tags.lock().expect("predicate registry poisoned");
        let leaf = map.entry(key).or_insert_with(|| {
            let target = pattern.clone();
            Arc::new(Leaf {
                eval: Box::new(move |tags: &BTreeSet<Tag>| tags.iter().any(|t| target.matches(t))),
            })
        });
        Predicate::Leaf(Arc::clone(leaf))
    }

    pub fn deregister_tag(&self, tag: &Tag) {
        let key = RegistryKey::Tag(tag.clone());
        self.tags.lock().expect("predicate registry poisoned").remove(&key);
    }

    pub fn deregister_pattern(&self, pattern: &TagPattern) {
        let key = RegistryKey::Pattern(
            pattern.key_source().to_string(),
            pattern.value_source().to_string(),
        );
        self.tags.lock().expect("predicate registry poisoned").remove(&key);
    }
}
