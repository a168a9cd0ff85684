// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::TypesError;

/// Immutable key/value pair. `color` is a purely cosmetic presentation hint
/// and is excluded from equality, hashing and the wire form (spec §3, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    key: String,
    value: String,
    #[serde(skip)]
    color: Option<String>,
}

impl Tag {
    /// Fails with [`TypesError::EmptyKey`] if `key` is empty (spec §3 invariant).
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Result<Self, TypesError> {
        let key = key.into();
        if key.is_empty() {
            return Err(TypesError::EmptyKey);
        }
        Ok(Self {
            key,
            value: value.into(),
            color: None,
        })
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn color(&self) -> Option<&str> {
        self.color.as_deref()
    }

    /// Single-entry `{key: value}` map form (spec §4.1 normalisation table).
    pub fn from_map(map: &BTreeMap<String, String>) -> Result<Self, TypesError> {
        let (key, value) = map
            .iter()
            .next()
            .ok_or_else(|| TypesError::BadArgument("empty tag map".into()))?;
        Tag::new(key.clone(), value.clone())
    }
}

impl PartialEq for Tag {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.value == other.value
    }
}

impl Eq for Tag {}

impl Hash for Tag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
        self.value.hash(state);
    }
}

impl PartialOrd for Tag {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Tag {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (&self.key, &self.value).cmp(&(&other.key, &other.value))
    }
}

/// Immutable pair of compiled regular expressions matched "from the start of
/// the string" — the default semantics of Rust's `regex` crate's `find`
/// anchored at offset 0, matching the source library's `re.match` (spec §4.1).
#[derive(Debug, Clone)]
pub struct TagPattern {
    key: Regex,
    value: Regex,
    key_src: String,
    value_src: String,
}

impl TagPattern {
    pub fn new(key: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self, TypesError> {
        let key_src = key.as_ref().to_string();
        let value_src = value.as_ref().to_string();
        let key_re = Regex::new(&key_src).map_err(|source| TypesError::InvalidPattern {
            pattern: key_src.clone(),
            source,
        })?;
        let value_re = Regex::new(&value_src).map_err(|source| TypesError::InvalidPattern {
            pattern: value_src.clone(),
            source,
        })?;
        Ok(Self {
            key: key_re,
            value: value_re,
            key_src,
            value_src,
        })
    }

    pub fn from_map(map: &BTreeMap<String, String>) -> Result<Self, TypesError> {
        let (key, value) = map
            .iter()
            .next()
            .ok_or_else(|| TypesError::BadArgument("empty tag-pattern map".into()))?;
        TagPattern::new(key, value)
    }

    fn anchored_match(re: &Regex, s: &str) -> bool {
        re.find(s).map(|m| m.start() == 0).unwrap_or(false)
    }

    pub fn matches(&self, tag: &Tag) -> bool {
        Self::anchored_match(&self.key, tag.key()) && Self::anchored_match(&self.value, tag.value())
    }

    pub fn key_source(&self) -> &str {
        &self.key_src
    }

    pub fn value_source(&self) -> &str {
        &self.value_src
    }
}

impl PartialEq for TagPattern {
    fn eq(&self, other: &Self) -> bool {
        self.key_src == other.key_src && self.value_src == other.value_src
    }
}

impl Eq for TagPattern {}

impl Hash for TagPattern {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key_src.hash(state);
        self.value_src.hash(state);
    }
}

impl PartialOrd for TagPattern {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TagPattern {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (&self.key_src, &self.value_src).cmp(&(&other.key_src, &other.value_src))
    }
}

/// Normalises every accepted user-facing shape (spec §4.1) before a
/// [`Predicate`](crate::Predicate) is derived.
pub enum TagLike {
    Tag(Tag),
    TagPattern(TagPattern),
    Pair(String, String),
    Map(BTreeMap<String, String>),
    TagSet(Vec<Tag>),
    PatternSet(Vec<TagPattern>),
    PairSet(Vec<(String, String)>),
    MapSet(Vec<BTreeMap<String, String>>),
}

impl TryFrom<(&str, &str)> for TagLike {
    type Error = TypesError;

    fn try_from(pair: (&str, &str)) -> Result<Self, Self::Error> {
        Ok(TagLike::Pair(pair.0.to_string(), pair.1.to_string()))
    }
}
