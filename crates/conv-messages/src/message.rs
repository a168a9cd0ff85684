// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use conv_functions::Function;
use conv_types::{Role, Tag, TagPattern};
use serde_json::{Map, Value};

use crate::error::MessagesError;

/// `{ name, arguments?, function_ref?, context, parsing_error_messages }`
/// (spec §3). `arguments = None` encodes "model produced text that could
/// not be repaired".
#[derive(Clone)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: Option<Map<String, Value>>,
    /// The wire-level JSON-stringified payload the model actually emitted,
    /// kept alongside `arguments` so a repair pass has something to work
    /// from when decoding or validation fails (spec §4.6 "a string payload
    /// produced by the model").
    pub raw_arguments: Option<String>,
    pub function_ref: Option<Arc<dyn Function>>,
    pub context: BTreeSet<TagPattern>,
    pub parsing_error_messages: Vec<FunctionMessage>,
}

impl FunctionCall {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: None,
            raw_arguments: None,
            function_ref: None,
            context: BTreeSet::new(),
            parsing_error_messages: Vec::new(),
        }
    }
}

impl std::fmt::Debug for FunctionCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionCall")
            .field("name", &self.name)
            .field("arguments", &self.arguments)
            .field("raw_arguments", &self.raw_arguments)
            .field("function_ref", &self.function_ref.as_ref().map(|r| r.name().to_string()))
            .field("context", &self.context)
            .field("parsing_error_messages", &self.parsing_error_messages)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct SystemMessage {
    pub content: String,
    pub tags: BTreeSet<Tag>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct UserMessage {
    pub content: String,
    pub tags: BTreeSet<Tag>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct AssistantMessage {
    pub content: Option<String>,
    pub function_call: Option<FunctionCall>,
    pub tags: BTreeSet<Tag>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct FunctionMessage {
    pub name: String,
    pub content: String,
    pub result: Option<Value>,
    pub tags: BTreeSet<Tag>,
    pub timestamp: DateTime<Utc>,
}

/// Sum type discriminated by [`Role`] (spec §3). A `base` wire form exists
/// only at the serialization boundary in `conv-llm`; in-process code always
/// matches on this enum (spec §9 "Sum-typed messages").
#[derive(Debug, Clone)]
pub enum Message {
    System(SystemMessage),
    User(UserMessage),
    Assistant(AssistantMessage),
    Function(FunctionMessage),
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Message::System(SystemMessage {
            content: content.into(),
            tags: BTreeSet::new(),
            timestamp: Utc::now(),
        })
    }

    pub fn user(content: impl Into<String>) -> Self {
        Message::User(UserMessage {
            content: content.into(),
            tags: BTreeSet::new(),
            timestamp: Utc::now(),
        })
    }

    pub fn assistant_text(content: impl Into<String>) -> Self {
        Message::Assistant(AssistantMessage {
            content: Some(content.into()),
            function_call: None,
            tags: BTreeSet::new(),
            timestamp: Utc::now(),
        })
    }

    /// Fails with [`MessagesError::EmptyAssistantMessage`] unless at least
    /// one of `content`/`function_call` is present (spec §3 invariant).
    pub fn assistant(
        content: Option<String>,
        function_call: Option<FunctionCall>,
    ) -> Result<Self, MessagesError> {
        if content.is_none() && function_call.is_none() {
            return Err(MessagesError::EmptyAssistantMessage);
        }
        Ok(Message::Assistant(AssistantMessage {
            content,
            function_call,
            tags: BTreeSet::new(),
            timestamp: Utc::now(),
        }))
    }

    pub fn function(name: impl Into<String>, content: impl Into<String>) -> Self {
        Message::Function(FunctionMessage {
            name: name.into(),
            content: content.into(),
            result: None,
            tags: BTreeSet::new(),
            timestamp: Utc::now(),
        })
    }

    pub fn role(&self) -> Role {
        match self {
            Message::System(_) => Role::System,
            Message::User(_) => Role::User,
            Message::Assistant(_) => Role::Assistant,
            Message::Function(_) => Role::Function,
        }
    }

    pub fn tags(&self) -> &BTreeSet<Tag> {
        match self {
            Message::System(m) => &m.tags,
            Message::User(m) => &m.tags,
            Message::Assistant(m) => &m.tags,
            Message::Function(m) => &m.tags,
        }
    }

    pub fn tags_mut(&mut self) -> &mut BTreeSet<Tag> {
        match self {
            Message::System(m) => &mut m.tags,
            Message::User(m) => &mut m.tags,
            Message::Assistant(m) => &mut m.tags,
            Message::Function(m) => &mut m.tags,
        }
    }

    pub fn with_tag(mut self, tag: Tag) -> Self {
        self.tags_mut().insert(tag);
        self
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Message::System(m) => Some(&m.content),
            Message::User(m) => Some(&m.content),
            Message::Assistant(m) => m.content.as_deref(),
            Message::Function(m) => Some(&m.content),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assistant_requires_content_or_call() {
        assert!(matches!(
            Message::assistant(None, None),
            Err(MessagesError::EmptyAssistantMessage)
        ));
        assert!(Message::assistant(Some("hi".into()), None).is_ok());
        assert!(Message::assistant(None, Some(FunctionCall::new("f"))).is_ok());
    }

    #[test]
    fn role_matches_discriminant() {
        assert_eq!(Message::system("s").role(), Role::System);
        assert_eq!(Message::user("u").role(), Role::User);
        assert_eq!(Message::function("f", "r").role(), Role::Function);
    }

    #[test]
    fn with_tag_inserts_into_tag_set() {
        let tag = Tag::new("kind", "greeting").unwrap();
        let m = Message::user("hi").with_tag(tag.clone());
        assert!(m.tags().contains(&tag));
    }
}
