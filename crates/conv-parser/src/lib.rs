// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Converts raw string arguments emitted by the model into a validated
//! JSON object, re-querying the model on failure (spec §4.6).
//!
//! Arbitrary-type deserialization the way `lalia`'s pydantic-backed parser
//! does it has no equivalent at runtime in Rust without code generation;
//! this parser validates against a [`PropObject`] schema and yields a
//! `serde_json::Map` instead of an arbitrary `T` (documented in
//! DESIGN.md).

use conv_functions::{validate, Prop, PropObject, ToolSchema};
use conv_llm::{ChatRequest, LlmClient};
use conv_messages::{FunctionMessage, Message};
use conv_types::{FunctionCallPolicy, Tag};
use serde_json::{Map, Value};

/// Tries strict JSON first, then YAML as a superset recovery path (spec
/// §4.6 step 1). The first successful deserialization wins.
fn deserialize(payload: &str) -> Option<Value> {
    if let Ok(v) = serde_json::from_str::<Value>(payload) {
        return Some(v);
    }
    serde_yaml::from_str::<Value>(payload).ok()
}

fn error_message(kind: &str, payload: &str, detail: &str) -> FunctionMessage {
    let message = Message::function(
        "parser",
        format!("Failed to parse arguments: {detail}\nPayload: {payload}"),
    )
    .with_tag(Tag::new("error", "function_call").expect("static tag"))
    .with_tag(Tag::new("error", kind).expect("static tag"));
    match message {
        Message::Function(fm) => fm,
        _ => unreachable!("Message::function always returns a FunctionMessage"),
    }
}

fn wrap_schema(schema: &PropObject, _wrapper_name: &str) -> PropObject {
    PropObject::new().with_property("response", Prop::Object(schema.clone()), true)
}

/// Drives the repair loop of spec §4.6 against one LLM, capped at
/// `max_retries` attempts.
pub struct Parser<'a> {
    llm: &'a dyn LlmClient,
    max_retries: usize,
}

impl<'a> Parser<'a> {
    pub fn new(llm: &'a dyn LlmClient, max_retries: usize) -> Self {
        Self { llm, max_retries }
    }

    /// Returns the validated argument object (or `None` on exhausted
    /// retries) and the chain of repair-error messages produced along the
    /// way (spec §4.6).
    pub async fn parse(
        &self,
        payload: &str,
        schema: &PropObject,
        target_name: &str,
        context: &[Message],
    ) -> (Option<Map<String, Value>>, Vec<FunctionMessage>) {
        let mut payload = payload.to_string();
        let mut errors = Vec::new();
        let mut context_messages: Vec<Message> = context.to_vec();

        for _attempt in 0..self.max_retries {
            let parsed = deserialize(&payload);
            let failure = match &parsed {
                Some(value) => match validate(schema, value) {
                    Ok(()) => return (value.as_object().cloned(), errors),
                    Err(e) => Some(("validation", e.to_string())),
                },
                None => Some(("deserialization", "not valid JSON or YAML".to_string())),
            };

            let (kind, detail) = failure.expect("loop only continues on failure");
            let msg = error_message(kind, &payload, &detail);
            errors.push(msg.clone());
            context_messages.push(Message::Function(msg));

            let wrapper_name = format!("{target_name}_response");
            let wrapper_schema = wrap_schema(schema, &wrapper_name);
            let mut request = ChatRequest::new(context_messages.clone());
            request.functions = vec![ToolSchema::new(
                &wrapper_name,
                format!("Corrected arguments for {target_name}"),
                &wrapper_schema,
            )];
            request.function_call = FunctionCallPolicy::ByName(wrapper_name.clone());

            match self.llm.complete(request).await {
                Ok(response) => match next_payload(&response) {
                    Some(next) => payload = next,
                    None => break,
                },
                Err(_) => break,
            }
        }

        (None, errors)
    }
}

fn next_payload(response: &conv_llm::ChatCompletionResponse) -> Option<String> {
    let choice = response.choices.first()?;
    if let Message::Assistant(am) = &choice.message {
        let fc = am.function_call.as_ref()?;
        let args = fc.arguments.as_ref()?;
        let inner = args.get("response")?;
        return serde_json::to_string(inner).ok();
    }
    None
}

/// Iterates over fallback LLMs in order (spec §4.6 step 6): the first one
/// to produce a non-`None` result wins.
pub async fn parse_with_fallbacks(
    llms: &[&dyn LlmClient],
    max_retries: usize,
    payload: &str,
    schema: &PropObject,
    target_name: &str,
    context: &[Message],
) -> (Option<Map<String, Value>>, Vec<FunctionMessage>) {
    let mut all_errors = Vec::new();
    for llm in llms {
        let parser = Parser::new(*llm, max_retries);
        let (value, mut errors) = parser.parse(payload, schema, target_name, context).await;
        all_errors.append(&mut errors);
        if value.is_some() {
            return (value, all_errors);
        }
    }
    (None, all_errors)
}
