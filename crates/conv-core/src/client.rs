// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use async_trait::async_trait;
use conv_budget::Budgeter;
use conv_functions::{validate, FunctionRegistry};
use conv_llm::{ChatCompletionResponse, ChatRequest, LlmClient, LlmError};
use conv_messages::Message;
use conv_parser::Parser;
use conv_types::{Predicate, Tag};
use serde_json::Value;

/// Composes a raw transport with the Budgeter and the repair-loop parser
/// to satisfy the full LLM Client contract of spec §4.8: truncate the
/// outgoing request excluding system messages, call the transport, then
/// splice repaired arguments, the resolved function reference, and the
/// parser's error chain into any function-call choice in the response.
pub struct Client {
    transport: Arc<dyn LlmClient>,
    budgeter: Budgeter,
    functions: Arc<FunctionRegistry>,
    max_parser_retries: usize,
}

impl Client {
    pub fn new(
        transport: Arc<dyn LlmClient>,
        budgeter: Budgeter,
        functions: Arc<FunctionRegistry>,
        max_parser_retries: usize,
    ) -> Self {
        Self {
            transport,
            budgeter,
            functions,
            max_parser_retries,
        }
    }

    fn exclude_system_messages() -> Result<Predicate, LlmError> {
        let tag = Tag::new("kind", "initial").map_err(|e| LlmError::Transport(e.to_string()))?;
        Ok(Predicate::from_tag(&tag))
    }
}

#[async_trait]
impl LlmClient for Client {
    async fn complete(&self, mut request: ChatRequest) -> Result<ChatCompletionResponse, LlmError> {
        let exclude_system = Self::exclude_system_messages()?;
        request.messages = self
            .budgeter
            .truncate(&request.messages, &request.functions, &exclude_system)?;
        let context_messages = request.messages.clone();

        let mut response = self.transport.complete(request).await?;

        for choice in response.choices.iter_mut() {
            let Message::Assistant(am) = &mut choice.message else {
                continue;
            };
            let Some(call) = am.function_call.as_mut() else {
                continue;
            };

            call.function_ref = self.functions.resolve(&call.name);
            let schema = call.function_ref.as_ref().map(|f| f.parameters_schema().clone());

            let already_valid = match (&call.arguments, &schema) {
                (Some(args), Some(schema)) => validate(schema, &Value::Object(args.clone())).is_ok(),
                (Some(_), None) => true,
                (None, _) => false,
            };

            if already_valid {
                continue;
            }

            match (&call.raw_arguments, &schema) {
                (Some(raw), Some(schema)) => {
                    tracing::warn!(function = %call.name, "repairing unparsable function call arguments");
                    let parser = Parser::new(self.transport.as_ref(), self.max_parser_retries);
                    let (parsed, errors) =
                        parser.parse(raw, schema, &call.name, &context_messages).await;
                    call.arguments = parsed;
                    call.parsing_error_messages = errors;
                }
                _ => {
                    call.arguments = None;
                }
            }
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conv_budget::CharHeuristicCounter;
    use conv_functions::{NativeFunction, Prop, PropObject};
    use conv_llm::{ChatCompletionResponse, Choice, MockLlmClient, Usage};
    use conv_messages::FunctionCall;
    use conv_types::FinishReason;
    use serde_json::{json, Map};

    fn budgeter(threshold: usize, completion_buffer: usize) -> Budgeter {
        Budgeter::new(threshold, completion_buffer, Box::new(CharHeuristicCounter)).unwrap()
    }

    fn registry_with_add() -> Arc<FunctionRegistry> {
        let registry = FunctionRegistry::new();
        registry.register(Arc::new(NativeFunction::new(
            "add",
            "adds two numbers",
            PropObject::new().with_property(
                "c",
                Prop::Number {
                    description: None,
                    minimum: None,
                    maximum: None,
                    default: None,
                },
                true,
            ),
            |args| Ok(args),
        )));
        Arc::new(registry)
    }

    fn stop_response() -> ChatCompletionResponse {
        ChatCompletionResponse::new(
            "resp-1",
            0,
            "mock",
            vec![Choice {
                index: 0,
                message: Message::assistant_text("ok"),
                finish_reason: FinishReason::Stop,
            }],
            Usage::default(),
        )
    }

    #[tokio::test]
    async fn truncation_protects_the_system_message() {
        let system_tag = Tag::new("kind", "initial").unwrap();
        let messages = vec![
            Message::system("you are terse").with_tag(system_tag),
            Message::user("padding padding padding padding padding padding"),
        ];

        let transport = Arc::new(MockLlmClient::new(vec![stop_response()]));
        let client = Client::new(transport.clone(), budgeter(5, 0), registry_with_add(), 2);

        client.complete(ChatRequest::new(messages)).await.unwrap();

        let sent = transport.requests();
        let forwarded = sent.first().expect("one request forwarded to the transport");
        assert_eq!(forwarded.messages.len(), 1);
        assert!(matches!(forwarded.messages[0], Message::System(_)));
    }

    #[tokio::test]
    async fn already_valid_arguments_pass_through_untouched() {
        let mut args = Map::new();
        args.insert("c".into(), json!(7));
        let mut call = FunctionCall::new("add");
        call.arguments = Some(args);

        let response = ChatCompletionResponse::new(
            "resp-1",
            0,
            "mock",
            vec![Choice {
                index: 0,
                message: Message::assistant(None, Some(call)).unwrap(),
                finish_reason: FinishReason::FunctionCall,
            }],
            Usage::default(),
        );

        let transport = Arc::new(MockLlmClient::new(vec![response]));
        let client = Client::new(transport, budgeter(500, 10), registry_with_add(), 2);

        let result = client
            .complete(ChatRequest::new(vec![Message::user("2 + 5")]))
            .await
            .unwrap();
        let Message::Assistant(am) = &result.choices[0].message else {
            panic!("expected an assistant message");
        };
        let call = am.function_call.as_ref().unwrap();
        assert!(call.function_ref.is_some());
        assert_eq!(call.arguments.as_ref().unwrap().get("c").unwrap(), &json!(7));
    }

    #[tokio::test]
    async fn invalid_arguments_are_repaired_from_raw_arguments() {
        let mut bad_call = FunctionCall::new("add");
        bad_call.raw_arguments = Some("not valid json".into());

        let first_response = ChatCompletionResponse::new(
            "resp-1",
            0,
            "mock",
            vec![Choice {
                index: 0,
                message: Message::assistant(None, Some(bad_call)).unwrap(),
                finish_reason: FinishReason::FunctionCall,
            }],
            Usage::default(),
        );

        let mut repaired_args = Map::new();
        repaired_args.insert("response".into(), json!({"c": 7}));
        let mut repaired_call = FunctionCall::new("add_response");
        repaired_call.arguments = Some(repaired_args);
        let repair_response = ChatCompletionResponse::new(
            "resp-2",
            0,
            "mock",
            vec![Choice {
                index: 0,
                message: Message::assistant(None, Some(repaired_call)).unwrap(),
                finish_reason: FinishReason::FunctionCall,
            }],
            Usage::default(),
        );

        let transport = Arc::new(MockLlmClient::new(vec![first_response, repair_response]));
        let client = Client::new(transport, budgeter(500, 10), registry_with_add(), 2);

        let result = client
            .complete(ChatRequest::new(vec![Message::user("2 + 5")]))
            .await
            .unwrap();
        let Message::Assistant(am) = &result.choices[0].message else {
            panic!("expected an assistant message");
        };
        let call = am.function_call.as_ref().unwrap();
        assert_eq!(call.arguments.as_ref().unwrap().get("c").unwrap(), &json!(7));
        assert_eq!(call.parsing_error_messages.len(), 1);
    }
}
