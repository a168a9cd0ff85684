// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The session loop state machine (spec §4.9): dispatch, generate, execute
//! any function call, repeat until a terminal finish reason or the
//! iteration cap, falling back to a single failure turn.

use std::collections::BTreeSet;
use std::sync::Arc;

use conv_budget::{Budgeter, CharHeuristicCounter};
use conv_functions::{execute_function_call, FunctionRegistry};
use conv_llm::{ChatRequest, Choice, LlmClient, Usage};
use conv_messages::{AssistantMessage, FunctionCall, FunctionMessage, Message, MessageBuffer};
use conv_types::{FinishReason, FunctionCallPolicy, Predicate, Tag, TagLike, TagPattern};

use crate::client::Client;
use crate::config::SessionConfig;
use crate::dispatcher::{DefaultDispatcher, Dispatcher};
use crate::error::SessionError;
use crate::progress::{NopProgressHandler, Progress, ProgressHandler, ProgressState};

const FAILURE_QUERY: &str = "Something went wrong. What happened?";

const ARGUMENT_PARSING_FAILURE_MESSAGE_TEMPLATE: &str =
    "The arguments for '{name}' could not be parsed into valid input after repeated attempts.";

const MAX_FUNCTION_CALL_RETRY_FAILURE_MESSAGE_TEMPLATE: &str =
    "Calling '{name}' kept failing and the retry budget for this turn is exhausted.";

/// The terminal outcome of one [`Session::submit`] call (spec §4.9).
#[derive(Debug, Clone)]
pub struct Completion {
    pub message: Message,
    pub finish_reason: FinishReason,
}

/// Distinguishes the two failure templates without threading format
/// strings through the call sites.
enum FailureKind {
    ArgumentParsing,
    MaxRetries,
}

/// `Session { llm, functions, failure_messages, dispatcher, buffer, config,
/// progress, usage }` (spec §3). `llm` is expected to already be a fully
/// composed client (budgeting + parser repair, spec §4.8) — typically a
/// [`Client`], constructed directly or via [`Session::with_transport`].
pub struct Session {
    llm: Arc<dyn LlmClient>,
    functions: Arc<FunctionRegistry>,
    failure_messages: Vec<Message>,
    dispatcher: Box<dyn Dispatcher>,
    buffer: MessageBuffer,
    config: SessionConfig,
    progress: Arc<dyn ProgressHandler>,
    usage: Usage,
    system_message: Option<Message>,
}

impl Session {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        system_prompt: Option<String>,
        functions: Arc<FunctionRegistry>,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        let mut buffer = MessageBuffer::with_default_fold(config.default_fold_tags.clone());
        let system_message = seed_system_message(&mut buffer, system_prompt)?;

        Ok(Self {
            llm,
            functions,
            failure_messages: vec![Message::user(FAILURE_QUERY)],
            dispatcher: Box::new(DefaultDispatcher),
            buffer,
            config,
            progress: Arc::new(NopProgressHandler),
            usage: Usage::default(),
            system_message,
        })
    }

    /// Convenience constructor assembling a [`Client`] (Budgeter + parser
    /// repair) around a raw transport, so callers configure one
    /// [`SessionConfig`] instead of wiring the composed client by hand.
    pub fn with_transport(
        transport: Arc<dyn LlmClient>,
        context_window: usize,
        system_prompt: Option<String>,
        functions: Arc<FunctionRegistry>,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        let budgeter = Budgeter::new(
            context_window,
            config.completion_buffer,
            Box::new(CharHeuristicCounter),
        )?;
        let client = Arc::new(Client::new(
            transport,
            budgeter,
            functions.clone(),
            config.max_parser_retries,
        ));
        Self::new(client, system_prompt, functions, config)
    }

    pub fn with_progress_handler(mut self, handler: Arc<dyn ProgressHandler>) -> Self {
        self.progress = handler;
        self
    }

    pub fn with_dispatcher(mut self, dispatcher: Box<dyn Dispatcher>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn with_failure_messages(mut self, messages: Vec<Message>) -> Self {
        self.failure_messages = messages;
        self
    }

    pub fn buffer(&self) -> &MessageBuffer {
        &self.buffer
    }

    pub fn tokens_used(&self) -> Usage {
        self.usage
    }

    /// Clears the buffer, re-seeds the system message, and resets the
    /// dispatcher and usage counters (supplements spec §4.9 with a
    /// `reset()` entry point mirroring `Session.reset`).
    pub fn reset(&mut self) -> Result<(), SessionError> {
        let system_prompt = self.system_message.as_ref().and_then(|m| m.text().map(str::to_string));
        self.buffer.clear();
        self.system_message = seed_system_message(&mut self.buffer, system_prompt)?;
        self.dispatcher.reset();
        self.usage = Usage::default();
        Ok(())
    }

    /// Adds and commits an initial batch of messages before the first
    /// `submit` call (spec §4.9 "supplemented" `init_messages`, used to
    /// seed few-shot turns ahead of the first user input).
    pub fn init_messages(&mut self, messages: impl IntoIterator<Item = Message>) {
        self.buffer.add_all(messages);
        if self.config.autocommit {
            self.buffer.commit();
        }
    }

    /// Submits one user turn and drives the session loop until a terminal
    /// response or `max_iterations` is reached (spec §4.9).
    pub async fn submit(&mut self, user_input: impl Into<String>) -> Result<Completion, SessionError> {
        self.buffer.add(Some(Message::user(user_input.into())));
        if self.config.autocommit {
            self.buffer.commit();
        }

        for iteration in 1..=self.config.max_iterations {
            match self.run_iteration(iteration).await {
                Ok(Some(completion)) => return Ok(completion),
                Ok(None) => continue,
                Err(err) => {
                    if self.config.rollback_on_error {
                        tracing::info!(iteration, "rolling back pending messages after error");
                        self.buffer.rollback();
                    }
                    return Err(err);
                }
            }
        }

        self.complete_failure().await
    }

    /// One Generating -> Executing|Stopping pass (spec §4.9). Returns
    /// `Some(Completion)` on a terminal finish reason, `None` to continue
    /// the outer loop.
    async fn run_iteration(&mut self, iteration: usize) -> Result<Option<Completion>, SessionError> {
        self.progress.on_progress(&Progress::new(ProgressState::Generating, iteration));

        let dispatch_call = self.dispatcher.dispatch(&self.buffer);
        let context = dispatch_call.context.clone();
        let visible_messages = self.visible_messages(&context)?;

        let mut request = ChatRequest::new(visible_messages);
        request.context = context.clone();
        request.functions = if dispatch_call.functions.is_empty() {
            self.functions.describe_all()
        } else {
            dispatch_call.functions.clone()
        };
        request.function_call = dispatch_call.function_call.clone();
        request.model = dispatch_call.model.clone();
        request.temperature = dispatch_call.temperature;

        let response = self.llm.complete(request).await?;
        self.usage += response.usage;

        for choice in response.choices {
            let (message, mut finish_reason) = self.handle_choice(choice, &context).await?;
            if let Some(override_reason) = dispatch_call.finish_reason_override {
                finish_reason = override_reason;
            }

            // Only `Delegate` (a successful function call) keeps the loop
            // going; every other finish reason, success or failure, ends
            // this `submit` call (spec §4.9: `Delegate` is the lone
            // non-terminal reason).
            if finish_reason.is_terminal() {
                if finish_reason == FinishReason::Stop {
                    self.progress.on_progress(&Progress::new(ProgressState::Stopping, iteration));
                }
                if self.config.autocommit {
                    tracing::info!(iteration, ?finish_reason, "committing turn");
                    self.buffer.commit();
                    self.dispatcher.reset();
                }
                return Ok(Some(Completion { message, finish_reason }));
            }
        }

        Ok(None)
    }

    /// Widens the visible message set to `context` (spec §4.9's `expand`
    /// step), snapshots it into an owned `Vec`, and lets the scoped
    /// unfold close immediately — the concurrency model is single-threaded
    /// and cooperative (spec §5), so nothing else observes the buffer
    /// between this snapshot and the call it feeds (documented in
    /// DESIGN.md). An empty `context` skips `expand` entirely: unfolding
    /// with an always-false predicate would be a no-op push, and passing
    /// `None` would instead clear the whole fold stack.
    fn visible_messages(&mut self, context: &BTreeSet<TagPattern>) -> Result<Vec<Message>, SessionError> {
        if context.is_empty() {
            return Ok(self.buffer.iter().cloned().collect());
        }
        let predicate = Predicate::from_tag_like(TagLike::PatternSet(context.iter().cloned().collect()))?;
        let guard = self.buffer.expand(Some(predicate));
        Ok(guard.buffer().iter().cloned().collect())
    }

    async fn handle_choice(
        &mut self,
        choice: Choice,
        context: &BTreeSet<TagPattern>,
    ) -> Result<(Message, FinishReason), SessionError> {
        match choice.message {
            Message::Assistant(am) if am.function_call.is_some() => {
                tracing::debug!(finish_reason = ?choice.finish_reason, "handling choice with a function call");
                self.handle_function_call_message(am, context).await
            }
            other => {
                tracing::debug!(finish_reason = ?choice.finish_reason, role = ?other.role(), "handling choice");
                self.buffer.add(Some(other.clone()));
                Ok((other, choice.finish_reason))
            }
        }
    }

    /// Executes a requested function call, repairing and re-querying on
    /// failure up to `max_function_call_attempts` times (spec §4.9
    /// Executing/Repairing states).
    async fn handle_function_call_message(
        &mut self,
        mut am: AssistantMessage,
        context: &BTreeSet<TagPattern>,
    ) -> Result<(Message, FinishReason), SessionError> {
        for _attempt in 1..=self.config.max_function_call_attempts {
            let mut call = am
                .function_call
                .clone()
                .expect("handle_function_call_message only runs with a function call present");
            let name = call.name.clone();

            am.tags.insert(Tag::new("function", name.clone())?);
            for error_message in std::mem::take(&mut call.parsing_error_messages) {
                self.buffer.add(Some(Message::Function(error_message)));
            }
            am.function_call = Some(call.clone());
            let call_message_index = self.buffer.len();
            self.buffer.add(Some(Message::Assistant(am.clone())));

            if call.arguments.is_none() || call.function_ref.is_none() {
                return self.handle_function_call_failure(FailureKind::ArgumentParsing, &name);
            }

            let (fn_message, finish) = self.handle_function_call(&call).await?;

            match finish {
                FinishReason::FunctionCallFailure => {
                    return Ok((Message::Function(fn_message), finish));
                }
                FinishReason::FunctionCallError => {
                    tracing::warn!(function = %name, "function call errored, retrying");
                    self.buffer.tag_at(call_message_index, Tag::new("error", "function_call")?);
                    am = self.complete_function_call_error(fn_message, context, &call).await?;
                }
                _ => {
                    return Ok((Message::Function(fn_message), finish));
                }
            }
        }

        let name = am.function_call.as_ref().map(|c| c.name.clone()).unwrap_or_default();
        self.handle_function_call_failure(FailureKind::MaxRetries, &name)
    }

    /// Invokes the resolved function and appends its outcome as a
    /// [`FunctionMessage`] — the sole point in the loop that records a
    /// function's execution result, whether it succeeded or errored
    /// (resolves the ordering between this and
    /// [`Session::complete_function_call_error`] documented in DESIGN.md).
    async fn handle_function_call(
        &mut self,
        call: &FunctionCall,
    ) -> Result<(FunctionMessage, FinishReason), SessionError> {
        let function = call
            .function_ref
            .as_ref()
            .expect("checked by the caller before invoking handle_function_call");
        let arguments = call
            .arguments
            .clone()
            .expect("checked by the caller before invoking handle_function_call");

        let result = execute_function_call(function.as_ref(), serde_json::Value::Object(arguments));

        let mut tags: BTreeSet<Tag> = BTreeSet::new();
        tags.insert(Tag::new("function", result.name.clone())?);
        if result.error.is_some() {
            tags.insert(Tag::new("error", "function_call")?);
        }

        let fn_message = FunctionMessage {
            name: result.name.clone(),
            content: result.to_content_string(),
            result: result.value.clone(),
            tags,
            timestamp: chrono::Utc::now(),
        };

        self.buffer.add(Some(Message::Function(fn_message.clone())));

        Ok((fn_message, result.finish_reason))
    }

    /// Unions the error message's tags into `context`, re-queries the LLM
    /// forcing the same function by name, and returns the corrective
    /// assistant message (spec §4.9 Repairing state, `_complete_function_call_error`).
    async fn complete_function_call_error(
        &mut self,
        fn_message: FunctionMessage,
        context: &BTreeSet<TagPattern>,
        call: &FunctionCall,
    ) -> Result<AssistantMessage, SessionError> {
        self.progress.on_progress(&Progress::new(ProgressState::Repairing, 0));

        let mut expand_context = context.clone();
        for tag in &fn_message.tags {
            expand_context.insert(TagPattern::new(
                format!("^{}$", regex::escape(tag.key())),
                format!("^{}$", regex::escape(tag.value())),
            )?);
        }

        let visible_messages = self.visible_messages(&expand_context)?;

        let schema = self
            .functions
            .describe(&call.name)
            .map_err(|_| SessionError::UnknownFunction(call.name.clone()))?;

        let mut request = ChatRequest::new(visible_messages);
        request.context = expand_context;
        request.function_call = FunctionCallPolicy::ByName(call.name.clone());
        request.functions = vec![schema];

        let response = self.llm.complete(request).await?;
        self.usage += response.usage;

        let choice = response.choices.into_iter().next().ok_or(SessionError::EmptyResponse)?;
        match choice.message {
            Message::Assistant(am) => Ok(am),
            other => Err(SessionError::UnexpectedChoiceRole(other.role())),
        }
    }

    /// Synthesizes and appends a terminal `(error, function_call)` message
    /// when a call can't be repaired or keeps failing (spec §4.9 states
    /// reaching `FunctionCallFailure`).
    fn handle_function_call_failure(
        &mut self,
        kind: FailureKind,
        name: &str,
    ) -> Result<(Message, FinishReason), SessionError> {
        let template = match kind {
            FailureKind::ArgumentParsing => ARGUMENT_PARSING_FAILURE_MESSAGE_TEMPLATE,
            FailureKind::MaxRetries => MAX_FUNCTION_CALL_RETRY_FAILURE_MESSAGE_TEMPLATE,
        };
        let content = template.replace("{name}", name);

        let message = Message::function(name, content)
            .with_tag(Tag::new("error", "function_call")?)
            .with_tag(Tag::new("function", name)?);
        self.buffer.add(Some(message.clone()));

        Ok((message, FinishReason::FunctionCallFailure))
    }

    /// One last LLM call over the `(error, .*)`-expanded buffer after the
    /// iteration cap is reached (spec §4.9 Failing state).
    async fn complete_failure(&mut self) -> Result<Completion, SessionError> {
        self.progress
            .on_progress(&Progress::new(ProgressState::Failing, self.config.max_iterations));

        self.buffer.add_all(self.failure_messages.clone());
        if self.config.autocommit {
            tracing::info!("committing synthesized failure query");
            self.buffer.commit();
        }

        let error_pattern = TagPattern::new("error", ".*")?;
        let context: BTreeSet<TagPattern> = std::iter::once(error_pattern).collect();
        let visible_messages = self.visible_messages(&context)?;

        let response = self.llm.complete(ChatRequest::new(visible_messages)).await?;
        self.usage += response.usage;

        let choice = response.choices.into_iter().next().ok_or(SessionError::EmptyResponse)?;
        let message = choice.message;
        self.buffer.add(Some(message.clone()));
        if self.config.autocommit {
            tracing::info!("committing failure response");
            self.buffer.commit();
            self.dispatcher.reset();
        }

        Ok(Completion {
            message,
            finish_reason: FinishReason::Failure,
        })
    }
}

fn seed_system_message(
    buffer: &mut MessageBuffer,
    system_prompt: Option<String>,
) -> Result<Option<Message>, SessionError> {
    match system_prompt {
        Some(content) => {
            let message = Message::system(content).with_tag(Tag::new("kind", "initial")?);
            buffer.add(Some(message.clone()));
            buffer.commit();
            Ok(Some(message))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conv_functions::{NativeFunction, PropObject};
    use conv_llm::{ChatCompletionResponse, Choice, MockLlmClient};
    use serde_json::{json, Map};

    fn registry_with_echo() -> Arc<FunctionRegistry> {
        let registry = FunctionRegistry::new();
        registry.register(Arc::new(NativeFunction::new(
            "echo",
            "echoes its input",
            PropObject::any_object(),
            |args| Ok(args),
        )));
        Arc::new(registry)
    }

    fn stop_response(text: &str) -> ChatCompletionResponse {
        ChatCompletionResponse::new(
            "resp-1",
            0,
            "mock-model",
            vec![Choice {
                index: 0,
                message: Message::assistant_text(text),
                finish_reason: FinishReason::Stop,
            }],
            Usage::default(),
        )
    }

    #[tokio::test]
    async fn submit_returns_on_plain_text_stop() {
        let mock = Arc::new(MockLlmClient::new(vec![stop_response("hi there")]));
        let mut session = Session::new(
            mock,
            Some("you are a helpful assistant".into()),
            registry_with_echo(),
            SessionConfig::new(),
        )
        .unwrap();

        let completion = session.submit("hello").await.unwrap();
        assert_eq!(completion.finish_reason, FinishReason::Stop);
        assert_eq!(completion.message.text(), Some("hi there"));
    }

    #[tokio::test]
    async fn system_message_is_tagged_kind_initial() {
        let mock = Arc::new(MockLlmClient::new(vec![]));
        let session = Session::new(
            mock,
            Some("you are a vet".into()),
            registry_with_echo(),
            SessionConfig::new(),
        )
        .unwrap();

        let tag = Tag::new("kind", "initial").unwrap();
        let system = session.buffer.get(0).unwrap();
        assert!(system.tags().contains(&tag));
    }

    #[tokio::test]
    async fn successful_function_call_continues_the_loop() {
        let registry = registry_with_echo();

        let mut args = Map::new();
        args.insert("x".into(), json!(1));
        let mut call = FunctionCall::new("echo");
        call.arguments = Some(args.clone());
        // `Session` expects `llm` to already be a composed client that has
        // resolved `function_ref` (spec §4.8); this test feeds a raw mock
        // transport directly, so it resolves the reference itself here.
        call.function_ref = registry.resolve("echo");

        let call_response = ChatCompletionResponse::new(
            "resp-1",
            0,
            "mock-model",
            vec![Choice {
                index: 0,
                message: Message::assistant(None, Some(call)).unwrap(),
                finish_reason: FinishReason::FunctionCall,
            }],
            Usage::default(),
        );

        let mock = Arc::new(MockLlmClient::new(vec![call_response, stop_response("done")]));
        let mut session = Session::new(mock, None, registry, SessionConfig::new()).unwrap();

        let completion = session.submit("call echo please").await.unwrap();
        assert_eq!(completion.finish_reason, FinishReason::Stop);
    }

    #[tokio::test]
    async fn unresolvable_function_ends_in_function_call_failure() {
        let mut call = FunctionCall::new("does_not_exist");
        call.arguments = Some(Map::new());
        let call_response = ChatCompletionResponse::new(
            "resp-1",
            0,
            "mock-model",
            vec![Choice {
                index: 0,
                message: Message::assistant(None, Some(call)).unwrap(),
                finish_reason: FinishReason::FunctionCall,
            }],
            Usage::default(),
        );

        let mock = Arc::new(MockLlmClient::new(vec![call_response]));
        let mut session = Session::new(mock, None, registry_with_echo(), SessionConfig::new()).unwrap();

        let completion = session.submit("call a ghost function").await.unwrap();
        assert_eq!(completion.finish_reason, FinishReason::FunctionCallFailure);
    }

    #[tokio::test]
    async fn function_call_error_tags_the_buffered_call_message() {
        let registry = FunctionRegistry::new();
        registry.register(Arc::new(NativeFunction::new(
            "always_errors",
            "always fails",
            PropObject::any_object(),
            |_| Err(conv_functions::FunctionsError::Invocation("boom".into())),
        )));
        let registry = Arc::new(registry);

        let mut call = FunctionCall::new("always_errors");
        call.arguments = Some(Map::new());
        call.function_ref = registry.resolve("always_errors");
        let call_response = ChatCompletionResponse::new(
            "resp-1",
            0,
            "mock-model",
            vec![Choice {
                index: 0,
                message: Message::assistant(None, Some(call)).unwrap(),
                finish_reason: FinishReason::FunctionCall,
            }],
            Usage::default(),
        );

        let mut config = SessionConfig::new();
        config.max_function_call_attempts = 1;

        let mock = Arc::new(MockLlmClient::new(vec![call_response, stop_response("sorry")]));
        let mut session = Session::new(mock, None, registry, config).unwrap();

        let completion = session.submit("call the failing function").await.unwrap();
        assert_eq!(completion.finish_reason, FinishReason::FunctionCallFailure);

        let error_tag = Tag::new("error", "function_call").unwrap();
        let call_message = (0..session.buffer.len())
            .filter_map(|i| session.buffer.get(i))
            .find(|m| matches!(m, Message::Assistant(am) if am.function_call.is_some()))
            .expect("the call message was buffered even though the default fold now hides it");
        assert!(
            call_message.tags().contains(&error_tag),
            "the call message should carry the error tag added after the retry failed"
        );
    }

    #[tokio::test]
    async fn exhausting_iterations_falls_back_to_failure_completion() {
        let mut config = SessionConfig::new();
        config.max_iterations = 1;

        let delegate_response = ChatCompletionResponse::new(
            "resp-1",
            0,
            "mock-model",
            vec![Choice {
                index: 0,
                message: Message::user("not an assistant message, forces Delegate"),
                finish_reason: FinishReason::Delegate,
            }],
            Usage::default(),
        );
        let failure_response = stop_response("here is what went wrong");

        let mock = Arc::new(MockLlmClient::new(vec![delegate_response, failure_response]));
        let mut session = Session::new(mock, None, registry_with_echo(), config).unwrap();

        let completion = session.submit("keep going forever").await.unwrap();
        assert_eq!(completion.finish_reason, FinishReason::Failure);
    }

    #[tokio::test]
    async fn reset_clears_buffer_but_reseeds_system_message() {
        let mock = Arc::new(MockLlmClient::new(vec![stop_response("hi")]));
        let mut session = Session::new(
            mock,
            Some("you are a vet".into()),
            registry_with_echo(),
            SessionConfig::new(),
        )
        .unwrap();

        session.submit("hello").await.unwrap();
        assert!(session.buffer.len() > 1);

        session.reset().unwrap();
        assert_eq!(session.buffer.len(), 1);
        let tag = Tag::new("kind", "initial").unwrap();
        assert!(session.buffer.get(0).unwrap().tags().contains(&tag));
    }
}
