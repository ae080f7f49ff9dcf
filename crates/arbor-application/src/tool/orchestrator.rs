//! Bounded request/validate retry loop around a provider adapter.
//!
//! ```text
//! AWAITING_RESPONSE --(no call)-----------------> Done
//! AWAITING_RESPONSE --(valid call)--------------> DoneWithCall
//! AWAITING_RESPONSE --(invalid, attempts < max)-> AWAITING_RESPONSE
//! AWAITING_RESPONSE --(attempts == max)---------> DoneExhausted
//! AWAITING_RESPONSE --(cancel token fired)------> Cancelled
//! ```

use arbor_core::config::{ArborConfig, DEFAULT_MAX_ATTEMPTS};
use arbor_core::error::Result;
use arbor_core::history::{EntryRole, ToolCallRecord};
use arbor_core::notice::Notifier;
use arbor_core::provider::{
    FinishReason, ProviderAdapter, ProviderMessage, ProviderReply, ProviderRequest, StreamEvent,
};
use arbor_core::tool::{
    RawToolCall, ToolCallAssembler, ToolSchemaRegistry, ToolValidation, is_viable_tool_call,
};
use futures::StreamExt;
use serde_json::{Map, Value};
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

/// Terminal state of `get_response_with_retry`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    /// Plain text answer, no tool call proposed
    Done,
    /// A valid tool call is ready for execution
    DoneWithCall,
    /// Every attempt proposed an invalid call
    DoneExhausted,
    /// Stopped by the caller; `text_response` holds the partial text
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryOutcome {
    pub text_response: String,
    pub tool_call: Option<ToolCallRecord>,
    pub state: RetryState,
    pub attempts: usize,
}

enum Attempt {
    Reply(ProviderReply),
    Cancelled(String),
}

pub struct ToolCallOrchestrator {
    registry: ToolSchemaRegistry,
    max_attempts: usize,
    notifier: Notifier,
}

impl ToolCallOrchestrator {
    pub fn new(registry: ToolSchemaRegistry, notifier: Notifier) -> Self {
        Self {
            registry,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            notifier,
        }
    }

    /// Uses the attempt cap from `config.tools`.
    pub fn from_config(config: &ArborConfig, registry: ToolSchemaRegistry, notifier: Notifier) -> Self {
        Self::new(registry, notifier).with_max_attempts(config.tools.max_attempts)
    }

    /// At least one attempt is always made.
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn registry(&self) -> &ToolSchemaRegistry {
        &self.registry
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Parses and validates a proposed call. Unparsable arguments give an
    /// invalid result instead of an error.
    pub fn validate(&self, call: &RawToolCall) -> (ToolValidation, Map<String, Value>) {
        match call.parse_arguments() {
            Ok(parameters) => {
                let validation = is_viable_tool_call(&self.registry, &call.name, &parameters);
                let parameters = match parameters {
                    Value::Object(map) => map,
                    _ => Map::new(),
                };
                (validation, parameters)
            }
            Err(err) => (ToolValidation::unparsable(&call.name, err), Map::new()),
        }
    }

    /// Drives request → parse → validate cycles until the provider answers
    /// without a call, proposes a valid one, the attempt cap is reached, or
    /// `cancel` fires.
    ///
    /// Rejected calls are appended to `request` as an assistant message
    /// carrying the call, followed by a tool message with the feedback, so
    /// the provider sees its own mistake on the next attempt. Text deltas are
    /// forwarded to `text_sink` as they arrive.
    ///
    /// # Errors
    ///
    /// Returns an error only if the provider adapter itself fails.
    pub async fn get_response_with_retry(
        &self,
        provider: &dyn ProviderAdapter,
        mut request: ProviderRequest,
        text_sink: Option<&UnboundedSender<String>>,
        cancel: &CancellationToken,
    ) -> Result<RetryOutcome> {
        let mut text_response = String::new();

        for attempt in 1..=self.max_attempts {
            if cancel.is_cancelled() {
                return Ok(Self::cancelled(text_response, attempt - 1));
            }
            tracing::debug!(
                "[ToolOrchestrator] Attempt {}/{} with {}",
                attempt,
                self.max_attempts,
                provider.name()
            );

            let reply = match self.request_once(provider, &request, text_sink, cancel).await? {
                Attempt::Reply(reply) => reply,
                Attempt::Cancelled(partial) => return Ok(Self::cancelled(partial, attempt)),
            };
            text_response = reply.text;

            let Some(raw_call) = reply.tool_call else {
                return Ok(RetryOutcome {
                    text_response,
                    tool_call: None,
                    state: RetryState::Done,
                    attempts: attempt,
                });
            };

            let (validation, parameters) = self.validate(&raw_call);
            let call = ToolCallRecord::new(raw_call.id, raw_call.name, parameters);

            if validation.is_valid {
                tracing::debug!("[ToolOrchestrator] Accepted call to {}", call.name);
                return Ok(RetryOutcome {
                    text_response,
                    tool_call: Some(call),
                    state: RetryState::DoneWithCall,
                    attempts: attempt,
                });
            }

            tracing::debug!(
                "[ToolOrchestrator] Rejected call to {}: {}",
                call.name,
                validation.feedback
            );
            let call_id = call.id.clone();
            request.push(ProviderMessage {
                tool_calls: vec![call],
                ..ProviderMessage::new(EntryRole::Assistant, text_response.clone())
            });
            request.push(ProviderMessage {
                tool_call_id: Some(call_id),
                ..ProviderMessage::new(EntryRole::Tool, validation.feedback)
            });
        }

        self.notifier.warn(format!(
            "{} did not produce a valid tool call after {} attempts",
            provider.name(),
            self.max_attempts
        ));
        Ok(RetryOutcome {
            text_response,
            tool_call: None,
            state: RetryState::DoneExhausted,
            attempts: self.max_attempts,
        })
    }

    async fn request_once(
        &self,
        provider: &dyn ProviderAdapter,
        request: &ProviderRequest,
        text_sink: Option<&UnboundedSender<String>>,
        cancel: &CancellationToken,
    ) -> Result<Attempt> {
        if !request.stream {
            let reply = provider.complete(request).await?;
            if cancel.is_cancelled() {
                return Ok(Attempt::Cancelled(reply.text));
            }
            if let Some(sink) = text_sink.filter(|_| !reply.text.is_empty()) {
                let _ = sink.send(reply.text.clone());
            }
            return Ok(Attempt::Reply(reply));
        }

        let mut stream = provider.stream(request).await?;
        let mut text = String::new();
        let mut assembler = ToolCallAssembler::new();
        let mut finish = None;

        while let Some(event) = stream.next().await {
            if cancel.is_cancelled() {
                tracing::debug!("[ToolOrchestrator] Stream cancelled after {} chars", text.len());
                return Ok(Attempt::Cancelled(text));
            }
            match event? {
                StreamEvent::TextDelta(delta) => {
                    if let Some(sink) = text_sink {
                        let _ = sink.send(delta.clone());
                    }
                    text.push_str(&delta);
                }
                StreamEvent::ToolCallDelta(delta) => assembler.push(delta),
                StreamEvent::Finish(reason) => {
                    finish = Some(reason);
                    break;
                }
            }
        }

        let tool_call = match finish {
            Some(FinishReason::ToolCalls) => assembler.first(),
            _ => {
                if !assembler.is_empty() {
                    tracing::warn!(
                        "[ToolOrchestrator] Ignoring tool call fragments without a tool-call finish"
                    );
                }
                None
            }
        };
        Ok(Attempt::Reply(ProviderReply { text, tool_call }))
    }

    fn cancelled(text_response: String, attempts: usize) -> RetryOutcome {
        RetryOutcome {
            text_response,
            tool_call: None,
            state: RetryState::Cancelled,
            attempts,
        }
    }

    /// Best-effort model list refresh. Failures are reported and give an
    /// empty list.
    pub async fn refresh_model_names(&self, provider: &dyn ProviderAdapter) -> Vec<String> {
        match provider.latest_available_model_names().await {
            Ok(names) => names,
            Err(err) => {
                self.notifier.warn(format!(
                    "Could not refresh models for {}: {}",
                    provider.name(),
                    err
                ));
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_core::error::ArborError;
    use arbor_core::notice::Severity;
    use arbor_core::provider::ProviderStream;
    use arbor_core::tool::{QUERY_PARAM, ToolCallDelta, WEB_SEARCH};
    use async_trait::async_trait;
    use futures::stream;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    /// Replays scripted replies and records every request it receives.
    struct ScriptedProvider {
        replies: Mutex<VecDeque<ProviderReply>>,
        fallback: ProviderReply,
        requests: Mutex<Vec<ProviderRequest>>,
    }

    impl ScriptedProvider {
        fn new(replies: Vec<ProviderReply>, fallback: ProviderReply) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                fallback,
                requests: Mutex::new(Vec::new()),
            }
        }

        fn always(reply: ProviderReply) -> Self {
            Self::new(Vec::new(), reply)
        }

        fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ProviderAdapter for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, request: &ProviderRequest) -> Result<ProviderReply> {
            self.requests.lock().unwrap().push(request.clone());
            let next = self.replies.lock().unwrap().pop_front();
            Ok(next.unwrap_or_else(|| self.fallback.clone()))
        }

        async fn latest_available_model_names(&self) -> Result<Vec<String>> {
            Err(ArborError::provider("connection refused"))
        }
    }

    /// Streams a fixed event sequence.
    struct EventProvider {
        events: Vec<StreamEvent>,
    }

    #[async_trait]
    impl ProviderAdapter for EventProvider {
        fn name(&self) -> &str {
            "events"
        }

        async fn complete(&self, _request: &ProviderRequest) -> Result<ProviderReply> {
            Err(ArborError::provider("stream only"))
        }

        async fn stream(&self, _request: &ProviderRequest) -> Result<ProviderStream> {
            Ok(stream::iter(self.events.clone()).map(Ok).boxed())
        }
    }

    fn search(arguments: &str) -> ProviderReply {
        ProviderReply::with_tool_call("searching", RawToolCall::new("call-1", WEB_SEARCH, arguments))
    }

    fn orchestrator() -> (ToolCallOrchestrator, mpsc::UnboundedReceiver<arbor_core::notice::Notice>) {
        let (notifier, notices) = Notifier::channel();
        (
            ToolCallOrchestrator::new(ToolSchemaRegistry::with_builtins(), notifier),
            notices,
        )
    }

    #[tokio::test]
    async fn test_plain_text_ends_loop() {
        let (orchestrator, _) = orchestrator();
        let provider = ScriptedProvider::always(ProviderReply::text("just text"));

        let outcome = orchestrator
            .get_response_with_retry(&provider, ProviderRequest::default(), None, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.state, RetryState::Done);
        assert_eq!(outcome.text_response, "just text");
        assert_eq!(outcome.attempts, 1);
    }

    #[tokio::test]
    async fn test_invalid_call_is_fed_back_then_accepted() {
        let (orchestrator, _) = orchestrator();
        let provider = ScriptedProvider::new(vec![search("{}")], search(r#"{"query": "rust"}"#));

        let outcome = orchestrator
            .get_response_with_retry(&provider, ProviderRequest::default(), None, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.state, RetryState::DoneWithCall);
        assert_eq!(outcome.attempts, 2);
        let call = outcome.tool_call.unwrap();
        assert_eq!(call.str_param(QUERY_PARAM), Some("rust"));

        let requests = provider.requests.lock().unwrap();
        let retried = &requests[1].messages;
        assert_eq!(retried.len(), 2);
        assert_eq!(retried[0].role, EntryRole::Assistant);
        assert_eq!(retried[0].tool_calls[0].name, WEB_SEARCH);
        assert_eq!(retried[1].role, EntryRole::Tool);
        assert_eq!(retried[1].tool_call_id.as_deref(), Some("call-1"));
        assert!(retried[1].content.contains(QUERY_PARAM));
    }

    #[tokio::test]
    async fn test_always_invalid_exhausts_after_five_attempts() {
        let (orchestrator, mut notices) = orchestrator();
        let provider = ScriptedProvider::always(search("not json"));

        let outcome = orchestrator
            .get_response_with_retry(&provider, ProviderRequest::default(), None, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.state, RetryState::DoneExhausted);
        assert_eq!(outcome.attempts, 5);
        assert_eq!(outcome.text_response, "searching");
        assert!(outcome.tool_call.is_none());
        assert_eq!(provider.request_count(), 5);
        assert_eq!(notices.try_recv().unwrap().severity, Severity::Warning);
    }

    #[tokio::test]
    async fn test_streamed_fragments_are_reassembled() {
        let (orchestrator, _) = orchestrator();
        let delta = |index, id: Option<&str>, name: Option<&str>, arguments: &str| {
            StreamEvent::ToolCallDelta(ToolCallDelta {
                index,
                id: id.map(str::to_owned),
                name: name.map(str::to_owned),
                arguments: Some(arguments.to_string()),
            })
        };
        let provider = EventProvider {
            events: vec![
                StreamEvent::TextDelta("Let me ".to_string()),
                StreamEvent::TextDelta("look.".to_string()),
                delta(0, Some("c0"), Some(WEB_SEARCH), "{\"que"),
                delta(1, Some("c1"), Some(WEB_SEARCH), "{\"query\": \"stray\"}"),
                delta(0, None, None, "ry\": \"tokio\"}"),
                StreamEvent::Finish(FinishReason::ToolCalls),
            ],
        };
        let (sink, mut deltas) = mpsc::unbounded_channel();
        let request = ProviderRequest::default().streaming(true);

        let outcome = orchestrator
            .get_response_with_retry(&provider, request, Some(&sink), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.state, RetryState::DoneWithCall);
        assert_eq!(outcome.text_response, "Let me look.");
        let call = outcome.tool_call.unwrap();
        assert_eq!(call.id, "c0");
        assert_eq!(call.str_param(QUERY_PARAM), Some("tokio"));
        assert_eq!(deltas.try_recv().unwrap(), "Let me ");
        assert_eq!(deltas.try_recv().unwrap(), "look.");
    }

    #[tokio::test]
    async fn test_fragments_without_tool_finish_are_ignored() {
        let (orchestrator, _) = orchestrator();
        let provider = EventProvider {
            events: vec![
                StreamEvent::TextDelta("done".to_string()),
                StreamEvent::ToolCallDelta(ToolCallDelta {
                    index: 0,
                    id: Some("c0".to_string()),
                    name: Some(WEB_SEARCH.to_string()),
                    arguments: Some("{}".to_string()),
                }),
                StreamEvent::Finish(FinishReason::Stop),
            ],
        };

        let outcome = orchestrator
            .get_response_with_retry(
                &provider,
                ProviderRequest::default().streaming(true),
                None,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.state, RetryState::Done);
        assert!(outcome.tool_call.is_none());
    }

    #[tokio::test]
    async fn test_cancelled_before_first_attempt() {
        let (orchestrator, _) = orchestrator();
        let provider = ScriptedProvider::always(ProviderReply::text("never"));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = orchestrator
            .get_response_with_retry(&provider, ProviderRequest::default(), None, &cancel)
            .await
            .unwrap();

        assert_eq!(outcome.state, RetryState::Cancelled);
        assert_eq!(outcome.attempts, 0);
        assert_eq!(provider.request_count(), 0);
    }

    /// Streams a fixed event sequence and fires `cancel` just before
    /// yielding the event at `cancel_at`.
    struct CancellingProvider {
        events: Vec<StreamEvent>,
        cancel_at: usize,
        cancel: CancellationToken,
    }

    #[async_trait]
    impl ProviderAdapter for CancellingProvider {
        fn name(&self) -> &str {
            "cancelling"
        }

        async fn complete(&self, _request: &ProviderRequest) -> Result<ProviderReply> {
            Err(ArborError::provider("stream only"))
        }

        async fn stream(&self, _request: &ProviderRequest) -> Result<ProviderStream> {
            let cancel = self.cancel.clone();
            let cancel_at = self.cancel_at;
            Ok(stream::iter(self.events.clone().into_iter().enumerate())
                .map(move |(position, event)| {
                    if position == cancel_at {
                        cancel.cancel();
                    }
                    Ok(event)
                })
                .boxed())
        }
    }

    #[tokio::test]
    async fn test_cancelled_mid_stream_keeps_partial_text() {
        let (orchestrator, _) = orchestrator();
        let cancel = CancellationToken::new();
        let provider = CancellingProvider {
            events: vec![
                StreamEvent::TextDelta("par".to_string()),
                StreamEvent::TextDelta("tial".to_string()),
                StreamEvent::TextDelta(" never seen".to_string()),
                StreamEvent::Finish(FinishReason::Stop),
            ],
            cancel_at: 2,
            cancel: cancel.clone(),
        };
        let (sink, mut deltas) = mpsc::unbounded_channel();

        let outcome = orchestrator
            .get_response_with_retry(
                &provider,
                ProviderRequest::default().streaming(true),
                Some(&sink),
                &cancel,
            )
            .await
            .unwrap();

        assert_eq!(outcome.state, RetryState::Cancelled);
        assert_eq!(outcome.text_response, "partial");
        assert_eq!(outcome.attempts, 1);
        assert!(outcome.tool_call.is_none());
        assert_eq!(deltas.try_recv().unwrap(), "par");
        assert_eq!(deltas.try_recv().unwrap(), "tial");
        assert!(deltas.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_attempt_cap_comes_from_config() {
        let mut config = ArborConfig::default();
        config.tools.max_attempts = 2;
        let (notifier, _notices) = Notifier::channel();
        let orchestrator =
            ToolCallOrchestrator::from_config(&config, ToolSchemaRegistry::with_builtins(), notifier);
        let provider = ScriptedProvider::always(search("{}"));

        let outcome = orchestrator
            .get_response_with_retry(&provider, ProviderRequest::default(), None, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(orchestrator.max_attempts(), 2);
        assert_eq!(outcome.state, RetryState::DoneExhausted);
        assert_eq!(outcome.attempts, 2);
        assert_eq!(provider.request_count(), 2);

        config.tools.max_attempts = 0;
        let (notifier, _notices) = Notifier::channel();
        let clamped =
            ToolCallOrchestrator::from_config(&config, ToolSchemaRegistry::with_builtins(), notifier);
        assert_eq!(clamped.max_attempts(), 1);
    }

    #[tokio::test]
    async fn test_provider_errors_propagate() {
        let (orchestrator, _) = orchestrator();
        let provider = EventProvider { events: Vec::new() };

        let result = orchestrator
            .get_response_with_retry(&provider, ProviderRequest::default(), None, &CancellationToken::new())
            .await;

        assert!(matches!(result, Err(ArborError::Provider(_))));
    }

    #[tokio::test]
    async fn test_refresh_model_names_degrades_to_empty() {
        let (orchestrator, mut notices) = orchestrator();
        let provider = ScriptedProvider::always(ProviderReply::text(""));

        assert!(orchestrator.refresh_model_names(&provider).await.is_empty());
        assert_eq!(notices.try_recv().unwrap().severity, Severity::Warning);
    }
}
