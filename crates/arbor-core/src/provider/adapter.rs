use super::request::{ProviderReply, ProviderRequest};
use crate::error::Result;
use crate::tool::ToolCallDelta;
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};

/// Why a streamed response ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Plain completion
    Stop,
    /// The response ends with a tool call to validate
    ToolCalls,
    /// Token limit reached
    Length,
}

/// Event of a streamed provider response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamEvent {
    TextDelta(String),
    ToolCallDelta(ToolCallDelta),
    Finish(FinishReason),
}

pub type ProviderStream = BoxStream<'static, Result<StreamEvent>>;

/// Vendor adapter behind a normalized request/response interface.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Provider name, also used as the conversation tag.
    fn name(&self) -> &str;

    async fn complete(&self, request: &ProviderRequest) -> Result<ProviderReply>;

    /// Streams the response. Adapters without native streaming replay their
    /// complete reply as events.
    async fn stream(&self, request: &ProviderRequest) -> Result<ProviderStream> {
        let reply = self.complete(request).await?;
        Ok(stream::iter(reply_events(reply)).map(Ok).boxed())
    }

    /// Best-effort refresh of the models this provider currently serves.
    async fn latest_available_model_names(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Event sequence equivalent to a complete reply.
pub fn reply_events(reply: ProviderReply) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    if !reply.text.is_empty() {
        events.push(StreamEvent::TextDelta(reply.text));
    }
    match reply.tool_call {
        Some(call) => {
            events.push(StreamEvent::ToolCallDelta(ToolCallDelta {
                index: 0,
                id: Some(call.id),
                name: Some(call.name),
                arguments: Some(call.arguments),
            }));
            events.push(StreamEvent::Finish(FinishReason::ToolCalls));
        }
        None => events.push(StreamEvent::Finish(FinishReason::Stop)),
    }
    events
}
