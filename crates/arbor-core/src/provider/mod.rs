//! Provider adapter contract.
//!
//! Vendor wire formats live outside this workspace; adapters consume a
//! `ProviderRequest` and produce a `ProviderReply` or a stream of
//! `StreamEvent`s.

mod adapter;
mod request;

pub use adapter::{FinishReason, ProviderAdapter, ProviderStream, StreamEvent, reply_events};
pub use request::{ProviderMessage, ProviderReply, ProviderRequest};
