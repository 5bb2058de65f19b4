//! The completion-service seam.
//!
//! Implementations of this trait are **untrusted** external collaborators —
//! HTTP gateways to language models, local inference servers, or scripted
//! mocks in tests. The runner never interprets their output beyond trimming
//! it into a stage slot; the gate is what decides whether it counts.

use instar_contracts::{error::InstarResult, role::ChatMessage};

/// Token budget used for every stage call.
pub const DEFAULT_MAX_TOKENS: u32 = 2048;

/// A role-bound external completion service.
pub trait CompletionService: Send + Sync {
    /// Send an ordered message list and return the assistant text.
    ///
    /// An empty or absent model response must be returned as an empty
    /// string, not an error. `Err` is reserved for transport failures
    /// (network, timeout), which fail the whole run — the runner does not
    /// retry individual stages.
    fn complete(&self, messages: &[ChatMessage], max_tokens: u32) -> InstarResult<String>;
}
