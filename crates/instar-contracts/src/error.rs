//! Runtime error types for the Instar engine.
//!
//! All fallible operations return `InstarResult<T>`. Two whole classes of
//! failure are deliberately NOT errors: a failed verification is a normal
//! `GateReport` with `passed = false`, and a denied molt is a normal
//! `GovernanceDecision`. Errors here are structural or environmental —
//! things a caller cannot branch on as routine control flow.

use thiserror::Error;

/// The unified error type for the Instar engine.
#[derive(Debug, Error)]
pub enum InstarError {
    /// The stage graph contains a cycle; the listed nodes could not be
    /// scheduled. A cyclic graph is rejected outright, never truncated.
    #[error("stage graph contains a cycle involving nodes {remaining:?}")]
    GraphCycle { remaining: Vec<String> },

    /// No terminal stage could be resolved: no explicit final node is set
    /// and the number of sink nodes is not exactly one.
    #[error("terminal stage is ambiguous: {candidates} sink node(s) and no explicit final node")]
    UnresolvedFinalNode { candidates: usize },

    /// A stage references a binding key with no configured completion service.
    #[error("node '{node}' references binding '{binding}' which has no completion service")]
    MissingBinding { node: String, binding: String },

    /// An edge or final-node declaration references a node id that does not exist.
    #[error("graph references unknown node '{node}': {context}")]
    MissingNode { node: String, context: String },

    /// A stage-graph document could not be read or parsed.
    #[error("failed to load stage graph: {reason}")]
    GraphLoad { reason: String },

    /// The external completion service failed for a stage call.
    ///
    /// Not retried here — the caller decides whether to retry the whole run.
    #[error("completion service failed for node '{node}': {reason}")]
    Completion { node: String, reason: String },

    /// The verification sandbox could not be set up or its runner could not
    /// be spawned. Distinct from a failing test run, which is evidence, not
    /// an error.
    #[error("verification sandbox failure: {reason}")]
    Sandbox { reason: String },

    /// The durable store could not complete a read or write.
    #[error("store operation failed: {reason}")]
    Store { reason: String },
}

/// Convenience alias used throughout the Instar crates.
pub type InstarResult<T> = Result<T, InstarError>;
