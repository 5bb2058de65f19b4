//! Governance decision and strategy-review types.
//!
//! A denied molt is a normal control-flow outcome a caller must branch on,
//! so it is modeled as a value, never as an error.

use serde::{Deserialize, Serialize};

/// The governance layer's answer to "may this entity molt now?".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernanceDecision {
    pub allowed: bool,
    /// Human-readable denial reason; empty when allowed.
    pub reason: String,
}

impl GovernanceDecision {
    pub fn allowed() -> Self {
        Self { allowed: true, reason: String::new() }
    }

    pub fn denied(reason: impl Into<String>) -> Self {
        Self { allowed: false, reason: reason.into() }
    }
}

/// A proposed prompt change produced by the strategy review pass.
///
/// Proposals only: applying one is the human/governance layer's decision,
/// which writes a new strategy version through the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategySuggestion {
    /// The role whose prompt should change.
    pub role: String,
    /// What to change and why, in plain language.
    pub suggestion: String,
}
