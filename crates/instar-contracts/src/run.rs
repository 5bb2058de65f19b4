//! Per-run working state and the gate's verdict type.
//!
//! `RunState` is the ephemeral scratchpad for one task execution. It is
//! created fresh by the runner, mutated only by the runner and the gate
//! result, handed to the caller, and then discarded — it is never persisted
//! as-is. Durable knowledge enters the store only through gate admission.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ephemeral working state for a single run of the stage graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    /// Unique id for this run, used in logs and the outcome row.
    pub run_id: Uuid,
    /// The task text the caller submitted.
    pub task: String,
    /// Per-stage outputs, keyed by node id. Written in topological order.
    pub slots: HashMap<String, String>,
    /// The resolved final node's output, handed to the verification gate.
    pub final_candidate: String,
    /// Whether the gate passed the final candidate.
    pub verification_passed: bool,
    /// Parser message or captured test-runner output from the gate.
    pub verification_evidence: String,
    /// The verified artifact. Set iff `verification_passed`; empty otherwise.
    pub authoritative_artifact: String,
    /// Truncated previews of recent verified memory, injected into every
    /// stage's input as optional extra context.
    pub long_term_context: String,
}

impl RunState {
    /// Create fresh state for `task` with all outputs empty.
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            task: task.into(),
            slots: HashMap::new(),
            final_candidate: String::new(),
            verification_passed: false,
            verification_evidence: String::new(),
            authoritative_artifact: String::new(),
            long_term_context: String::new(),
        }
    }

    /// Store a stage's output.
    pub fn set_slot(&mut self, node_id: impl Into<String>, output: impl Into<String>) {
        self.slots.insert(node_id.into(), output.into());
    }

    /// Read a stage's output; an unwritten slot reads as empty.
    pub fn slot(&self, node_id: &str) -> &str {
        self.slots.get(node_id).map(String::as_str).unwrap_or("")
    }

    /// Apply the gate's verdict.
    ///
    /// On pass, the final candidate becomes the authoritative artifact. On
    /// fail, the artifact stays empty — it is never partially set.
    pub fn set_verification(&mut self, passed: bool, evidence: impl Into<String>) {
        self.verification_passed = passed;
        self.verification_evidence = evidence.into();
        if passed {
            self.authoritative_artifact = self.final_candidate.clone();
        }
    }
}

/// The verdict the verification gate returns for one candidate.
///
/// A failing report is a normal outcome, not an error: `evidence` carries
/// the parser message or captured test output the caller needs to decide on
/// retry, human intervention, or abandonment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateReport {
    /// True iff the candidate parsed (no tests) or the test runner exited
    /// successfully (tests supplied).
    pub passed: bool,
    /// Parse outcome or combined captured stdout+stderr from the runner.
    pub evidence: String,
}

impl GateReport {
    /// A passing report with the given evidence.
    pub fn pass(evidence: impl Into<String>) -> Self {
        Self { passed: true, evidence: evidence.into() }
    }

    /// A failing report with the given evidence.
    pub fn fail(evidence: impl Into<String>) -> Self {
        Self { passed: false, evidence: evidence.into() }
    }
}
