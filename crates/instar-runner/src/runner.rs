//! The run orchestrator: one task in, one gated artifact out.
//!
//! The pipeline is a strict sequence — no stage starts before its
//! predecessors' outputs are in the slots, and stage execution is
//! sequential even across independent branches (a deliberate
//! simplification: deterministic slot-write ordering over throughput).
//!
//!   context inject → stages in topological order → gate → outcome row
//!   → [pass] verified-memory admission → [optional] checkpoint
//!
//! Structural problems (unresolved final node, missing binding) abort
//! before any external call and are never recorded as an outcome. A failed
//! verification is a normal, recorded outcome.

use std::collections::HashMap;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info, warn};

use instar_contracts::{
    config::RunOptions,
    error::{InstarError, InstarResult},
    role::Role,
    run::RunState,
};
use instar_gate::Gate;
use instar_graph::StageGraph;
use instar_store::{hash_graph, hash_memory, Store};

use crate::roles::{assemble_messages, system_prompt};
use crate::service::{CompletionService, DEFAULT_MAX_TOKENS};

/// Drives one stage graph against a set of bound completion services.
///
/// Construction validates the graph and the bindings, so a `Runner` that
/// exists can always schedule; `execute` may still fail on external calls.
pub struct Runner {
    graph: StageGraph,
    services: HashMap<String, Box<dyn CompletionService>>,
}

impl Runner {
    /// Validate `graph` and check that every non-verifier node's binding
    /// key has a service. Fails fast — before any stage ever executes.
    pub fn new(
        graph: StageGraph,
        services: HashMap<String, Box<dyn CompletionService>>,
    ) -> InstarResult<Self> {
        graph.validate()?;
        for node in &graph.nodes {
            if node.role != Role::Verifier && !services.contains_key(&node.binding) {
                return Err(InstarError::MissingBinding {
                    node: node.id.clone(),
                    binding: node.binding.clone(),
                });
            }
        }
        Ok(Self { graph, services })
    }

    /// The graph this runner schedules.
    pub fn graph(&self) -> &StageGraph {
        &self.graph
    }

    /// Execute one task through the full pipeline.
    ///
    /// Returns the run state with all slots filled and
    /// `authoritative_artifact` set iff verification passed. With a store
    /// attached, records an outcome row for every completed run and admits
    /// the artifact to verified memory on a gate pass (optionally writing a
    /// checkpoint per `options`).
    pub fn execute(
        &self,
        task: &str,
        test_artifact: Option<&str>,
        store: Option<&Store>,
        gate: &Gate,
        options: &RunOptions,
    ) -> InstarResult<RunState> {
        let started = Instant::now();
        let mut state = RunState::new(task);

        // Resolve order and terminal first: structural failures abort
        // before any external call or persistence write.
        let order = self.graph.topological_order()?;
        let final_id = self.graph.final_node_id()?.to_string();

        if let Some(store) = store {
            state.long_term_context = build_context(store, options)?;
        }

        info!(
            run_id = %state.run_id,
            stages = order.len(),
            final_node = %final_id,
            has_tests = test_artifact.is_some(),
            "run starting"
        );

        for node_id in &order {
            let Some(node) = self.graph.node(node_id) else {
                continue;
            };
            if node.role == Role::Verifier {
                continue;
            }

            // Predecessor outputs, keyed by the predecessor's role.
            let mut inputs: HashMap<Role, String> = HashMap::new();
            for pred_id in self.graph.predecessors(node_id) {
                if let Some(pred) = self.graph.node(pred_id) {
                    inputs.insert(pred.role, state.slot(pred_id).to_string());
                }
            }

            let system = system_prompt(node.role, store)?;
            let Some(messages) =
                assemble_messages(node.role, &system, task, &inputs, &state.long_term_context)
            else {
                continue;
            };

            let service =
                self.services
                    .get(&node.binding)
                    .ok_or_else(|| InstarError::MissingBinding {
                        node: node.id.clone(),
                        binding: node.binding.clone(),
                    })?;

            debug!(run_id = %state.run_id, node = %node.id, role = %node.role, "stage dispatch");
            let output = service.complete(&messages, DEFAULT_MAX_TOKENS)?;
            state.set_slot(node_id.as_str(), output.trim());
        }

        state.final_candidate = state.slot(&final_id).to_string();
        let report = gate.verify(&state.final_candidate, test_artifact)?;
        state.set_verification(report.passed, report.evidence);

        let latency_sec = started.elapsed().as_secs_f64();
        if state.verification_passed {
            info!(run_id = %state.run_id, latency_sec, "run verified");
        } else {
            warn!(run_id = %state.run_id, latency_sec, "run failed verification");
        }

        if let Some(store) = store {
            let task_ref: String = task.chars().take(100).collect();
            store.record_outcome(state.verification_passed, latency_sec, &task_ref)?;

            if state.verification_passed && !state.authoritative_artifact.is_empty() {
                let artifact_ref = format!("artifact_{}", Utc::now().timestamp_millis());
                let summary =
                    format!("Verified artifact ({} chars)", state.authoritative_artifact.len());
                let preview: String =
                    state.authoritative_artifact.chars().take(2000).collect();
                store.add_verified(&artifact_ref, &summary, &preview)?;

                if options.write_checkpoint {
                    let graph_hash = hash_graph(self.graph.to_canonical_json().as_bytes());
                    let refs = vec![artifact_ref];
                    let memory_hash = hash_memory(&refs);
                    store.write_checkpoint(
                        &options.entity_version,
                        &graph_hash,
                        &memory_hash,
                        &refs,
                    )?;
                }
            }
        }

        Ok(state)
    }
}

/// Concatenate truncated previews of the most recent verified entries into
/// the run's long-term context block.
fn build_context(store: &Store, options: &RunOptions) -> InstarResult<String> {
    let recent = store.get_recent_verified(options.context_entries)?;
    let parts: Vec<String> = recent
        .iter()
        .map(|entry| {
            if entry.content_preview.is_empty() {
                entry.summary.clone()
            } else {
                entry
                    .content_preview
                    .chars()
                    .take(options.context_preview_chars)
                    .collect()
            }
        })
        .filter(|part| !part.is_empty())
        .collect();
    Ok(parts.join("\n---\n"))
}
