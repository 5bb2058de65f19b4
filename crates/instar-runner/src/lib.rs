//! # instar-runner
//!
//! The run orchestrator. Drives one task through the stage graph in
//! topological order, dispatching each stage to its bound completion
//! service, then hands the final candidate to the verification gate. Only
//! a gate pass admits the artifact into durable verified memory; every run
//! leaves an outcome row behind for the strategy review loop.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let graph = StageGraph::load(Path::new("pipeline.json"))?;
//! let mut services: HashMap<String, Box<dyn CompletionService>> = HashMap::new();
//! services.insert("default".to_string(), Box::new(my_gateway));
//!
//! let runner = Runner::new(graph, services)?;
//! let state = runner.execute(
//!     "Write a function add(a, b) that returns the sum.",
//!     Some("def test_add():\n    from solution import add\n    assert add(1, 2) == 3\n"),
//!     Some(&store),
//!     &Gate::default(),
//!     &RunOptions::default(),
//! )?;
//! assert!(state.verification_passed);
//! ```

pub mod improvement;
pub mod roles;
pub mod runner;
pub mod service;

pub use improvement::{apply_suggestion, review_strategies};
pub use roles::{assemble_messages, system_prompt};
pub use runner::Runner;
pub use service::{CompletionService, DEFAULT_MAX_TOKENS};

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use instar_contracts::{
        config::RunOptions,
        error::{InstarError, InstarResult},
        role::{ChatMessage, Role},
    };
    use instar_gate::Gate;
    use instar_graph::{StageEdge, StageGraph, StageNode};
    use instar_store::Store;

    use super::*;

    /// Returns a fixed response and records every message list it was sent.
    struct ScriptedService {
        response: String,
        recorded: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedService {
        fn new(response: &str) -> Arc<Self> {
            Arc::new(Self { response: response.to_string(), recorded: Mutex::new(Vec::new()) })
        }

        fn calls(&self) -> Vec<Vec<ChatMessage>> {
            self.recorded.lock().unwrap().clone()
        }
    }

    impl CompletionService for Arc<ScriptedService> {
        fn complete(&self, messages: &[ChatMessage], _max_tokens: u32) -> InstarResult<String> {
            self.recorded.lock().unwrap().push(messages.to_vec());
            Ok(self.response.clone())
        }
    }

    fn node(id: &str, role: Role, binding: &str) -> StageNode {
        StageNode { id: id.to_string(), role, binding: binding.to_string() }
    }

    fn edge(from: &str, to: &str) -> StageEdge {
        StageEdge { from: from.to_string(), to: to.to_string() }
    }

    /// generator → critic → judge → verify, each role on its own binding.
    fn pipeline_graph() -> StageGraph {
        StageGraph {
            nodes: vec![
                node("generator", Role::Generator, "gen"),
                node("critic", Role::Critic, "crit"),
                node("judge", Role::Judge, "judge"),
                node("verify", Role::Verifier, ""),
            ],
            edges: vec![
                edge("generator", "critic"),
                edge("critic", "judge"),
                edge("judge", "verify"),
            ],
            final_node: Some("judge".to_string()),
        }
    }

    fn bind(
        gen: &Arc<ScriptedService>,
        crit: &Arc<ScriptedService>,
        judge: &Arc<ScriptedService>,
    ) -> HashMap<String, Box<dyn CompletionService>> {
        let mut services: HashMap<String, Box<dyn CompletionService>> = HashMap::new();
        services.insert("gen".to_string(), Box::new(gen.clone()));
        services.insert("crit".to_string(), Box::new(crit.clone()));
        services.insert("judge".to_string(), Box::new(judge.clone()));
        services
    }

    fn python_available() -> bool {
        std::process::Command::new("python3")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    // ── Construction ──────────────────────────────────────────────────────────

    #[test]
    fn unbound_stage_fails_construction() {
        let graph = pipeline_graph();
        let mut services: HashMap<String, Box<dyn CompletionService>> = HashMap::new();
        services.insert("gen".to_string(), Box::new(ScriptedService::new("x")));

        let err = match Runner::new(graph, services) {
            Ok(_) => panic!("construction must fail without a critic binding"),
            Err(e) => e,
        };
        match err {
            InstarError::MissingBinding { node, binding } => {
                assert_eq!(node, "critic");
                assert_eq!(binding, "crit");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn verifier_stage_needs_no_binding() {
        let gen = ScriptedService::new("a");
        let crit = ScriptedService::new("b");
        let judge = ScriptedService::new("c");
        assert!(Runner::new(pipeline_graph(), bind(&gen, &crit, &judge)).is_ok());
    }

    #[test]
    fn cyclic_graph_fails_construction() {
        let graph = StageGraph {
            nodes: vec![node("a", Role::Generator, "gen"), node("b", Role::Critic, "gen")],
            edges: vec![edge("a", "b"), edge("b", "a")],
            final_node: Some("b".to_string()),
        };
        let gen = ScriptedService::new("x");
        let mut services: HashMap<String, Box<dyn CompletionService>> = HashMap::new();
        services.insert("gen".to_string(), Box::new(gen));

        assert!(matches!(
            Runner::new(graph, services),
            Err(InstarError::GraphCycle { .. })
        ));
    }

    // ── Execution ─────────────────────────────────────────────────────────────

    #[test]
    fn stages_run_in_order_and_fill_slots() {
        let gen = ScriptedService::new("the draft");
        let crit = ScriptedService::new("the critique");
        // Empty judge output keeps the gate from ever reaching a sandbox.
        let judge = ScriptedService::new("");
        let runner = Runner::new(pipeline_graph(), bind(&gen, &crit, &judge)).unwrap();

        let state = runner
            .execute("implement add", None, None, &Gate::default(), &RunOptions::default())
            .unwrap();

        assert_eq!(state.slot("generator"), "the draft");
        assert_eq!(state.slot("critic"), "the critique");
        assert_eq!(state.slot("judge"), "");
        assert_eq!(state.slot("verify"), "", "verifier stage never writes a slot");
        assert!(!state.verification_passed);
        assert_eq!(state.verification_evidence, "no candidate");
        assert!(state.authoritative_artifact.is_empty());

        // Each downstream stage saw its predecessor's output.
        let crit_calls = crit.calls();
        assert_eq!(crit_calls.len(), 1);
        assert!(crit_calls[0][1].content.contains("Draft code:\nthe draft"));
        let judge_calls = judge.calls();
        assert!(judge_calls[0][1].content.contains("Critique:\nthe critique"));
    }

    #[test]
    fn failed_run_records_outcome_but_admits_nothing() {
        let gen = ScriptedService::new("draft");
        let crit = ScriptedService::new("critique");
        let judge = ScriptedService::new("");
        let runner = Runner::new(pipeline_graph(), bind(&gen, &crit, &judge)).unwrap();
        let store = Store::in_memory("test-entity").unwrap();

        let options = RunOptions { write_checkpoint: true, ..RunOptions::default() };
        let state = runner
            .execute("a task", None, Some(&store), &Gate::default(), &options)
            .unwrap();
        assert!(!state.verification_passed);

        let outcomes = store.get_recent_outcomes(10).unwrap();
        assert_eq!(outcomes.len(), 1);
        assert!(!outcomes[0].verification_passed);
        assert_eq!(outcomes[0].task_ref, "a task");
        assert!(store.get_recent_verified(10).unwrap().is_empty());
        assert!(store.list_checkpoints(10).unwrap().is_empty());
    }

    #[test]
    fn verified_run_admits_artifact_and_checkpoints() {
        if !python_available() {
            return;
        }
        let gen = ScriptedService::new("def add(a, b):\n    return a + b");
        let crit = ScriptedService::new("looks fine");
        let judge = ScriptedService::new("def add(a, b):\n    return a + b\n");
        let runner = Runner::new(pipeline_graph(), bind(&gen, &crit, &judge)).unwrap();
        let store = Store::in_memory("test-entity").unwrap();

        let options = RunOptions {
            entity_version: "0.2.0".to_string(),
            write_checkpoint: true,
            ..RunOptions::default()
        };
        let state = runner
            .execute("implement add", None, Some(&store), &Gate::default(), &options)
            .unwrap();

        assert!(state.verification_passed, "evidence: {}", state.verification_evidence);
        assert_eq!(state.authoritative_artifact, "def add(a, b):\n    return a + b");

        let verified = store.get_recent_verified(10).unwrap();
        assert_eq!(verified.len(), 1);
        assert!(verified[0].artifact_ref.starts_with("artifact_"));
        assert!(verified[0].content_preview.contains("def add"));

        let outcomes = store.get_recent_outcomes(10).unwrap();
        assert!(outcomes[0].verification_passed);

        let checkpoints = store.list_checkpoints(10).unwrap();
        assert_eq!(checkpoints.len(), 1);
        assert_eq!(checkpoints[0].entity_version, "0.2.0");
        assert_eq!(checkpoints[0].artifact_refs, vec![verified[0].artifact_ref.clone()]);
        assert!(!checkpoints[0].graph_hash.is_empty());
    }

    #[test]
    fn verified_memory_is_injected_as_context() {
        let gen = ScriptedService::new("draft");
        let crit = ScriptedService::new("critique");
        let judge = ScriptedService::new("");
        let runner = Runner::new(pipeline_graph(), bind(&gen, &crit, &judge)).unwrap();

        let store = Store::in_memory("test-entity").unwrap();
        store
            .add_verified("artifact_1", "Verified artifact (20 chars)", "def earlier(): pass")
            .unwrap();

        runner
            .execute("new task", None, Some(&store), &Gate::default(), &RunOptions::default())
            .unwrap();

        let gen_calls = gen.calls();
        assert!(gen_calls[0][1]
            .content
            .contains("Relevant verified knowledge:\ndef earlier(): pass"));
    }

    #[test]
    fn strategy_override_replaces_system_prompt() {
        let gen = ScriptedService::new("draft");
        let crit = ScriptedService::new("critique");
        let judge = ScriptedService::new("");
        let runner = Runner::new(pipeline_graph(), bind(&gen, &crit, &judge)).unwrap();

        let store = Store::in_memory("test-entity").unwrap();
        store.set_strategy("generator", "You are a terse code generator.").unwrap();

        runner
            .execute("task", None, Some(&store), &Gate::default(), &RunOptions::default())
            .unwrap();

        let gen_calls = gen.calls();
        assert_eq!(gen_calls[0][0].content, "You are a terse code generator.");
        // Other roles keep their defaults.
        let crit_calls = crit.calls();
        assert_eq!(crit_calls[0][0].content, roles::CRITIC_SYSTEM);
    }

    // ── Strategy review ───────────────────────────────────────────────────────

    #[test]
    fn too_few_outcomes_yield_no_suggestions() {
        let store = Store::in_memory("test-entity").unwrap();
        store.record_outcome(false, 1.0, "t1").unwrap();
        store.record_outcome(false, 1.0, "t2").unwrap();
        assert!(review_strategies(&store, 10).unwrap().is_empty());
    }

    #[test]
    fn high_failure_rate_targets_generator_and_judge() {
        let store = Store::in_memory("test-entity").unwrap();
        for i in 0..4 {
            store.record_outcome(false, 1.0, &format!("t{i}")).unwrap();
        }

        let suggestions = review_strategies(&store, 10).unwrap();
        assert_eq!(suggestions.len(), 2);
        assert_eq!(suggestions[0].role, "generator");
        assert_eq!(suggestions[1].role, "judge");
    }

    #[test]
    fn healthy_entity_gets_no_suggestions() {
        let store = Store::in_memory("test-entity").unwrap();
        for i in 0..5 {
            store.record_outcome(true, 1.0, &format!("t{i}")).unwrap();
        }
        assert!(review_strategies(&store, 10).unwrap().is_empty());
    }

    #[test]
    fn applying_a_suggestion_versions_the_strategy() {
        let store = Store::in_memory("test-entity").unwrap();

        let v1 = apply_suggestion(&store, Role::Generator, "first prompt").unwrap();
        let v2 = apply_suggestion(&store, Role::Generator, "second prompt").unwrap();
        assert_eq!(v1, 1);
        assert_eq!(v2, 2);

        assert_eq!(store.get_strategy("generator").unwrap().unwrap(), "second prompt");
        assert_eq!(system_prompt(Role::Generator, Some(&store)).unwrap(), "second prompt");
    }
}
