//! # instar-contracts
//!
//! Shared types, configuration structures, and error taxonomy for the Instar
//! engine.
//!
//! All crates in the workspace import from here. No business logic lives in
//! this crate — only data definitions, configuration, and error types.

pub mod config;
pub mod error;
pub mod governance;
pub mod records;
pub mod role;
pub mod run;

#[cfg(test)]
mod tests {
    use super::*;
    use error::InstarError;
    use governance::GovernanceDecision;
    use role::Role;
    use run::RunState;

    // ── Role ─────────────────────────────────────────────────────────────────

    #[test]
    fn role_parses_known_names() {
        assert_eq!("generator".parse::<Role>().unwrap(), Role::Generator);
        assert_eq!("critic".parse::<Role>().unwrap(), Role::Critic);
        assert_eq!("judge".parse::<Role>().unwrap(), Role::Judge);
        assert_eq!("router".parse::<Role>().unwrap(), Role::Router);
        assert_eq!("verifier".parse::<Role>().unwrap(), Role::Verifier);
    }

    #[test]
    fn role_rejects_unknown_name() {
        assert!("planner".parse::<Role>().is_err());
    }

    #[test]
    fn role_display_round_trips() {
        for role in [
            Role::Generator,
            Role::Critic,
            Role::Judge,
            Role::Router,
            Role::Verifier,
        ] {
            let parsed: Role = role.to_string().parse().unwrap();
            assert_eq!(parsed, role);
        }
    }

    #[test]
    fn role_serde_uses_snake_case() {
        let json = serde_json::to_string(&Role::Generator).unwrap();
        assert_eq!(json, "\"generator\"");
        let decoded: Role = serde_json::from_str("\"judge\"").unwrap();
        assert_eq!(decoded, Role::Judge);
    }

    // ── RunState ─────────────────────────────────────────────────────────────

    #[test]
    fn run_state_slots_default_to_empty_string() {
        let state = RunState::new("do the thing");
        assert_eq!(state.task, "do the thing");
        assert_eq!(state.slot("missing"), "");
        assert!(!state.verification_passed);
        assert!(state.authoritative_artifact.is_empty());
    }

    #[test]
    fn run_state_set_verification_gates_authority() {
        let mut state = RunState::new("task");
        state.final_candidate = "print('ok')".to_string();

        state.set_verification(false, "tests failed");
        assert!(!state.verification_passed);
        assert_eq!(state.verification_evidence, "tests failed");
        assert!(
            state.authoritative_artifact.is_empty(),
            "authority must never be granted on a failed verification"
        );

        state.set_verification(true, "all tests passed");
        assert!(state.verification_passed);
        assert_eq!(state.authoritative_artifact, "print('ok')");
    }

    #[test]
    fn run_state_ids_are_unique() {
        let a = RunState::new("t");
        let b = RunState::new("t");
        assert_ne!(a.run_id, b.run_id);
    }

    // ── GovernanceDecision ───────────────────────────────────────────────────

    #[test]
    fn governance_decision_constructors() {
        let ok = GovernanceDecision::allowed();
        assert!(ok.allowed);
        assert!(ok.reason.is_empty());

        let no = GovernanceDecision::denied("entity is paused");
        assert!(!no.allowed);
        assert_eq!(no.reason, "entity is paused");
    }

    // ── Error display ────────────────────────────────────────────────────────

    #[test]
    fn error_graph_cycle_display() {
        let err = InstarError::GraphCycle {
            remaining: vec!["a".to_string(), "b".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("cycle"));
        assert!(msg.contains('a') && msg.contains('b'));
    }

    #[test]
    fn error_missing_binding_display() {
        let err = InstarError::MissingBinding {
            node: "critic".to_string(),
            binding: "critic-model".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("critic-model"));
        assert!(msg.contains("critic"));
    }

    #[test]
    fn error_unresolved_final_node_display() {
        let err = InstarError::UnresolvedFinalNode { candidates: 2 };
        assert!(err.to_string().contains('2'));
    }
}
