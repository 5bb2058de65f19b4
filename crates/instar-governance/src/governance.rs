//! Molt gating, human veto, and the governance audit trail.
//!
//! Enforced outside the cognitive loop: the runner never calls these — a
//! molt is requested by the hosting application, and the actual substitution
//! of a new graph/bindings/prompts is the caller's responsibility. This
//! layer only gates and records.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use instar_contracts::{
    config::GovernanceConfig,
    error::InstarResult,
    governance::GovernanceDecision,
};
use instar_store::{Store, KEY_LAST_MOLT_AT, KEY_PAUSED};

/// Preflight check: may this entity molt right now?
///
/// The human veto is checked first and wins regardless of cooldown state;
/// otherwise the cooldown against `last_molt_at` applies. Read-only — for
/// the race-safe check-and-record, use [`trigger_molt`].
pub fn can_molt(store: &Store, config: &GovernanceConfig) -> InstarResult<GovernanceDecision> {
    if store.governance_value(KEY_PAUSED)?.as_deref() == Some("1") {
        return Ok(GovernanceDecision::denied("entity is paused (human veto)"));
    }
    if let Some(raw) = store.governance_value(KEY_LAST_MOLT_AT)? {
        // A malformed stamp is treated as "never molted" rather than a
        // permanent lockout.
        if let Ok(last) = DateTime::parse_from_rfc3339(&raw) {
            let elapsed = Utc::now().signed_duration_since(last.with_timezone(&Utc));
            let limit = chrono::Duration::from_std(config.molt_rate_limit)
                .unwrap_or(chrono::Duration::MAX);
            if elapsed < limit {
                return Ok(GovernanceDecision::denied(format!(
                    "molt rate limit: wait {}s between molts",
                    config.molt_rate_limit.as_secs_f64()
                )));
            }
        }
    }
    Ok(GovernanceDecision::allowed())
}

/// Request a molt: atomically re-check the gate and, on allow, write one
/// checkpoint, advance `last_molt_at` and the entity version, and append a
/// `molt` audit event.
///
/// On deny, no side effect is performed and the denial reason is returned.
/// The check-and-record runs inside a single store transaction, so two
/// molts racing on the cooldown can never both pass.
pub fn trigger_molt(
    store: &Store,
    config: &GovernanceConfig,
    entity_version: &str,
    graph_hash: &str,
    memory_hash: &str,
    artifact_refs: &[String],
) -> InstarResult<GovernanceDecision> {
    let graph_hash = if graph_hash.is_empty() { "molt" } else { graph_hash };
    let decision = store.checkpoint_molt(
        entity_version,
        graph_hash,
        memory_hash,
        artifact_refs,
        config.molt_rate_limit,
    )?;
    if decision.allowed {
        info!(entity_id = %store.entity_id(), entity_version, "molt allowed");
    } else {
        warn!(entity_id = %store.entity_id(), reason = %decision.reason, "molt denied");
    }
    Ok(decision)
}

/// Human veto: pause the entity. Unconditional and never rate-limited — a
/// veto must always be actionable.
pub fn pause(store: &Store) -> InstarResult<()> {
    store.set_governance_value(KEY_PAUSED, "1")?;
    store.append_audit("pause", "human veto")?;
    warn!(entity_id = %store.entity_id(), "entity paused");
    Ok(())
}

/// Lift the veto and restore normal rate-limit-only gating.
pub fn resume(store: &Store) -> InstarResult<()> {
    store.set_governance_value(KEY_PAUSED, "0")?;
    store.append_audit("resume", "")?;
    info!(entity_id = %store.entity_id(), "entity resumed");
    Ok(())
}

/// Whether the human veto is currently active.
pub fn is_paused(store: &Store) -> InstarResult<bool> {
    Ok(store.governance_value(KEY_PAUSED)?.as_deref() == Some("1"))
}

/// Record an emergency shutdown in the audit log.
pub fn emergency_shutdown(store: &Store) -> InstarResult<()> {
    store.append_audit("emergency_shutdown", "")?;
    warn!(entity_id = %store.entity_id(), "emergency shutdown recorded");
    Ok(())
}
