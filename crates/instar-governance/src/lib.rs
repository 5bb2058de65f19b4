//! # instar-governance
//!
//! Governance for self-modifying entities: the molt ("self-rewrite")
//! operation is gated by a per-entity cooldown and a human veto, and every
//! governance action lands in the append-only audit log.
//!
//! Denials are values (`GovernanceDecision`), not errors — a caller must
//! branch on them as routine control flow.

pub mod governance;

pub use governance::{can_molt, emergency_shutdown, is_paused, pause, resume, trigger_molt};
