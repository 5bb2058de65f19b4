//! Durable row types read back from the store.
//!
//! Every row is scoped to one entity by the store itself, so entity ids do
//! not appear here. All of these are immutable once written; reads return
//! them most-recent-first.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One artifact admitted to long-term verified memory.
///
/// Created only by a successful gate outcome. Previews are truncated at
/// write time (2000 chars) and again when injected as run context (500).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifiedMemoryEntry {
    /// Generated reference, e.g. `artifact_1700000000000`.
    pub artifact_ref: String,
    /// Short description, e.g. "Verified artifact (184 chars)".
    pub summary: String,
    /// Leading slice of the artifact text, at most 2000 chars.
    pub content_preview: String,
    pub created_at: DateTime<Utc>,
}

/// A point-in-time binding of entity version, graph definition, and
/// verified-memory state. Append-only; never mutated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub entity_version: String,
    /// Hash of the graph definition document.
    pub graph_hash: String,
    /// Hash of the admitted artifact reference list.
    pub memory_hash: String,
    pub artifact_refs: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// One row per run, used only for aggregate measurement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outcome {
    /// Truncated task text (100 chars).
    pub task_ref: String,
    pub verification_passed: bool,
    pub latency_sec: f64,
    pub created_at: DateTime<Utc>,
}

/// One version of a role's prompt strategy.
///
/// Versions are monotonic per role starting at 1; "current" is the max
/// version. Prior versions are retained as an audit trail of prompt
/// evolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyRecord {
    pub role: String,
    pub version: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// One governance event (molt, pause, resume, emergency_shutdown).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub event_type: String,
    pub detail: String,
    pub created_at: DateTime<Utc>,
}

/// One signed handoff delivery in an entity's inbox.
///
/// Signature validity is computed on read, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboxRecord {
    pub from_entity_id: String,
    pub artifact_ref: String,
    /// Payload text, truncated to 100 000 chars at write time.
    pub payload_text: String,
    pub payload_hash: String,
    /// Base64 HMAC-SHA256 signature claimed by the sender.
    pub signature: String,
    pub created_at: DateTime<Utc>,
}
