//! The entity-scoped durable store.
//!
//! Seven logical tables back the engine: verified memory, checkpoints,
//! outcomes, strategies, audit log, governance key-values, and the handoff
//! inbox. Every write is an insert — governance state is the single
//! exception, with last-write-wins upsert semantics per `(entity, key)`.
//! Every read filters by entity id first and returns rows newest-first.
//!
//! One physical database may multiplex many logical entities; two `Store`
//! handles with different entity ids never observe each other's rows.
//!
//! Connection discipline: each `Store` owns one shared connection behind a
//! `Mutex` for its whole lifetime. Each public method is one transaction;
//! `checkpoint_molt` is the only multi-statement transaction and runs under
//! `BEGIN IMMEDIATE` so concurrent molts serialize on the write lock.

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::{debug, info};

use instar_contracts::{
    error::{InstarError, InstarResult},
    governance::GovernanceDecision,
    records::{
        AuditRecord, Checkpoint, InboxRecord, Outcome, StrategyRecord, VerifiedMemoryEntry,
    },
};

/// Governance key holding the RFC 3339 time of the last molt.
pub const KEY_LAST_MOLT_AT: &str = "last_molt_at";
/// Governance key holding the paused flag ("0" / "1").
pub const KEY_PAUSED: &str = "paused";
/// Governance key holding the current entity version string.
pub const KEY_ENTITY_VERSION: &str = "entity_version";

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS verified_memory (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  entity_id TEXT NOT NULL,
  artifact_ref TEXT NOT NULL,
  summary TEXT NOT NULL,
  content_preview TEXT NOT NULL,
  created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_vm_entity ON verified_memory(entity_id);

CREATE TABLE IF NOT EXISTS checkpoints (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  entity_id TEXT NOT NULL,
  entity_version TEXT NOT NULL,
  graph_hash TEXT NOT NULL,
  memory_hash TEXT NOT NULL,
  artifact_refs TEXT NOT NULL,
  created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_cp_entity ON checkpoints(entity_id);

CREATE TABLE IF NOT EXISTS outcomes (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  entity_id TEXT NOT NULL,
  task_ref TEXT NOT NULL,
  verification_passed INTEGER NOT NULL CHECK (verification_passed IN (0,1)),
  latency_sec REAL NOT NULL,
  created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_out_entity ON outcomes(entity_id);

CREATE TABLE IF NOT EXISTS strategies (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  entity_id TEXT NOT NULL,
  role TEXT NOT NULL,
  version INTEGER NOT NULL,
  content TEXT NOT NULL,
  created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_strat_entity ON strategies(entity_id);

CREATE TABLE IF NOT EXISTS audit_log (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  entity_id TEXT NOT NULL,
  event_type TEXT NOT NULL,
  detail TEXT NOT NULL,
  created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_audit_entity ON audit_log(entity_id);

CREATE TABLE IF NOT EXISTS governance_state (
  entity_id TEXT NOT NULL,
  key TEXT NOT NULL,
  value TEXT NOT NULL,
  updated_at TEXT NOT NULL,
  PRIMARY KEY (entity_id, key)
);

CREATE TABLE IF NOT EXISTS inbox (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  entity_id TEXT NOT NULL,
  from_entity_id TEXT NOT NULL,
  artifact_ref TEXT NOT NULL,
  payload_text TEXT NOT NULL,
  payload_hash TEXT NOT NULL,
  signature TEXT NOT NULL,
  created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_inbox_entity ON inbox(entity_id);
";

/// Maximum stored preview length for a verified-memory entry.
pub const CONTENT_PREVIEW_MAX: usize = 2000;

fn store_err(e: impl std::fmt::Display) -> InstarError {
    InstarError::Store { reason: e.to_string() }
}

fn parse_created_at(raw: &str) -> InstarResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| store_err(format!("malformed timestamp '{raw}': {e}")))
}

/// Truncate to a char boundary without splitting a code point.
fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// A durable store handle scoped to one logical entity.
pub struct Store {
    entity_id: String,
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (or create) a file-backed store at `path` for `entity_id`.
    ///
    /// Parent directories are created as needed and the schema is applied
    /// idempotently.
    pub fn open(path: &Path, entity_id: impl Into<String>) -> InstarResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| store_err(format!("cannot create store directory: {e}")))?;
        }
        let conn = Connection::open(path).map_err(store_err)?;
        Self::with_connection(conn, entity_id)
    }

    /// Open an in-memory store for `entity_id`. Rows live as long as the
    /// handle; intended for tests and throwaway runs.
    pub fn in_memory(entity_id: impl Into<String>) -> InstarResult<Self> {
        let conn = Connection::open_in_memory().map_err(store_err)?;
        Self::with_connection(conn, entity_id)
    }

    fn with_connection(conn: Connection, entity_id: impl Into<String>) -> InstarResult<Self> {
        conn.execute_batch(SCHEMA).map_err(store_err)?;
        let entity_id = entity_id.into();
        debug!(entity_id = %entity_id, "store opened");
        Ok(Self { entity_id, conn: Mutex::new(conn) })
    }

    /// The entity this handle is scoped to.
    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    fn lock(&self) -> InstarResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| store_err(format!("store connection lock poisoned: {e}")))
    }

    // ── Verified memory ───────────────────────────────────────────────────────

    /// Admit a verified artifact into long-term memory.
    ///
    /// Call only after a gate pass — this is the sole admission path to
    /// durable knowledge. The preview is truncated to
    /// [`CONTENT_PREVIEW_MAX`] chars.
    pub fn add_verified(
        &self,
        artifact_ref: &str,
        summary: &str,
        content_preview: &str,
    ) -> InstarResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO verified_memory (entity_id, artifact_ref, summary, content_preview, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                self.entity_id,
                artifact_ref,
                summary,
                truncate_chars(content_preview, CONTENT_PREVIEW_MAX),
                Utc::now().to_rfc3339(),
            ],
        )
        .map_err(store_err)?;
        info!(entity_id = %self.entity_id, artifact_ref, "artifact admitted to verified memory");
        Ok(())
    }

    /// The `k` most recent verified entries, newest first.
    pub fn get_recent_verified(&self, k: usize) -> InstarResult<Vec<VerifiedMemoryEntry>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT artifact_ref, summary, content_preview, created_at
                 FROM verified_memory WHERE entity_id = ?1 ORDER BY id DESC LIMIT ?2",
            )
            .map_err(store_err)?;
        let rows = stmt
            .query_map(params![self.entity_id, k as i64], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .map_err(store_err)?;

        let mut entries = Vec::new();
        for row in rows {
            let (artifact_ref, summary, content_preview, created_at) = row.map_err(store_err)?;
            entries.push(VerifiedMemoryEntry {
                artifact_ref,
                summary,
                content_preview,
                created_at: parse_created_at(&created_at)?,
            });
        }
        Ok(entries)
    }

    // ── Checkpoints ───────────────────────────────────────────────────────────

    /// Append an immutable checkpoint.
    pub fn write_checkpoint(
        &self,
        entity_version: &str,
        graph_hash: &str,
        memory_hash: &str,
        artifact_refs: &[String],
    ) -> InstarResult<()> {
        let refs_json = serde_json::to_string(artifact_refs).map_err(store_err)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO checkpoints (entity_id, entity_version, graph_hash, memory_hash, artifact_refs, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                self.entity_id,
                entity_version,
                graph_hash,
                memory_hash,
                refs_json,
                Utc::now().to_rfc3339(),
            ],
        )
        .map_err(store_err)?;
        info!(entity_id = %self.entity_id, entity_version, graph_hash, "checkpoint written");
        Ok(())
    }

    /// Recent checkpoints, newest first.
    pub fn list_checkpoints(&self, limit: usize) -> InstarResult<Vec<Checkpoint>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT entity_version, graph_hash, memory_hash, artifact_refs, created_at
                 FROM checkpoints WHERE entity_id = ?1 ORDER BY id DESC LIMIT ?2",
            )
            .map_err(store_err)?;
        let rows = stmt
            .query_map(params![self.entity_id, limit as i64], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })
            .map_err(store_err)?;

        let mut checkpoints = Vec::new();
        for row in rows {
            let (entity_version, graph_hash, memory_hash, refs_json, created_at) =
                row.map_err(store_err)?;
            checkpoints.push(Checkpoint {
                entity_version,
                graph_hash,
                memory_hash,
                artifact_refs: serde_json::from_str(&refs_json).map_err(store_err)?,
                created_at: parse_created_at(&created_at)?,
            });
        }
        Ok(checkpoints)
    }

    // ── Outcomes ──────────────────────────────────────────────────────────────

    /// Record one run outcome for aggregate measurement.
    pub fn record_outcome(
        &self,
        verification_passed: bool,
        latency_sec: f64,
        task_ref: &str,
    ) -> InstarResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO outcomes (entity_id, task_ref, verification_passed, latency_sec, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                self.entity_id,
                task_ref,
                verification_passed as i64,
                latency_sec,
                Utc::now().to_rfc3339(),
            ],
        )
        .map_err(store_err)?;
        Ok(())
    }

    /// The `k` most recent outcomes, newest first.
    pub fn get_recent_outcomes(&self, k: usize) -> InstarResult<Vec<Outcome>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT task_ref, verification_passed, latency_sec, created_at
                 FROM outcomes WHERE entity_id = ?1 ORDER BY id DESC LIMIT ?2",
            )
            .map_err(store_err)?;
        let rows = stmt
            .query_map(params![self.entity_id, k as i64], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .map_err(store_err)?;

        let mut outcomes = Vec::new();
        for row in rows {
            let (task_ref, passed, latency_sec, created_at) = row.map_err(store_err)?;
            outcomes.push(Outcome {
                task_ref,
                verification_passed: passed != 0,
                latency_sec,
                created_at: parse_created_at(&created_at)?,
            });
        }
        Ok(outcomes)
    }

    // ── Strategies ────────────────────────────────────────────────────────────

    /// Current prompt strategy for `role`: the content of the highest
    /// version, or `None` when no strategy has been set.
    pub fn get_strategy(&self, role: &str) -> InstarResult<Option<String>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT content FROM strategies
             WHERE entity_id = ?1 AND role = ?2 ORDER BY version DESC LIMIT 1",
            params![self.entity_id, role],
            |row| row.get(0),
        )
        .optional()
        .map_err(store_err)
    }

    /// Insert a new strategy version for `role` (`1 + max(existing)`).
    ///
    /// Prior versions are never overwritten — the full prompt evolution
    /// stays on record. Returns the version just written.
    pub fn set_strategy(&self, role: &str, content: &str) -> InstarResult<i64> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(store_err)?;
        let version: i64 = tx
            .query_row(
                "SELECT COALESCE(MAX(version), 0) + 1 FROM strategies
                 WHERE entity_id = ?1 AND role = ?2",
                params![self.entity_id, role],
                |row| row.get(0),
            )
            .map_err(store_err)?;
        tx.execute(
            "INSERT INTO strategies (entity_id, role, version, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![self.entity_id, role, version, content, Utc::now().to_rfc3339()],
        )
        .map_err(store_err)?;
        tx.commit().map_err(store_err)?;
        debug!(entity_id = %self.entity_id, role, version, "strategy version written");
        Ok(version)
    }

    /// All versions recorded for `role`, newest first.
    pub fn strategy_history(&self, role: &str) -> InstarResult<Vec<StrategyRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT role, version, content, created_at FROM strategies
                 WHERE entity_id = ?1 AND role = ?2 ORDER BY version DESC",
            )
            .map_err(store_err)?;
        let rows = stmt
            .query_map(params![self.entity_id, role], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .map_err(store_err)?;

        let mut records = Vec::new();
        for row in rows {
            let (role, version, content, created_at) = row.map_err(store_err)?;
            records.push(StrategyRecord {
                role,
                version,
                content,
                created_at: parse_created_at(&created_at)?,
            });
        }
        Ok(records)
    }

    // ── Governance state & audit ──────────────────────────────────────────────

    /// Read a governance key-value for this entity.
    pub fn governance_value(&self, key: &str) -> InstarResult<Option<String>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT value FROM governance_state WHERE entity_id = ?1 AND key = ?2",
            params![self.entity_id, key],
            |row| row.get(0),
        )
        .optional()
        .map_err(store_err)
    }

    /// Upsert a governance key-value (the only last-write-wins table).
    pub fn set_governance_value(&self, key: &str, value: &str) -> InstarResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO governance_state (entity_id, key, value, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(entity_id, key)
             DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![self.entity_id, key, value, Utc::now().to_rfc3339()],
        )
        .map_err(store_err)?;
        Ok(())
    }

    /// Append a governance audit event.
    pub fn append_audit(&self, event_type: &str, detail: &str) -> InstarResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO audit_log (entity_id, event_type, detail, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![self.entity_id, event_type, detail, Utc::now().to_rfc3339()],
        )
        .map_err(store_err)?;
        Ok(())
    }

    /// Recent audit events, newest first.
    pub fn recent_audit(&self, limit: usize) -> InstarResult<Vec<AuditRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT event_type, detail, created_at FROM audit_log
                 WHERE entity_id = ?1 ORDER BY id DESC LIMIT ?2",
            )
            .map_err(store_err)?;
        let rows = stmt
            .query_map(params![self.entity_id, limit as i64], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .map_err(store_err)?;

        let mut records = Vec::new();
        for row in rows {
            let (event_type, detail, created_at) = row.map_err(store_err)?;
            records.push(AuditRecord {
                event_type,
                detail,
                created_at: parse_created_at(&created_at)?,
            });
        }
        Ok(records)
    }

    /// Atomically check the molt gate and, on allow, record the molt.
    ///
    /// Runs as one `BEGIN IMMEDIATE` transaction: read the paused veto and
    /// `last_molt_at`, apply the cooldown, and on allow write the
    /// checkpoint, update `last_molt_at` / `entity_version`, and append the
    /// `molt` audit event. The write lock means two racing molts serialize
    /// here — the loser observes the winner's `last_molt_at` and is denied.
    ///
    /// On deny, nothing is written. Denial is a `GovernanceDecision`
    /// value, not an error.
    pub fn checkpoint_molt(
        &self,
        entity_version: &str,
        graph_hash: &str,
        memory_hash: &str,
        artifact_refs: &[String],
        cooldown: Duration,
    ) -> InstarResult<GovernanceDecision> {
        let refs_json = serde_json::to_string(artifact_refs).map_err(store_err)?;
        let now = Utc::now();

        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(store_err)?;

        let paused: Option<String> = tx
            .query_row(
                "SELECT value FROM governance_state WHERE entity_id = ?1 AND key = ?2",
                params![self.entity_id, KEY_PAUSED],
                |row| row.get(0),
            )
            .optional()
            .map_err(store_err)?;
        if paused.as_deref() == Some("1") {
            return Ok(GovernanceDecision::denied("entity is paused (human veto)"));
        }

        let last_molt: Option<String> = tx
            .query_row(
                "SELECT value FROM governance_state WHERE entity_id = ?1 AND key = ?2",
                params![self.entity_id, KEY_LAST_MOLT_AT],
                |row| row.get(0),
            )
            .optional()
            .map_err(store_err)?;
        if let Some(elapsed) = last_molt
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|t| now.signed_duration_since(t.with_timezone(&Utc)))
        {
            let limit = chrono::Duration::from_std(cooldown).unwrap_or(chrono::Duration::MAX);
            if elapsed < limit {
                return Ok(GovernanceDecision::denied(format!(
                    "molt rate limit: wait {}s between molts",
                    cooldown.as_secs_f64()
                )));
            }
        }

        let stamp = now.to_rfc3339();
        tx.execute(
            "INSERT INTO checkpoints (entity_id, entity_version, graph_hash, memory_hash, artifact_refs, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![self.entity_id, entity_version, graph_hash, memory_hash, refs_json, stamp],
        )
        .map_err(store_err)?;
        for (key, value) in [(KEY_LAST_MOLT_AT, stamp.as_str()), (KEY_ENTITY_VERSION, entity_version)] {
            tx.execute(
                "INSERT INTO governance_state (entity_id, key, value, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(entity_id, key)
                 DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![self.entity_id, key, value, stamp],
            )
            .map_err(store_err)?;
        }
        tx.execute(
            "INSERT INTO audit_log (entity_id, event_type, detail, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                self.entity_id,
                "molt",
                format!("version={entity_version} graph_hash={graph_hash}"),
                stamp,
            ],
        )
        .map_err(store_err)?;
        tx.commit().map_err(store_err)?;

        info!(entity_id = %self.entity_id, entity_version, "molt recorded");
        Ok(GovernanceDecision::allowed())
    }

    // ── Inbox ─────────────────────────────────────────────────────────────────

    /// Append one signed handoff delivery to this entity's inbox.
    ///
    /// The payload text is truncated to 100 000 chars; the hash and
    /// signature always cover the original payload.
    pub fn put_inbox(
        &self,
        from_entity_id: &str,
        artifact_ref: &str,
        payload_text: &str,
        payload_hash: &str,
        signature: &str,
    ) -> InstarResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO inbox (entity_id, from_entity_id, artifact_ref, payload_text, payload_hash, signature, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                self.entity_id,
                from_entity_id,
                artifact_ref,
                truncate_chars(payload_text, 100_000),
                payload_hash,
                signature,
                Utc::now().to_rfc3339(),
            ],
        )
        .map_err(store_err)?;
        Ok(())
    }

    /// Recent inbox deliveries, newest first. Signature validity is never
    /// stored; verification happens on read in the handoff layer.
    pub fn get_inbox(&self, limit: usize) -> InstarResult<Vec<InboxRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT from_entity_id, artifact_ref, payload_text, payload_hash, signature, created_at
                 FROM inbox WHERE entity_id = ?1 ORDER BY id DESC LIMIT ?2",
            )
            .map_err(store_err)?;
        let rows = stmt
            .query_map(params![self.entity_id, limit as i64], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })
            .map_err(store_err)?;

        let mut records = Vec::new();
        for row in rows {
            let (from_entity_id, artifact_ref, payload_text, payload_hash, signature, created_at) =
                row.map_err(store_err)?;
            records.push(InboxRecord {
                from_entity_id,
                artifact_ref,
                payload_text,
                payload_hash,
                signature,
                created_at: parse_created_at(&created_at)?,
            });
        }
        Ok(records)
    }
}
