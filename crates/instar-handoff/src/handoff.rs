//! Inter-entity handoff: entity A's signed artifact becomes entity B's input.
//!
//! Delivery writes one immutable inbox row on the recipient's store.
//! Signature validity is recomputed on every read and surfaced as a flag —
//! callers decide whether to discard unverified entries.

use chrono::Utc;
use tracing::debug;

use instar_contracts::{config::SigningConfig, error::InstarResult};
use instar_store::Store;

use crate::signing::{artifact_hash, sign_artifact, verify_artifact};

/// One inbox delivery as seen by the recipient.
#[derive(Debug, Clone)]
pub struct ReceivedArtifact {
    /// Claimed sender entity id.
    pub from_entity_id: String,
    pub artifact_ref: String,
    pub payload_text: String,
    /// Whether the signature checked out against the claimed sender's
    /// secret. Always `true` when verification was not requested.
    pub verified: bool,
}

/// Sign `content` as `sender_entity_id` and deliver it to the recipient's
/// inbox. Returns the artifact reference used
/// (`artifact_<sender>_<epoch-ms>` when none is supplied).
pub fn send_artifact(
    config: &SigningConfig,
    sender_entity_id: &str,
    recipient_store: &Store,
    content: &str,
    artifact_ref: Option<&str>,
) -> InstarResult<String> {
    let reference = artifact_ref.map(str::to_string).unwrap_or_else(|| {
        format!("artifact_{sender_entity_id}_{}", Utc::now().timestamp_millis())
    });
    let payload_hash = artifact_hash(content.as_bytes());
    let signature = sign_artifact(config, sender_entity_id, content.as_bytes());
    recipient_store.put_inbox(sender_entity_id, &reference, content, &payload_hash, &signature)?;
    debug!(
        sender = sender_entity_id,
        recipient = %recipient_store.entity_id(),
        artifact_ref = %reference,
        "artifact handed off"
    );
    Ok(reference)
}

/// Read recent inbox deliveries for this entity.
///
/// With `verify`, each entry's signature is recomputed against the claimed
/// sender id; entries are returned regardless of the result, with the
/// `verified` flag set per entry.
pub fn receive_artifacts(
    config: &SigningConfig,
    store: &Store,
    limit: usize,
    verify: bool,
) -> InstarResult<Vec<ReceivedArtifact>> {
    let entries = store.get_inbox(limit)?;
    Ok(entries
        .into_iter()
        .map(|e| {
            let verified = if verify && !e.payload_text.is_empty() && !e.signature.is_empty() {
                verify_artifact(config, &e.from_entity_id, e.payload_text.as_bytes(), &e.signature)
            } else {
                true
            };
            ReceivedArtifact {
                from_entity_id: e.from_entity_id,
                artifact_ref: e.artifact_ref,
                payload_text: e.payload_text,
                verified,
            }
        })
        .collect())
}
