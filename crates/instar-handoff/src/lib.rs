//! # instar-handoff
//!
//! Authenticated artifact exchange between independently-running entities:
//! HMAC-SHA256 signing over raw payload bytes, constant-time verification,
//! and delivery into the recipient entity's durable inbox.

pub mod handoff;
pub mod signing;

pub use handoff::{receive_artifacts, send_artifact, ReceivedArtifact};
pub use signing::{artifact_hash, sign_artifact, verify_artifact};

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use instar_contracts::config::SigningConfig;
    use instar_store::Store;

    use super::*;

    fn config_with(entity: &str, secret: &str) -> SigningConfig {
        let mut entity_secrets = HashMap::new();
        entity_secrets.insert(entity.to_string(), secret.to_string());
        SigningConfig { default_secret: None, entity_secrets }
    }

    // ── Signing ───────────────────────────────────────────────────────────────

    #[test]
    fn signature_verifies_under_signing_entity() {
        let config = config_with("alpha", "alpha-key");
        let sig = sign_artifact(&config, "alpha", b"payload bytes");
        assert!(verify_artifact(&config, "alpha", b"payload bytes", &sig));
    }

    #[test]
    fn signature_fails_under_different_entity() {
        let mut config = config_with("alpha", "alpha-key");
        config
            .entity_secrets
            .insert("beta".to_string(), "beta-key".to_string());

        let sig = sign_artifact(&config, "alpha", b"payload");
        assert!(!verify_artifact(&config, "beta", b"payload", &sig));
    }

    #[test]
    fn tampered_payload_fails_verification() {
        let config = config_with("alpha", "alpha-key");
        let sig = sign_artifact(&config, "alpha", b"original");
        assert!(!verify_artifact(&config, "alpha", b"tampered", &sig));
    }

    #[test]
    fn malformed_signature_is_false_not_error() {
        let config = config_with("alpha", "alpha-key");
        assert!(!verify_artifact(&config, "alpha", b"payload", "%%% not base64 %%%"));
        assert!(!verify_artifact(&config, "alpha", b"payload", ""));
    }

    #[test]
    fn unconfigured_entities_use_deterministic_placeholder() {
        let config = SigningConfig::default();
        let a = sign_artifact(&config, "gamma", b"data");
        let b = sign_artifact(&config, "gamma", b"data");
        assert_eq!(a, b);
        assert!(verify_artifact(&config, "gamma", b"data", &a));
        // Placeholders are per-entity, so attribution still distinguishes ids.
        assert!(!verify_artifact(&config, "delta", b"data", &a));
    }

    #[test]
    fn artifact_hash_is_stable_and_32_chars() {
        let h = artifact_hash(b"content");
        assert_eq!(h.len(), 32);
        assert_eq!(h, artifact_hash(b"content"));
        assert_ne!(h, artifact_hash(b"other"));
    }

    // ── Handoff ───────────────────────────────────────────────────────────────

    #[test]
    fn sent_artifact_arrives_verified() {
        let config = config_with("sender", "sender-key");
        let recipient = Store::in_memory("recipient").unwrap();

        let reference =
            send_artifact(&config, "sender", &recipient, "def add(a,b): return a+b", None)
                .unwrap();
        assert!(reference.starts_with("artifact_sender_"));

        let received = receive_artifacts(&config, &recipient, 10, true).unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].from_entity_id, "sender");
        assert_eq!(received[0].artifact_ref, reference);
        assert_eq!(received[0].payload_text, "def add(a,b): return a+b");
        assert!(received[0].verified);
    }

    #[test]
    fn explicit_reference_is_preserved() {
        let config = config_with("sender", "sender-key");
        let recipient = Store::in_memory("recipient").unwrap();

        let reference =
            send_artifact(&config, "sender", &recipient, "payload", Some("artifact_custom"))
                .unwrap();
        assert_eq!(reference, "artifact_custom");
    }

    #[test]
    fn forged_inbox_entry_is_flagged_not_dropped() {
        let config = config_with("sender", "sender-key");
        let recipient = Store::in_memory("recipient").unwrap();

        send_artifact(&config, "sender", &recipient, "genuine", None).unwrap();
        // An entry claiming to be from "sender" but signed with nothing real.
        recipient
            .put_inbox("sender", "artifact_forged", "forged payload", "hash", "Zm9yZ2Vk")
            .unwrap();

        let received = receive_artifacts(&config, &recipient, 10, true).unwrap();
        assert_eq!(received.len(), 2, "unverified entries are returned, callers filter");
        // Newest first: the forged entry leads.
        assert!(!received[0].verified);
        assert!(received[1].verified);
    }

    #[test]
    fn verification_can_be_skipped_on_read() {
        let config = config_with("sender", "sender-key");
        let recipient = Store::in_memory("recipient").unwrap();
        recipient.put_inbox("sender", "ref", "text", "hash", "bogus").unwrap();

        let received = receive_artifacts(&config, &recipient, 10, false).unwrap();
        assert!(received[0].verified, "flag defaults to true when verification is off");
    }
}
