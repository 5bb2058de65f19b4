//! Explicit configuration structures.
//!
//! Configuration is constructed once at process start and passed by
//! reference into every component that needs a binding or a secret. No
//! component reads ambient environment state directly.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Secrets used for artifact signing and verification.
///
/// Resolution order per entity: entity-specific override, then the shared
/// default, then a deterministic per-entity placeholder. The placeholder
/// path exists only so the system runs unconfigured — it must never be
/// relied on for real attribution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SigningConfig {
    /// Shared fallback secret for all entities.
    pub default_secret: Option<String>,
    /// Per-entity secret overrides, keyed by entity id.
    pub entity_secrets: HashMap<String, String>,
}

impl SigningConfig {
    /// Resolve the signing secret for `entity_id`.
    ///
    /// Returns the secret bytes and whether the insecure placeholder was
    /// used (so callers can log the condition).
    pub fn resolve(&self, entity_id: &str) -> (Vec<u8>, bool) {
        if let Some(secret) = self.entity_secrets.get(entity_id) {
            return (secret.as_bytes().to_vec(), false);
        }
        if let Some(secret) = &self.default_secret {
            return (secret.as_bytes().to_vec(), false);
        }
        (format!("default-secret-{entity_id}").into_bytes(), true)
    }
}

/// Governance settings for the molt gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernanceConfig {
    /// Minimum wall-clock spacing between molts for one entity.
    #[serde(with = "duration_secs")]
    pub molt_rate_limit: Duration,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self { molt_rate_limit: Duration::from_secs(60) }
    }
}

/// Per-run knobs for the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOptions {
    /// Version string recorded in checkpoints written after this run.
    pub entity_version: String,
    /// Write a checkpoint after a successful admission.
    pub write_checkpoint: bool,
    /// How many recent verified entries to inject as context.
    pub context_entries: usize,
    /// Per-entry preview budget when building the context block.
    pub context_preview_chars: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            entity_version: "0.1.0".to_string(),
            write_checkpoint: false,
            context_entries: 5,
            context_preview_chars: 500,
        }
    }
}

/// Serialize `Duration` as whole seconds (f64) for config documents.
mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Ok(Duration::from_secs_f64(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signing_config_prefers_entity_override() {
        let mut config = SigningConfig {
            default_secret: Some("shared".to_string()),
            entity_secrets: HashMap::new(),
        };
        config
            .entity_secrets
            .insert("alpha".to_string(), "alpha-secret".to_string());

        let (secret, placeholder) = config.resolve("alpha");
        assert_eq!(secret, b"alpha-secret");
        assert!(!placeholder);

        let (secret, placeholder) = config.resolve("beta");
        assert_eq!(secret, b"shared");
        assert!(!placeholder);
    }

    #[test]
    fn signing_config_placeholder_is_deterministic_and_flagged() {
        let config = SigningConfig::default();
        let (a, flagged_a) = config.resolve("gamma");
        let (b, flagged_b) = config.resolve("gamma");
        assert_eq!(a, b);
        assert!(flagged_a && flagged_b);
        assert_eq!(a, b"default-secret-gamma");
    }

    #[test]
    fn governance_config_round_trips_through_json() {
        let config = GovernanceConfig { molt_rate_limit: Duration::from_secs(90) };
        let json = serde_json::to_string(&config).unwrap();
        let decoded: GovernanceConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.molt_rate_limit, Duration::from_secs(90));
    }
}
