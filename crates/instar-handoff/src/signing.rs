//! Keyed artifact signing for cryptographic attribution.
//!
//! Signatures are HMAC-SHA256 over the raw payload bytes, base64-encoded.
//! Verification recomputes the MAC and compares in constant time; malformed
//! input of any kind resolves to `false`, never an error.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use tracing::warn;

use instar_contracts::config::SigningConfig;

type HmacSha256 = Hmac<Sha256>;

/// Sign `payload` with the secret resolved for `entity_id`.
///
/// Returns the base64 signature. When neither an entity override nor the
/// shared default secret is configured, a deterministic per-entity
/// placeholder is used — sufficient to run, worthless for real attribution,
/// and logged as such.
pub fn sign_artifact(config: &SigningConfig, entity_id: &str, payload: &[u8]) -> String {
    let (secret, placeholder) = config.resolve(entity_id);
    if placeholder {
        warn!(entity_id, "signing with insecure placeholder secret; configure a real key");
    }
    // HMAC accepts keys of any length.
    let mut mac = HmacSha256::new_from_slice(&secret).expect("HMAC key of any length is valid");
    mac.update(payload);
    BASE64.encode(mac.finalize().into_bytes())
}

/// Verify a base64 signature against the secret resolved for `entity_id`.
///
/// Constant-time comparison via the MAC itself. Malformed signatures are a
/// verification failure, not an error.
pub fn verify_artifact(
    config: &SigningConfig,
    entity_id: &str,
    payload: &[u8],
    signature_b64: &str,
) -> bool {
    let Ok(signature) = BASE64.decode(signature_b64) else {
        return false;
    };
    let (secret, _) = config.resolve(entity_id);
    let Ok(mut mac) = HmacSha256::new_from_slice(&secret) else {
        return false;
    };
    mac.update(payload);
    mac.verify_slice(&signature).is_ok()
}

/// Stable content hash of an artifact payload, used as its storage
/// reference hash: SHA-256, first 32 hex chars.
pub fn artifact_hash(payload: &[u8]) -> String {
    let digest = Sha256::digest(payload);
    hex::encode(digest)[..32].to_string()
}
