//! Content hashing for checkpoints.
//!
//! Both hashes are SHA-256 digests truncated to 16 hex characters — long
//! enough to identify a definition or memory state in a checkpoint row,
//! short enough to read in an audit trail.

use sha2::{Digest, Sha256};

/// Stable hash of a graph definition document.
pub fn hash_graph(definition: &[u8]) -> String {
    let digest = Sha256::digest(definition);
    hex::encode(digest)[..16].to_string()
}

/// Stable hash of a verified-memory state, represented by its artifact
/// reference list in admission order.
pub fn hash_memory(refs: &[String]) -> String {
    // serde_json produces a deterministic encoding for a string list.
    let encoded = serde_json::to_vec(refs).expect("string list must serialize to JSON");
    let digest = Sha256::digest(&encoded);
    hex::encode(digest)[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_graph_is_stable_and_truncated() {
        let a = hash_graph(b"{\"nodes\":[]}");
        let b = hash_graph(b"{\"nodes\":[]}");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
        assert_ne!(a, hash_graph(b"{\"nodes\":[1]}"));
    }

    #[test]
    fn hash_memory_depends_on_ref_order() {
        let forward = hash_memory(&["a".to_string(), "b".to_string()]);
        let reverse = hash_memory(&["b".to_string(), "a".to_string()]);
        assert_eq!(forward.len(), 16);
        assert_ne!(forward, reverse, "admission order is part of the state");
    }

    #[test]
    fn hash_memory_of_empty_refs_is_stable() {
        assert_eq!(hash_memory(&[]), hash_memory(&[]));
    }
}
