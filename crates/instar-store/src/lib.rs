//! # instar-store
//!
//! Entity-scoped durable persistence for the Instar engine, backed by
//! SQLite (`rusqlite`, bundled). Verified memory, checkpoints, and the
//! audit log are append-only; governance state is the single upsert table.
//! An in-memory variant backs tests and throwaway runs.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use instar_store::Store;
//!
//! let store = Store::open(Path::new(".instar/store.db"), "code-entity")?;
//! store.add_verified("artifact_1700000000000", "Verified artifact (184 chars)", preview)?;
//! let recent = store.get_recent_verified(5)?;
//! ```

pub mod hash;
pub mod store;

pub use hash::{hash_graph, hash_memory};
pub use store::{Store, CONTENT_PREVIEW_MAX, KEY_ENTITY_VERSION, KEY_LAST_MOLT_AT, KEY_PAUSED};
