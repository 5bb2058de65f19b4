//! # instar-gate
//!
//! The verification gate for the Instar engine: the sole admission path to
//! durable verified memory. Candidates are checked in an ephemeral sandbox
//! — parse-only when no tests are supplied, the standard test runner under
//! a bounded timeout when they are.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use instar_gate::Gate;
//!
//! let gate = Gate::default();
//! let report = gate.verify(candidate_text, Some(test_text))?;
//! if report.passed { /* admit */ }
//! ```

pub mod gate;

pub use gate::{strip_code_fence, Gate, DEFAULT_TIMEOUT};
