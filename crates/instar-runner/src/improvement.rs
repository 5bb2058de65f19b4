//! Rule-based strategy review over recorded outcomes.
//!
//! The review only proposes; nothing here rewrites a prompt on its own.
//! Applying a suggestion is a separate, deliberate call that versions the
//! strategy through the store, so every prompt the runner has ever used
//! stays reconstructable.

use tracing::{debug, info};

use instar_contracts::{error::InstarResult, governance::StrategySuggestion, role::Role};
use instar_store::Store;

/// Fewer recorded outcomes than this and the failure rate is noise.
const MIN_OUTCOMES: usize = 3;

/// Failure rate at or above which prompt changes are proposed.
const FAIL_RATE_THRESHOLD: f64 = 0.5;

/// Review the last `recent_count` outcomes and propose prompt changes.
///
/// Returns an empty list when there is too little data or the entity is
/// performing acceptably. Current rule set: a failure rate at or above one
/// half targets the generator and judge prompts, since those two produce
/// the code the gate sees.
pub fn review_strategies(
    store: &Store,
    recent_count: usize,
) -> InstarResult<Vec<StrategySuggestion>> {
    let outcomes = store.get_recent_outcomes(recent_count)?;
    if outcomes.len() < MIN_OUTCOMES {
        debug!(outcomes = outcomes.len(), "too few outcomes to review");
        return Ok(Vec::new());
    }

    let passed = outcomes.iter().filter(|o| o.verification_passed).count();
    let fail_rate = 1.0 - (passed as f64 / outcomes.len() as f64);
    debug!(outcomes = outcomes.len(), passed, fail_rate, "strategy review");

    let mut suggestions = Vec::new();
    if fail_rate >= FAIL_RATE_THRESHOLD {
        suggestions.push(StrategySuggestion {
            role: Role::Generator.as_str().to_string(),
            suggestion: "Add explicit instruction: output only valid Python with no markdown \
                         fences or commentary."
                .to_string(),
        });
        suggestions.push(StrategySuggestion {
            role: Role::Judge.as_str().to_string(),
            suggestion: "Ensure the judge incorporates all critic feedback and outputs runnable \
                         code only."
                .to_string(),
        });
        info!(fail_rate, proposals = suggestions.len(), "strategy changes proposed");
    }
    Ok(suggestions)
}

/// Install `new_prompt` as the next strategy version for `role`.
///
/// Returns the new version number. Prior versions are retained.
pub fn apply_suggestion(store: &Store, role: Role, new_prompt: &str) -> InstarResult<i64> {
    let version = store.set_strategy(role.as_str(), new_prompt)?;
    info!(role = %role, version, "strategy updated");
    Ok(version)
}
