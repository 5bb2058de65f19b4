//! Per-role input assembly.
//!
//! Each role declares which predecessor outputs it consumes and how it
//! formats them — the closed `Role` enum replaces string-keyed branch
//! dispatch. Default system prompts can be superseded per role by the
//! strategy store, which is how prompt evolution reaches a running entity.

use std::collections::HashMap;

use instar_contracts::{
    error::InstarResult,
    role::{ChatMessage, Role},
};
use instar_store::Store;

pub const GENERATOR_SYSTEM: &str = "You are the Generator. You produce a single Python \
implementation that satisfies the user's task. Output only valid Python code, no markdown \
fences or extra commentary. The code will be reviewed by a Critic and then verified by \
running tests.";

pub const CRITIC_SYSTEM: &str = "You are the Critic. Review the draft code for bugs, edge \
cases, and style. Be concise. List specific issues and suggestions. Do not rewrite the \
code; only critique.";

pub const JUDGE_SYSTEM: &str = "You are the Judge. Given the task, the draft code, and the \
critique, produce the final single Python implementation. Output only valid Python code, \
no markdown fences or extra commentary. Incorporate the critic's feedback. The result \
will be run through the test suite.";

pub const ROUTER_SYSTEM: &str = "You are a Router. Classify the task in one word: code, \
research, or other. Reply with only that word.";

/// Resolve the system prompt for `role`: the current strategy-store version
/// when one is set, else the built-in default.
pub fn system_prompt(role: Role, store: Option<&Store>) -> InstarResult<String> {
    if let Some(store) = store {
        if let Some(strategy) = store.get_strategy(role.as_str())? {
            return Ok(strategy);
        }
    }
    Ok(match role {
        Role::Generator => GENERATOR_SYSTEM,
        Role::Critic => CRITIC_SYSTEM,
        Role::Judge => JUDGE_SYSTEM,
        Role::Router => ROUTER_SYSTEM,
        // Never dispatched; the default keeps the function total.
        Role::Verifier => GENERATOR_SYSTEM,
    }
    .to_string())
}

fn with_context(content: String, long_term_context: &str) -> String {
    if long_term_context.is_empty() {
        content
    } else {
        format!("{content}\n\nRelevant verified knowledge:\n{long_term_context}")
    }
}

/// Build the message list for one stage call.
///
/// `inputs` maps each predecessor's role to its slot output; a role reads
/// only the predecessors it declares and treats missing ones as empty.
/// Returns `None` for the verifier pseudo-role, which is handled by the
/// gate after all stages finish.
pub fn assemble_messages(
    role: Role,
    system: &str,
    task: &str,
    inputs: &HashMap<Role, String>,
    long_term_context: &str,
) -> Option<Vec<ChatMessage>> {
    let pred = |r: Role| inputs.get(&r).map(String::as_str).unwrap_or("");

    let user = match role {
        Role::Generator => with_context(task.to_string(), long_term_context),
        Role::Critic => with_context(
            format!("Task:\n{task}\n\nDraft code:\n{}", pred(Role::Generator)),
            long_term_context,
        ),
        Role::Judge => with_context(
            format!(
                "Task:\n{task}\n\nDraft:\n{}\n\nCritique:\n{}",
                pred(Role::Generator),
                pred(Role::Critic)
            ),
            long_term_context,
        ),
        // The router only classifies; verified knowledge would bias it.
        Role::Router => task.to_string(),
        Role::Verifier => return None,
    };

    Some(vec![ChatMessage::system(system), ChatMessage::user(user)])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generator_sees_task_and_context() {
        let messages = assemble_messages(
            Role::Generator,
            GENERATOR_SYSTEM,
            "implement add",
            &HashMap::new(),
            "past artifact",
        )
        .unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert!(messages[1].content.starts_with("implement add"));
        assert!(messages[1].content.contains("Relevant verified knowledge:\npast artifact"));
    }

    #[test]
    fn critic_reads_the_generator_draft() {
        let mut inputs = HashMap::new();
        inputs.insert(Role::Generator, "draft code here".to_string());

        let messages =
            assemble_messages(Role::Critic, CRITIC_SYSTEM, "task", &inputs, "").unwrap();
        assert!(messages[1].content.contains("Draft code:\ndraft code here"));
    }

    #[test]
    fn judge_reads_draft_and_critique() {
        let mut inputs = HashMap::new();
        inputs.insert(Role::Generator, "the draft".to_string());
        inputs.insert(Role::Critic, "the critique".to_string());

        let messages = assemble_messages(Role::Judge, JUDGE_SYSTEM, "task", &inputs, "").unwrap();
        assert!(messages[1].content.contains("Draft:\nthe draft"));
        assert!(messages[1].content.contains("Critique:\nthe critique"));
    }

    #[test]
    fn missing_predecessors_degrade_to_empty() {
        let messages =
            assemble_messages(Role::Judge, JUDGE_SYSTEM, "task", &HashMap::new(), "").unwrap();
        assert!(messages[1].content.contains("Draft:\n\n"));
    }

    #[test]
    fn router_ignores_long_term_context() {
        let messages =
            assemble_messages(Role::Router, ROUTER_SYSTEM, "classify me", &HashMap::new(), "ctx")
                .unwrap();
        assert_eq!(messages[1].content, "classify me");
    }

    #[test]
    fn verifier_is_never_dispatched() {
        assert!(assemble_messages(Role::Verifier, "", "task", &HashMap::new(), "").is_none());
    }
}
