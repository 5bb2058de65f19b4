//! Stage roles and the completion-service message type.
//!
//! `Role` is a closed set: every stage in a graph is one of these variants,
//! and each variant declares its own input-assembly rule in the runner.
//! New roles are added here, not by string convention.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The role a stage plays in the pipeline.
///
/// `Verifier` is a pseudo-role: a node may carry it for documentation
/// purposes, but the runner never dispatches it to a completion service —
/// verification is performed by the gate after all stages finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Produces a draft artifact from the task.
    Generator,
    /// Reviews a draft and lists concrete issues; never rewrites.
    Critic,
    /// Merges draft and critique into the final candidate artifact.
    Judge,
    /// Classifies the task in one word (code / research / other).
    Router,
    /// Placeholder for the verification gate; skipped during stage execution.
    Verifier,
}

impl Role {
    /// The canonical lowercase name, matching the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Generator => "generator",
            Role::Critic => "critic",
            Role::Judge => "judge",
            Role::Router => "router",
            Role::Verifier => "verifier",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "generator" => Ok(Role::Generator),
            "critic" => Ok(Role::Critic),
            "judge" => Ok(Role::Judge),
            "router" => Ok(Role::Router),
            "verifier" => Ok(Role::Verifier),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// One message in a completion-service conversation.
///
/// The wire unit of the external `complete()` interface: an ordered list of
/// these is sent per stage call. `role` here is the chat role ("system",
/// "user"), unrelated to the stage [`Role`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    /// Build a system-role message.
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    /// Build a user-role message.
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }
}
