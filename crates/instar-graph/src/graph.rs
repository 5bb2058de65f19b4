//! Stage graph types and scheduling.
//!
//! A `StageGraph` is a declarative DAG: nodes carry a role and a binding
//! key, edges declare data flow. Structure problems (cycles, dangling
//! edges, ambiguous terminals) are hard errors — a malformed graph must
//! never be partially scheduled.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use instar_contracts::{
    error::{InstarError, InstarResult},
    role::Role,
};

/// One stage: a unique id, the role it plays, and the binding key that
/// selects its completion service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageNode {
    /// Unique node id (e.g. "generator", "critic").
    pub id: String,
    /// Which role's input-assembly rule this stage uses.
    pub role: Role,
    /// Key into the completion-service bindings.
    pub binding: String,
}

/// A directed data dependency: `to`'s input includes `from`'s output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageEdge {
    #[serde(rename = "from")]
    pub from: String,
    #[serde(rename = "to")]
    pub to: String,
}

/// A declarative stage graph: nodes, edges, and an optional explicit
/// terminal node whose output becomes the verification candidate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageGraph {
    #[serde(default)]
    pub nodes: Vec<StageNode>,
    #[serde(default)]
    pub edges: Vec<StageEdge>,
    /// Node whose output is the final candidate. When absent, the single
    /// sink node is used; zero or multiple sinks is a configuration error.
    #[serde(default)]
    pub final_node: Option<String>,
}

impl StageGraph {
    /// Node ids with an edge into `node_id`.
    pub fn predecessors(&self, node_id: &str) -> Vec<&str> {
        self.edges
            .iter()
            .filter(|e| e.to == node_id)
            .map(|e| e.from.as_str())
            .collect()
    }

    /// Node ids that `node_id` has an edge to.
    pub fn successors(&self, node_id: &str) -> Vec<&str> {
        self.edges
            .iter()
            .filter(|e| e.from == node_id)
            .map(|e| e.to.as_str())
            .collect()
    }

    /// Look up a node by id.
    pub fn node(&self, node_id: &str) -> Option<&StageNode> {
        self.nodes.iter().find(|n| n.id == node_id)
    }

    /// Return all node ids in topological order (Kahn's algorithm).
    ///
    /// Zero-in-degree nodes are collected in batches, so ties are broken
    /// only by the underlying iteration order — callers must not rely on a
    /// particular tie-break. A cycle is an error, never a truncated order.
    pub fn topological_order(&self) -> InstarResult<Vec<String>> {
        let mut in_degree: HashMap<&str, usize> =
            self.nodes.iter().map(|n| (n.id.as_str(), 0)).collect();
        for edge in &self.edges {
            if let Some(d) = in_degree.get_mut(edge.to.as_str()) {
                *d += 1;
            }
        }

        let mut order: Vec<String> = Vec::with_capacity(self.nodes.len());
        let mut emitted: HashSet<&str> = HashSet::new();

        while order.len() < self.nodes.len() {
            let ready: Vec<&str> = self
                .nodes
                .iter()
                .map(|n| n.id.as_str())
                .filter(|id| !emitted.contains(id) && in_degree[id] == 0)
                .collect();

            if ready.is_empty() {
                let remaining = self
                    .nodes
                    .iter()
                    .map(|n| n.id.clone())
                    .filter(|id| !emitted.contains(id.as_str()))
                    .collect();
                return Err(InstarError::GraphCycle { remaining });
            }

            for id in ready {
                emitted.insert(id);
                order.push(id.to_string());
                for succ in self.successors(id) {
                    if let Some(d) = in_degree.get_mut(succ) {
                        *d -= 1;
                    }
                }
            }
        }

        Ok(order)
    }

    /// Resolve the terminal node: the explicit `final_node` if set, else
    /// the single node with no outgoing edges.
    ///
    /// Zero or multiple sink candidates without an explicit final node is
    /// `UnresolvedFinalNode` — an ambiguous graph fails the run rather than
    /// picking arbitrarily.
    pub fn final_node_id(&self) -> InstarResult<&str> {
        if let Some(final_node) = &self.final_node {
            return match self.node(final_node) {
                Some(node) => Ok(node.id.as_str()),
                None => Err(InstarError::MissingNode {
                    node: final_node.clone(),
                    context: "declared final_node".to_string(),
                }),
            };
        }
        let sinks: Vec<&str> = self
            .nodes
            .iter()
            .map(|n| n.id.as_str())
            .filter(|id| self.successors(id).is_empty())
            .collect();
        match sinks.as_slice() {
            [only] => Ok(only),
            other => Err(InstarError::UnresolvedFinalNode { candidates: other.len() }),
        }
    }

    /// Validate graph structure: unique node ids, edges referencing existing
    /// nodes, no cycle, and a resolvable terminal node.
    ///
    /// Run automatically on load; call it directly for graphs built in code.
    pub fn validate(&self) -> InstarResult<()> {
        let mut seen: HashSet<&str> = HashSet::new();
        for node in &self.nodes {
            if !seen.insert(node.id.as_str()) {
                return Err(InstarError::MissingNode {
                    node: node.id.clone(),
                    context: "duplicate node id".to_string(),
                });
            }
        }
        for edge in &self.edges {
            for endpoint in [&edge.from, &edge.to] {
                if !seen.contains(endpoint.as_str()) {
                    return Err(InstarError::MissingNode {
                        node: endpoint.clone(),
                        context: format!("edge {} -> {}", edge.from, edge.to),
                    });
                }
            }
        }
        self.topological_order()?;
        self.final_node_id()?;
        Ok(())
    }

    /// Parse a JSON graph document and validate it.
    pub fn from_json_str(s: &str) -> InstarResult<Self> {
        let graph: StageGraph = serde_json::from_str(s).map_err(|e| InstarError::GraphLoad {
            reason: format!("invalid JSON graph document: {e}"),
        })?;
        graph.validate()?;
        Ok(graph)
    }

    /// Parse a TOML graph document and validate it.
    pub fn from_toml_str(s: &str) -> InstarResult<Self> {
        let graph: StageGraph = toml::from_str(s).map_err(|e| InstarError::GraphLoad {
            reason: format!("invalid TOML graph document: {e}"),
        })?;
        graph.validate()?;
        Ok(graph)
    }

    /// Load a graph from a `.json` or `.toml` file.
    ///
    /// A missing file is an error, never a silent empty graph.
    pub fn load(path: &Path) -> InstarResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| InstarError::GraphLoad {
            reason: format!("failed to read graph file '{}': {e}", path.display()),
        })?;
        let is_toml = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("toml"))
            .unwrap_or(false);
        let graph = if is_toml {
            Self::from_toml_str(&raw)?
        } else {
            Self::from_json_str(&raw)?
        };
        debug!(
            path = %path.display(),
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            "stage graph loaded"
        );
        Ok(graph)
    }

    /// Canonical JSON representation of the definition, used for the
    /// checkpoint graph hash.
    pub fn to_canonical_json(&self) -> String {
        // StageGraph always serializes; its fields are plain data.
        serde_json::to_string(self).expect("StageGraph must serialize to JSON")
    }
}
