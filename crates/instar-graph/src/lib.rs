//! # instar-graph
//!
//! The declarative stage graph for the Instar engine: a DAG of stages
//! (role + binding) and data-flow edges, with structural validation,
//! Kahn-style topological ordering, terminal-node resolution, and loading
//! from JSON or TOML documents.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use instar_graph::StageGraph;
//!
//! let graph = StageGraph::load(Path::new("graphs/code_entity.json"))?;
//! let order = graph.topological_order()?;
//! let terminal = graph.final_node_id()?;
//! ```

pub mod graph;

pub use graph::{StageEdge, StageGraph, StageNode};
