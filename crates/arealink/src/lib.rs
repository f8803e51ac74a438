//! Cluster formation for hierarchical link-state routing, simulated under
//! complete information.
//!
//! An undirected weighted graph is loaded with an initial cluster
//! assignment. Rounds of deferred-acceptance matching then merge adjacent
//! clusters: each cluster ranks its neighbors by what its own worst-case
//! LSDB load would become after the merge (probed with an exact
//! merge/unmerge primitive), and mutual first choices commit. The protocol
//! runs to a fixed point, a round in which every cluster prefers to stand
//! alone.

mod cost;
mod def;
pub mod encoding;
mod graph;
mod ident;
mod merge;

pub use cost::{max_cost, CostFn};
pub use def::{GraphDef, LinkDef, NodeDef};
pub use graph::{Cluster, Edge, Graph, Node};
pub use ident::{ClusterId, NodeId};
