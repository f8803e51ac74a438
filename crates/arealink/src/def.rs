//! The graph-definition interchange records and their conversion to and
//! from the live graph.

use crate::cost::CostFn;
use crate::graph::{Cluster, Edge, Graph, Node};
use crate::ident::{ClusterId, NodeId};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDef {
    #[serde(rename = "ID")]
    pub id: NodeId,
    #[serde(rename = "Cluster")]
    pub cluster: ClusterId,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkDef {
    #[serde(rename = "A")]
    pub a: NodeId,
    #[serde(rename = "B")]
    pub b: NodeId,
    #[serde(rename = "Cost")]
    pub cost: u64,
}

/// A flat description of a graph. Canonically each link appears exactly once
/// with its endpoints in ascending order; [`Graph::new`] also accepts the
/// duplicated form (`a->b` alongside `b->a`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphDef {
    #[serde(rename = "Nodes")]
    pub nodes: Vec<NodeDef>,
    #[serde(rename = "Links")]
    pub links: Vec<LinkDef>,
}

impl Graph {
    /// Materializes a definition. Clusters are created on first reference;
    /// links are installed in both endpoints, so a definition carrying both
    /// directions of a link simply overwrites one record with its twin.
    ///
    /// Links must reference nodes present in the node list and must not be
    /// self-links; ingest is expected to have validated both.
    pub fn new(def: &GraphDef, cost_fn: CostFn) -> Graph {
        let mut g = Graph {
            nodes: FxHashMap::default(),
            clusters: FxHashMap::default(),
            cost_fn,
        };

        for n in &def.nodes {
            let c = g
                .clusters
                .entry(n.cluster.clone())
                .or_insert_with(|| Cluster::new(n.cluster.clone()));
            c.members.insert(n.id.clone());
            g.nodes
                .insert(n.id.clone(), Node::new(n.id.clone(), n.cluster.clone()));
        }

        for l in &def.links {
            if let Some(a) = g.nodes.get_mut(&l.a) {
                a.edges.insert(l.b.clone(), Edge::new(l.b.clone(), l.cost));
            }
            if let Some(b) = g.nodes.get_mut(&l.b) {
                b.edges.insert(l.a.clone(), Edge::new(l.a.clone(), l.cost));
            }
        }

        g
    }

    /// Emits the canonical definition of the current graph: every node once,
    /// every link once with endpoints in ascending order, both lists sorted.
    pub fn graph_def(&self) -> GraphDef {
        let mut nodes: Vec<NodeDef> = self
            .nodes
            .values()
            .map(|n| NodeDef {
                id: n.id.clone(),
                cluster: n.cluster.clone(),
            })
            .collect();
        nodes.sort_by(|x, y| x.id.cmp(&y.id));

        let mut links: Vec<LinkDef> = Vec::new();
        for n in self.nodes.values() {
            for e in n.edges() {
                if n.id < *e.dst() {
                    links.push(LinkDef {
                        a: n.id.clone(),
                        b: e.dst().clone(),
                        cost: e.cost(),
                    });
                }
            }
        }
        links.sort_by(|x, y| x.a.cmp(&y.a).then_with(|| x.b.cmp(&y.b)));

        GraphDef { nodes, links }
    }
}
