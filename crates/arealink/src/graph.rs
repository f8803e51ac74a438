//! The in-memory clustering graph: nodes, undirected weighted edges, cluster
//! membership, and the per-cluster LSDB metrics derived from them.
//!
//! Entities cross-reference each other by identifier through the graph-level
//! tables, so there are no cyclic references to manage; the price is one map
//! lookup per traversal step.

use crate::cost::CostFn;
use crate::ident::{ClusterId, NodeId};
use rustc_hash::{FxHashMap, FxHashSet};
use std::borrow::Borrow;
use std::cell::{Cell, RefCell};
use std::hash::Hash;

/// One direction of an undirected link. The same link is stored once in each
/// endpoint's edge map; the two records carry the same cost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub(crate) dst: NodeId,
    pub(crate) cost: u64,
}

impl Edge {
    pub(crate) fn new(dst: NodeId, cost: u64) -> Edge {
        Edge { dst, cost }
    }

    pub fn dst(&self) -> &NodeId {
        &self.dst
    }

    pub fn cost(&self) -> u64 {
        self.cost
    }
}

/// A vertex of the graph. Always a member of exactly one cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) cluster: ClusterId,
    pub(crate) edges: FxHashMap<NodeId, Edge>,
}

impl Node {
    pub(crate) fn new(id: NodeId, cluster: ClusterId) -> Node {
        Node {
            id,
            cluster,
            edges: FxHashMap::default(),
        }
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    /// The id of the cluster this node currently belongs to.
    pub fn cluster_id(&self) -> &ClusterId {
        &self.cluster
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    pub fn edge<Q>(&self, dst: &Q) -> Option<&Edge>
    where
        NodeId: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.edges.get(dst)
    }

    /// Number of edges whose destination lies in the same cluster as this node.
    pub fn num_edges_in_cluster(&self, g: &Graph) -> usize {
        self.edges
            .values()
            .filter(|e| g.cluster_of(&e.dst) == Some(&self.cluster))
            .count()
    }

    /// Number of edges whose destination lies in a different cluster.
    pub fn num_edges_out_cluster(&self, g: &Graph) -> usize {
        self.edges
            .values()
            .filter(|e| g.cluster_of(&e.dst) != Some(&self.cluster))
            .count()
    }

    /// Whether any neighbor of this node belongs to a different cluster.
    pub fn is_border_node(&self, g: &Graph) -> bool {
        self.edges
            .values()
            .any(|e| g.cluster_of(&e.dst) != Some(&self.cluster))
    }
}

/// A named set of nodes.
///
/// The derived metrics are memoized per cluster record. Merges never mutate a
/// cluster in place, they replace it with a freshly built record, so a
/// populated slot can only ever describe the current membership. Interior
/// mutability keeps the metric accessors on `&self`.
#[derive(Debug)]
pub struct Cluster {
    pub(crate) id: ClusterId,
    pub(crate) members: FxHashSet<NodeId>,

    cached_num_edges: Cell<Option<usize>>,
    cached_num_border_nodes: Cell<Option<usize>>,
    cached_num_border_edges: Cell<Option<usize>>,
    cached_local_lsdb_size: Cell<Option<usize>>,
    cached_neighbor_clusters: RefCell<Option<Vec<ClusterId>>>,
}

impl Cluster {
    pub(crate) fn new(id: ClusterId) -> Cluster {
        Cluster {
            id,
            members: FxHashSet::default(),
            cached_num_edges: Cell::new(None),
            cached_num_border_nodes: Cell::new(None),
            cached_num_border_edges: Cell::new(None),
            cached_local_lsdb_size: Cell::new(None),
            cached_neighbor_clusters: RefCell::new(None),
        }
    }

    pub fn id(&self) -> &ClusterId {
        &self.id
    }

    pub fn num_nodes(&self) -> usize {
        self.members.len()
    }

    pub fn members(&self) -> impl Iterator<Item = &NodeId> {
        self.members.iter()
    }

    pub fn contains<Q>(&self, id: &Q) -> bool
    where
        NodeId: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.members.contains(id)
    }

    pub(crate) fn flush_cache(&self) {
        self.cached_num_edges.set(None);
        self.cached_num_border_nodes.set(None);
        self.cached_num_border_edges.set(None);
        self.cached_local_lsdb_size.set(None);
        *self.cached_neighbor_clusters.borrow_mut() = None;
    }

    /// Number of edges between members of this cluster.
    pub fn num_edges(&self, g: &Graph) -> usize {
        if let Some(n) = self.cached_num_edges.get() {
            return n;
        }
        let total: usize = self
            .members
            .iter()
            .filter_map(|id| g.node(id))
            .map(|n| n.num_edges_in_cluster(g))
            .sum();
        // Each intra-cluster edge was seen from both endpoints.
        let n = total / 2;
        self.cached_num_edges.set(Some(n));
        n
    }

    /// Number of members with at least one edge leaving the cluster.
    pub fn num_border_nodes(&self, g: &Graph) -> usize {
        if let Some(n) = self.cached_num_border_nodes.get() {
            return n;
        }
        let n = self
            .members
            .iter()
            .filter_map(|id| g.node(id))
            .filter(|node| node.is_border_node(g))
            .count();
        self.cached_num_border_nodes.set(Some(n));
        n
    }

    /// Number of edges connecting members of this cluster to nodes outside
    /// it. Not halved: each border edge has only one endpoint here.
    pub fn num_border_edges(&self, g: &Graph) -> usize {
        if let Some(n) = self.cached_num_border_edges.get() {
            return n;
        }
        let n = self
            .members
            .iter()
            .filter_map(|id| g.node(id))
            .map(|node| node.num_edges_out_cluster(g))
            .sum();
        self.cached_num_border_edges.set(Some(n));
        n
    }

    /// Number of virtual edges this cluster contributes to the overlay LSDB:
    /// a full mesh over its border nodes.
    pub fn num_virt_edges(&self, g: &Graph) -> usize {
        let b = self.num_border_nodes(g);
        b * b.saturating_sub(1) / 2
    }

    /// Ids of the clusters reachable by a single edge from any member,
    /// excluding this cluster itself. Unordered.
    pub fn neighbor_clusters(&self, g: &Graph) -> Vec<ClusterId> {
        if let Some(ids) = self.cached_neighbor_clusters.borrow().as_ref() {
            return ids.clone();
        }
        let mut seen: FxHashSet<ClusterId> = FxHashSet::default();
        for id in &self.members {
            let Some(node) = g.node(id) else {
                continue;
            };
            for e in node.edges.values() {
                if let Some(c) = g.cluster_of(&e.dst) {
                    seen.insert(c.clone());
                }
            }
        }
        // Any member with an in-cluster neighbor puts our own id in the set.
        seen.remove(&self.id);
        let ids: Vec<ClusterId> = seen.into_iter().collect();
        *self.cached_neighbor_clusters.borrow_mut() = Some(ids.clone());
        ids
    }

    /// Number of links in this cluster's local LSDB: the real links it
    /// tracks internally.
    pub fn local_lsdb_size(&self, g: &Graph) -> usize {
        if let Some(n) = self.cached_local_lsdb_size.get() {
            return n;
        }
        let n = self.num_edges(g);
        self.cached_local_lsdb_size.set(Some(n));
        n
    }
}

/// The clustering graph. The node table and edge topology are fixed at
/// construction; rounds of merging only move cluster membership around.
#[derive(Debug)]
pub struct Graph {
    pub(crate) nodes: FxHashMap<NodeId, Node>,
    pub(crate) clusters: FxHashMap<ClusterId, Cluster>,
    pub(crate) cost_fn: CostFn,
}

impl Graph {
    pub fn node<Q>(&self, id: &Q) -> Option<&Node>
    where
        NodeId: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.nodes.get(id)
    }

    pub fn cluster<Q>(&self, id: &Q) -> Option<&Cluster>
    where
        ClusterId: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.clusters.get(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Live clusters only: a cluster with no members does not exist
    /// semantically, even if a transient record sits in the table.
    pub fn clusters(&self) -> impl Iterator<Item = &Cluster> {
        self.clusters.values().filter(|c| !c.members.is_empty())
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_clusters(&self) -> usize {
        self.clusters().count()
    }

    pub(crate) fn cluster_of(&self, id: &NodeId) -> Option<&ClusterId> {
        self.nodes.get(id).map(|n| &n.cluster)
    }

    /// Number of links in the overlay LSDB: every cluster's virtual full
    /// mesh plus the border edges between clusters.
    pub fn overlay_lsdb_size(&self) -> usize {
        let border: usize = self
            .clusters
            .values()
            .map(|c| c.num_border_edges(self))
            .sum();
        let virt: usize = self.clusters.values().map(|c| c.num_virt_edges(self)).sum();
        // Each border edge was counted from both of its clusters.
        virt + border / 2
    }

    /// Number of links cluster `c` must learn from the rest of the overlay.
    pub fn remote_lsdb_size<Q>(&self, c: &Q) -> usize
    where
        ClusterId: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let virt = self.cluster(c).map_or(0, |cl| cl.num_virt_edges(self));
        self.overlay_lsdb_size() - virt
    }

    /// Applies the installed cost function to `c`.
    pub fn cost(&self, c: &ClusterId) -> usize {
        (self.cost_fn)(self, c)
    }

    // Every non-empty cluster of self must appear in other with the same
    // member set, and each member must match node-for-node (id, cluster id,
    // edge map by destination and cost).
    fn clusters_subsumed_by(&self, other: &Graph) -> bool {
        for c in self.clusters() {
            let Some(d) = other.clusters.get(&c.id) else {
                return false;
            };
            if c.members != d.members {
                return false;
            }
            for id in &c.members {
                match (self.nodes.get(id), other.nodes.get(id)) {
                    (Some(a), Some(b)) => {
                        if a != b {
                            return false;
                        }
                    }
                    _ => return false,
                }
            }
        }
        true
    }
}

impl PartialEq for Graph {
    /// Structural equality: same live clusters over the same nodes with the
    /// same edges. Empty clusters are ignored on either side.
    fn eq(&self, other: &Graph) -> bool {
        self.clusters_subsumed_by(other) && other.clusters_subsumed_by(self)
    }
}

impl Eq for Graph {}
