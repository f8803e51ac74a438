//! Cluster cost models.
//!
//! A cost function prices a cluster on a given graph; the merge protocol
//! treats lower as better. A graph installs exactly one cost function at
//! construction and never changes it.

use crate::graph::Graph;
use crate::ident::ClusterId;

pub type CostFn = fn(&Graph, &ClusterId) -> usize;

/// Worst-case LSDB load: the larger of what the cluster must learn from the
/// rest of the overlay and what it tracks internally.
pub fn max_cost(g: &Graph, c: &ClusterId) -> usize {
    let remote = g.remote_lsdb_size(c);
    let local = g.cluster(c).map_or(0, |cl| cl.local_lsdb_size(g));
    remote.max(local)
}
