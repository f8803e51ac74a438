//! Cluster merging: the committed merge, the reversible probe used to price
//! hypothetical merges, and the round-based deferred-acceptance protocol.

use crate::graph::{Cluster, Graph};
use crate::ident::{cluster_pair_key, ClusterId};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;

impl Graph {
    /// Merges two clusters. The lexically smaller identifier survives; the
    /// merged cluster is rebuilt from scratch under it so that no memoized
    /// metric outlives the structural change, and the larger identifier is
    /// retired from the cluster table.
    pub fn merge_clusters(&mut self, a: &ClusterId, b: &ClusterId) {
        let _ = self.merge_clusters_taking(a, b);
    }

    // Returns the two replaced cluster records so merge_compute_unmerge can
    // reinstate them. None if the ids are equal or either cluster is missing,
    // in which case the graph is left untouched.
    fn merge_clusters_taking(
        &mut self,
        a: &ClusterId,
        b: &ClusterId,
    ) -> Option<(Cluster, Cluster)> {
        let (s, l) = if a <= b { (a, b) } else { (b, a) };
        if s == l {
            return None;
        }
        let old_s = self.clusters.remove(s)?;
        let Some(old_l) = self.clusters.remove(l) else {
            self.clusters.insert(old_s.id.clone(), old_s);
            return None;
        };

        let mut merged = Cluster::new(s.clone());
        for nid in old_s.members.iter().chain(old_l.members.iter()) {
            if let Some(n) = self.nodes.get_mut(nid) {
                n.cluster = merged.id.clone();
            }
            merged.members.insert(nid.clone());
        }
        self.clusters.insert(merged.id.clone(), merged);

        Some((old_s, old_l))
    }

    /// Temporarily merges `a` and `b`, runs `f` on the perturbed graph, then
    /// restores the exact prior state. The original cluster records return
    /// under their own identifiers with their member back-references rewound;
    /// any metric they memoized during the probe is dropped.
    ///
    /// `f` gets a shared borrow, so it cannot keep references to the merged
    /// cluster past the unmerge.
    pub fn merge_compute_unmerge<T>(
        &mut self,
        a: &ClusterId,
        b: &ClusterId,
        f: impl FnOnce(&Graph) -> T,
    ) -> T {
        let Some((old_s, old_l)) = self.merge_clusters_taking(a, b) else {
            // Same id or a missing cluster: nothing was merged, observe as-is.
            return f(self);
        };

        let res = f(self);

        // The merged cluster sits under old_s's identifier; it has to leave
        // the table before the originals go back in, or the reinstated old_s
        // would be the record being shadowed.
        self.clusters.remove(&old_s.id);
        for nid in &old_s.members {
            if let Some(n) = self.nodes.get_mut(nid) {
                n.cluster = old_s.id.clone();
            }
        }
        for nid in &old_l.members {
            if let Some(n) = self.nodes.get_mut(nid) {
                n.cluster = old_l.id.clone();
            }
        }
        // Metrics looked up during the probe described the merged shape.
        old_s.flush_cache();
        old_l.flush_cache();
        self.clusters.insert(old_s.id.clone(), old_s);
        self.clusters.insert(old_l.id.clone(), old_l);

        res
    }

    /// The cost `c` would carry if `c` and `d` were merged; the cost of `c`
    /// as it stands when `c == d`.
    pub(crate) fn merge_cost(&mut self, c: &ClusterId, d: &ClusterId) -> usize {
        if c == d {
            return self.cost(c);
        }
        // Only the surviving identifier exists inside the probe.
        let survivor = if c <= d { c.clone() } else { d.clone() };
        self.merge_compute_unmerge(c, d, |g| g.cost(&survivor))
    }

    // The order in which `c` would prefer to merge with its neighbors,
    // ending with `c` itself: ascending by merge cost, ties resolved by the
    // symmetric pair order so both sides of a tied pair rank it identically.
    // Candidates costlier than standing alone are cut off.
    fn propose_merge(&mut self, c: &ClusterId) -> VecDeque<ClusterId> {
        let mut candidates = match self.clusters.get(c) {
            Some(cl) => cl.neighbor_clusters(self),
            None => Vec::new(),
        };
        candidates.push(c.clone());

        let mut scored: Vec<(usize, ClusterId)> = Vec::with_capacity(candidates.len());
        for x in candidates {
            let cost = self.merge_cost(c, &x);
            scored.push((cost, x));
        }
        scored.sort_by(|(ci, i), (cj, j)| {
            ci.cmp(cj)
                .then_with(|| cluster_pair_key(c, i).cmp(&cluster_pair_key(c, j)))
        });

        let mut list = VecDeque::with_capacity(scored.len());
        for (_, x) in scored {
            let is_self = x == *c;
            list.push_back(x);
            if is_self {
                break;
            }
        }
        list
    }

    /// Runs one round of deferred-acceptance merging. `on_merge` fires for
    /// every pairing, `(c, c)` meaning `c` chose to stand alone. Returns
    /// whether any inter-cluster merge happened; a `false` round is stable
    /// and the graph was not changed.
    pub fn merge_round<F>(&mut self, mut on_merge: F) -> bool
    where
        F: FnMut(&ClusterId, &ClusterId),
    {
        // Snapshot the id set first: pricing proposals swaps clusters in and
        // out of the table (merge_compute_unmerge), so the table itself
        // cannot be iterated meanwhile. Sorted order keeps rounds
        // reproducible.
        let mut ids: Vec<ClusterId> = self.clusters.keys().cloned().collect();
        ids.sort();

        let mut preferences: FxHashMap<ClusterId, VecDeque<ClusterId>> = FxHashMap::default();
        for c in &ids {
            let p = self.propose_merge(c);
            preferences.insert(c.clone(), p);
        }

        let mut matched: FxHashSet<ClusterId> = FxHashSet::default();
        let mut changed_overall = false;

        loop {
            let mut changed = false;
            for c in &ids {
                if matched.contains(c) {
                    continue;
                }
                let Some(top) = preferences.get(c).and_then(|p| p.front().cloned()) else {
                    continue;
                };
                if top == *c {
                    // Standing alone beat every remaining candidate. Progress
                    // for the fixed point, but not an overall change: a round
                    // where everyone self-matches is a stable round.
                    matched.insert(c.clone());
                    on_merge(c, c);
                    changed = true;
                    continue;
                }
                let mutual = preferences
                    .get(&top)
                    .and_then(|p| p.front())
                    .is_some_and(|t| t == c);
                if mutual && *c < top {
                    // The pair is visible from both ends; the smaller id
                    // commits it, so it fires exactly once.
                    matched.insert(c.clone());
                    matched.insert(top.clone());
                    changed = true;
                    changed_overall = true;
                    on_merge(c, &top);
                    self.merge_clusters(c, &top);
                }
            }

            // Anyone whose remaining top choice got matched away moves on to
            // the next candidate. The walk can never pass a cluster's own
            // entry: the cluster itself is unmatched here.
            for c in &ids {
                if matched.contains(c) {
                    continue;
                }
                let Some(p) = preferences.get_mut(c) else {
                    continue;
                };
                while p.front().is_some_and(|top| matched.contains(top)) {
                    p.pop_front();
                }
            }

            if !changed {
                break;
            }
        }

        changed_overall
    }

    /// Runs rounds until one is stable, handing the graph to `on_round`
    /// before each round (including the final, stable one) and reporting
    /// every pairing to `on_merge`. Returns the number of rounds that
    /// changed the graph.
    pub fn merge_with<R, F>(&mut self, mut on_round: R, mut on_merge: F) -> usize
    where
        R: FnMut(&Graph),
        F: FnMut(&ClusterId, &ClusterId),
    {
        let mut rounds = 0;
        on_round(&*self);
        while self.merge_round(&mut on_merge) {
            rounds += 1;
            on_round(&*self);
        }
        rounds
    }

    /// Runs rounds until the graph stabilizes and returns how many changed
    /// the graph.
    pub fn merge(&mut self) -> usize {
        self.merge_with(|_| {}, |_, _| {})
    }
}
