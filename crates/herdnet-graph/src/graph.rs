use herdnet_core::{AnimalId, EdgeWeighting};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Aggregated edge payload. Both the encounter count and the total duration
/// are kept regardless of the configured weight mode, because the risk-score
/// formulas consume encounter frequency and brevity directly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeData {
    pub count: u64,
    pub duration_secs: f64,
}

impl EdgeData {
    pub fn weight(&self, weighting: EdgeWeighting) -> f64 {
        match weighting {
            EdgeWeighting::DurationSum => self.duration_secs,
            EdgeWeighting::Count => self.count as f64,
        }
    }

    /// Mean duration of one encounter on this edge.
    pub fn mean_duration_secs(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.duration_secs / self.count as f64
        }
    }
}

/// Undirected, weighted interaction graph over individuals.
///
/// Adjacency is kept in `BTreeMap`s so iteration order is a pure function of
/// node ids: rebuilding from the same record set in any input order yields a
/// byte-identical graph, and deterministic tie-breaks fall out for free.
/// Both directions of every edge are stored; invariants: no self-loops,
/// every stored edge has count > 0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InteractionGraph {
    weighting: EdgeWeighting,
    adjacency: BTreeMap<AnimalId, BTreeMap<AnimalId, EdgeData>>,
}

impl InteractionGraph {
    pub fn new(weighting: EdgeWeighting) -> Self {
        Self {
            weighting,
            adjacency: BTreeMap::new(),
        }
    }

    pub fn weighting(&self) -> EdgeWeighting {
        self.weighting
    }

    /// Register `id` as a node even if it has no edges yet.
    pub fn ensure_node(&mut self, id: &AnimalId) {
        self.adjacency.entry(id.clone()).or_default();
    }

    /// Accumulate one encounter between `a` and `b`. The pair is
    /// canonicalized internally; callers must have rejected self-loops.
    pub fn accumulate(&mut self, a: &AnimalId, b: &AnimalId, duration_secs: f64) {
        debug_assert_ne!(a, b);
        for (u, v) in [(a, b), (b, a)] {
            let edge = self
                .adjacency
                .entry(u.clone())
                .or_default()
                .entry(v.clone())
                .or_default();
            edge.count += 1;
            edge.duration_secs += duration_secs;
        }
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency
            .values()
            .map(|nbrs| nbrs.len())
            .sum::<usize>()
            / 2
    }

    pub fn contains(&self, id: &AnimalId) -> bool {
        self.adjacency.contains_key(id)
    }

    /// Nodes in ascending id order.
    pub fn nodes(&self) -> impl Iterator<Item = &AnimalId> {
        self.adjacency.keys()
    }

    /// Neighbors of `id` in ascending id order; empty for unknown or
    /// isolated nodes.
    pub fn neighbors(&self, id: &AnimalId) -> impl Iterator<Item = (&AnimalId, &EdgeData)> {
        self.adjacency.get(id).into_iter().flat_map(|m| m.iter())
    }

    pub fn degree(&self, id: &AnimalId) -> usize {
        self.adjacency.get(id).map_or(0, |m| m.len())
    }

    pub fn edge(&self, a: &AnimalId, b: &AnimalId) -> Option<&EdgeData> {
        self.adjacency.get(a).and_then(|m| m.get(b))
    }

    pub fn weight(&self, a: &AnimalId, b: &AnimalId) -> Option<f64> {
        self.edge(a, b).map(|e| e.weight(self.weighting))
    }

    /// Total weight incident to `id` under the configured weighting.
    pub fn strength(&self, id: &AnimalId) -> f64 {
        self.neighbors(id)
            .map(|(_, e)| e.weight(self.weighting))
            .sum()
    }

    /// Sum of all edge weights (each undirected edge counted once).
    pub fn total_weight(&self) -> f64 {
        self.nodes().map(|n| self.strength(n)).sum::<f64>() / 2.0
    }

    /// Unique undirected edges as `(u, v, data)` with `u < v`.
    pub fn edges(&self) -> impl Iterator<Item = (&AnimalId, &AnimalId, &EdgeData)> {
        self.adjacency
            .iter()
            .flat_map(|(u, nbrs)| nbrs.iter().map(move |(v, e)| (u, v, e)))
            .filter(|(u, v, _)| u < v)
    }

    /// Observed edges over possible edges; 0 when fewer than two nodes.
    pub fn density(&self) -> f64 {
        let n = self.node_count();
        if n < 2 {
            return 0.0;
        }
        (2 * self.edge_count()) as f64 / (n * (n - 1)) as f64
    }

    /// Induced subgraph on the surviving nodes. Survivors that lose all
    /// their edges stay in the graph as isolated nodes.
    pub fn induced_subgraph(&self, removed: &BTreeSet<AnimalId>) -> InteractionGraph {
        let mut sub = InteractionGraph::new(self.weighting);
        for (u, nbrs) in &self.adjacency {
            if removed.contains(u) {
                continue;
            }
            let kept: BTreeMap<AnimalId, EdgeData> = nbrs
                .iter()
                .filter(|(v, _)| !removed.contains(*v))
                .map(|(v, e)| (v.clone(), *e))
                .collect();
            sub.adjacency.insert(u.clone(), kept);
        }
        sub
    }
}
