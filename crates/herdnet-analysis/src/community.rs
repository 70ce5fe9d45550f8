use herdnet_core::AnimalId;
use herdnet_graph::InteractionGraph;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::centrality::NodeIndex;

/// A modularity-maximizing partition of the graph.
///
/// Communities are ordered by their lowest member id, which also fixes the
/// community indices across runs on identical input.
#[derive(Debug, Clone, PartialEq)]
pub struct CommunityStructure {
    pub communities: Vec<BTreeSet<AnimalId>>,
    pub assignment: BTreeMap<AnimalId, usize>,
    pub modularity: f64,
}

impl CommunityStructure {
    pub fn community_of(&self, id: &AnimalId) -> Option<usize> {
        self.assignment.get(id).copied()
    }

    /// Largest community by member count; ties go to the one containing the
    /// lowest id (communities are already ordered that way).
    pub fn largest(&self) -> Option<&BTreeSet<AnimalId>> {
        let mut best: Option<&BTreeSet<AnimalId>> = None;
        for community in &self.communities {
            if best.map_or(true, |b| community.len() > b.len()) {
                best = Some(community);
            }
        }
        best
    }

    /// Fraction of `id`'s incident edges that cross into another community.
    pub fn crossing_fraction(&self, graph: &InteractionGraph, id: &AnimalId) -> f64 {
        let degree = graph.degree(id);
        if degree == 0 {
            return 0.0;
        }
        let own = self.community_of(id);
        let crossing = graph
            .neighbors(id)
            .filter(|(nbr, _)| self.community_of(nbr) != own)
            .count();
        crossing as f64 / degree as f64
    }
}

/// Greedy modularity agglomeration (CNM): start from singletons, repeatedly
/// merge the connected pair with the largest modularity gain, stop when no
/// merge improves modularity. Candidate pairs are scanned in ascending
/// representative-id order so equal gains resolve to the lowest pair.
pub fn detect_communities(graph: &InteractionGraph) -> CommunityStructure {
    let index = NodeIndex::of(graph);
    let n = index.ids.len();
    let m = graph.total_weight();

    if n == 0 || m <= 0.0 {
        let communities: Vec<BTreeSet<AnimalId>> = index
            .ids
            .iter()
            .map(|id| BTreeSet::from([id.clone()]))
            .collect();
        let assignment = index
            .ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();
        return CommunityStructure {
            communities,
            assignment,
            modularity: 0.0,
        };
    }

    // Community id = lowest dense node index it contains.
    let mut strength: BTreeMap<usize, f64> = BTreeMap::new();
    let mut internal: BTreeMap<usize, f64> = BTreeMap::new();
    let mut members: HashMap<usize, Vec<usize>> = HashMap::new();
    for (i, id) in index.ids.iter().enumerate() {
        strength.insert(i, graph.strength(id));
        internal.insert(i, 0.0);
        members.insert(i, vec![i]);
    }

    let mut between: BTreeMap<(usize, usize), f64> = BTreeMap::new();
    for (u, v, data) in graph.edges() {
        let (i, j) = (index.positions[u], index.positions[v]);
        let key = (i.min(j), i.max(j));
        *between.entry(key).or_default() += data.weight(graph.weighting());
    }

    loop {
        let mut best: Option<((usize, usize), f64)> = None;
        for (&(i, j), &w) in &between {
            let gain = w / m - strength[&i] * strength[&j] / (2.0 * m * m);
            if best.map_or(true, |(_, g)| gain > g) {
                best = Some(((i, j), gain));
            }
        }
        let Some(((i, j), gain)) = best else { break };
        if gain <= 0.0 {
            break;
        }

        let (keep, drop) = (i.min(j), i.max(j));
        let w_ij = between.remove(&(keep, drop)).unwrap_or(0.0);
        let drop_strength = strength.remove(&drop).unwrap_or(0.0);
        let drop_internal = internal.remove(&drop).unwrap_or(0.0);
        *strength.entry(keep).or_default() += drop_strength;
        *internal.entry(keep).or_default() += drop_internal + w_ij;
        let moved = members.remove(&drop).unwrap_or_default();
        members.entry(keep).or_default().extend(moved);

        // Reroute the dropped community's remaining adjacency onto `keep`.
        let rerouted: Vec<((usize, usize), f64)> = between
            .iter()
            .filter(|(&(a, b), _)| a == drop || b == drop)
            .map(|(&k, &w)| (k, w))
            .collect();
        for ((a, b), w) in rerouted {
            between.remove(&(a, b));
            let other = if a == drop { b } else { a };
            let key = (keep.min(other), keep.max(other));
            *between.entry(key).or_default() += w;
        }
    }

    let modularity = strength
        .keys()
        .map(|c| internal[c] / m - (strength[c] / (2.0 * m)).powi(2))
        .sum();

    let mut communities = Vec::with_capacity(members.len());
    let mut assignment = BTreeMap::new();
    for (&rep, _) in &strength {
        let set: BTreeSet<AnimalId> = members[&rep]
            .iter()
            .map(|&i| index.ids[i].clone())
            .collect();
        for id in &set {
            assignment.insert(id.clone(), communities.len());
        }
        communities.push(set);
    }

    CommunityStructure {
        communities,
        assignment,
        modularity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herdnet_core::EdgeWeighting;

    fn graph_of(edges: &[(&str, &str)]) -> InteractionGraph {
        let mut g = InteractionGraph::new(EdgeWeighting::Count);
        for (a, b) in edges {
            g.accumulate(&a.to_string(), &b.to_string(), 1.0);
        }
        g
    }

    fn two_triangles() -> InteractionGraph {
        graph_of(&[
            ("a1", "a2"),
            ("a1", "a3"),
            ("a2", "a3"),
            ("b1", "b2"),
            ("b1", "b3"),
            ("b2", "b3"),
            ("a3", "b1"),
        ])
    }

    #[test]
    fn splits_bridged_triangles_into_two_communities() {
        let structure = detect_communities(&two_triangles());
        assert_eq!(structure.communities.len(), 2);
        assert!(structure.modularity > 0.0);
        let a = structure.community_of(&"a1".into());
        assert_eq!(a, structure.community_of(&"a2".into()));
        assert_eq!(a, structure.community_of(&"a3".into()));
        assert_ne!(a, structure.community_of(&"b1".into()));
    }

    #[test]
    fn detection_is_deterministic() {
        let g = two_triangles();
        assert_eq!(detect_communities(&g), detect_communities(&g));
    }

    #[test]
    fn edgeless_nodes_stay_singletons() {
        let g = two_triangles();
        let sub = g.induced_subgraph(
            &["a1", "a2", "a3", "b2", "b3"]
                .map(String::from)
                .into_iter()
                .collect(),
        );
        let structure = detect_communities(&sub);
        assert_eq!(structure.communities.len(), 1);
        assert_eq!(structure.modularity, 0.0);
    }

    #[test]
    fn crossing_fraction_marks_the_bridge_endpoints() {
        let g = two_triangles();
        let structure = detect_communities(&g);
        let cross_a3 = structure.crossing_fraction(&g, &"a3".into());
        let cross_a1 = structure.crossing_fraction(&g, &"a1".into());
        assert!(cross_a3 > 0.0);
        assert_eq!(cross_a1, 0.0);
    }
}
