use herdnet_core::{AnimalId, HerdNetError, Result, SnapshotId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

use crate::{AnalysisSnapshot, MetricsEngine};

/// Per-metric change for one surviving individual (after minus before).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IndividualDelta {
    pub degree_centrality: f64,
    pub betweenness_centrality: f64,
    pub closeness_centrality: f64,
    pub eigenvector_centrality: f64,
    pub conflict_risk: f64,
    pub isolation_risk: f64,
    pub bridge_score: f64,
}

/// Herd-level change (after minus before).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HerdDelta {
    pub node_count: i64,
    pub edge_count: i64,
    pub density: f64,
    pub modularity: f64,
    pub community_count: i64,
    pub average_clustering_coefficient: f64,
    pub average_degree: f64,
}

/// Outcome of a what-if removal. Holds the resulting snapshot and references
/// the baseline by id; the baseline itself is never copied or touched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub removed: BTreeSet<AnimalId>,
    pub baseline_id: SnapshotId,
    pub resulting_snapshot: AnalysisSnapshot,
    pub herd_delta: HerdDelta,
    /// Deltas for surviving nodes only; removed ids are excluded.
    pub node_deltas: BTreeMap<AnimalId, IndividualDelta>,
}

/// Evaluates hypothetical node removals against a baseline snapshot.
///
/// The whole removal set is applied to a single induced subgraph before
/// metrics are recomputed: removing {x, y} is not the same as removing x
/// then y, because communities can reform around each intermediate graph.
#[derive(Debug, Clone, Default)]
pub struct SimulationEngine {
    metrics: MetricsEngine,
}

impl SimulationEngine {
    pub fn new(metrics: MetricsEngine) -> Self {
        Self { metrics }
    }

    pub fn simulate(
        &self,
        baseline: &AnalysisSnapshot,
        removed: &BTreeSet<AnimalId>,
    ) -> Result<SimulationResult> {
        for id in removed {
            if !baseline.graph.contains(id) {
                return Err(HerdNetError::UnknownNode(id.clone()));
            }
        }

        let subgraph = baseline.graph.induced_subgraph(removed);
        let resulting = self.metrics.compute_windowed(&subgraph, baseline.window);

        let node_deltas: BTreeMap<AnimalId, IndividualDelta> = resulting
            .individuals
            .iter()
            .map(|(id, after)| {
                let before = baseline.individuals.get(id).copied().unwrap_or_default();
                (
                    id.clone(),
                    IndividualDelta {
                        degree_centrality: after.degree_centrality - before.degree_centrality,
                        betweenness_centrality: after.betweenness_centrality
                            - before.betweenness_centrality,
                        closeness_centrality: after.closeness_centrality
                            - before.closeness_centrality,
                        eigenvector_centrality: after.eigenvector_centrality
                            - before.eigenvector_centrality,
                        conflict_risk: after.conflict_risk - before.conflict_risk,
                        isolation_risk: after.isolation_risk - before.isolation_risk,
                        bridge_score: after.bridge_score - before.bridge_score,
                    },
                )
            })
            .collect();

        let herd_delta = HerdDelta {
            node_count: resulting.herd.node_count as i64 - baseline.herd.node_count as i64,
            edge_count: resulting.herd.edge_count as i64 - baseline.herd.edge_count as i64,
            density: resulting.herd.density - baseline.herd.density,
            modularity: resulting.herd.modularity - baseline.herd.modularity,
            community_count: resulting.herd.community_count as i64
                - baseline.herd.community_count as i64,
            average_clustering_coefficient: resulting.herd.average_clustering_coefficient
                - baseline.herd.average_clustering_coefficient,
            average_degree: resulting.herd.average_degree - baseline.herd.average_degree,
        };

        info!(
            removed = removed.len(),
            surviving = resulting.herd.node_count,
            "simulated removal"
        );

        Ok(SimulationResult {
            removed: removed.clone(),
            baseline_id: baseline.id,
            resulting_snapshot: resulting,
            herd_delta,
            node_deltas,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use herdnet_core::EdgeWeighting;
    use herdnet_graph::InteractionGraph;

    fn two_pair_snapshot() -> AnalysisSnapshot {
        let mut g = InteractionGraph::new(EdgeWeighting::DurationSum);
        g.accumulate(&"cow1".to_string(), &"cow2".to_string(), 10.0);
        g.accumulate(&"cow1".to_string(), &"cow2".to_string(), 5.0);
        g.accumulate(&"cow3".to_string(), &"cow4".to_string(), 5.0);
        MetricsEngine::default().compute(&g)
    }

    fn removal(ids: &[&str]) -> BTreeSet<AnimalId> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn removing_one_cow_isolates_its_partner() {
        let baseline = two_pair_snapshot();
        let result = SimulationEngine::default()
            .simulate(&baseline, &removal(&["cow1"]))
            .unwrap();

        let after = &result.resulting_snapshot;
        assert_eq!(after.herd.node_count, 3);
        assert_eq!(after.herd.edge_count, 1);
        assert!(after
            .graph
            .weight(&"cow3".into(), &"cow4".into())
            .is_some());
        assert_eq!(after.individuals["cow2"].isolation_risk, 1.0);

        // deltas for survivors only
        let keys: Vec<_> = result.node_deltas.keys().cloned().collect();
        assert_eq!(keys, vec!["cow2", "cow3", "cow4"]);
        assert_eq!(result.baseline_id, baseline.id);
    }

    #[test]
    fn empty_removal_is_a_no_op() {
        let baseline = two_pair_snapshot();
        let result = SimulationEngine::default()
            .simulate(&baseline, &BTreeSet::new())
            .unwrap();

        let after = &result.resulting_snapshot;
        assert_eq!(after.graph, baseline.graph);
        assert_eq!(after.herd, baseline.herd);
        assert_eq!(after.individuals, baseline.individuals);
        assert_eq!(result.herd_delta, HerdDelta::default());
        for delta in result.node_deltas.values() {
            assert_relative_eq!(delta.degree_centrality, 0.0);
            assert_relative_eq!(delta.isolation_risk, 0.0);
        }
    }

    #[test]
    fn full_removal_yields_empty_graph_without_raising() {
        let baseline = two_pair_snapshot();
        let result = SimulationEngine::default()
            .simulate(&baseline, &removal(&["cow1", "cow2", "cow3", "cow4"]))
            .unwrap();

        let after = &result.resulting_snapshot;
        assert_eq!(after.herd.node_count, 0);
        assert_eq!(after.herd.density, 0.0);
        assert_eq!(after.herd.community_count, 0);
        assert!(result.node_deltas.is_empty());
    }

    #[test]
    fn set_removal_uses_a_single_induced_subgraph() {
        let baseline = two_pair_snapshot();
        let result = SimulationEngine::default()
            .simulate(&baseline, &removal(&["cow1", "cow3"]))
            .unwrap();
        let after = &result.resulting_snapshot;
        assert_eq!(after.herd.node_count, 2);
        assert_eq!(after.herd.edge_count, 0);
        assert_eq!(after.individuals["cow2"].isolation_risk, 1.0);
        assert_eq!(after.individuals["cow4"].isolation_risk, 1.0);
    }

    #[test]
    fn unknown_node_aborts_and_leaves_baseline_untouched() {
        let baseline = two_pair_snapshot();
        let before = serde_json::to_vec(&baseline).unwrap();

        let err = SimulationEngine::default()
            .simulate(&baseline, &removal(&["nonexistent"]))
            .unwrap_err();
        assert!(matches!(err, HerdNetError::UnknownNode(_)));

        let after = serde_json::to_vec(&baseline).unwrap();
        assert_eq!(before, after);
    }
}
