use chrono::{DateTime, Utc};
use herdnet_core::{
    AnimalId, HerdMetrics, IndividualMetrics, NormalizationBasis, SnapshotId, TimeWindow,
};
use herdnet_graph::InteractionGraph;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Immutable bundle of a graph and everything computed from it.
///
/// Snapshots are never mutated after creation; simulations produce new
/// snapshots and reference their baseline by `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSnapshot {
    pub id: SnapshotId,
    pub graph: InteractionGraph,
    pub herd: HerdMetrics,
    pub individuals: BTreeMap<AnimalId, IndividualMetrics>,
    pub normalization: NormalizationBasis,
    pub computed_at: DateTime<Utc>,
    pub window: Option<TimeWindow>,
    /// Set when eigenvector centrality failed to converge and fell back to
    /// degree centrality.
    pub approximate: bool,
}

impl AnalysisSnapshot {
    /// The `n` individuals with the highest max(conflict, isolation) risk,
    /// descending; equal risks order by ascending id.
    pub fn top_risk(&self, n: usize) -> Vec<(&AnimalId, &IndividualMetrics)> {
        let mut ranked: Vec<(&AnimalId, &IndividualMetrics)> = self.individuals.iter().collect();
        ranked.sort_by(|(id_a, m_a), (id_b, m_b)| {
            let risk_a = m_a.conflict_risk.max(m_a.isolation_risk);
            let risk_b = m_b.conflict_risk.max(m_b.isolation_risk);
            risk_b
                .partial_cmp(&risk_a)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| id_a.cmp(id_b))
        });
        ranked.truncate(n);
        ranked
    }

    pub fn metrics_of(&self, id: &AnimalId) -> Option<&IndividualMetrics> {
        self.individuals.get(id)
    }
}
