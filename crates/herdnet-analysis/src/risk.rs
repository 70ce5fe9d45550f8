use herdnet_core::{AnimalId, NormalizationBasis, RiskWeights, ScoreRange};
use herdnet_graph::InteractionGraph;
use std::collections::BTreeMap;

use crate::CommunityStructure;

#[derive(Debug, Clone, Copy, Default)]
pub struct RiskScores {
    pub conflict: f64,
    pub isolation: f64,
    pub bridge: f64,
}

fn score_range(values: impl Iterator<Item = f64>) -> ScoreRange {
    let mut range = ScoreRange {
        min: f64::INFINITY,
        max: f64::NEG_INFINITY,
    };
    let mut any = false;
    for v in values {
        any = true;
        range.min = range.min.min(v);
        range.max = range.max.max(v);
    }
    if !any {
        return ScoreRange::default();
    }
    range
}

/// Derived risk scores, min-max normalized within the herd. Returns the
/// per-score raw ranges so the normalization basis can be recorded on the
/// snapshot.
///
/// - conflict: many short encounters plus betweenness pressure.
/// - isolation: low degree centrality and membership far from the largest
///   community; degree-0 nodes are pinned to 1.0.
/// - bridge: betweenness and crossing fraction for nodes whose edges span
///   communities; zero when no incident edge crosses.
pub fn compute_risk_scores(
    graph: &InteractionGraph,
    degree_centrality: &BTreeMap<AnimalId, f64>,
    betweenness: &BTreeMap<AnimalId, f64>,
    communities: &CommunityStructure,
    weights: &RiskWeights,
) -> (BTreeMap<AnimalId, RiskScores>, NormalizationBasis) {
    let largest_size = communities.largest().map_or(0, |c| c.len());

    let encounters: BTreeMap<&AnimalId, f64> = graph
        .nodes()
        .map(|id| {
            (
                id,
                graph.neighbors(id).map(|(_, e)| e.count as f64).sum::<f64>(),
            )
        })
        .collect();
    let brevity: BTreeMap<&AnimalId, f64> = graph
        .nodes()
        .map(|id| {
            let count: f64 = graph.neighbors(id).map(|(_, e)| e.count as f64).sum();
            let duration: f64 = graph.neighbors(id).map(|(_, e)| e.duration_secs).sum();
            // no encounters, no brevity signal
            let brev = if count > 0.0 {
                1.0 / (1.0 + duration / count)
            } else {
                0.0
            };
            (id, brev)
        })
        .collect();

    // Frequency and brevity live on arbitrary scales; bring them onto [0, 1]
    // before weighting so the coefficients stay comparable.
    let encounter_range = score_range(encounters.values().copied());
    let brevity_range = score_range(brevity.values().copied());

    let mut raw: BTreeMap<AnimalId, RiskScores> = BTreeMap::new();
    for id in graph.nodes() {
        let deg_c = degree_centrality.get(id).copied().unwrap_or(0.0);
        let btw = betweenness.get(id).copied().unwrap_or(0.0);
        let freq_n = encounter_range.normalize(encounters[id]);
        let brev_n = brevity_range.normalize(brevity[id]);

        let conflict = weights.conflict_frequency * freq_n
            + weights.conflict_brevity * brev_n
            + weights.conflict_betweenness * btw;

        let community_distance = match communities.community_of(id) {
            Some(c) if largest_size > 0 => {
                1.0 - communities.communities[c].len() as f64 / largest_size as f64
            }
            _ => 1.0,
        };
        let isolation = weights.isolation_centrality * (1.0 - deg_c)
            + weights.isolation_community * community_distance;

        let crossing = communities.crossing_fraction(graph, id);
        let bridge = if crossing > 0.0 {
            weights.bridge_betweenness * btw + weights.bridge_crossing * crossing
        } else {
            0.0
        };

        raw.insert(
            id.clone(),
            RiskScores {
                conflict,
                isolation,
                bridge,
            },
        );
    }

    let basis = NormalizationBasis {
        conflict: score_range(raw.values().map(|r| r.conflict)),
        isolation: score_range(raw.values().map(|r| r.isolation)),
        bridge: score_range(raw.values().map(|r| r.bridge)),
    };

    let normalized = raw
        .into_iter()
        .map(|(id, r)| {
            let isolation = if graph.degree(&id) == 0 {
                // Zero connectivity is the limiting case.
                1.0
            } else {
                basis.isolation.normalize(r.isolation)
            };
            (
                id,
                RiskScores {
                    conflict: basis.conflict.normalize(r.conflict),
                    isolation,
                    bridge: basis.bridge.normalize(r.bridge),
                },
            )
        })
        .collect();

    (normalized, basis)
}
