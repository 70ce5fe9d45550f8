use chrono::Utc;
use herdnet_core::{AnalysisConfig, AnimalId, HerdMetrics, IndividualMetrics, TimeWindow};
use herdnet_graph::InteractionGraph;
use std::collections::BTreeMap;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    betweenness_centrality, closeness_centrality, compute_risk_scores, degree_centrality,
    detect_communities, diameter, eigenvector_centrality, AnalysisSnapshot,
};

/// Computes a full [`AnalysisSnapshot`] from an interaction graph.
///
/// `compute` is a pure function of the graph and the engine configuration:
/// it never mutates its input, and identical input yields identical metrics.
#[derive(Debug, Clone, Default)]
pub struct MetricsEngine {
    config: AnalysisConfig,
}

impl MetricsEngine {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn compute(&self, graph: &InteractionGraph) -> AnalysisSnapshot {
        self.compute_windowed(graph, None)
    }

    pub fn compute_windowed(
        &self,
        graph: &InteractionGraph,
        window: Option<TimeWindow>,
    ) -> AnalysisSnapshot {
        let degree = degree_centrality(graph);
        let betweenness = betweenness_centrality(graph);
        let closeness = closeness_centrality(graph);
        let communities = detect_communities(graph);

        let eigen = eigenvector_centrality(graph, &self.config.eigenvector);
        let approximate = !eigen.converged;
        let eigenvector = if approximate {
            warn!(
                cap = self.config.eigenvector.max_iterations,
                "eigenvector centrality did not converge, falling back to degree centrality"
            );
            degree.clone()
        } else {
            eigen.scores
        };

        let (risks, normalization) =
            compute_risk_scores(graph, &degree, &betweenness, &communities, &self.config.risk);

        let individuals: BTreeMap<AnimalId, IndividualMetrics> = graph
            .nodes()
            .map(|id| {
                let risk = risks.get(id).copied().unwrap_or_default();
                (
                    id.clone(),
                    IndividualMetrics {
                        degree_centrality: degree[id],
                        betweenness_centrality: betweenness[id],
                        closeness_centrality: closeness[id],
                        eigenvector_centrality: eigenvector[id],
                        conflict_risk: risk.conflict,
                        isolation_risk: risk.isolation,
                        bridge_score: risk.bridge,
                    },
                )
            })
            .collect();

        let node_count = graph.node_count();
        let herd = HerdMetrics {
            node_count,
            edge_count: graph.edge_count(),
            density: graph.density(),
            diameter: diameter(graph),
            modularity: communities.modularity,
            community_count: communities.communities.len(),
            average_clustering_coefficient: average_clustering(graph),
            average_degree: if node_count == 0 {
                0.0
            } else {
                graph.nodes().map(|n| graph.degree(n) as f64).sum::<f64>() / node_count as f64
            },
        };

        debug!(
            nodes = herd.node_count,
            communities = herd.community_count,
            approximate,
            "computed analysis snapshot"
        );

        AnalysisSnapshot {
            id: Uuid::new_v4(),
            graph: graph.clone(),
            herd,
            individuals,
            normalization,
            computed_at: Utc::now(),
            window,
            approximate,
        }
    }
}

/// Mean local clustering coefficient (unweighted); nodes with degree < 2
/// contribute 0.
fn average_clustering(graph: &InteractionGraph) -> f64 {
    let n = graph.node_count();
    if n == 0 {
        return 0.0;
    }
    let total: f64 = graph.nodes().map(|id| local_clustering(graph, id)).sum();
    total / n as f64
}

fn local_clustering(graph: &InteractionGraph, id: &AnimalId) -> f64 {
    let nbrs: Vec<&AnimalId> = graph.neighbors(id).map(|(nbr, _)| nbr).collect();
    let k = nbrs.len();
    if k < 2 {
        return 0.0;
    }
    let mut links = 0usize;
    for i in 0..k {
        for j in (i + 1)..k {
            if graph.edge(nbrs[i], nbrs[j]).is_some() {
                links += 1;
            }
        }
    }
    (2 * links) as f64 / (k * (k - 1)) as f64
}
