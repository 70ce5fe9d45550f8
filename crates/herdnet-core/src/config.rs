use serde::{Deserialize, Serialize};

/// How multiple interaction records for the same unordered pair aggregate
/// into one edge weight. Fixed for the duration of an analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeWeighting {
    /// Sum of interaction durations in seconds.
    DurationSum,
    /// Number of interaction records.
    Count,
}

impl Default for EdgeWeighting {
    fn default() -> Self {
        EdgeWeighting::DurationSum
    }
}

/// What the graph builder does with records that fail validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedRecordPolicy {
    /// Fail the whole build (default).
    Reject,
    /// Drop the record and emit a warning.
    SkipAndWarn,
}

impl Default for MalformedRecordPolicy {
    fn default() -> Self {
        MalformedRecordPolicy::Reject
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EigenvectorConfig {
    /// Hard cap on power-iteration steps before falling back to degree
    /// centrality and flagging the snapshot as approximate.
    #[serde(default = "EigenvectorConfig::default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default = "EigenvectorConfig::default_tolerance")]
    pub tolerance: f64,
}

impl EigenvectorConfig {
    fn default_max_iterations() -> usize {
        100
    }

    fn default_tolerance() -> f64 {
        1e-6
    }
}

impl Default for EigenvectorConfig {
    fn default() -> Self {
        Self {
            max_iterations: Self::default_max_iterations(),
            tolerance: Self::default_tolerance(),
        }
    }
}

/// Weighting coefficients for the three derived risk scores.
///
/// Raw component values are combined linearly with these weights, then
/// min-max normalized within the herd being analyzed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RiskWeights {
    /// Conflict risk: total encounter frequency.
    #[serde(default = "RiskWeights::default_conflict_frequency")]
    pub conflict_frequency: f64,
    /// Conflict risk: short mean encounter duration.
    #[serde(default = "RiskWeights::default_conflict_brevity")]
    pub conflict_brevity: f64,
    /// Conflict risk: betweenness pressure.
    #[serde(default = "RiskWeights::default_conflict_betweenness")]
    pub conflict_betweenness: f64,
    /// Isolation risk: inverse degree centrality.
    #[serde(default = "RiskWeights::default_isolation_centrality")]
    pub isolation_centrality: f64,
    /// Isolation risk: distance from the largest community.
    #[serde(default = "RiskWeights::default_isolation_community")]
    pub isolation_community: f64,
    /// Bridge score: betweenness component.
    #[serde(default = "RiskWeights::default_bridge_betweenness")]
    pub bridge_betweenness: f64,
    /// Bridge score: fraction of incident edges crossing communities.
    #[serde(default = "RiskWeights::default_bridge_crossing")]
    pub bridge_crossing: f64,
}

impl RiskWeights {
    fn default_conflict_frequency() -> f64 {
        0.40
    }

    fn default_conflict_brevity() -> f64 {
        0.25
    }

    fn default_conflict_betweenness() -> f64 {
        0.35
    }

    fn default_isolation_centrality() -> f64 {
        0.60
    }

    fn default_isolation_community() -> f64 {
        0.40
    }

    fn default_bridge_betweenness() -> f64 {
        0.70
    }

    fn default_bridge_crossing() -> f64 {
        0.30
    }
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            conflict_frequency: Self::default_conflict_frequency(),
            conflict_brevity: Self::default_conflict_brevity(),
            conflict_betweenness: Self::default_conflict_betweenness(),
            isolation_centrality: Self::default_isolation_centrality(),
            isolation_community: Self::default_isolation_community(),
            bridge_betweenness: Self::default_bridge_betweenness(),
            bridge_crossing: Self::default_bridge_crossing(),
        }
    }
}

/// Full configuration for one analysis run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub weighting: EdgeWeighting,
    #[serde(default)]
    pub malformed: MalformedRecordPolicy,
    #[serde(default)]
    pub eigenvector: EigenvectorConfig,
    #[serde(default)]
    pub risk: RiskWeights,
}
