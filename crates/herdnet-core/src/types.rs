use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque stable identifier for a tracked animal (e.g. ear-tag id).
pub type AnimalId = String;
pub type SnapshotId = Uuid;
pub type ThreadId = Uuid;

/// A single timestamped proximity event between two individuals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub a: AnimalId,
    pub b: AnimalId,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl InteractionRecord {
    pub fn new(
        a: impl Into<AnimalId>,
        b: impl Into<AnimalId>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        Self {
            a: a.into(),
            b: b.into(),
            start,
            end,
        }
    }

    /// Duration of the encounter in seconds.
    pub fn duration_secs(&self) -> f64 {
        (self.end - self.start).num_milliseconds() as f64 / 1000.0
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.a.is_empty() || self.b.is_empty() {
            return Err(crate::HerdNetError::MalformedRecord(
                "record is missing an endpoint id".into(),
            ));
        }
        if self.a == self.b {
            return Err(crate::HerdNetError::MalformedRecord(format!(
                "self-interaction for {}",
                self.a
            )));
        }
        if self.end < self.start {
            return Err(crate::HerdNetError::MalformedRecord(format!(
                "record for ({}, {}) ends before it starts",
                self.a, self.b
            )));
        }
        Ok(())
    }
}

/// Closed analysis window. A record is in-window when its whole span lies
/// inside the window, so aggregated durations stay exact.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, record: &InteractionRecord) -> bool {
        record.start >= self.start && record.end <= self.end
    }
}

/// Herd-level statistics for one graph instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HerdMetrics {
    pub node_count: usize,
    pub edge_count: usize,
    pub density: f64,
    /// Longest shortest path; `None` for empty or disconnected herds.
    pub diameter: Option<usize>,
    pub modularity: f64,
    pub community_count: usize,
    pub average_clustering_coefficient: f64,
    pub average_degree: f64,
}

/// Per-individual structural metrics and derived risk scores.
///
/// Risk scores are normalized to [0, 1] within the herd that produced the
/// snapshot; the min/max basis is recorded alongside the snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IndividualMetrics {
    pub degree_centrality: f64,
    pub betweenness_centrality: f64,
    pub closeness_centrality: f64,
    pub eigenvector_centrality: f64,
    pub conflict_risk: f64,
    pub isolation_risk: f64,
    pub bridge_score: f64,
}

/// Raw min/max of one risk score before per-run normalization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreRange {
    pub min: f64,
    pub max: f64,
}

impl ScoreRange {
    pub fn normalize(&self, raw: f64) -> f64 {
        let span = self.max - self.min;
        if span <= f64::EPSILON {
            0.0
        } else {
            ((raw - self.min) / span).clamp(0.0, 1.0)
        }
    }
}

/// Per-run normalization basis, recorded so later comparisons between
/// snapshots can be made on raw values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizationBasis {
    pub conflict: ScoreRange,
    pub isolation: ScoreRange,
    pub bridge: ScoreRange,
}
