use crate::InteractionGraph;
use herdnet_core::{
    AnalysisConfig, EdgeWeighting, InteractionRecord, MalformedRecordPolicy, Result, TimeWindow,
};
use tracing::{debug, warn};

/// Builds a weighted interaction graph from raw proximity records.
///
/// The build is a pure function of the record *set* and window: records are
/// canonicalized to unordered pairs and accumulated into `BTreeMap`
/// adjacency, so input order never affects the result.
#[derive(Debug, Clone, Default)]
pub struct GraphBuilder {
    weighting: EdgeWeighting,
    malformed: MalformedRecordPolicy,
}

impl GraphBuilder {
    pub fn new(weighting: EdgeWeighting, malformed: MalformedRecordPolicy) -> Self {
        Self {
            weighting,
            malformed,
        }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(config.weighting, config.malformed)
    }

    pub fn build(
        &self,
        records: &[InteractionRecord],
        window: Option<TimeWindow>,
    ) -> Result<InteractionGraph> {
        let mut graph = InteractionGraph::new(self.weighting);
        let mut skipped = 0usize;

        for record in records {
            if let Err(err) = record.validate() {
                match self.malformed {
                    MalformedRecordPolicy::Reject => return Err(err),
                    MalformedRecordPolicy::SkipAndWarn => {
                        warn!(%err, "skipping malformed interaction record");
                        skipped += 1;
                        continue;
                    }
                }
            }
            if let Some(w) = window {
                if !w.contains(record) {
                    continue;
                }
            }
            graph.accumulate(&record.a, &record.b, record.duration_secs());
        }

        debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            skipped,
            "built interaction graph"
        );
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use herdnet_core::HerdNetError;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn rec(a: &str, b: &str, start: i64, end: i64) -> InteractionRecord {
        InteractionRecord::new(a, b, ts(start), ts(end))
    }

    fn scenario_a() -> Vec<InteractionRecord> {
        vec![
            rec("cow1", "cow2", 0, 10),
            rec("cow1", "cow2", 20, 25),
            rec("cow3", "cow4", 0, 5),
        ]
    }

    #[test]
    fn aggregates_duration_per_unordered_pair() {
        let g = GraphBuilder::default().build(&scenario_a(), None).unwrap();
        assert_eq!(g.node_count(), 4);
        assert_eq!(g.edge_count(), 2);
        assert_eq!(g.weight(&"cow1".into(), &"cow2".into()), Some(15.0));
        assert_eq!(g.weight(&"cow3".into(), &"cow4".into()), Some(5.0));
        assert!((g.density() - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn build_is_order_independent() {
        let builder = GraphBuilder::default();
        let records = scenario_a();
        let forward = builder.build(&records, None).unwrap();

        let mut reversed = records.clone();
        reversed.reverse();
        assert_eq!(builder.build(&reversed, None).unwrap(), forward);

        let mut rotated = records;
        rotated.rotate_left(1);
        assert_eq!(builder.build(&rotated, None).unwrap(), forward);
    }

    #[test]
    fn reversed_endpoints_merge_into_one_edge() {
        let records = vec![rec("cow1", "cow2", 0, 10), rec("cow2", "cow1", 20, 25)];
        let g = GraphBuilder::default().build(&records, None).unwrap();
        assert_eq!(g.edge_count(), 1);
        assert_eq!(g.weight(&"cow1".into(), &"cow2".into()), Some(15.0));
    }

    #[test]
    fn window_excludes_records_before_aggregation() {
        let window = TimeWindow::new(ts(0), ts(15));
        let g = GraphBuilder::default()
            .build(&scenario_a(), Some(window))
            .unwrap();
        // the second cow1/cow2 record falls outside the window
        assert_eq!(g.weight(&"cow1".into(), &"cow2".into()), Some(10.0));
        assert_eq!(g.weight(&"cow3".into(), &"cow4".into()), Some(5.0));
    }

    #[test]
    fn rejects_inverted_time_range() {
        let records = vec![rec("cow1", "cow2", 10, 0)];
        let err = GraphBuilder::default().build(&records, None).unwrap_err();
        assert!(matches!(err, HerdNetError::MalformedRecord(_)));
    }

    #[test]
    fn rejects_self_interaction() {
        let records = vec![rec("cow1", "cow1", 0, 10)];
        let err = GraphBuilder::default().build(&records, None).unwrap_err();
        assert!(matches!(err, HerdNetError::MalformedRecord(_)));
    }

    #[test]
    fn skip_and_warn_drops_bad_records() {
        let records = vec![rec("cow1", "cow1", 0, 10), rec("cow1", "cow2", 0, 10)];
        let builder = GraphBuilder::new(
            EdgeWeighting::DurationSum,
            MalformedRecordPolicy::SkipAndWarn,
        );
        let g = builder.build(&records, None).unwrap();
        assert_eq!(g.node_count(), 2);
        assert_eq!(g.edge_count(), 1);
    }

    #[test]
    fn count_weighting_is_fixed_per_run() {
        let builder = GraphBuilder::new(EdgeWeighting::Count, MalformedRecordPolicy::Reject);
        let g = builder.build(&scenario_a(), None).unwrap();
        assert_eq!(g.weight(&"cow1".into(), &"cow2".into()), Some(2.0));
        assert_eq!(g.weight(&"cow3".into(), &"cow4".into()), Some(1.0));
    }
}
