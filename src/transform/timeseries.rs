use crate::query::builder::TIME_DIMENSION;
use crate::query::description::Metric;
use crate::query::time::TimeBucket;
use crate::store::ResultRow;
use crate::transform::rollup::GroupAccumulator;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

pub const LABEL_SEPARATOR: &str = " / ";

#[derive(Debug, Clone, PartialEq)]
pub struct SeriesConfig {
    /// Non-time dimension columns.
    pub dimensions: Vec<String>,
    pub metrics: Vec<Metric>,
    pub bucket: TimeBucket,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub timestamp: DateTime<Utc>,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Series {
    pub label: String,
    pub metric: String,
    pub dimension_values: Vec<String>,
    pub points: Vec<SeriesPoint>,
}

/// Reshape grouped rows carrying a `time_dimension` column into gap-filled
/// series, one per dimension combination and metric.
pub fn transform_to_time_series(rows: &[ResultRow], config: &SeriesConfig) -> Vec<Series> {
    let expected = config.bucket.buckets(config.from, config.to);
    let mut groups: BTreeMap<Vec<String>, BTreeMap<DateTime<Utc>, GroupAccumulator>> =
        BTreeMap::new();
    let mut skipped = 0usize;

    for row in rows {
        let Some(ts) = row
            .get(TIME_DIMENSION)
            .and_then(|c| c.as_i64())
            .and_then(DateTime::from_timestamp_millis)
        else {
            skipped += 1;
            continue;
        };
        // Same truncation as the SQL bucket, so stray values land in a known bucket.
        let bucket = config.bucket.truncate(ts);
        let key: Vec<String> = config
            .dimensions
            .iter()
            .map(|d| row.get(d).map(ToString::to_string).unwrap_or_default())
            .collect();
        groups
            .entry(key)
            .or_default()
            .entry(bucket)
            .or_insert_with(|| GroupAccumulator::new(&config.metrics))
            .add(row);
    }
    if skipped > 0 {
        tracing::warn!(skipped, "rows without a usable time bucket were ignored");
    }

    if config.dimensions.is_empty() && groups.is_empty() {
        groups.insert(Vec::new(), BTreeMap::new());
    }

    let mut keyed: Vec<(String, usize, Series)> = Vec::new();
    for (dimension_values, buckets) in groups {
        let timestamps: BTreeSet<DateTime<Utc>> =
            expected.iter().copied().chain(buckets.keys().copied()).collect();
        let finished: BTreeMap<DateTime<Utc>, Vec<Option<f64>>> = buckets
            .iter()
            .map(|(ts, acc)| (*ts, acc.finish().0.into_iter().map(|(_, v)| v).collect()))
            .collect();
        let sort_label = dimension_values.join(LABEL_SEPARATOR);

        for (mi, metric) in config.metrics.iter().enumerate() {
            let default = metric.aggregation.zero_when_empty().then_some(0.0);
            let points = timestamps
                .iter()
                .map(|ts| SeriesPoint {
                    timestamp: *ts,
                    value: finished.get(ts).map_or(default, |values| values[mi]),
                })
                .collect();
            let label = if config.dimensions.is_empty() {
                metric.output_name()
            } else {
                sort_label.clone()
            };
            keyed.push((
                sort_label.clone(),
                mi,
                Series {
                    label,
                    metric: metric.output_name(),
                    dimension_values: dimension_values.clone(),
                    points,
                },
            ));
        }
    }

    keyed.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));
    keyed.into_iter().map(|(_, _, s)| s).collect()
}
