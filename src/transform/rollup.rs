//! Re-aggregation of already-aggregated metric cells.
//!
//! count and sum add up with NULL cells as 0, min and max combine, avg is re-derived from its
//! hidden sum/count components. Percentiles cannot be combined from
//! percentiles: they are exact only when a group holds a single source row.

use crate::query::description::{Aggregation, Metric};
use crate::store::ResultRow;
use serde::Serialize;

/// A roll-up that could not be computed exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RollupWarning {
    /// Percentile over more than one source row.
    #[serde(rename_all = "camelCase")]
    PercentileNotAdditive { metric: String },
    /// avg over more than one source row without sum/count components.
    #[serde(rename_all = "camelCase")]
    MissingAvgComponents { metric: String },
}

#[derive(Debug, Clone)]
enum Acc {
    Additive(f64),
    Min(Option<f64>),
    Max(Option<f64>),
    Average { sum: f64, count: f64, complete: bool },
    Percentile,
}

#[derive(Debug, Clone)]
struct MetricAcc {
    column: String,
    sum_column: String,
    count_column: String,
    acc: Acc,
    /// Cell of the first source row, exact when the group has one row.
    first: Option<f64>,
}

/// Accumulates source rows for one group (a pivot cell, subtotal, or bucket).
#[derive(Debug, Clone)]
pub struct GroupAccumulator {
    rows: usize,
    metrics: Vec<MetricAcc>,
}

impl GroupAccumulator {
    pub fn new(metrics: &[Metric]) -> Self {
        let metrics = metrics
            .iter()
            .map(|m| MetricAcc {
                column: m.output_name(),
                sum_column: m.sum_component(),
                count_column: m.count_component(),
                acc: match m.aggregation {
                    Aggregation::Count | Aggregation::Sum => Acc::Additive(0.0),
                    Aggregation::Min => Acc::Min(None),
                    Aggregation::Max => Acc::Max(None),
                    Aggregation::Avg => Acc::Average {
                        sum: 0.0,
                        count: 0.0,
                        complete: true,
                    },
                    _ => Acc::Percentile,
                },
                first: None,
            })
            .collect();
        Self { rows: 0, metrics }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn add(&mut self, row: &ResultRow) {
        self.rows += 1;
        for m in &mut self.metrics {
            let cell = row.get(&m.column).and_then(|c| c.as_f64());
            if self.rows == 1 {
                m.first = cell;
            }
            match &mut m.acc {
                Acc::Additive(total) => *total += cell.unwrap_or(0.0),
                Acc::Min(cur) => {
                    if let Some(v) = cell {
                        *cur = Some(cur.map_or(v, |c| c.min(v)));
                    }
                }
                Acc::Max(cur) => {
                    if let Some(v) = cell {
                        *cur = Some(cur.map_or(v, |c| c.max(v)));
                    }
                }
                Acc::Average {
                    sum,
                    count,
                    complete,
                } => match (row.get(&m.sum_column), row.get(&m.count_column)) {
                    (Some(s), Some(c)) => {
                        // SUM over only NULL inputs is NULL while COUNT is 0
                        *sum += s.as_f64().unwrap_or(0.0);
                        *count += c.as_f64().unwrap_or(0.0);
                    }
                    _ => *complete = false,
                },
                Acc::Percentile => {}
            }
        }
    }

    /// Final value per metric column, plus any roll-up warnings.
    /// An empty group reports 0 for every metric; count and sum are never null.
    pub fn finish(&self) -> (Vec<(String, Option<f64>)>, Vec<RollupWarning>) {
        let mut values = Vec::with_capacity(self.metrics.len());
        let mut warnings = Vec::new();
        for m in &self.metrics {
            let value = if let Acc::Additive(total) = m.acc {
                Some(total)
            } else if self.rows == 0 {
                Some(0.0)
            } else if self.rows == 1 {
                m.first
            } else {
                match &m.acc {
                    Acc::Additive(total) => Some(*total),
                    Acc::Min(v) | Acc::Max(v) => *v,
                    Acc::Average {
                        sum,
                        count,
                        complete,
                    } => {
                        if !*complete {
                            warnings.push(RollupWarning::MissingAvgComponents {
                                metric: m.column.clone(),
                            });
                            None
                        } else if *count > 0.0 {
                            Some(sum / count)
                        } else {
                            None
                        }
                    }
                    Acc::Percentile => {
                        warnings.push(RollupWarning::PercentileNotAdditive {
                            metric: m.column.clone(),
                        });
                        None
                    }
                }
            };
            values.push((m.column.clone(), value));
        }
        (values, warnings)
    }
}
