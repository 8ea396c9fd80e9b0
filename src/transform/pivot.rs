//! Nested pivot rows with subtotals and a grand total.
//!
//! Rows are grouped into a tree by dimension path. Every prefix node
//! accumulates all source rows beneath it, so subtotals and the total always
//! reflect the full data set regardless of `row_limit`.

use crate::query::description::Metric;
use crate::store::ResultRow;
use crate::transform::rollup::{GroupAccumulator, RollupWarning};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

pub const TOTAL_LABEL: &str = "Total";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PivotRowType {
    Data,
    Subtotal,
    Total,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PivotRow {
    pub id: String,
    #[serde(rename = "type")]
    pub row_type: PivotRowType,
    pub level: usize,
    pub label: String,
    pub dimension_values: Vec<String>,
    pub values: BTreeMap<String, Option<f64>>,
    pub is_subtotal: bool,
    pub is_total: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PivotWarning {
    #[serde(rename_all = "camelCase")]
    Rollup {
        row_id: String,
        warning: RollupWarning,
    },
    #[serde(rename_all = "camelCase")]
    RowsTruncated { shown: usize, total: usize },
    /// The source query hit its row cap, so subtotals and the total cover
    /// only the rows that were returned.
    #[serde(rename_all = "camelCase")]
    SourceTruncated { row_cap: u32 },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PivotTable {
    pub rows: Vec<PivotRow>,
    pub warnings: Vec<PivotWarning>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PivotConfig {
    /// Dimension columns, outermost first.
    pub dimensions: Vec<String>,
    pub metrics: Vec<Metric>,
    /// Maximum number of data rows shown.
    pub row_limit: Option<usize>,
}

struct Node {
    label: String,
    acc: GroupAccumulator,
    children: Vec<Node>,
    index: HashMap<String, usize>,
}

impl Node {
    fn new(label: String, metrics: &[Metric]) -> Self {
        Self {
            label,
            acc: GroupAccumulator::new(metrics),
            children: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn child(&mut self, label: &str, metrics: &[Metric]) -> &mut Node {
        let idx = match self.index.get(label) {
            Some(&i) => i,
            None => {
                self.children.push(Node::new(label.to_string(), metrics));
                self.index.insert(label.to_string(), self.children.len() - 1);
                self.children.len() - 1
            }
        };
        &mut self.children[idx]
    }
}

/// Dimension cell as a group label. NULL and missing cells become "".
fn label_of(row: &ResultRow, dimension: &str) -> String {
    row.get(dimension).map(ToString::to_string).unwrap_or_default()
}

pub fn transform_to_pivot_table(rows: &[ResultRow], config: &PivotConfig) -> PivotTable {
    let metrics = &config.metrics;
    let mut root = Node::new(TOTAL_LABEL.to_string(), metrics);

    for row in rows {
        root.acc.add(row);
        let mut node = &mut root;
        for dim in &config.dimensions {
            node = node.child(&label_of(row, dim), metrics);
            node.acc.add(row);
        }
    }

    let mut out = Emitter {
        depth: config.dimensions.len(),
        row_limit: config.row_limit,
        data_rows: 0,
        table: PivotTable::default(),
    };
    let mut path = Vec::new();
    let mut ids = Vec::new();
    for (i, child) in root.children.iter().enumerate() {
        ids.push(i);
        out.walk(child, &mut path, &mut ids);
        ids.pop();
    }
    out.emit(&root, PivotRowType::Total, 0, Vec::new(), "total".to_string());

    if let Some(limit) = config.row_limit {
        if out.data_rows > limit {
            tracing::debug!(shown = limit, total = out.data_rows, "pivot data rows truncated");
            out.table.warnings.push(PivotWarning::RowsTruncated {
                shown: limit,
                total: out.data_rows,
            });
        }
    }
    out.table
}

struct Emitter {
    depth: usize,
    row_limit: Option<usize>,
    data_rows: usize,
    table: PivotTable,
}

impl Emitter {
    fn walk(&mut self, node: &Node, path: &mut Vec<String>, ids: &mut Vec<usize>) {
        path.push(node.label.clone());
        let id_path = ids
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(".");

        if path.len() == self.depth {
            let shown = self.row_limit.map_or(true, |limit| self.data_rows < limit);
            self.data_rows += 1;
            if shown {
                self.emit(
                    node,
                    PivotRowType::Data,
                    self.depth - 1,
                    path.clone(),
                    format!("data-{id_path}"),
                );
            }
        } else {
            self.emit(
                node,
                PivotRowType::Subtotal,
                path.len() - 1,
                path.clone(),
                format!("subtotal-{id_path}"),
            );
            for (i, child) in node.children.iter().enumerate() {
                ids.push(i);
                self.walk(child, path, ids);
                ids.pop();
            }
        }
        path.pop();
    }

    fn emit(
        &mut self,
        node: &Node,
        row_type: PivotRowType,
        level: usize,
        dimension_values: Vec<String>,
        id: String,
    ) {
        let (values, warnings) = node.acc.finish();
        for warning in warnings {
            tracing::warn!(row = %id, ?warning, "inexact pivot roll-up");
            self.table.warnings.push(PivotWarning::Rollup {
                warning,
                row_id: id.clone(),
            });
        }
        self.table.rows.push(PivotRow {
            id,
            row_type,
            level,
            label: node.label.clone(),
            dimension_values,
            values: values.into_iter().collect(),
            is_subtotal: row_type == PivotRowType::Subtotal,
            is_total: row_type == PivotRowType::Total,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::description::Aggregation;
    use crate::store::CellValue;

    fn row(cells: &[(&str, CellValue)]) -> ResultRow {
        cells
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn count_row(dims: &[(&str, &str)], count: i64) -> ResultRow {
        let mut r = row(&[("count_count", CellValue::Int(count))]);
        for (k, v) in dims {
            r.insert(k.to_string(), CellValue::from(*v));
        }
        r
    }

    fn config(dimensions: &[&str]) -> PivotConfig {
        PivotConfig {
            dimensions: dimensions.iter().map(|d| d.to_string()).collect(),
            metrics: vec![Metric::new("count", Aggregation::Count)],
            row_limit: None,
        }
    }

    fn count(r: &PivotRow) -> Option<f64> {
        r.values["count_count"]
    }

    #[test]
    fn test_zero_dimensions_single_total() {
        let rows = vec![count_row(&[], 14)];
        let table = transform_to_pivot_table(&rows, &config(&[]));
        assert_eq!(table.rows.len(), 1);
        let total = &table.rows[0];
        assert_eq!(total.row_type, PivotRowType::Total);
        assert_eq!(total.level, 0);
        assert_eq!(total.label, "Total");
        assert!(total.is_total);
        assert_eq!(count(total), Some(14.0));
    }

    #[test]
    fn test_zero_rows_total_defaults_to_zero() {
        let table = transform_to_pivot_table(&[], &config(&[]));
        assert_eq!(table.rows.len(), 1);
        assert_eq!(count(&table.rows[0]), Some(0.0));
    }

    #[test]
    fn test_one_dimension() {
        let rows = vec![
            count_row(&[("environment", "production")], 11),
            count_row(&[("environment", "staging")], 3),
        ];
        let table = transform_to_pivot_table(&rows, &config(&["environment"]));
        let types: Vec<_> = table.rows.iter().map(|r| (r.row_type, r.level)).collect();
        assert_eq!(
            types,
            vec![
                (PivotRowType::Data, 0),
                (PivotRowType::Data, 0),
                (PivotRowType::Total, 0)
            ]
        );
        assert_eq!(table.rows[0].label, "production");
        assert_eq!(count(&table.rows[2]), Some(14.0));
    }

    #[test]
    fn test_two_dimensions_subtotals_before_children() {
        let rows = vec![
            count_row(&[("env", "prod"), ("model", "a")], 5),
            count_row(&[("env", "prod"), ("model", "b")], 2),
            count_row(&[("env", "stage"), ("model", "a")], 1),
        ];
        let table = transform_to_pivot_table(&rows, &config(&["env", "model"]));
        let shape: Vec<_> = table
            .rows
            .iter()
            .map(|r| (r.row_type, r.level, r.label.as_str(), count(r)))
            .collect();
        assert_eq!(
            shape,
            vec![
                (PivotRowType::Subtotal, 0, "prod", Some(7.0)),
                (PivotRowType::Data, 1, "a", Some(5.0)),
                (PivotRowType::Data, 1, "b", Some(2.0)),
                (PivotRowType::Subtotal, 0, "stage", Some(1.0)),
                (PivotRowType::Data, 1, "a", Some(1.0)),
                (PivotRowType::Total, 0, "Total", Some(8.0)),
            ]
        );
        assert_eq!(table.rows[1].dimension_values, vec!["prod", "a"]);
        assert!(table.rows[0].is_subtotal);
    }

    #[test]
    fn test_three_dimensions_levels() {
        let rows = vec![
            count_row(&[("a", "x"), ("b", "y"), ("c", "z")], 1),
            count_row(&[("a", "x"), ("b", "y"), ("c", "w")], 2),
        ];
        let table = transform_to_pivot_table(&rows, &config(&["a", "b", "c"]));
        let shape: Vec<_> = table.rows.iter().map(|r| (r.row_type, r.level)).collect();
        assert_eq!(
            shape,
            vec![
                (PivotRowType::Subtotal, 0),
                (PivotRowType::Subtotal, 1),
                (PivotRowType::Data, 2),
                (PivotRowType::Data, 2),
                (PivotRowType::Total, 0),
            ]
        );
        assert_eq!(count(&table.rows[1]), Some(3.0));
    }

    #[test]
    fn test_row_limit_keeps_totals_of_full_data() {
        let rows = vec![
            count_row(&[("env", "a")], 1),
            count_row(&[("env", "b")], 2),
            count_row(&[("env", "c")], 3),
        ];
        let mut cfg = config(&["env"]);
        cfg.row_limit = Some(2);
        let table = transform_to_pivot_table(&rows, &cfg);
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.rows[2].row_type, PivotRowType::Total);
        assert_eq!(count(&table.rows[2]), Some(6.0));
        assert_eq!(
            table.warnings,
            vec![PivotWarning::RowsTruncated { shown: 2, total: 3 }]
        );
    }

    #[test]
    fn test_duplicates_merged_and_null_labelled_empty() {
        let mut null_env = count_row(&[], 4);
        null_env.insert("env".into(), CellValue::Null);
        let rows = vec![
            count_row(&[("env", "a")], 1),
            null_env,
            count_row(&[("env", "a")], 2),
        ];
        let table = transform_to_pivot_table(&rows, &config(&["env"]));
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.rows[0].label, "a");
        assert_eq!(count(&table.rows[0]), Some(3.0));
        assert_eq!(table.rows[1].label, "");
        assert_eq!(count(&table.rows[1]), Some(4.0));
    }

    #[test]
    fn test_percentile_subtotal_warns() {
        let metrics = vec![Metric::new("latency", Aggregation::P95)];
        let rows = vec![
            row(&[("env", "a".into()), ("p95_latency", CellValue::Float(10.0))]),
            row(&[("env", "b".into()), ("p95_latency", CellValue::Float(20.0))]),
        ];
        let table = transform_to_pivot_table(
            &rows,
            &PivotConfig {
                dimensions: vec!["env".into()],
                metrics,
                row_limit: None,
            },
        );
        assert_eq!(table.rows[0].values["p95_latency"], Some(10.0));
        assert_eq!(table.rows[2].values["p95_latency"], None);
        assert_eq!(table.warnings.len(), 1);
    }

    #[test]
    fn test_serialized_shape() {
        let table = transform_to_pivot_table(&[count_row(&[], 2)], &config(&[]));
        let json = serde_json::to_value(&table.rows[0]).unwrap();
        assert_eq!(json["type"], "total");
        assert_eq!(json["isTotal"], true);
        assert_eq!(json["isSubtotal"], false);
        assert_eq!(json["dimensionValues"], serde_json::json!([]));
        assert_eq!(json["values"]["count_count"], 2.0);
    }
}
