use crate::error::QueryValidationError;
use crate::query::description::{Aggregation, Metric, QueryDescription, SortDirection};
use crate::query::filter::translate_filter;
use crate::query::sql::{
    AggFunc, CmpOp, Expr, OrderTerm, ParamValue, Parameters, Predicate, Projection,
    SelectStatement, TableRef,
};
use crate::query::time::TimeBucket;
use crate::registry::{MeasureDef, ViewDeclaration, ViewName};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;

/// Output column name of the time bucket.
pub const TIME_DIMENSION: &str = "time_dimension";

/// Row cap applied when a description carries no explicit `limit`.
pub const DEFAULT_MAX_RESULT_ROWS: u32 = 10_000;

/// Upper bound on the number of time buckets one query may span.
pub const DEFAULT_MAX_TIME_BUCKETS: u32 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuilderOptions {
    pub max_result_rows: u32,
    /// Every series is gap-filled to this many points at most.
    pub max_time_buckets: u32,
}

impl Default for BuilderOptions {
    fn default() -> Self {
        Self {
            max_result_rows: DEFAULT_MAX_RESULT_ROWS,
            max_time_buckets: DEFAULT_MAX_TIME_BUCKETS,
        }
    }
}

/// A validated query ready for the store, plus what downstream shaping needs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledQuery {
    pub view: ViewName,
    pub sql: String,
    pub params: Parameters,
    /// Output columns in SELECT order, hidden avg components included.
    pub columns: Vec<String>,
    pub dimensions: Vec<String>,
    pub metrics: Vec<Metric>,
    pub bucket: Option<TimeBucket>,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    /// Set when no explicit limit was given and the configured cap applies.
    pub row_cap: Option<u32>,
}

impl CompiledQuery {
    pub fn metric_columns(&self) -> Vec<String> {
        self.metrics.iter().map(Metric::output_name).collect()
    }

    pub fn is_metric_column(&self, column: &str) -> bool {
        self.metrics.iter().any(|m| {
            m.output_name() == column || m.sum_component() == column || m.count_component() == column
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    options: BuilderOptions,
}

impl QueryBuilder {
    pub fn new(options: BuilderOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> BuilderOptions {
        self.options
    }

    /// Validate `desc` against the registry and compile it into one
    /// parameterized statement scoped to `project_id`.
    pub fn build(
        &self,
        desc: &QueryDescription,
        project_id: &str,
    ) -> Result<CompiledQuery, QueryValidationError> {
        if desc.from_timestamp > desc.to_timestamp {
            return Err(QueryValidationError::InvalidTimeRange(format!(
                "fromTimestamp {} is after toTimestamp {}",
                desc.from_timestamp.to_rfc3339(),
                desc.to_timestamp.to_rfc3339()
            )));
        }
        if desc.metrics.is_empty() {
            return Err(QueryValidationError::MissingMetrics);
        }

        let view = desc.view.declaration();
        let mut relations: Vec<&'static str> = Vec::new();
        let mut stmt = SelectStatement::new(TableRef {
            table: view.base_table,
            alias: view.alias,
        });
        let mut params = Parameters::new();

        let bucket = desc
            .time_dimension
            .map(|td| td.granularity.resolve(desc.from_timestamp, desc.to_timestamp));
        if let Some(bucket) = bucket {
            let count = bucket.bucket_count(desc.from_timestamp, desc.to_timestamp);
            if count > i64::from(self.options.max_time_buckets) {
                return Err(QueryValidationError::InvalidTimeRange(format!(
                    "{count} {} buckets exceed the limit of {}; use a coarser granularity or a shorter range",
                    bucket.sql_unit(),
                    self.options.max_time_buckets
                )));
            }
            let expr = Expr::Bucket {
                unit: bucket.sql_unit(),
                inner: Box::new(Expr::Column(view.time_column)),
            };
            stmt.projections.push(Projection {
                expr: expr.clone(),
                alias: TIME_DIMENSION.to_string(),
            });
            stmt.group_by.push(expr);
        }

        let mut dimensions = Vec::with_capacity(desc.dimensions.len());
        let mut seen = HashSet::new();
        for d in &desc.dimensions {
            if !seen.insert(d.field.as_str()) {
                return Err(QueryValidationError::DuplicateDimension(d.field.clone()));
            }
            let def = view
                .dimension(&d.field)
                .filter(|def| def.groupable)
                .ok_or_else(|| invalid_field(view, &d.field))?;
            note_relation(&mut relations, def.relation);
            let expr = Expr::Column(def.sql);
            stmt.projections.push(Projection {
                expr: expr.clone(),
                alias: d.field.clone(),
            });
            stmt.group_by.push(expr);
            dimensions.push(d.field.clone());
        }

        let mut metric_names = HashSet::new();
        let mut components = Vec::new();
        for metric in &desc.metrics {
            let def = view
                .measure(&metric.measure)
                .ok_or_else(|| invalid_field(view, &metric.measure))?;
            if !def.allows(metric.aggregation) {
                return Err(QueryValidationError::InvalidAggregation {
                    measure: metric.measure.clone(),
                    aggregation: metric.aggregation.to_string(),
                });
            }
            let name = metric.output_name();
            if !metric_names.insert(name.clone()) {
                return Err(QueryValidationError::DuplicateMetric(name));
            }
            note_relation(&mut relations, def.relation);
            let expr = match aggregate(def, metric.aggregation) {
                Expr::Aggregate {
                    func: AggFunc::Sum,
                    arg,
                } => Expr::Aggregate {
                    func: AggFunc::SumOrZero,
                    arg,
                },
                other => other,
            };
            stmt.projections.push(Projection { expr, alias: name });
            if metric.aggregation == Aggregation::Avg {
                components.push(Projection {
                    expr: aggregate(def, Aggregation::Sum),
                    alias: metric.sum_component(),
                });
                components.push(Projection {
                    expr: aggregate(def, Aggregation::Count),
                    alias: metric.count_component(),
                });
            }
        }
        stmt.projections.extend(components);

        let project = params.bind("project_id", ParamValue::Text(project_id.to_string()));
        stmt.predicates
            .push(Predicate::compare(Expr::Column(view.project_column), CmpOp::Eq, project));
        let from = params.bind(
            "from_timestamp",
            ParamValue::Int(desc.from_timestamp.timestamp_millis()),
        );
        stmt.predicates
            .push(Predicate::compare(Expr::Column(view.time_column), CmpOp::Gte, from));
        let to = params.bind(
            "to_timestamp",
            ParamValue::Int(desc.to_timestamp.timestamp_millis()),
        );
        stmt.predicates
            .push(Predicate::compare(Expr::Column(view.time_column), CmpOp::Lte, to));
        if let Some(base) = view.base_predicate {
            stmt.predicates.push(Predicate::Raw(base));
        }

        for (i, cond) in desc.filters.iter().enumerate() {
            let translated = translate_filter(view, cond, i, &mut params)?;
            note_relation(&mut relations, translated.relation);
            stmt.predicates.push(translated.predicate);
        }

        // Relations join in declaration order, whatever order they were referenced in.
        stmt.joins = view
            .relations
            .iter()
            .filter(|r| relations.contains(&r.name))
            .map(|r| r.join_sql)
            .collect();

        let mut order_terms: Vec<OrderTerm> = Vec::new();
        for o in desc.order_by.as_deref().unwrap_or_default() {
            let known = (bucket.is_some() && o.field == TIME_DIMENSION)
                || dimensions.contains(&o.field)
                || metric_names.contains(&o.field);
            if !known {
                return Err(invalid_field(view, &o.field));
            }
            if order_terms.iter().all(|t| t.alias != o.field) {
                order_terms.push(OrderTerm {
                    alias: o.field.clone(),
                    direction: o.direction,
                });
            }
        }
        // Group columns not named in orderBy break ties, ascending.
        let group_columns = bucket
            .map(|_| TIME_DIMENSION.to_string())
            .into_iter()
            .chain(dimensions.iter().cloned());
        for alias in group_columns {
            if order_terms.iter().all(|t| t.alias != alias) {
                order_terms.push(OrderTerm {
                    alias,
                    direction: SortDirection::Asc,
                });
            }
        }
        stmt.order_by = order_terms;

        if desc.limit == Some(0) {
            return Err(QueryValidationError::InvalidPaging(
                "limit must be greater than zero".to_string(),
            ));
        }
        if desc.page == Some(0) {
            return Err(QueryValidationError::InvalidPaging(
                "page numbers start at 1".to_string(),
            ));
        }
        let row_cap = desc.limit.is_none().then_some(self.options.max_result_rows);
        let page_size = desc.limit.unwrap_or(self.options.max_result_rows);
        stmt.limit = Some(params.bind("limit", ParamValue::Int(page_size as i64)));
        if let Some(page) = desc.page {
            let offset = (page as i64 - 1) * page_size as i64;
            stmt.offset = Some(params.bind("offset", ParamValue::Int(offset)));
        }

        Ok(CompiledQuery {
            view: desc.view,
            sql: stmt.render(),
            params,
            columns: stmt.output_columns(),
            dimensions,
            metrics: desc.metrics.clone(),
            bucket,
            from: desc.from_timestamp,
            to: desc.to_timestamp,
            row_cap,
        })
    }
}

fn invalid_field(view: &ViewDeclaration, field: &str) -> QueryValidationError {
    QueryValidationError::InvalidField {
        view: view.name.to_string(),
        field: field.to_string(),
    }
}

fn note_relation(relations: &mut Vec<&'static str>, relation: Option<&'static str>) {
    if let Some(r) = relation {
        if !relations.contains(&r) {
            relations.push(r);
        }
    }
}

fn aggregate(def: &MeasureDef, agg: Aggregation) -> Expr {
    let Some(sql) = def.sql else {
        return Expr::Aggregate {
            func: AggFunc::CountStar,
            arg: None,
        };
    };
    let func = match agg {
        Aggregation::Count => AggFunc::Count,
        Aggregation::Sum => AggFunc::Sum,
        Aggregation::Avg => AggFunc::Avg,
        Aggregation::Min => AggFunc::Min,
        Aggregation::Max => AggFunc::Max,
        Aggregation::P50
        | Aggregation::P75
        | Aggregation::P90
        | Aggregation::P95
        | Aggregation::P99 => AggFunc::Quantile(agg.quantile().unwrap_or("0.5")),
    };
    Expr::Aggregate {
        func,
        arg: Some(Box::new(Expr::Column(sql))),
    }
}
