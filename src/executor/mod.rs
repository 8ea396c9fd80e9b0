pub mod enrich;

use crate::error::{EngineResult, QueryExecutionError, QueryValidationError};
use crate::pricing::PricingTable;
use crate::query::builder::TIME_DIMENSION;
use crate::query::{CompiledQuery, Metric, QueryBuilder, QueryDescription, TimeBucket};
use crate::store::{AnalyticsStore, ResultRow};
use crate::transform::{
    transform_to_pivot_table, transform_to_time_series, PivotConfig, PivotTable, PivotWarning,
    Series, SeriesConfig,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

/// Rows of one executed query, metric cells coerced to numbers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub rows: Vec<ResultRow>,
    pub columns: Vec<String>,
    pub dimensions: Vec<String>,
    pub metrics: Vec<Metric>,
    pub bucket: Option<TimeBucket>,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    /// The configured row cap was reached; more rows may exist.
    pub truncated: bool,
}

pub struct QueryExecutor<S> {
    store: S,
    builder: QueryBuilder,
    pricing: Option<Arc<PricingTable>>,
}

impl<S: AnalyticsStore> QueryExecutor<S> {
    pub fn new(store: S, builder: QueryBuilder) -> Self {
        Self {
            store,
            builder,
            pricing: None,
        }
    }

    /// Enable per-model cost estimates on observation rows.
    pub fn with_pricing(mut self, pricing: Arc<PricingTable>) -> Self {
        self.pricing = Some(pricing);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn compile(
        &self,
        project_id: &str,
        desc: &QueryDescription,
    ) -> Result<CompiledQuery, QueryValidationError> {
        self.builder.build(desc, project_id)
    }

    /// Validate, compile and run `desc`. Validation failures return before
    /// the store is touched.
    pub async fn execute(
        &self,
        project_id: &str,
        desc: &QueryDescription,
    ) -> EngineResult<QueryResult> {
        let compiled = self.compile(project_id, desc)?;
        tracing::debug!(
            view = %compiled.view,
            project_id,
            sql = %compiled.sql,
            params = compiled.params.len(),
            "executing analytics query"
        );

        let mut rows = self
            .store
            .fetch(&compiled)
            .await
            .map_err(|source| {
                tracing::error!(view = %compiled.view, error = %source, sql = %compiled.sql, "analytics query failed");
                QueryExecutionError {
                    source,
                    sql: compiled.sql.clone(),
                }
            })?;

        for row in rows.iter_mut() {
            coerce_numbers(row, &compiled);
        }

        if let Some(pricing) = &self.pricing {
            if enrich::supports_cost_estimate(&compiled) {
                let priced = enrich::apply_cost_estimate(&mut rows, pricing);
                tracing::debug!(rows = rows.len(), priced, "applied model cost estimates");
            }
        }

        let truncated = compiled
            .row_cap
            .is_some_and(|cap| rows.len() >= cap as usize);
        if truncated {
            tracing::warn!(
                view = %compiled.view,
                rows = rows.len(),
                "result hit the row cap; set an explicit limit or narrow the query"
            );
        }
        tracing::info!(view = %compiled.view, rows = rows.len(), "analytics query complete");

        Ok(QueryResult {
            rows,
            columns: compiled.columns,
            dimensions: compiled.dimensions,
            metrics: compiled.metrics,
            bucket: compiled.bucket,
            from: compiled.from,
            to: compiled.to,
            truncated,
        })
    }

    /// Execute and shape as a pivot table. Any time dimension is ignored by
    /// the pivot; group on dimensions only for sensible subtotals.
    ///
    /// Totals are only complete when every group came back: a result cut by
    /// the row cap carries a `SourceTruncated` warning. Use `row_limit` to
    /// limit displayed rows instead of a query `limit`.
    pub async fn execute_pivot(
        &self,
        project_id: &str,
        desc: &QueryDescription,
        row_limit: Option<usize>,
    ) -> EngineResult<PivotTable> {
        let result = self.execute(project_id, desc).await?;
        let config = PivotConfig {
            dimensions: result.dimensions,
            metrics: result.metrics,
            row_limit,
        };
        let mut table = transform_to_pivot_table(&result.rows, &config);
        if result.truncated {
            let row_cap = self.builder.options().max_result_rows;
            tracing::warn!(row_cap, "pivot totals computed from a truncated result");
            table.warnings.push(PivotWarning::SourceTruncated { row_cap });
        }
        Ok(table)
    }

    /// Execute and shape as gap-filled time series.
    pub async fn execute_series(
        &self,
        project_id: &str,
        desc: &QueryDescription,
    ) -> EngineResult<Vec<Series>> {
        if desc.time_dimension.is_none() {
            return Err(QueryValidationError::MissingTimeDimension.into());
        }
        let result = self.execute(project_id, desc).await?;
        let Some(bucket) = result.bucket else {
            return Err(QueryValidationError::MissingTimeDimension.into());
        };
        let config = SeriesConfig {
            dimensions: result.dimensions,
            metrics: result.metrics,
            bucket,
            from: result.from,
            to: result.to,
        };
        Ok(transform_to_time_series(&result.rows, &config))
    }
}

/// Metric cells and the time bucket may come back as numeric strings or
/// wide integers; normalise them to plain numbers.
fn coerce_numbers(row: &mut ResultRow, compiled: &CompiledQuery) {
    for (column, cell) in row.iter_mut() {
        if column == TIME_DIMENSION || compiled.is_metric_column(column) {
            *cell = std::mem::replace(cell, crate::store::CellValue::Null).into_number();
        }
    }
}
