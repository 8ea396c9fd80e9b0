use crate::error::QueryValidationError;
use crate::query::time::Granularity;
use crate::registry::ViewName;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Declarative description of one analytics query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryDescription {
    pub view: ViewName,
    #[serde(default)]
    pub dimensions: Vec<Dimension>,
    pub metrics: Vec<Metric>,
    #[serde(default)]
    pub filters: Vec<FilterCondition>,
    #[serde(default)]
    pub time_dimension: Option<TimeDimension>,
    pub from_timestamp: DateTime<Utc>,
    pub to_timestamp: DateTime<Utc>,
    #[serde(default)]
    pub order_by: Option<Vec<OrderBy>>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
    pub field: String,
}

impl Dimension {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metric {
    pub measure: String,
    pub aggregation: Aggregation,
}

impl Metric {
    pub fn new(measure: impl Into<String>, aggregation: Aggregation) -> Self {
        Self {
            measure: measure.into(),
            aggregation,
        }
    }

    /// Output column name: `{aggregation}_{measure}`.
    pub fn output_name(&self) -> String {
        format!("{}_{}", self.aggregation.as_str(), self.measure)
    }

    /// Hidden column holding the SUM component of an `avg` metric.
    pub fn sum_component(&self) -> String {
        format!("{}__sum", self.output_name())
    }

    /// Hidden column holding the non-null COUNT component of an `avg` metric.
    pub fn count_component(&self) -> String {
        format!("{}__count", self.output_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    Count,
    Sum,
    Avg,
    Min,
    Max,
    P50,
    P75,
    P90,
    P95,
    P99,
}

impl Aggregation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Aggregation::Count => "count",
            Aggregation::Sum => "sum",
            Aggregation::Avg => "avg",
            Aggregation::Min => "min",
            Aggregation::Max => "max",
            Aggregation::P50 => "p50",
            Aggregation::P75 => "p75",
            Aggregation::P90 => "p90",
            Aggregation::P95 => "p95",
            Aggregation::P99 => "p99",
        }
    }

    /// Quantile for percentile aggregations.
    pub fn quantile(&self) -> Option<&'static str> {
        match self {
            Aggregation::P50 => Some("0.5"),
            Aggregation::P75 => Some("0.75"),
            Aggregation::P90 => Some("0.9"),
            Aggregation::P95 => Some("0.95"),
            Aggregation::P99 => Some("0.99"),
            _ => None,
        }
    }

    /// Whether an empty bucket is a true zero rather than an undefined value.
    pub fn zero_when_empty(&self) -> bool {
        matches!(self, Aggregation::Count | Aggregation::Sum)
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterOperator {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=", alias = "<>")]
    Neq,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = "any of")]
    AnyOf,
    #[serde(rename = "none of")]
    NoneOf,
    #[serde(rename = "all of")]
    AllOf,
    #[serde(rename = "contains")]
    Contains,
    #[serde(rename = "does not contain")]
    DoesNotContain,
    #[serde(rename = "starts with")]
    StartsWith,
    #[serde(rename = "ends with")]
    EndsWith,
    #[serde(rename = "is null")]
    IsNull,
    #[serde(rename = "is not null")]
    IsNotNull,
}

impl FilterOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Eq => "=",
            FilterOperator::Neq => "!=",
            FilterOperator::Gt => ">",
            FilterOperator::Gte => ">=",
            FilterOperator::Lt => "<",
            FilterOperator::Lte => "<=",
            FilterOperator::AnyOf => "any of",
            FilterOperator::NoneOf => "none of",
            FilterOperator::AllOf => "all of",
            FilterOperator::Contains => "contains",
            FilterOperator::DoesNotContain => "does not contain",
            FilterOperator::StartsWith => "starts with",
            FilterOperator::EndsWith => "ends with",
            FilterOperator::IsNull => "is null",
            FilterOperator::IsNotNull => "is not null",
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw filter operand as it arrives from the caller. Its meaning depends on
/// the type of the filtered column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<String>),
    Null,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCondition {
    pub field: String,
    pub operator: FilterOperator,
    #[serde(default = "null_value")]
    pub value: FilterValue,
    /// Metadata key for object-typed columns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

fn null_value() -> FilterValue {
    FilterValue::Null
}

impl FilterCondition {
    pub fn new(field: impl Into<String>, operator: FilterOperator, value: FilterValue) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
            key: None,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeDimension {
    pub granularity: Granularity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

impl FromStr for SortDirection {
    type Err = QueryValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ASC" | "asc" | "Asc" => Ok(SortDirection::Asc),
            "DESC" | "desc" | "Desc" => Ok(SortDirection::Desc),
            other => Err(QueryValidationError::InvalidOrder(other.to_string())),
        }
    }
}

impl TryFrom<String> for SortDirection {
    type Error = QueryValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SortDirection> for String {
    fn from(value: SortDirection) -> Self {
        value.as_sql().to_ascii_lowercase()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    pub direction: SortDirection,
}

impl OrderBy {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }
}

impl QueryDescription {
    /// Minimal description over a time range; fill the rest with struct update syntax.
    pub fn new(view: ViewName, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            view,
            dimensions: Vec::new(),
            metrics: Vec::new(),
            filters: Vec::new(),
            time_dimension: None,
            from_timestamp: from,
            to_timestamp: to,
            order_by: None,
            page: None,
            limit: None,
        }
    }

    pub fn output_metric_names(&self) -> Vec<String> {
        self.metrics.iter().map(Metric::output_name).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_output_names() {
        assert_eq!(Metric::new("count", Aggregation::Count).output_name(), "count_count");
        assert_eq!(
            Metric::new("totalTokens", Aggregation::Sum).output_name(),
            "sum_totalTokens"
        );
        let avg = Metric::new("latency", Aggregation::Avg);
        assert_eq!(avg.sum_component(), "avg_latency__sum");
        assert_eq!(avg.count_component(), "avg_latency__count");
    }

    #[test]
    fn test_deserialize_description() {
        let json = r#"{
            "view": "observations",
            "dimensions": [{"field": "environment"}, {"field": "providedModelName"}],
            "metrics": [{"measure": "count", "aggregation": "count"},
                        {"measure": "totalCost", "aggregation": "p95"}],
            "filters": [
                {"field": "environment", "operator": "any of", "value": ["production", "staging"]},
                {"field": "latency", "operator": ">=", "value": 250},
                {"field": "metadata", "operator": "=", "value": "eu", "key": "region"}
            ],
            "timeDimension": {"granularity": "day"},
            "fromTimestamp": "2024-01-01T00:00:00Z",
            "toTimestamp": "2024-01-31T23:59:59Z",
            "orderBy": [{"field": "count_count", "direction": "DESC"}],
            "limit": 50
        }"#;
        let q: QueryDescription = serde_json::from_str(json).unwrap();
        assert_eq!(q.view, ViewName::Observations);
        assert_eq!(q.dimensions.len(), 2);
        assert_eq!(q.metrics[1].aggregation, Aggregation::P95);
        assert_eq!(q.filters[0].operator, FilterOperator::AnyOf);
        assert_eq!(
            q.filters[0].value,
            FilterValue::List(vec!["production".into(), "staging".into()])
        );
        assert_eq!(q.filters[1].value, FilterValue::Number(250.0));
        assert_eq!(q.filters[2].key.as_deref(), Some("region"));
        assert_eq!(q.time_dimension.unwrap().granularity, Granularity::Day);
        assert_eq!(q.order_by.unwrap()[0].direction, SortDirection::Desc);
    }

    #[test]
    fn test_invalid_direction_rejected() {
        let err = "test".parse::<SortDirection>().unwrap_err();
        assert_eq!(err.to_string(), "Invalid order: test");
    }

    #[test]
    fn test_null_operators_need_no_value() {
        let f: FilterCondition =
            serde_json::from_str(r#"{"field": "userId", "operator": "is null"}"#).unwrap();
        assert_eq!(f.value, FilterValue::Null);
    }
}
