/// Raised while validating a query description, before any SQL is produced.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QueryValidationError {
    #[error("Unknown view: {0}")]
    UnknownView(String),

    #[error("Invalid field: {field} is not available on view {view}")]
    InvalidField { view: String, field: String },

    #[error("Invalid filter column: {0}")]
    InvalidFilterColumn(String),

    #[error("Invalid operator: {operator} is not allowed for {field}")]
    InvalidOperator { field: String, operator: String },

    #[error("Invalid filter value for {field}: {reason}")]
    InvalidFilterValue { field: String, reason: String },

    #[error("Invalid aggregation: {aggregation} is not allowed for measure {measure}")]
    InvalidAggregation { measure: String, aggregation: String },

    #[error("Query must select at least one metric")]
    MissingMetrics,

    #[error("Time series queries require a timeDimension")]
    MissingTimeDimension,

    #[error("Duplicate metric: {0}")]
    DuplicateMetric(String),

    #[error("Duplicate dimension: {0}")]
    DuplicateDimension(String),

    #[error("Invalid time range: {0}")]
    InvalidTimeRange(String),

    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    #[error("Invalid paging: {0}")]
    InvalidPaging(String),
}

/// Failure while talking to the analytical store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("query timed out after {0}s")]
    Timeout(u64),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("query error: {0}")]
    Query(String),

    #[error("blocking task failed: {0}")]
    Join(String),
}

/// A store-level failure together with the statement that caused it.
#[derive(Debug, thiserror::Error)]
#[error("query execution failed: {source}")]
pub struct QueryExecutionError {
    #[source]
    pub source: StoreError,
    pub sql: String,
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] QueryValidationError),

    #[error(transparent)]
    Execution(#[from] QueryExecutionError),
}

impl EngineError {
    /// The generated statement, when the failure happened after SQL generation.
    pub fn sql(&self) -> Option<&str> {
        match self {
            EngineError::Validation(_) => None,
            EngineError::Execution(e) => Some(&e.sql),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, thiserror::Error)]
pub enum PricingError {
    #[error("invalid model match pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("pricing request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("pricing refresh got status {0}")]
    Status(u16),

    #[error("pricing payload contained no usable models")]
    Empty,
}
