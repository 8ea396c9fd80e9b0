//! Analytics query engine for LLM trace observability data.
//!
//! A [`QueryDescription`](query::QueryDescription) names a view, dimensions,
//! metrics and filters. The [`QueryBuilder`](query::QueryBuilder) validates it
//! against the static view registry and compiles one parameterized statement;
//! the [`QueryExecutor`](executor::QueryExecutor) runs it against an
//! [`AnalyticsStore`](store::AnalyticsStore) and the `transform` module
//! reshapes the rows into a pivot table or time series.

pub mod config;
pub mod error;
pub mod executor;
pub mod overlay;
pub mod pricing;
pub mod query;
pub mod registry;
pub mod store;
pub mod transform;

pub use error::{EngineError, QueryExecutionError, QueryValidationError, StoreError};
pub use executor::{QueryExecutor, QueryResult};
pub use query::{CompiledQuery, QueryBuilder, QueryDescription};
pub use registry::ViewName;
