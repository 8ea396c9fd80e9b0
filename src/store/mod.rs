#[cfg(feature = "duckdb-store")]
pub mod conn;
pub mod schema;
pub mod value;

use crate::error::StoreError;
use crate::query::CompiledQuery;
use std::future::Future;

#[cfg(feature = "duckdb-store")]
pub use conn::DuckDbStore;
pub use value::{CellValue, ResultRow};

/// Anything that can run a compiled query and hand back its rows.
pub trait AnalyticsStore: Send + Sync {
    fn fetch(
        &self,
        query: &CompiledQuery,
    ) -> impl Future<Output = Result<Vec<ResultRow>, StoreError>> + Send;
}
