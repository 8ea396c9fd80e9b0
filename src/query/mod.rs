pub mod builder;
pub mod description;
pub mod filter;
pub mod order;
pub mod sql;
pub mod time;

pub use builder::{BuilderOptions, CompiledQuery, QueryBuilder, TIME_DIMENSION};
pub use description::{
    Aggregation, Dimension, FilterCondition, FilterOperator, FilterValue, Metric, OrderBy,
    QueryDescription, SortDirection, TimeDimension,
};
pub use order::{order_by_to_sql, ColumnOrder};
pub use time::{Granularity, TimeBucket};
