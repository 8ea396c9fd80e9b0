//! Reshaping of executed rows for display. Nothing here fails: inexact
//! roll-ups are reported as warnings alongside the output.

pub mod pivot;
pub mod rollup;
pub mod timeseries;

pub use pivot::{
    transform_to_pivot_table, PivotConfig, PivotRow, PivotRowType, PivotTable, PivotWarning,
};
pub use rollup::{GroupAccumulator, RollupWarning};
pub use timeseries::{transform_to_time_series, Series, SeriesConfig, SeriesPoint};
