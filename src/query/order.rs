//! ORDER BY translation for the hand-written list queries.

use crate::error::QueryValidationError;
use crate::query::description::SortDirection;
use crate::query::filter::resolve_filter_column;
use crate::registry::ViewDeclaration;
use serde::Deserialize;

/// Sort request as the table views send it: a column name and a raw direction.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ColumnOrder {
    pub column: String,
    pub order: String,
}

impl ColumnOrder {
    pub fn new(column: impl Into<String>, order: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            order: order.into(),
        }
    }
}

/// Render an `ORDER BY` clause for `order` against the columns of `view`.
/// `None` yields an empty string.
pub fn order_by_to_sql(
    order: Option<&ColumnOrder>,
    view: &ViewDeclaration,
) -> Result<String, QueryValidationError> {
    let Some(order) = order else {
        return Ok(String::new());
    };
    let column = resolve_filter_column(view, &order.column)?;
    let direction: SortDirection = order.order.parse()?;
    Ok(format!("ORDER BY {} {}", column.sql, direction.as_sql()))
}
