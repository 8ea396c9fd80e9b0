use serde::Serialize;

use crate::query::description::{Aggregation, FilterOperator};

/// Value type of a registered column. Drives which filter operators apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ValueType {
    String,
    StringList,
    StringObject,
    Integer,
    Decimal,
    Datetime,
    Boolean,
}

impl ValueType {
    pub fn allowed_operators(&self) -> &'static [FilterOperator] {
        use FilterOperator::*;
        match self {
            ValueType::Datetime => &[Gt, Gte, Lt, Lte],
            ValueType::String => &[
                Eq,
                Neq,
                AnyOf,
                NoneOf,
                Contains,
                DoesNotContain,
                StartsWith,
                EndsWith,
                IsNull,
                IsNotNull,
            ],
            ValueType::StringList => &[AnyOf, NoneOf, AllOf],
            ValueType::StringObject => {
                &[Eq, Neq, Contains, DoesNotContain, StartsWith, EndsWith]
            }
            ValueType::Integer | ValueType::Decimal => {
                &[Eq, Neq, Gt, Gte, Lt, Lte, IsNull, IsNotNull]
            }
            ValueType::Boolean => &[Eq, Neq],
        }
    }

    pub fn accepts(&self, op: FilterOperator) -> bool {
        self.allowed_operators().contains(&op)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ValueType::Integer | ValueType::Decimal)
    }
}

/// A groupable / filterable column of a view.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DimensionDef {
    pub field: &'static str,
    #[serde(skip)]
    pub sql: &'static str,
    pub value_type: ValueType,
    /// Only list columns cannot be grouped on.
    pub groupable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relation: Option<&'static str>,
}

/// A numeric column that metrics aggregate over.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct MeasureDef {
    pub field: &'static str,
    /// `None` for the `count` pseudo-measure, rendered as `COUNT(*)`.
    #[serde(skip)]
    pub sql: Option<&'static str>,
    pub value_type: ValueType,
    pub aggregations: &'static [Aggregation],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relation: Option<&'static str>,
}

impl MeasureDef {
    pub fn is_count(&self) -> bool {
        self.sql.is_none()
    }

    pub fn allows(&self, agg: Aggregation) -> bool {
        self.aggregations.contains(&agg)
    }
}

/// A table joined in only when one of its fields is referenced.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RelationDef {
    pub name: &'static str,
    #[serde(skip)]
    pub join_sql: &'static str,
}

/// Everything the builder needs to know about one queryable view.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewDeclaration {
    pub name: &'static str,
    pub base_table: &'static str,
    #[serde(skip)]
    pub alias: &'static str,
    #[serde(skip)]
    pub time_column: &'static str,
    #[serde(skip)]
    pub project_column: &'static str,
    #[serde(skip)]
    pub base_predicate: Option<&'static str>,
    pub dimensions: &'static [DimensionDef],
    pub measures: &'static [MeasureDef],
    pub relations: &'static [RelationDef],
}

impl ViewDeclaration {
    pub fn dimension(&self, field: &str) -> Option<&'static DimensionDef> {
        self.dimensions.iter().find(|d| d.field == field)
    }

    pub fn measure(&self, field: &str) -> Option<&'static MeasureDef> {
        self.measures.iter().find(|m| m.field == field)
    }

    pub fn relation(&self, name: &str) -> Option<&'static RelationDef> {
        self.relations.iter().find(|r| r.name == name)
    }
}
