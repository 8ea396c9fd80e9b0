pub mod types;
pub mod views;

use crate::error::QueryValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use types::{DimensionDef, MeasureDef, RelationDef, ValueType, ViewDeclaration};

/// The closed set of queryable views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ViewName {
    Traces,
    Observations,
    ScoresNumeric,
    ScoresCategorical,
}

impl ViewName {
    pub const ALL: [ViewName; 4] = [
        ViewName::Traces,
        ViewName::Observations,
        ViewName::ScoresNumeric,
        ViewName::ScoresCategorical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ViewName::Traces => "traces",
            ViewName::Observations => "observations",
            ViewName::ScoresNumeric => "scores-numeric",
            ViewName::ScoresCategorical => "scores-categorical",
        }
    }

    /// Registry entry for this view.
    pub fn declaration(&self) -> &'static ViewDeclaration {
        match self {
            ViewName::Traces => &views::TRACES,
            ViewName::Observations => &views::OBSERVATIONS,
            ViewName::ScoresNumeric => &views::SCORES_NUMERIC,
            ViewName::ScoresCategorical => &views::SCORES_CATEGORICAL,
        }
    }
}

impl fmt::Display for ViewName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ViewName {
    type Err = QueryValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ViewName::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| QueryValidationError::UnknownView(s.to_string()))
    }
}

impl TryFrom<String> for ViewName {
    type Error = QueryValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ViewName> for String {
    fn from(value: ViewName) -> Self {
        value.as_str().to_string()
    }
}

/// Look up a view by name, failing with `UnknownView`.
pub fn lookup(name: &str) -> Result<&'static ViewDeclaration, QueryValidationError> {
    name.parse::<ViewName>().map(|v| v.declaration())
}
