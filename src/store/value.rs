use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One result row: output column name to value.
pub type ResultRow = BTreeMap<String, CellValue>;

/// A single cell as returned by the store, after conversion to native types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Numeric view of the cell. Numeric strings (as some stores return
    /// wide integers) are parsed; anything else is `None`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Int(i) => Some(*i as f64),
            CellValue::Float(f) => Some(*f),
            CellValue::Text(s) => s.trim().parse::<f64>().ok(),
            CellValue::Bool(_) | CellValue::Null => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            CellValue::Int(i) => Some(*i),
            CellValue::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            CellValue::Text(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Convert to a number cell, keeping integers integral. Non-numeric
    /// values become `Null`.
    pub fn into_number(self) -> CellValue {
        match self {
            CellValue::Int(_) | CellValue::Float(_) | CellValue::Null => self,
            CellValue::Text(s) => {
                let s = s.trim();
                if let Ok(i) = s.parse::<i64>() {
                    CellValue::Int(i)
                } else {
                    s.parse::<f64>().map(CellValue::Float).unwrap_or(CellValue::Null)
                }
            }
            CellValue::Bool(b) => CellValue::Int(b as i64),
        }
    }
}

/// Display label; `Null` renders as the empty string.
impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => Ok(()),
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::Int(i) => write!(f, "{i}"),
            CellValue::Float(x) => write!(f, "{x}"),
            CellValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for CellValue {
    fn from(v: i64) -> Self {
        CellValue::Int(v)
    }
}

impl From<f64> for CellValue {
    fn from(v: f64) -> Self {
        CellValue::Float(v)
    }
}

impl From<&str> for CellValue {
    fn from(v: &str) -> Self {
        CellValue::Text(v.to_string())
    }
}

impl From<Option<f64>> for CellValue {
    fn from(v: Option<f64>) -> Self {
        v.map(CellValue::Float).unwrap_or(CellValue::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_number() {
        assert_eq!(CellValue::from("42").into_number(), CellValue::Int(42));
        assert_eq!(CellValue::from("1.5").into_number(), CellValue::Float(1.5));
        assert_eq!(CellValue::from("abc").into_number(), CellValue::Null);
        assert_eq!(CellValue::Int(3).into_number(), CellValue::Int(3));
    }

    #[test]
    fn test_display_null_is_empty() {
        assert_eq!(CellValue::Null.to_string(), "");
        assert_eq!(CellValue::from("prod").to_string(), "prod");
    }

    #[test]
    fn test_serializes_untagged() {
        let row: ResultRow = [
            ("a".to_string(), CellValue::Int(1)),
            ("b".to_string(), CellValue::Null),
            ("c".to_string(), CellValue::from("x")),
        ]
        .into_iter()
        .collect();
        assert_eq!(
            serde_json::to_string(&row).unwrap(),
            r#"{"a":1,"b":null,"c":"x"}"#
        );
    }
}
