//! Filter translation: one `FilterCondition` becomes one WHERE predicate.

use crate::error::QueryValidationError;
use crate::query::description::{FilterCondition, FilterOperator, FilterValue};
use crate::query::sql::{CmpOp, Expr, ParamValue, Parameters, Predicate};
use crate::registry::{ValueType, ViewDeclaration};
use chrono::DateTime;

/// A column a filter may address: any dimension, or any non-count measure.
#[derive(Debug, Clone, Copy)]
pub struct FilterColumn {
    pub sql: &'static str,
    pub value_type: ValueType,
    pub relation: Option<&'static str>,
}

pub fn resolve_filter_column(
    view: &ViewDeclaration,
    field: &str,
) -> Result<FilterColumn, QueryValidationError> {
    if let Some(d) = view.dimension(field) {
        return Ok(FilterColumn {
            sql: d.sql,
            value_type: d.value_type,
            relation: d.relation,
        });
    }
    view.measure(field)
        .and_then(|m| {
            m.sql.map(|sql| FilterColumn {
                sql,
                value_type: m.value_type,
                relation: m.relation,
            })
        })
        .ok_or_else(|| QueryValidationError::InvalidFilterColumn(field.to_string()))
}

/// A translated filter and the relation it needs joined, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslatedFilter {
    pub predicate: Predicate,
    pub relation: Option<&'static str>,
}

pub fn translate_filter(
    view: &ViewDeclaration,
    cond: &FilterCondition,
    index: usize,
    params: &mut Parameters,
) -> Result<TranslatedFilter, QueryValidationError> {
    let column = resolve_filter_column(view, &cond.field)?;
    if !column.value_type.accepts(cond.operator) {
        return Err(QueryValidationError::InvalidOperator {
            field: cond.field.clone(),
            operator: cond.operator.to_string(),
        });
    }

    let mut ctx = Ctx {
        cond,
        params,
        base_name: format!("filter_{index}_{}", cond.field),
        bound: 0,
    };
    let col = Expr::Column(column.sql);

    let predicate = match column.value_type {
        ValueType::Datetime => {
            let ms = ctx.timestamp_ms()?;
            let rhs = ctx.bind(ParamValue::Int(ms));
            Predicate::compare(col, cmp_op(cond.operator), rhs)
        }
        ValueType::String => ctx.string_predicate(col)?,
        ValueType::StringObject => {
            let key = cond.key.as_deref().filter(|k| !k.is_empty()).ok_or_else(|| {
                ctx.invalid("a metadata key is required for object columns")
            })?;
            let path = ctx.bind(ParamValue::Text(json_path(key)));
            let extracted = Expr::Call {
                func: "json_extract_string",
                args: vec![col, path],
            };
            ctx.string_predicate(extracted)?
        }
        ValueType::StringList => {
            let items = ctx.list()?;
            let tests: Vec<Predicate> = items
                .into_iter()
                .map(|item| {
                    let p = ctx.bind(ParamValue::Text(item));
                    Predicate::Test(Expr::Call {
                        func: "list_contains",
                        args: vec![col.clone(), p],
                    })
                })
                .collect();
            match cond.operator {
                FilterOperator::AllOf => Predicate::And(tests),
                FilterOperator::NoneOf => Predicate::Or(tests).negate(),
                _ => Predicate::Or(tests),
            }
        }
        ValueType::Integer | ValueType::Decimal => match cond.operator {
            FilterOperator::IsNull | FilterOperator::IsNotNull => null_check(col, cond.operator),
            op => {
                let n = ctx.number()?;
                let value = if column.value_type == ValueType::Integer && n.fract() == 0.0 {
                    let v = exact_i64(n)
                        .ok_or_else(|| ctx.invalid("out of range for an integer column"))?;
                    ParamValue::Int(v)
                } else {
                    ParamValue::Float(n)
                };
                let rhs = ctx.bind(value);
                Predicate::compare(col, cmp_op(op), rhs)
            }
        },
        ValueType::Boolean => {
            let b = ctx.boolean()?;
            let rhs = ctx.bind(ParamValue::Bool(b));
            Predicate::compare(col, cmp_op(cond.operator), rhs)
        }
    };

    Ok(TranslatedFilter {
        predicate,
        relation: column.relation,
    })
}

struct Ctx<'a> {
    cond: &'a FilterCondition,
    params: &'a mut Parameters,
    base_name: String,
    bound: usize,
}

impl Ctx<'_> {
    fn bind(&mut self, value: ParamValue) -> Expr {
        let name = if self.bound == 0 {
            self.base_name.clone()
        } else {
            format!("{}_{}", self.base_name, self.bound)
        };
        self.bound += 1;
        self.params.bind(name, value)
    }

    fn invalid(&self, reason: &str) -> QueryValidationError {
        QueryValidationError::InvalidFilterValue {
            field: self.cond.field.clone(),
            reason: reason.to_string(),
        }
    }

    fn text(&self) -> Result<String, QueryValidationError> {
        match &self.cond.value {
            FilterValue::Text(s) => Ok(s.clone()),
            _ => Err(self.invalid("expected a string")),
        }
    }

    fn list(&self) -> Result<Vec<String>, QueryValidationError> {
        match &self.cond.value {
            FilterValue::List(items) if !items.is_empty() => Ok(items.clone()),
            FilterValue::List(_) => Err(self.invalid("expected at least one value")),
            _ => Err(self.invalid("expected a list of strings")),
        }
    }

    fn number(&self) -> Result<f64, QueryValidationError> {
        match &self.cond.value {
            FilterValue::Number(n) if n.is_finite() => Ok(*n),
            FilterValue::Text(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .ok_or_else(|| self.invalid("expected a number")),
            _ => Err(self.invalid("expected a number")),
        }
    }

    fn boolean(&self) -> Result<bool, QueryValidationError> {
        match &self.cond.value {
            FilterValue::Bool(b) => Ok(*b),
            FilterValue::Text(s) if s == "true" => Ok(true),
            FilterValue::Text(s) if s == "false" => Ok(false),
            _ => Err(self.invalid("expected a boolean")),
        }
    }

    /// Datetime operands are RFC 3339 strings or epoch milliseconds.
    fn timestamp_ms(&self) -> Result<i64, QueryValidationError> {
        match &self.cond.value {
            FilterValue::Text(s) => DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.timestamp_millis())
                .map_err(|_| self.invalid("expected an RFC 3339 timestamp")),
            FilterValue::Number(n) if n.is_finite() => exact_i64(n.trunc())
                .ok_or_else(|| self.invalid("epoch milliseconds out of range")),
            _ => Err(self.invalid("expected an RFC 3339 timestamp")),
        }
    }

    fn string_predicate(&mut self, col: Expr) -> Result<Predicate, QueryValidationError> {
        let op = self.cond.operator;
        let pred = match op {
            FilterOperator::IsNull | FilterOperator::IsNotNull => null_check(col, op),
            FilterOperator::AnyOf | FilterOperator::NoneOf => {
                let items = self
                    .list()?
                    .into_iter()
                    .map(|v| self.bind(ParamValue::Text(v)))
                    .collect();
                Predicate::InList {
                    expr: col,
                    items,
                    negated: op == FilterOperator::NoneOf,
                }
            }
            FilterOperator::Contains
            | FilterOperator::DoesNotContain
            | FilterOperator::StartsWith
            | FilterOperator::EndsWith => {
                let v = self.text()?;
                let p = self.bind(ParamValue::Text(v));
                let func = match op {
                    FilterOperator::StartsWith => "starts_with",
                    FilterOperator::EndsWith => "ends_with",
                    _ => "contains",
                };
                let test = Predicate::Test(Expr::Call {
                    func,
                    args: vec![col, p],
                });
                if op == FilterOperator::DoesNotContain {
                    test.negate()
                } else {
                    test
                }
            }
            _ => {
                let v = self.text()?;
                let rhs = self.bind(ParamValue::Text(v));
                Predicate::compare(col, cmp_op(op), rhs)
            }
        };
        Ok(pred)
    }
}

fn null_check(col: Expr, op: FilterOperator) -> Predicate {
    Predicate::IsNull {
        expr: col,
        negated: op == FilterOperator::IsNotNull,
    }
}

fn cmp_op(op: FilterOperator) -> CmpOp {
    match op {
        FilterOperator::Neq => CmpOp::Neq,
        FilterOperator::Gt => CmpOp::Gt,
        FilterOperator::Gte => CmpOp::Gte,
        FilterOperator::Lt => CmpOp::Lt,
        FilterOperator::Lte => CmpOp::Lte,
        _ => CmpOp::Eq,
    }
}

fn json_path(key: &str) -> String {
    format!("$.\"{}\"", key.replace('\\', "\\\\").replace('"', "\\\""))
}

/// `n` as an i64 when it is integral and in range; `as` would saturate.
fn exact_i64(n: f64) -> Option<i64> {
    const LIMIT: f64 = 9_223_372_036_854_775_808.0; // 2^63
    (n.fract() == 0.0 && (-LIMIT..LIMIT).contains(&n)).then_some(n as i64)
}
