//! SQL intermediate representation.
//!
//! The builder assembles a [`SelectStatement`] from typed clause nodes and
//! renders it to text as the very last step. Identifiers and expressions
//! come exclusively from `&'static str` registry fragments; every value
//! supplied by a caller is a numbered placeholder into the parameter list.

use crate::query::description::SortDirection;
use serde::Serialize;
use std::fmt::Write;

/// A bound parameter value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
}

/// One named parameter. Its position in the list is its placeholder number.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryParameter {
    pub name: String,
    pub value: ParamValue,
}

/// Ordered parameter list that hands out `$n` placeholders.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Parameters {
    items: Vec<QueryParameter>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a value and return the placeholder expression for it.
    pub fn bind(&mut self, name: impl Into<String>, value: ParamValue) -> Expr {
        self.items.push(QueryParameter {
            name: name.into(),
            value,
        });
        Expr::Param(self.items.len())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueryParameter> {
        self.items.iter()
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.items.iter().find(|p| p.name == name).map(|p| &p.value)
    }

    pub fn values(&self) -> Vec<ParamValue> {
        self.items.iter().map(|p| p.value.clone()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AggFunc {
    CountStar,
    Count,
    Sum,
    /// SUM that reads 0 instead of NULL when no input is non-null.
    SumOrZero,
    Avg,
    Min,
    Max,
    Quantile(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Trusted column expression from the registry.
    Column(&'static str),
    /// 1-based placeholder.
    Param(usize),
    /// Epoch-millisecond column truncated to a bucket, as epoch milliseconds.
    Bucket { unit: &'static str, inner: Box<Expr> },
    Aggregate { func: AggFunc, arg: Option<Box<Expr>> },
    Call { func: &'static str, args: Vec<Expr> },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CmpOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CmpOp {
    fn as_sql(&self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::Neq => "!=",
            CmpOp::Gt => ">",
            CmpOp::Gte => ">=",
            CmpOp::Lt => "<",
            CmpOp::Lte => "<=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare { lhs: Expr, op: CmpOp, rhs: Expr },
    InList { expr: Expr, items: Vec<Expr>, negated: bool },
    IsNull { expr: Expr, negated: bool },
    /// A boolean-valued expression such as `contains(a, b)`.
    Test(Expr),
    /// Static view predicate from the registry.
    Raw(&'static str),
    Not(Box<Predicate>),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    pub fn compare(lhs: Expr, op: CmpOp, rhs: Expr) -> Self {
        Predicate::Compare { lhs, op, rhs }
    }

    pub fn negate(self) -> Self {
        Predicate::Not(Box::new(self))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub expr: Expr,
    pub alias: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderTerm {
    pub alias: String,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableRef {
    pub table: &'static str,
    pub alias: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    pub projections: Vec<Projection>,
    pub from: TableRef,
    pub joins: Vec<&'static str>,
    pub predicates: Vec<Predicate>,
    pub group_by: Vec<Expr>,
    pub order_by: Vec<OrderTerm>,
    pub limit: Option<Expr>,
    pub offset: Option<Expr>,
}

impl SelectStatement {
    pub fn new(from: TableRef) -> Self {
        Self {
            projections: Vec::new(),
            from,
            joins: Vec::new(),
            predicates: Vec::new(),
            group_by: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// Output column names in SELECT order.
    pub fn output_columns(&self) -> Vec<String> {
        self.projections.iter().map(|p| p.alias.clone()).collect()
    }

    pub fn render(&self) -> String {
        let mut sql = String::from("SELECT\n");
        let items: Vec<String> = self
            .projections
            .iter()
            .map(|p| format!("    {} AS {}", render_expr(&p.expr), quote_ident(&p.alias)))
            .collect();
        sql.push_str(&items.join(",\n"));
        let _ = write!(sql, "\nFROM {} {}", self.from.table, self.from.alias);
        for join in &self.joins {
            let _ = write!(sql, "\n{join}");
        }
        for (i, pred) in self.predicates.iter().enumerate() {
            let kw = if i == 0 { "\nWHERE " } else { "\n    AND " };
            sql.push_str(kw);
            sql.push_str(&render_predicate(pred));
        }
        if !self.group_by.is_empty() {
            let groups: Vec<String> = self.group_by.iter().map(render_expr).collect();
            let _ = write!(sql, "\nGROUP BY {}", groups.join(", "));
        }
        if !self.order_by.is_empty() {
            let terms: Vec<String> = self
                .order_by
                .iter()
                .map(|t| format!("{} {}", quote_ident(&t.alias), t.direction.as_sql()))
                .collect();
            let _ = write!(sql, "\nORDER BY {}", terms.join(", "));
        }
        if let Some(limit) = &self.limit {
            let _ = write!(sql, "\nLIMIT {}", render_expr(limit));
        }
        if let Some(offset) = &self.offset {
            let _ = write!(sql, " OFFSET {}", render_expr(offset));
        }
        sql
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn render_expr(expr: &Expr) -> String {
    match expr {
        Expr::Column(c) => (*c).to_string(),
        Expr::Param(i) => format!("${i}"),
        Expr::Bucket { unit, inner } => format!(
            "epoch_ms(CAST(date_trunc('{unit}', epoch_ms({})) AS TIMESTAMP))",
            render_expr(inner)
        ),
        Expr::Aggregate { func, arg } => {
            let arg = arg.as_deref().map(render_expr).unwrap_or_default();
            match func {
                AggFunc::CountStar => "COUNT(*)".to_string(),
                AggFunc::Count => format!("COUNT({arg})"),
                AggFunc::Sum => format!("SUM({arg})"),
                AggFunc::SumOrZero => format!("COALESCE(SUM({arg}), 0)"),
                AggFunc::Avg => format!("AVG({arg})"),
                AggFunc::Min => format!("MIN({arg})"),
                AggFunc::Max => format!("MAX({arg})"),
                AggFunc::Quantile(q) => format!("quantile_cont({arg}, {q})"),
            }
        }
        Expr::Call { func, args } => {
            let args: Vec<String> = args.iter().map(render_expr).collect();
            format!("{func}({})", args.join(", "))
        }
    }
}

pub fn render_predicate(pred: &Predicate) -> String {
    match pred {
        Predicate::Compare { lhs, op, rhs } => {
            format!("{} {} {}", render_expr(lhs), op.as_sql(), render_expr(rhs))
        }
        Predicate::InList {
            expr,
            items,
            negated,
        } => {
            let items: Vec<String> = items.iter().map(render_expr).collect();
            let kw = if *negated { "NOT IN" } else { "IN" };
            format!("{} {kw} ({})", render_expr(expr), items.join(", "))
        }
        Predicate::IsNull { expr, negated } => {
            let kw = if *negated { "IS NOT NULL" } else { "IS NULL" };
            format!("{} {kw}", render_expr(expr))
        }
        Predicate::Test(expr) => render_expr(expr),
        Predicate::Raw(sql) => (*sql).to_string(),
        Predicate::Not(inner) => format!("NOT ({})", render_predicate(inner)),
        Predicate::And(parts) => join_predicates(parts, " AND "),
        Predicate::Or(parts) => join_predicates(parts, " OR "),
    }
}

fn join_predicates(parts: &[Predicate], sep: &str) -> String {
    let rendered: Vec<String> = parts.iter().map(render_predicate).collect();
    format!("({})", rendered.join(sep))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameters_number_in_order() {
        let mut params = Parameters::new();
        assert_eq!(params.bind("a", ParamValue::Int(1)), Expr::Param(1));
        assert_eq!(params.bind("b", ParamValue::Text("x".into())), Expr::Param(2));
        assert_eq!(params.len(), 2);
        assert_eq!(params.get("b"), Some(&ParamValue::Text("x".into())));
    }

    #[test]
    fn test_render_full_statement() {
        let mut params = Parameters::new();
        let mut stmt = SelectStatement::new(TableRef {
            table: "observations",
            alias: "o",
        });
        stmt.projections.push(Projection {
            expr: Expr::Column("o.environment"),
            alias: "environment".into(),
        });
        stmt.projections.push(Projection {
            expr: Expr::Aggregate {
                func: AggFunc::CountStar,
                arg: None,
            },
            alias: "count_count".into(),
        });
        stmt.joins
            .push("LEFT JOIN traces t ON o.trace_id = t.id AND o.project_id = t.project_id");
        let p = params.bind("project_id", ParamValue::Text("p1".into()));
        stmt.predicates
            .push(Predicate::compare(Expr::Column("o.project_id"), CmpOp::Eq, p));
        let a = params.bind("f0", ParamValue::Text("a".into()));
        let b = params.bind("f1", ParamValue::Text("b".into()));
        stmt.predicates.push(Predicate::InList {
            expr: Expr::Column("o.environment"),
            items: vec![a, b],
            negated: true,
        });
        stmt.group_by.push(Expr::Column("o.environment"));
        stmt.order_by.push(OrderTerm {
            alias: "environment".into(),
            direction: SortDirection::Asc,
        });
        stmt.limit = Some(params.bind("limit", ParamValue::Int(10)));

        let sql = stmt.render();
        assert_eq!(
            sql,
            "SELECT\n    o.environment AS \"environment\",\n    COUNT(*) AS \"count_count\"\n\
             FROM observations o\n\
             LEFT JOIN traces t ON o.trace_id = t.id AND o.project_id = t.project_id\n\
             WHERE o.project_id = $1\n    AND o.environment NOT IN ($2, $3)\n\
             GROUP BY o.environment\n\
             ORDER BY \"environment\" ASC\n\
             LIMIT $4"
        );
        assert_eq!(stmt.output_columns(), vec!["environment", "count_count"]);
    }

    #[test]
    fn test_render_bucket_and_quantile() {
        let bucket = Expr::Bucket {
            unit: "day",
            inner: Box::new(Expr::Column("t.timestamp")),
        };
        assert_eq!(
            render_expr(&bucket),
            "epoch_ms(CAST(date_trunc('day', epoch_ms(t.timestamp)) AS TIMESTAMP))"
        );
        let p95 = Expr::Aggregate {
            func: AggFunc::Quantile("0.95"),
            arg: Some(Box::new(Expr::Column("t.latency_ms"))),
        };
        assert_eq!(render_expr(&p95), "quantile_cont(t.latency_ms, 0.95)");
    }

    #[test]
    fn test_render_nested_predicates() {
        let pred = Predicate::Or(vec![
            Predicate::Test(Expr::Call {
                func: "list_contains",
                args: vec![Expr::Column("t.tags"), Expr::Param(1)],
            }),
            Predicate::Test(Expr::Call {
                func: "list_contains",
                args: vec![Expr::Column("t.tags"), Expr::Param(2)],
            }),
        ])
        .negate();
        assert_eq!(
            render_predicate(&pred),
            "NOT ((list_contains(t.tags, $1) OR list_contains(t.tags, $2)))"
        );
    }

    #[test]
    fn test_alias_quotes_are_escaped() {
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }
}
