//! Static column tables for every view.
//!
//! Every SQL fragment here is a compile-time constant. User input never
//! reaches SQL text: it can only select one of these entries by name.

use super::types::{DimensionDef, MeasureDef, RelationDef, ValueType, ViewDeclaration};
use crate::query::description::Aggregation::{self, *};

const COUNT_ONLY: &[Aggregation] = &[Count];
const NUMERIC: &[Aggregation] = &[Count, Sum, Avg, Min, Max, P50, P75, P90, P95, P99];

const fn dim(field: &'static str, sql: &'static str, value_type: ValueType) -> DimensionDef {
    DimensionDef {
        field,
        sql,
        value_type,
        groupable: true,
        relation: None,
    }
}

const fn filter_only(field: &'static str, sql: &'static str, value_type: ValueType) -> DimensionDef {
    DimensionDef {
        field,
        sql,
        value_type,
        groupable: false,
        relation: None,
    }
}

const fn trace_dim(field: &'static str, sql: &'static str, value_type: ValueType) -> DimensionDef {
    DimensionDef {
        field,
        sql,
        value_type,
        groupable: !matches!(value_type, ValueType::StringList),
        relation: Some("traces"),
    }
}

const fn measure(field: &'static str, sql: &'static str, value_type: ValueType) -> MeasureDef {
    MeasureDef {
        field,
        sql: Some(sql),
        value_type,
        aggregations: NUMERIC,
        relation: None,
    }
}

const COUNT: MeasureDef = MeasureDef {
    field: "count",
    sql: None,
    value_type: ValueType::Integer,
    aggregations: COUNT_ONLY,
    relation: None,
};

// ── traces ──

pub static TRACES: ViewDeclaration = ViewDeclaration {
    name: "traces",
    base_table: "traces",
    alias: "t",
    time_column: "t.timestamp",
    project_column: "t.project_id",
    base_predicate: None,
    dimensions: &[
        dim("id", "t.id", ValueType::String),
        dim("name", "t.name", ValueType::String),
        dim("userId", "t.user_id", ValueType::String),
        dim("sessionId", "t.session_id", ValueType::String),
        dim("release", "t.release", ValueType::String),
        dim("version", "t.version", ValueType::String),
        dim("environment", "t.environment", ValueType::String),
        dim("bookmarked", "t.bookmarked", ValueType::Boolean),
        filter_only("tags", "t.tags", ValueType::StringList),
        filter_only("metadata", "t.metadata", ValueType::StringObject),
        filter_only("timestamp", "t.timestamp", ValueType::Datetime),
    ],
    measures: &[
        COUNT,
        measure("latency", "t.latency_ms", ValueType::Integer),
        measure("observationsCount", "t.observation_count", ValueType::Integer),
        measure("totalTokens", "t.total_tokens", ValueType::Integer),
        measure("totalCost", "t.total_cost", ValueType::Decimal),
    ],
    relations: &[],
};

// ── observations ──

const OBSERVATION_TRACES: RelationDef = RelationDef {
    name: "traces",
    join_sql: "LEFT JOIN traces t ON o.trace_id = t.id AND o.project_id = t.project_id",
};

pub static OBSERVATIONS: ViewDeclaration = ViewDeclaration {
    name: "observations",
    base_table: "observations",
    alias: "o",
    time_column: "o.start_time",
    project_column: "o.project_id",
    base_predicate: None,
    dimensions: &[
        dim("id", "o.id", ValueType::String),
        dim("traceId", "o.trace_id", ValueType::String),
        dim("parentObservationId", "o.parent_observation_id", ValueType::String),
        dim("type", "o.type", ValueType::String),
        dim("name", "o.name", ValueType::String),
        dim("environment", "o.environment", ValueType::String),
        dim("level", "o.level", ValueType::String),
        dim("version", "o.version", ValueType::String),
        dim("providedModelName", "o.provided_model_name", ValueType::String),
        dim("promptName", "o.prompt_name", ValueType::String),
        dim("promptVersion", "o.prompt_version", ValueType::Integer),
        trace_dim("traceName", "t.name", ValueType::String),
        trace_dim("userId", "t.user_id", ValueType::String),
        trace_dim("sessionId", "t.session_id", ValueType::String),
        trace_dim("traceRelease", "t.release", ValueType::String),
        trace_dim("traceVersion", "t.version", ValueType::String),
        trace_dim("tags", "t.tags", ValueType::StringList),
        filter_only("metadata", "o.metadata", ValueType::StringObject),
        filter_only("startTime", "o.start_time", ValueType::Datetime),
    ],
    measures: &[
        COUNT,
        measure("latency", "(o.end_time - o.start_time)", ValueType::Integer),
        measure(
            "timeToFirstToken",
            "(o.completion_start_time - o.start_time)",
            ValueType::Integer,
        ),
        measure("inputTokens", "o.input_tokens", ValueType::Integer),
        measure("outputTokens", "o.output_tokens", ValueType::Integer),
        measure("totalTokens", "o.total_tokens", ValueType::Integer),
        measure("inputCost", "o.input_cost", ValueType::Decimal),
        measure("outputCost", "o.output_cost", ValueType::Decimal),
        measure("totalCost", "o.total_cost", ValueType::Decimal),
    ],
    relations: &[OBSERVATION_TRACES],
};

// ── scores ──

const SCORE_TRACES: RelationDef = RelationDef {
    name: "traces",
    join_sql: "LEFT JOIN traces t ON s.trace_id = t.id AND s.project_id = t.project_id",
};

pub static SCORES_NUMERIC: ViewDeclaration = ViewDeclaration {
    name: "scores-numeric",
    base_table: "scores",
    alias: "s",
    time_column: "s.timestamp",
    project_column: "s.project_id",
    base_predicate: Some("s.data_type IN ('NUMERIC', 'BOOLEAN')"),
    dimensions: &[
        dim("id", "s.id", ValueType::String),
        dim("name", "s.name", ValueType::String),
        dim("source", "s.source", ValueType::String),
        dim("dataType", "s.data_type", ValueType::String),
        dim("environment", "s.environment", ValueType::String),
        dim("traceId", "s.trace_id", ValueType::String),
        dim("observationId", "s.observation_id", ValueType::String),
        dim("configId", "s.config_id", ValueType::String),
        trace_dim("traceName", "t.name", ValueType::String),
        trace_dim("userId", "t.user_id", ValueType::String),
        trace_dim("sessionId", "t.session_id", ValueType::String),
        trace_dim("traceRelease", "t.release", ValueType::String),
        trace_dim("tags", "t.tags", ValueType::StringList),
        filter_only("timestamp", "s.timestamp", ValueType::Datetime),
    ],
    measures: &[COUNT, measure("value", "s.value", ValueType::Decimal)],
    relations: &[SCORE_TRACES],
};

pub static SCORES_CATEGORICAL: ViewDeclaration = ViewDeclaration {
    name: "scores-categorical",
    base_table: "scores",
    alias: "s",
    time_column: "s.timestamp",
    project_column: "s.project_id",
    base_predicate: Some("s.data_type = 'CATEGORICAL'"),
    dimensions: &[
        dim("id", "s.id", ValueType::String),
        dim("name", "s.name", ValueType::String),
        dim("source", "s.source", ValueType::String),
        dim("stringValue", "s.string_value", ValueType::String),
        dim("environment", "s.environment", ValueType::String),
        dim("traceId", "s.trace_id", ValueType::String),
        dim("observationId", "s.observation_id", ValueType::String),
        dim("configId", "s.config_id", ValueType::String),
        trace_dim("traceName", "t.name", ValueType::String),
        trace_dim("userId", "t.user_id", ValueType::String),
        trace_dim("sessionId", "t.session_id", ValueType::String),
        trace_dim("traceRelease", "t.release", ValueType::String),
        trace_dim("tags", "t.tags", ValueType::StringList),
        filter_only("timestamp", "s.timestamp", ValueType::Datetime),
    ],
    measures: &[COUNT],
    relations: &[SCORE_TRACES],
};
