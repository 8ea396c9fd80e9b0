/// Fact tables the views read from. Instants are epoch milliseconds (BIGINT),
/// metadata is a JSON document stored as text.
pub const FACT_TABLES_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS traces (
    id                VARCHAR NOT NULL,
    project_id        VARCHAR NOT NULL,
    timestamp         BIGINT NOT NULL,
    name              VARCHAR,
    user_id           VARCHAR,
    session_id        VARCHAR,
    release           VARCHAR,
    version           VARCHAR,
    environment       VARCHAR NOT NULL DEFAULT 'default',
    bookmarked        BOOLEAN NOT NULL DEFAULT false,
    tags              VARCHAR[],
    metadata          VARCHAR,
    latency_ms        BIGINT,
    observation_count BIGINT NOT NULL DEFAULT 0,
    total_tokens      BIGINT NOT NULL DEFAULT 0,
    total_cost        DOUBLE
);

CREATE TABLE IF NOT EXISTS observations (
    id                    VARCHAR NOT NULL,
    project_id            VARCHAR NOT NULL,
    trace_id              VARCHAR,
    parent_observation_id VARCHAR,
    type                  VARCHAR NOT NULL,
    name                  VARCHAR,
    environment           VARCHAR NOT NULL DEFAULT 'default',
    level                 VARCHAR NOT NULL DEFAULT 'DEFAULT',
    version               VARCHAR,
    provided_model_name   VARCHAR,
    prompt_name           VARCHAR,
    prompt_version        INTEGER,
    start_time            BIGINT NOT NULL,
    end_time              BIGINT,
    completion_start_time BIGINT,
    metadata              VARCHAR,
    input_tokens          BIGINT NOT NULL DEFAULT 0,
    output_tokens         BIGINT NOT NULL DEFAULT 0,
    total_tokens          BIGINT NOT NULL DEFAULT 0,
    input_cost            DOUBLE,
    output_cost           DOUBLE,
    total_cost            DOUBLE
);

CREATE TABLE IF NOT EXISTS scores (
    id             VARCHAR NOT NULL,
    project_id     VARCHAR NOT NULL,
    timestamp      BIGINT NOT NULL,
    name           VARCHAR NOT NULL,
    source         VARCHAR NOT NULL DEFAULT 'API',
    data_type      VARCHAR NOT NULL,
    value          DOUBLE,
    string_value   VARCHAR,
    environment    VARCHAR NOT NULL DEFAULT 'default',
    trace_id       VARCHAR,
    observation_id VARCHAR,
    config_id      VARCHAR
);
"#;
