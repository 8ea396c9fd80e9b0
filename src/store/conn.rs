use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::query::sql::ParamValue;
use crate::query::CompiledQuery;
use crate::store::{AnalyticsStore, CellValue, ResultRow};
use duckdb::types::{TimeUnit, Value};
use duckdb::Connection;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Single DuckDB connection shared behind a mutex. Statements run on the
/// blocking pool under a timeout.
pub struct DuckDbStore {
    conn: Arc<Mutex<Connection>>,
    timeout: Duration,
}

impl DuckDbStore {
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StoreError::Connection(format!("failed to open DuckDB in-memory: {e}")))?;
        Ok(Self::wrap(conn))
    }

    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|e| {
            StoreError::Connection(format!("failed to open DuckDB at {}: {e}", path.display()))
        })?;
        Ok(Self::wrap(conn))
    }

    /// Open the store described by `config`. When a SQLite file is configured
    /// it is attached read-only and made the default catalog.
    pub fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        let conn = match &config.path {
            Some(path) => Connection::open(path).map_err(|e| {
                StoreError::Connection(format!("failed to open DuckDB at {}: {e}", path.display()))
            })?,
            None => Connection::open_in_memory().map_err(|e| {
                StoreError::Connection(format!("failed to open DuckDB in-memory: {e}"))
            })?,
        };

        if let Some(sqlite) = &config.attach_sqlite {
            attach_sqlite(&conn, sqlite, &config.sqlite_alias)?;
            tracing::info!(
                path = %sqlite.display(),
                alias = %config.sqlite_alias,
                "attached SQLite database read-only"
            );
        }

        Ok(Self::wrap(conn).with_timeout(Duration::from_secs(config.query_timeout_secs)))
    }

    fn wrap(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run `f` against the connection via `spawn_blocking`.
    pub async fn query<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, duckdb::Error> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::time::timeout(
            self.timeout,
            tokio::task::spawn_blocking(move || {
                let guard = conn.blocking_lock();
                f(&guard).map_err(|e| StoreError::Query(e.to_string()))
            }),
        )
        .await
        .map_err(|_| StoreError::Timeout(self.timeout.as_secs()))?
        .map_err(|e| StoreError::Join(e.to_string()))?
    }

    pub async fn execute_batch(&self, sql: impl Into<String>) -> Result<(), StoreError> {
        let sql = sql.into();
        self.query(move |conn| conn.execute_batch(&sql)).await
    }

    /// Create the fact tables if they do not exist.
    pub async fn init_schema(&self) -> Result<(), StoreError> {
        self.execute_batch(super::schema::FACT_TABLES_DDL).await
    }
}

fn attach_sqlite(conn: &Connection, path: &Path, alias: &str) -> Result<(), StoreError> {
    let path_str = path
        .to_str()
        .ok_or_else(|| StoreError::Connection("invalid database path".to_string()))?;
    if alias.is_empty() || !alias.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(StoreError::Connection(format!("invalid attach alias: {alias}")));
    }

    // The home directory may not exist in containers, so INSTALL needs a writable location.
    let ext_dir = std::env::var("DUCKDB_EXTENSION_DIR").unwrap_or_else(|_| {
        std::env::temp_dir()
            .join("duckdb_ext")
            .to_string_lossy()
            .into_owned()
    });
    conn.execute_batch(&format!(
        "SET extension_directory = '{}'",
        ext_dir.replace('\'', "''")
    ))
    .map_err(|e| StoreError::Connection(format!("failed to set extension_directory: {e}")))?;

    conn.execute_batch("INSTALL sqlite_scanner; LOAD sqlite_scanner;")
        .map_err(|e| StoreError::Connection(format!("failed to load sqlite_scanner: {e}")))?;

    conn.execute_batch(&format!(
        "ATTACH '{}' AS {alias} (TYPE SQLITE, READ_ONLY); USE {alias};",
        path_str.replace('\'', "''")
    ))
    .map_err(|e| StoreError::Connection(format!("failed to attach SQLite database: {e}")))
}

impl AnalyticsStore for DuckDbStore {
    async fn fetch(&self, query: &CompiledQuery) -> Result<Vec<ResultRow>, StoreError> {
        let sql = query.sql.clone();
        let params = query.params.values();
        let columns = query.columns.clone();

        self.query(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let bind_values: Vec<Box<dyn duckdb::types::ToSql>> =
                params.into_iter().map(to_sql).collect();
            let params_ref: Vec<&dyn duckdb::types::ToSql> =
                bind_values.iter().map(|b| b.as_ref()).collect();

            let mut rows = stmt.query(params_ref.as_slice())?;
            let mut out = Vec::new();
            while let Some(row) = rows.next()? {
                let mut record = ResultRow::new();
                for (i, column) in columns.iter().enumerate() {
                    let value: Value = row.get(i)?;
                    record.insert(column.clone(), CellValue::from(value));
                }
                out.push(record);
            }
            Ok(out)
        })
        .await
    }
}

fn to_sql(value: ParamValue) -> Box<dyn duckdb::types::ToSql> {
    match value {
        ParamValue::Int(v) => Box::new(v),
        ParamValue::Float(v) => Box::new(v),
        ParamValue::Text(v) => Box::new(v),
        ParamValue::Bool(v) => Box::new(v),
    }
}

impl From<Value> for CellValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => CellValue::Null,
            Value::Boolean(b) => CellValue::Bool(b),
            Value::TinyInt(v) => CellValue::Int(v.into()),
            Value::SmallInt(v) => CellValue::Int(v.into()),
            Value::Int(v) => CellValue::Int(v.into()),
            Value::BigInt(v) => CellValue::Int(v),
            // SUM over BIGINT widens to HUGEINT.
            Value::HugeInt(v) => i64::try_from(v)
                .map(CellValue::Int)
                .unwrap_or(CellValue::Float(v as f64)),
            Value::UTinyInt(v) => CellValue::Int(v.into()),
            Value::USmallInt(v) => CellValue::Int(v.into()),
            Value::UInt(v) => CellValue::Int(v.into()),
            Value::UBigInt(v) => i64::try_from(v)
                .map(CellValue::Int)
                .unwrap_or(CellValue::Float(v as f64)),
            Value::Float(v) => CellValue::Float(v.into()),
            Value::Double(v) => CellValue::Float(v),
            Value::Decimal(d) => d
                .to_string()
                .parse::<f64>()
                .map(CellValue::Float)
                .unwrap_or(CellValue::Null),
            Value::Timestamp(unit, v) => CellValue::Int(match unit {
                TimeUnit::Second => v * 1_000,
                TimeUnit::Millisecond => v,
                TimeUnit::Microsecond => v / 1_000,
                TimeUnit::Nanosecond => v / 1_000_000,
            }),
            Value::Text(s) | Value::Enum(s) => CellValue::Text(s),
            other => {
                tracing::debug!(value = ?other, "unsupported store value type, reading as null");
                CellValue::Null
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_conversion() {
        assert_eq!(CellValue::from(Value::HugeInt(42)), CellValue::Int(42));
        assert_eq!(CellValue::from(Value::Double(0.5)), CellValue::Float(0.5));
        assert_eq!(
            CellValue::from(Value::Text("prod".into())),
            CellValue::Text("prod".into())
        );
        assert_eq!(
            CellValue::from(Value::Timestamp(TimeUnit::Microsecond, 1_500_000)),
            CellValue::Int(1_500)
        );
        assert_eq!(CellValue::from(Value::Blob(vec![1, 2])), CellValue::Null);
    }

    #[tokio::test]
    async fn test_fetch_binds_parameters() {
        let store = DuckDbStore::in_memory().unwrap();
        store.init_schema().await.unwrap();
        store
            .execute_batch(
                "INSERT INTO traces (id, project_id, timestamp, environment, tags) VALUES
                 ('a', 'p1', 1000, 'production', ['x']),
                 ('b', 'p1', 2000, 'staging', []),
                 ('c', 'p2', 1500, 'production', [])",
            )
            .await
            .unwrap();

        let desc = crate::query::QueryDescription {
            dimensions: vec![crate::query::Dimension::new("environment")],
            metrics: vec![crate::query::Metric::new(
                "count",
                crate::query::Aggregation::Count,
            )],
            ..crate::query::QueryDescription::new(
                crate::registry::ViewName::Traces,
                chrono::DateTime::from_timestamp_millis(0).unwrap(),
                chrono::DateTime::from_timestamp_millis(10_000).unwrap(),
            )
        };
        let compiled = crate::query::QueryBuilder::default()
            .build(&desc, "p1")
            .unwrap();
        let rows = store.fetch(&compiled).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["environment"], CellValue::Text("production".into()));
        assert_eq!(rows[0]["count_count"], CellValue::Int(1));
        assert_eq!(rows[1]["environment"], CellValue::Text("staging".into()));
    }

    #[tokio::test]
    async fn test_bad_sql_is_a_query_error() {
        let store = DuckDbStore::in_memory().unwrap();
        let err = store.execute_batch("SELECT * FROM missing_table").await.unwrap_err();
        assert!(matches!(err, StoreError::Query(_)));
    }
}
