use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub pricing: PricingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// DuckDB database file; in-memory when unset.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// SQLite file attached read-only and used as the default catalog.
    #[serde(default)]
    pub attach_sqlite: Option<PathBuf>,
    #[serde(default = "default_sqlite_alias")]
    pub sqlite_alias: String,
    #[serde(default = "default_query_timeout")]
    pub query_timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            attach_sqlite: None,
            sqlite_alias: default_sqlite_alias(),
            query_timeout_secs: default_query_timeout(),
        }
    }
}

fn default_sqlite_alias() -> String {
    "source".to_string()
}
fn default_query_timeout() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct QueryConfig {
    #[serde(default = "default_max_result_rows")]
    pub max_result_rows: u32,
    #[serde(default = "default_max_time_buckets")]
    pub max_time_buckets: u32,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_result_rows: default_max_result_rows(),
            max_time_buckets: default_max_time_buckets(),
        }
    }
}

fn default_max_result_rows() -> u32 {
    crate::query::builder::DEFAULT_MAX_RESULT_ROWS
}

fn default_max_time_buckets() -> u32 {
    crate::query::builder::DEFAULT_MAX_TIME_BUCKETS
}

#[derive(Debug, Deserialize, Clone)]
pub struct PricingConfig {
    #[serde(default = "default_pricing_enabled")]
    pub enabled: bool,
    /// LiteLLM-format price file fetched on startup when set.
    #[serde(default)]
    pub remote_url: Option<String>,
    #[serde(default)]
    pub custom_models: Vec<CustomModelConfig>,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            remote_url: None,
            custom_models: Vec::new(),
        }
    }
}

fn default_pricing_enabled() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct CustomModelConfig {
    pub model_name: String,
    pub match_pattern: String,
    pub input_cost_per_token: f64,
    pub output_cost_per_token: f64,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.store.query_timeout_secs == 0 {
            return Err("store.query_timeout_secs must be greater than zero".to_string());
        }
        if self.query.max_result_rows == 0 {
            return Err("query.max_result_rows must be greater than zero".to_string());
        }
        if self.query.max_time_buckets == 0 {
            return Err("query.max_time_buckets must be greater than zero".to_string());
        }
        for model in &self.pricing.custom_models {
            if model.input_cost_per_token < 0.0 || model.output_cost_per_token < 0.0 {
                return Err(format!(
                    "pricing.custom_models: negative price for {}",
                    model.model_name
                ));
            }
        }
        Ok(())
    }

    pub fn load(config_path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = Config::builder();

        let path = config_path.unwrap_or("config.toml");
        builder = builder.add_source(File::with_name(path).required(false));

        // Overlay with environment variables (TRACELENS__QUERY__MAX_RESULT_ROWS=500, etc.)
        builder = builder.add_source(
            Environment::with_prefix("TRACELENS")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}
