use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracelens::config::AppConfig;
use tracelens::pricing::PricingTable;
use tracelens::query::{BuilderOptions, QueryBuilder, QueryDescription};
use tracelens::registry::ViewName;
use tracelens::store::DuckDbStore;
use tracelens::QueryExecutor;

#[derive(Parser)]
#[command(name = "tracelens", about = "Analytics queries over LLM trace data")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the view registry as JSON
    Views,
    /// Create the fact tables in the configured store
    InitSchema,
    /// Run a query description read from a JSON file
    Query {
        #[arg(short, long)]
        file: PathBuf,
        #[arg(short, long)]
        project: String,
        #[arg(long, value_enum, default_value_t = Shape::Rows)]
        shape: Shape,
        /// Maximum number of pivot data rows
        #[arg(long)]
        row_limit: Option<usize>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Shape {
    Rows,
    Pivot,
    Series,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tracelens=info".into()),
        )
        .json()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load(Some(&cli.config))?;

    if let Err(msg) = config.validate() {
        eprintln!("Configuration error: {msg}");
        return Err(msg.into());
    }

    match cli.command {
        Command::Views => {
            let views: Vec<_> = ViewName::ALL.iter().map(|v| v.declaration()).collect();
            println!("{}", serde_json::to_string_pretty(&views)?);
        }
        Command::InitSchema => {
            let store = DuckDbStore::connect(&config.store)?;
            store.init_schema().await?;
            tracing::info!("fact tables created");
        }
        Command::Query {
            file,
            project,
            shape,
            row_limit,
        } => {
            let desc: QueryDescription = serde_json::from_slice(&std::fs::read(&file)?)?;
            let store = DuckDbStore::connect(&config.store)?;
            let builder = QueryBuilder::new(BuilderOptions {
                max_result_rows: config.query.max_result_rows,
                max_time_buckets: config.query.max_time_buckets,
            });
            let mut executor = QueryExecutor::new(store, builder);

            if config.pricing.enabled {
                let pricing = PricingTable::from_config(&config.pricing)?;
                if let Some(url) = &config.pricing.remote_url {
                    let client = reqwest::Client::new();
                    if let Err(e) = pricing.refresh_from_url(&client, url).await {
                        tracing::warn!(error = %e, "pricing refresh failed, using bundled prices");
                    }
                }
                executor = executor.with_pricing(Arc::new(pricing));
            }

            let output = match shape {
                Shape::Rows => serde_json::to_string_pretty(&executor.execute(&project, &desc).await?)?,
                Shape::Pivot => serde_json::to_string_pretty(
                    &executor.execute_pivot(&project, &desc, row_limit).await?,
                )?,
                Shape::Series => {
                    serde_json::to_string_pretty(&executor.execute_series(&project, &desc).await?)?
                }
            };
            println!("{output}");
        }
    }

    Ok(())
}
