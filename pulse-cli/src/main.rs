use anyhow::Result;
use clap::{Parser, Subcommand};
use pulse::Config;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "pulse")]
#[command(about = "Pulse CLI - render and run templated dashboard queries")]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "pulse.toml", global = true)]
    config: PathBuf,

    /// Search engine URL (overrides engine.url)
    #[arg(long, env = "PULSE_ENGINE_URL", global = true)]
    url: Option<String>,

    /// Template directory (overrides templates.root)
    #[arg(long, global = true)]
    templates: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the query a descriptor builds, without sending it
    Render {
        /// JSON file holding one query descriptor
        descriptor: PathBuf,
    },

    /// Execute one query and print the normalized result
    Query {
        /// JSON file holding one query descriptor
        descriptor: PathBuf,

        /// Parse the response as a text table instead of JSON
        #[arg(long)]
        rows: bool,

        /// Follow composite pagination of this aggregation to the last page
        #[arg(long, conflicts_with = "rows")]
        all_pages: Option<String>,

        /// Print the engine response without normalizing it
        #[arg(long, conflicts_with_all = ["rows", "all_pages"])]
        raw: bool,
    },

    /// Execute a batch of queries in one multi-search request
    Batch {
        /// JSON file holding an array of query descriptors
        descriptors: PathBuf,
    },

    /// Fetch a document by identifier
    Get {
        /// Document identifier
        id: String,

        /// Indices to try in order (repeatable)
        #[arg(short, long, required_unless_present = "pattern")]
        index: Vec<String>,

        /// Search an index pattern or alias instead of fetching directly
        #[arg(short, long, conflicts_with = "index")]
        pattern: Option<String>,
    },

    /// Un-pivot nested aggregation buckets from a saved response into rows
    Flatten {
        /// JSON file holding a search response or its aggregations object
        response: PathBuf,

        /// Aggregation names from outermost to innermost (comma-separated)
        #[arg(short, long, value_delimiter = ',', required = true)]
        group_by: Vec<String>,

        /// Metric names read from the innermost bucket (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        metrics: Vec<String>,
    },
}

fn load_config(path: &Path, url: Option<String>, templates: Option<PathBuf>) -> Result<Config> {
    let mut config = if path.exists() {
        Config::load(path)?
    } else {
        Config::default()
    };
    if let Some(url) = url {
        config.engine.url = url;
    }
    if let Some(root) = templates {
        config.templates.root = pulse::config::expand_tilde(&root)?;
    }
    Ok(config)
}

/// Logs go to stderr; stdout carries command output only.
fn init_logging(config: &Config) {
    let filter = EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| config.logging.level.clone()),
    );
    let format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| config.logging.format.clone());

    if format.eq_ignore_ascii_case("json") {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config, cli.url, cli.templates)?;
    init_logging(&config);

    match cli.command {
        Commands::Render { descriptor } => commands::run_render(&config, &descriptor)?,
        Commands::Query {
            descriptor,
            rows,
            all_pages,
            raw,
        } => {
            let mode = if rows {
                commands::QueryMode::Rows
            } else if let Some(aggregation) = all_pages {
                commands::QueryMode::AllPages(aggregation)
            } else if raw {
                commands::QueryMode::Raw
            } else {
                commands::QueryMode::Normalized
            };
            commands::run_query(&config, &descriptor, mode).await?
        }
        Commands::Batch { descriptors } => commands::run_batch(&config, &descriptors).await?,
        Commands::Get { id, index, pattern } => {
            commands::run_get(&config, &id, &index, pattern.as_deref()).await?
        }
        Commands::Flatten {
            response,
            group_by,
            metrics,
        } => commands::run_flatten(&response, &group_by, &metrics)?,
    }

    Ok(())
}
