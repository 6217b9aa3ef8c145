//! # Logan Harness CLI (`logan`)
//!
//! ## Usage
//!
//! ```bash
//! logan --config ./config/logan.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `logan validate "<query>"` | Show how a query would be normalized |
//! | `logan search "<query>"` | Normalize and run a query (fallback on rejection) |
//! | `logan catalog list` | List security query families |
//! | `logan catalog show <type>` | Render a security query family |
//! | `logan catalog build --term <t>` | Build a full-text query |
//! | `logan catalog dashboard` | Dashboard summary queries |
//! | `logan serve` | Start the HTTP/MCP tool server |
//!
//! ## Examples
//!
//! ```bash
//! logan validate "* | stats count(*)" --minutes 60
//! logan search "'Log Source' = 'OCI Audit Logs' | stats count by 'Event Type'" --minutes 1440
//! logan search "* | head 5" --console
//! logan catalog show failed_logins --minutes 120
//! ```
//!
//! Set `RUST_LOG` to control log output (stderr); `LOGAN_DEBUG=true` turns
//! on debug logging for the harness.

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use logan_harness::backend::{HttpBackend, QueryBackend};
use logan_harness::catalog;
use logan_harness::config::{self, Config};
use logan_harness::execute::{execute_console, execute_query, ExecutionSettings};
use logan_harness::models::RawQuery;
use logan_harness::normalize::{normalize, NormalizeOptions};
use logan_harness::server;

/// Logan Harness: log query normalization and safe execution for
/// log-analytics backends.
#[derive(Parser)]
#[command(
    name = "logan",
    about = "Logan Harness: normalize and safely execute log-analytics queries",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// `validate` and `catalog` fall back to built-in defaults when the file
    /// cannot be loaded.
    #[arg(long, global = true, default_value = "./config/logan.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize a query without executing it.
    Validate {
        query: String,

        /// Inject a relative time filter covering this many minutes.
        #[arg(long)]
        minutes: Option<u32>,
    },

    /// Normalize and execute a query.
    ///
    /// A backend rejection triggers exactly one fallback attempt with a
    /// simplified query.
    Search {
        query: String,

        /// Look-back window in minutes (default from config).
        #[arg(long)]
        minutes: Option<u32>,

        /// Maximum rows to return.
        #[arg(long)]
        limit: Option<u32>,

        /// Send the query the way the web console does: explicit time
        /// range, null comparisons canonicalized, nothing else, no fallback.
        #[arg(long)]
        console: bool,

        /// With `--console`: record that no processing was requested.
        #[arg(long, requires = "console")]
        bypass: bool,
    },

    /// Security query catalog and query builders.
    Catalog {
        #[command(subcommand)]
        action: CatalogAction,
    },

    /// Start the HTTP tool server with the MCP endpoint at `/mcp`.
    Serve,
}

#[derive(Subcommand)]
enum CatalogAction {
    /// List query families.
    List,
    /// Render one family with a time filter prefix.
    Show {
        query_type: String,
        #[arg(long)]
        minutes: Option<u32>,
    },
    /// Build a full-text query from search terms.
    Build {
        #[arg(long = "term", required = true)]
        terms: Vec<String>,
        #[arg(long = "source")]
        sources: Vec<String>,
        #[arg(long)]
        severity: Option<String>,
        #[arg(long)]
        minutes: Option<u32>,
    },
    /// Dashboard summary queries.
    Dashboard {
        #[arg(long)]
        minutes: Option<u32>,
    },
}

fn init_tracing() {
    let debug = std::env::var("LOGAN_DEBUG")
        .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
        .unwrap_or(false);
    let default_filter = if debug {
        "logan_harness=debug,tower_http=debug"
    } else {
        "logan_harness=info"
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Config for commands that never reach the backend.
fn offline_config(path: &std::path::Path) -> Config {
    config::load_config(path).unwrap_or_else(|e| {
        tracing::debug!(error = %e, "using default configuration");
        Config::minimal()
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { query, minutes } => {
            let cfg = offline_config(&cli.config);
            let minutes = minutes.map(|m| cfg.query.check_minutes(m)).transpose()?;
            let result = normalize(
                &query,
                &NormalizeOptions {
                    time_period_minutes: minutes,
                    available_sources: &cfg.query.available_sources,
                },
            );
            print_json(&result)?;
        }
        Commands::Search {
            query,
            minutes,
            limit,
            console,
            bypass,
        } => {
            let cfg = config::load_config(&cli.config)?;
            let backend = HttpBackend::new(&cfg.backend)?;
            let minutes =
                cfg.query
                    .check_minutes(minutes.unwrap_or(cfg.query.default_time_period_minutes))?;
            let default_rows = if console {
                cfg.query.console_max_rows
            } else {
                cfg.query.default_max_rows
            };
            let rows = limit.map_or(default_rows, |l| cfg.query.clamp_rows(l));

            let settings = ExecutionSettings::from_config(&cfg);
            let raw = RawQuery::new(query, minutes, rows);
            let outcome = if console {
                execute_console(&backend, &settings, &raw, bypass).await
            } else {
                execute_query(&backend, &settings, &raw).await
            };
            print_json(&outcome)?;
            if !outcome.success {
                std::process::exit(1);
            }
        }
        Commands::Catalog { action } => {
            let cfg = offline_config(&cli.config);
            let minutes_or_default = |m: Option<u32>| {
                cfg.query
                    .check_minutes(m.unwrap_or(cfg.query.default_time_period_minutes))
            };
            match action {
                CatalogAction::List => print_json(&catalog::list_families())?,
                CatalogAction::Show {
                    query_type,
                    minutes,
                } => {
                    let rendered = catalog::security_query(&query_type, minutes_or_default(minutes)?)?;
                    print_json(&rendered)?;
                }
                CatalogAction::Build {
                    terms,
                    sources,
                    severity,
                    minutes,
                } => {
                    let built = catalog::build_custom_query(
                        &terms,
                        &sources,
                        severity.as_deref(),
                        minutes_or_default(minutes)?,
                    )?;
                    print_json(&built)?;
                }
                CatalogAction::Dashboard { minutes } => {
                    print_json(&catalog::dashboard_queries(minutes_or_default(minutes)?))?;
                }
            }
        }
        Commands::Serve => {
            let cfg = config::load_config(&cli.config)?;
            let backend: Option<Arc<dyn QueryBackend>> = match HttpBackend::new(&cfg.backend) {
                Ok(b) => Some(Arc::new(b)),
                Err(e) => {
                    tracing::warn!(error = %e, "query backend disabled");
                    None
                }
            };
            server::run_server(&cfg, backend).await?;
        }
    }

    Ok(())
}
