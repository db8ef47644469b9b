//! # Corpus Sync CLI (`corpus`)
//!
//! The `corpus` binary drives the ingestion catalog and the search-index
//! reconciliation engine.
//!
//! ## Usage
//!
//! ```bash
//! corpus --config ./corpus.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `corpus init` | Create the SQLite database and run schema migrations |
//! | `corpus sources` | List configured collectors and their health |
//! | `corpus ingest` | Run every configured collector and persist its resources |
//! | `corpus sync` | Run one reconciliation pass (catalog → index) |
//! | `corpus sync --watch` | Run passes on the configured interval until interrupted |
//! | `corpus search <query>` | Search catalog records by text and metadata filters |
//! | `corpus retire <hash>` | Retire a resource by content hash |
//! | `corpus status` | Show catalog/index convergence counts |

use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use corpus_sync::collector::Collector;
use corpus_sync::collector_fs::FilesystemCollector;
use corpus_sync::config;
use corpus_sync::context::IngestContext;
use corpus_sync::persist::PersistOutcome;
use corpus_sync::status::collect_status;

/// Corpus Sync CLI — an ingestion catalog and search-index
/// synchronization engine.
#[derive(Parser)]
#[command(
    name = "corpus",
    about = "Corpus Sync — an ingestion catalog and search-index synchronization engine",
    version,
    long_about = "Corpus Sync ingests content from pluggable collectors into a content-addressed \
    store plus a durable SQLite catalog, then keeps a search index converged on that catalog \
    through idempotent reconciliation passes."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./corpus.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file, the `resources` catalog table,
    /// and the `chunks` index table. Idempotent.
    Init,

    /// List configured collectors and their health.
    Sources,

    /// Run every configured collector and persist its resources.
    ///
    /// Validation failures skip the resource; identical content is a
    /// metadata refresh, not a new record. The search index is not
    /// touched — run `corpus sync` afterwards.
    Ingest {
        /// Show what would be persisted without writing anything.
        #[arg(long)]
        dry_run: bool,

        /// Maximum number of resources to persist.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Reconcile the search index against the catalog.
    Sync {
        /// Wipe the index first and rebuild it from the catalog.
        #[arg(long)]
        full_reset: bool,

        /// Keep running passes on the configured interval until
        /// interrupted.
        #[arg(long)]
        watch: bool,
    },

    /// Search catalog records by free text and metadata filters.
    ///
    /// Each `--filter key=value` narrows the match (filters are AND-ed);
    /// the query string matches across names, sources, and paths.
    Search {
        /// Free-text query. May be empty when filters are given.
        #[arg(default_value = "")]
        query: String,

        /// Metadata filter as `key=value`; repeatable.
        #[arg(long = "filter", value_parser = parse_key_val)]
        filters: Vec<(String, String)>,

        /// Maximum number of results to return.
        #[arg(long, default_value_t = 10)]
        limit: i64,
    },

    /// Retire a resource: remove its catalog record and stored content.
    ///
    /// The index catches up on the next reconciliation pass.
    Retire {
        /// Content hash of the resource to retire.
        hash: Option<String>,

        /// Retire every resource whose metadata matches `key=value`
        /// instead of a single hash.
        #[arg(long = "meta", value_parser = parse_key_val)]
        meta: Option<(String, String)>,
    },

    /// Show catalog/index convergence counts.
    Status,
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid key=value pair: '{}'", s))?;
    Ok((key.to_string(), value.to_string()))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let ctx = IngestContext::open(cfg).await?;
            ctx.close().await;
            println!("Database initialized successfully.");
        }
        Commands::Sources => {
            list_sources(&cfg);
        }
        Commands::Ingest { dry_run, limit } => {
            run_ingest(cfg, dry_run, limit).await?;
        }
        Commands::Sync { full_reset, watch } => {
            run_sync(cfg, full_reset, watch).await?;
        }
        Commands::Search {
            query,
            filters,
            limit,
        } => {
            run_search(cfg, &query, filters, limit).await?;
        }
        Commands::Retire { hash, meta } => {
            run_retire(cfg, hash, meta).await?;
        }
        Commands::Status => {
            let ctx = IngestContext::open(cfg).await?;
            let report = collect_status(&ctx).await?;
            println!("{:<16} {}", "RESOURCES", report.resources);
            println!("{:<16} {}", "INDEXED", report.indexed);
            println!("{:<16} {}", "PENDING ADD", report.pending_add);
            println!("{:<16} {}", "STALE", report.stale);
            for (source, count) in &report.by_source {
                println!("  {:<14} {}", source, count);
            }
            println!(
                "{}",
                if report.is_converged() {
                    "Index is converged."
                } else {
                    "Index is NOT converged; run `corpus sync`."
                }
            );
            ctx.close().await;
        }
    }

    Ok(())
}

fn list_sources(cfg: &config::Config) {
    let fs_status = match &cfg.collectors.filesystem {
        Some(fs_config) => {
            if fs_config.root.exists() {
                ("OK", true)
            } else {
                ("NOT CONFIGURED (root does not exist)", false)
            }
        }
        None => ("NOT CONFIGURED", false),
    };

    println!("{:<16} {:<40} HEALTHY", "COLLECTOR", "STATUS");
    println!("{:<16} {:<40} {}", "filesystem", fs_status.0, fs_status.1);
}

/// Build every collector the config enables.
fn build_collectors(cfg: &config::Config) -> Result<Vec<Box<dyn Collector>>> {
    let mut collectors: Vec<Box<dyn Collector>> = Vec::new();
    if let Some(fs_config) = &cfg.collectors.filesystem {
        collectors.push(Box::new(FilesystemCollector::new(fs_config.clone())?));
    }
    Ok(collectors)
}

async fn run_ingest(cfg: config::Config, dry_run: bool, limit: Option<usize>) -> Result<()> {
    let collectors = build_collectors(&cfg)?;
    if collectors.is_empty() {
        anyhow::bail!("No collectors configured. Add a [collectors.filesystem] section.");
    }

    let ctx = IngestContext::open(cfg).await?;
    let mut stored = 0usize;
    let mut refreshed = 0usize;
    let mut skipped = 0usize;
    let mut remaining = limit;

    for collector in &collectors {
        let mut resources = collector.collect().await?;
        if let Some(n) = remaining {
            resources.truncate(n);
            remaining = Some(n - resources.len());
        }

        if dry_run {
            println!(
                "[dry run] {}: {} resource(s) would be persisted",
                collector.name(),
                resources.len()
            );
            continue;
        }

        for outcome in ctx.persistence.persist_all(&resources).await? {
            match outcome {
                PersistOutcome::Stored(_) => stored += 1,
                PersistOutcome::Refreshed(_) => refreshed += 1,
                PersistOutcome::Skipped(_) => skipped += 1,
            }
        }
    }

    if !dry_run {
        println!(
            "Ingest complete: {} stored, {} refreshed, {} skipped.",
            stored, refreshed, skipped
        );
    }
    ctx.close().await;
    Ok(())
}

async fn run_sync(cfg: config::Config, full_reset: bool, watch: bool) -> Result<()> {
    let full_reset = full_reset || cfg.sync.full_reset;
    let interval = Duration::from_secs(cfg.sync.interval_secs);
    let ctx = IngestContext::open(cfg).await?;
    let cancel = CancellationToken::new();

    // Ctrl-C flips the token; the engine stops between resources.
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_cancel.cancel();
        }
    });

    let report = if full_reset {
        ctx.sync.full_reset(&cancel).await?
    } else {
        ctx.sync.run_pass(&cancel).await?
    };

    match report {
        Some(report) => {
            println!(
                "Sync pass: {} added, {} deleted, {} unchanged, {} failed.",
                report.added,
                report.deleted,
                report.unchanged,
                report.failed.len()
            );
        }
        None => println!("Another sync pass is already running."),
    }

    if watch {
        println!(
            "Watching: reconciling every {}s (Ctrl-C to stop).",
            interval.as_secs()
        );
        ctx.sync.run_scheduled(interval, cancel).await;
        ctx.close().await;
        return Ok(());
    }

    ctx.close().await;
    Ok(())
}

async fn run_search(
    cfg: config::Config,
    query: &str,
    filters: Vec<(String, String)>,
    limit: i64,
) -> Result<()> {
    let ctx = IngestContext::open(cfg).await?;

    let mut group = std::collections::BTreeMap::new();
    for (key, value) in filters {
        group.insert(key, value);
    }
    let groups = if group.is_empty() { vec![] } else { vec![group] };

    let hits = ctx.catalog.search(query, &groups, Some(limit)).await?;
    if hits.is_empty() {
        println!("No matches.");
    }
    for record in &hits {
        println!(
            "{}  {:<24} {:<12} {}",
            &record.resource_hash[..record.resource_hash.len().min(12)],
            record.file_name,
            record.source_type,
            record.modified_at.as_deref().unwrap_or("-")
        );
    }

    ctx.close().await;
    Ok(())
}

async fn run_retire(
    cfg: config::Config,
    hash: Option<String>,
    meta: Option<(String, String)>,
) -> Result<()> {
    let ctx = IngestContext::open(cfg).await?;

    match (hash, meta) {
        (Some(hash), None) => {
            if ctx.persistence.retire(&hash).await? {
                println!("Retired {}.", hash);
            } else {
                println!("No resource with hash {}.", hash);
            }
        }
        (None, Some((key, value))) => {
            let retired = ctx.persistence.retire_by_metadata(&key, &value).await?;
            println!("Retired {} resource(s) matching {}={}.", retired.len(), key, value);
        }
        _ => anyhow::bail!("Provide either a content hash or --meta key=value (not both)."),
    }

    ctx.close().await;
    Ok(())
}
