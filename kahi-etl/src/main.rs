//! kahi-etl - bibliographic entity resolution and merge
//!
//! Stages raw provider records, then resolves them into canonical works,
//! authors, institutions and venues in a SQLite store.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use kahi_common::config::{self as common_config, TomlConfig};
use kahi_etl::config::{CliOverrides, EtlConfig, OaRegistryMode, LOG_LEVEL_ENV};
use kahi_etl::db::{self, Collection};
use kahi_etl::linker::ConflictPolicy;
use kahi_etl::merge::UnmatchedAuthorPolicy;
use kahi_etl::staging::stage_jsonl;
use kahi_etl::types::{ExternalId, Provider, Work, WorkIdentifier};
use kahi_etl::{Orchestrator, Pipeline};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "kahi-etl")]
#[command(about = "Bibliographic entity resolution and merge engine")]
#[command(version)]
struct Args {
    /// Config file (default: ~/.config/kahi/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Root folder holding the database
    #[arg(long, global = true)]
    root_folder: Option<PathBuf>,

    /// SQLite database path
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Tracing filter when RUST_LOG is unset (e.g. "debug")
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load a provider dump (one JSON record per line) into staging
    Stage {
        provider: Provider,
        file: PathBuf,
    },
    /// Resolve works; all staged DOIs when none are given
    Run {
        dois: Vec<String>,

        /// File with one DOI per line
        #[arg(long)]
        dois_file: Option<PathBuf>,

        /// JSONL file of {"title", "venue", "year"} citations
        #[arg(long)]
        citations_file: Option<PathBuf>,

        #[arg(short, long)]
        workers: Option<usize>,

        #[arg(long)]
        conflict_policy: Option<ConflictPolicy>,

        #[arg(long)]
        unmatched_authors: Option<UnmatchedAuthorPolicy>,

        /// Skip registry and currency lookups
        #[arg(long)]
        no_enrichment: bool,

        /// Open-access registry: staged or live
        #[arg(long)]
        oa_registry: Option<OaRegistryMode>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the stored work for a DOI
    Show { doi: String },
    /// Record counts per collection and staged records per provider
    Status,
    /// Write a config file with the current settings
    InitConfig {
        path: Option<PathBuf>,
    },
}

#[derive(Debug, Deserialize)]
struct CitationLine {
    title: String,
    #[serde(default)]
    venue: Option<String>,
    #[serde(default)]
    year: Option<i32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let toml = common_config::load_or_default(args.config.as_deref());
    init_tracing(args.log_level.as_deref(), &toml)?;

    let mut cli = CliOverrides {
        root_folder: args.root_folder.clone(),
        database: args.database.clone(),
        log_level: args.log_level.clone(),
        ..Default::default()
    };
    if let Command::Run {
        workers,
        conflict_policy,
        unmatched_authors,
        no_enrichment,
        oa_registry,
        ..
    } = &args.command
    {
        cli.workers = *workers;
        cli.conflict_policy = *conflict_policy;
        cli.unmatched_author_policy = *unmatched_authors;
        cli.enrichment = no_enrichment.then_some(false);
        cli.oa_registry = *oa_registry;
    }

    let config = EtlConfig::resolve(&cli, &toml).context("Invalid configuration")?;

    match args.command {
        Command::InitConfig { path } => init_config(path, &config, &toml)?,
        Command::Stage { provider, file } => {
            let pool = open_pool(&config).await?;
            let handle = tokio::fs::File::open(&file)
                .await
                .with_context(|| format!("Cannot open {}", file.display()))?;
            let summary = stage_jsonl(&pool, provider, BufReader::new(handle)).await?;
            println!(
                "{}: {} staged, {} already staged, {} malformed",
                provider, summary.staged, summary.duplicates, summary.malformed
            );
        }
        Command::Run {
            dois,
            dois_file,
            citations_file,
            json,
            ..
        } => {
            let pool = open_pool(&config).await?;
            let mut identifiers: Vec<WorkIdentifier> = dois.iter().map(|d| WorkIdentifier::doi(d)).collect();
            if let Some(path) = dois_file {
                identifiers.extend(read_dois(&path).await?);
            }
            if let Some(path) = citations_file {
                identifiers.extend(read_citations(&path).await?);
            }
            if identifiers.is_empty() {
                identifiers = db::list_staged_dois(&pool)
                    .await?
                    .iter()
                    .map(|d| WorkIdentifier::doi(d))
                    .collect();
                info!(count = identifiers.len(), "Processing all staged DOIs");
            }

            let pipeline = Pipeline::from_config(&config, pool.clone()).await?;
            let orchestrator = Orchestrator::new(pipeline, config.workers);

            let cancel_token = CancellationToken::new();
            let watcher = cancel_token.clone();
            tokio::spawn(async move {
                if signal::ctrl_c().await.is_ok() {
                    info!("Received Ctrl+C, finishing identifiers in flight");
                    watcher.cancel();
                }
            });

            let report = orchestrator.run(identifiers, &cancel_token).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", report);
            }
            if report.failed() > 0 {
                std::process::exit(1);
            }
        }
        Command::Show { doi } => {
            let pool = open_pool(&config).await?;
            let ids = [ExternalId::doi(&doi)];
            match db::find_document_by_external_id(&pool, &ids).await? {
                Some((id, work)) => print_work(id, &work)?,
                None => bail!("No stored work with DOI {}", doi),
            }
        }
        Command::Status => {
            let pool = open_pool(&config).await?;
            for collection in Collection::ALL {
                println!("{:<14}{}", collection.to_string(), db::count(&pool, collection).await?);
            }
            for (provider, count) in db::count_raw_records(&pool).await? {
                println!("staged {:<7}{}", provider.to_string(), count);
            }
        }
    }

    Ok(())
}

async fn open_pool(config: &EtlConfig) -> Result<sqlx::SqlitePool> {
    info!("Database: {}", config.database.display());
    db::init_database_pool(&config.database)
        .await
        .context("Failed to open database")
}

fn init_tracing(cli_level: Option<&str>, toml: &TomlConfig) -> Result<()> {
    let level = cli_level
        .map(String::from)
        .or_else(|| std::env::var(LOG_LEVEL_ENV).ok())
        .unwrap_or_else(|| toml.logging.level.clone());
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&level))?;

    let registry = tracing_subscriber::registry().with(filter);
    match &toml.logging.log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Cannot open log file {}", path.display()))?;
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(std::sync::Mutex::new(file)),
                )
                .init();
        }
        None => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
    Ok(())
}

fn init_config(path: Option<PathBuf>, config: &EtlConfig, toml: &TomlConfig) -> Result<()> {
    let path = match path.or_else(common_config::user_config_path) {
        Some(path) => path,
        None => bail!("No config directory on this platform; pass a path"),
    };
    if path.exists() {
        bail!("{} already exists", path.display());
    }

    let written = TomlConfig {
        database: Some(config.database.clone()),
        workers: Some(config.workers),
        ror_url: Some(config.ror_url.clone()),
        doaj_url: Some(config.doaj_url.clone()),
        currency_url: Some(config.currency_url.clone()),
        http_timeout_secs: Some(config.http_timeout.as_secs()),
        registry_score_threshold: Some(config.registry_score_threshold),
        conflict_policy: Some(config.conflict_policy.to_string()),
        unmatched_author_policy: Some(config.unmatched_author_policy.to_string()),
        enrichment: Some(config.enrichment),
        oa_registry: Some(config.oa_registry.to_string()),
        ..toml.clone()
    };
    common_config::write_toml_config(&written, &path)?;
    println!("Wrote {}", path.display());
    Ok(())
}

async fn read_dois(path: &Path) -> Result<Vec<WorkIdentifier>> {
    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("Cannot open {}", path.display()))?;
    let mut lines = BufReader::new(file).lines();
    let mut identifiers = Vec::new();
    while let Some(line) = lines.next_line().await? {
        let doi = line.trim();
        if !doi.is_empty() && !doi.starts_with('#') {
            identifiers.push(WorkIdentifier::doi(doi));
        }
    }
    Ok(identifiers)
}

async fn read_citations(path: &Path) -> Result<Vec<WorkIdentifier>> {
    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("Cannot open {}", path.display()))?;
    let mut lines = BufReader::new(file).lines();
    let mut identifiers = Vec::new();
    let mut number = 0;
    while let Some(line) = lines.next_line().await? {
        number += 1;
        if line.trim().is_empty() {
            continue;
        }
        let citation: CitationLine = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: invalid citation", path.display(), number))?;
        identifiers.push(WorkIdentifier::Citation {
            title: citation.title,
            venue: citation.venue,
            year: citation.year,
        });
    }
    Ok(identifiers)
}

fn print_work(id: uuid::Uuid, work: &Work) -> Result<()> {
    println!("id: {}", id);
    if let Some(updated) = kahi_common::time::from_ts(work.updated) {
        println!("updated: {}", updated.to_rfc3339());
    }
    println!("{}", serde_json::to_string_pretty(work)?);
    Ok(())
}
