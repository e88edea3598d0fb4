//! taxon_admin — maintenance tool for the taxonomy tables.
//!
//! Reads config from env vars (a `.env` file is honoured):
//!   TAXON_DATABASE_URL     — Postgres connection string (falls back to DATABASE_URL)
//!   TAXON_MAX_CONNECTIONS  — pool size (default: 5)
//!   TAXON_*                — engine settings, see `taxon_core::config`
//!
//! Usage:
//!   cargo run --features database,cli --bin taxon_admin -- tree --kind category --counts
//!   cargo run --features database,cli --bin taxon_admin -- path --kind category --slug europe
//!   cargo run --features database,cli --bin taxon_admin -- verify
//!   cargo run --features database,cli --bin taxon_admin -- reconcile --kind tag

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use sqlx::postgres::PgPoolOptions;

use taxon::path::PathQuery;
use taxon::render::{render_breadcrumbs, render_drift, render_tree};
use taxon::service::{TaxonomyService, TaxonomyServiceImpl};
use taxon::settings::AdminSettings;
use taxon::subtree::SubtreeQuery;
use taxon::taxon_postgres::{self, PgTaxonomyStore};
use taxon::{Audience, StatusFilter, TaxonomyId, TaxonomyKind};

/// Taxonomy maintenance tool
#[derive(Parser, Debug)]
#[command(name = "taxon_admin")]
#[command(about = "Inspect and repair hierarchical taxonomies")]
struct Cli {
    /// Postgres connection string
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// YAML settings file, applied before environment variables
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Connection pool size
    #[arg(long, global = true)]
    max_connections: Option<u32>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the nested tree for one kind
    Tree {
        #[command(flatten)]
        scope: Scope,
        /// Show stored content counts
        #[arg(long)]
        counts: bool,
    },
    /// Print the breadcrumb trail for a node
    Path {
        #[command(flatten)]
        scope: Scope,
        #[command(flatten)]
        target: Target,
    },
    /// List the ids beneath a node
    Subtree {
        #[command(flatten)]
        scope: Scope,
        #[command(flatten)]
        target: Target,
        /// Include the matched node itself
        #[arg(long)]
        include_self: bool,
    },
    /// Rewrite drifted content counts from the relationship ledger
    Reconcile {
        #[arg(long, value_parser = parse_kind)]
        kind: Option<TaxonomyKind>,
    },
    /// Report drifted content counts; exits 1 when any are found
    Verify {
        #[arg(long, value_parser = parse_kind)]
        kind: Option<TaxonomyKind>,
    },
    /// Create the taxonomy tables if they do not exist
    Migrate,
}

#[derive(Args, Debug)]
struct Scope {
    /// category, tag or link-category
    #[arg(long, short = 'k', value_parser = parse_kind, default_value = "category")]
    kind: TaxonomyKind,

    /// Comma-separated statuses or codes (default: the admin audience filter)
    #[arg(long, value_parser = parse_statuses)]
    statuses: Option<StatusFilter>,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct Target {
    #[arg(long, value_parser = parse_id)]
    id: Option<TaxonomyId>,
    #[arg(long)]
    slug: Option<String>,
}

impl Target {
    /// `Ok(id)` or `Err(slug)`.
    fn resolve(self) -> Result<std::result::Result<TaxonomyId, String>> {
        match (self.id, self.slug) {
            (Some(id), _) => Ok(Ok(id)),
            (None, Some(slug)) => Ok(Err(slug)),
            (None, None) => bail!("pass --id or --slug"),
        }
    }
}

fn parse_kind(s: &str) -> Result<TaxonomyKind, String> {
    TaxonomyKind::from_str(s).ok_or_else(|| format!("unknown taxonomy kind: {}", s))
}

fn parse_statuses(s: &str) -> Result<StatusFilter, String> {
    StatusFilter::parse_list(s).map_err(|e| e.to_string())
}

fn parse_id(s: &str) -> Result<TaxonomyId, String> {
    TaxonomyId::parse(s).map_err(|e| e.to_string())
}

fn load_settings(cli: &Cli) -> Result<AdminSettings> {
    let base = match &cli.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            AdminSettings::from_yaml_str(&raw)?
        }
        None => AdminSettings::default(),
    };
    let mut settings = base.with_lookup(|key| std::env::var(key).ok())?;
    if let Some(url) = &cli.database_url {
        settings.database_url = Some(url.clone());
    }
    if let Some(n) = cli.max_connections {
        settings.max_connections = n.max(1);
    }
    Ok(settings)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,taxon_core=info,taxon_postgres=info".into()),
        )
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("{}: {:#}", "error".red().bold(), e);
            process::exit(2);
        }
    }
}

async fn run(cli: Cli) -> Result<i32> {
    let settings = load_settings(&cli)?;
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .connect(settings.require_database_url()?)
        .await
        .context("failed to connect to database")?;
    tracing::debug!("connected to database");

    if let Command::Migrate = cli.command {
        taxon_postgres::migrate(&pool).await?;
        println!("{} schema applied", "OK".green());
        return Ok(0);
    }

    let admin_filter = settings.taxonomy.filter_for(Audience::Admin);
    let store = Arc::new(PgTaxonomyStore::new(pool));
    let service = TaxonomyServiceImpl::new(store).with_config(settings.taxonomy);

    match cli.command {
        Command::Tree { scope, counts } => {
            let filter = scope.statuses.unwrap_or(admin_filter);
            let tree = service.get_tree(scope.kind, &filter).await?;
            if cli.json {
                print_json(&tree)?;
            } else {
                print!("{}", render_tree(&tree, counts));
            }
        }
        Command::Path { scope, target } => {
            let filter = scope.statuses.unwrap_or(admin_filter);
            let query = match target.resolve()? {
                Ok(id) => PathQuery::Id(id),
                Err(slug) => PathQuery::Slug(slug),
            };
            let crumbs = service.get_path(scope.kind, &filter, &query).await?;
            if cli.json {
                print_json(&crumbs)?;
            } else {
                println!("{}", render_breadcrumbs(&crumbs));
            }
        }
        Command::Subtree {
            scope,
            target,
            include_self,
        } => {
            let filter = scope.statuses.unwrap_or(admin_filter);
            let query = match target.resolve()? {
                Ok(id) => SubtreeQuery::Id(id),
                Err(slug) => SubtreeQuery::Slug(slug),
            };
            let ids = service
                .get_subtree_ids(scope.kind, &filter, &query, include_self)
                .await?;
            if cli.json {
                print_json(&ids)?;
            } else {
                for id in ids {
                    println!("{}", id);
                }
            }
        }
        Command::Reconcile { kind } => {
            let report = service.recompute_counts(kind).await?;
            if cli.json {
                print_json(&report)?;
            } else {
                print!("{}", render_drift(&report.corrected));
                println!(
                    "{} examined {}, corrected {}",
                    "OK".green(),
                    report.examined,
                    report.corrected.len()
                );
            }
        }
        Command::Verify { kind } => {
            let drift = service.verify_counts(kind).await?;
            if cli.json {
                print_json(&drift)?;
            } else if drift.is_empty() {
                println!("{} counts match the ledger", "OK".green());
            } else {
                print!("{}", render_drift(&drift));
                println!("{} {} drifted counts", "DRIFT".yellow().bold(), drift.len());
            }
            if !drift.is_empty() {
                return Ok(1);
            }
        }
        Command::Migrate => {}
    }
    Ok(0)
}
