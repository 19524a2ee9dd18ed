//! `clause`: ingest contract extractions into the graph, query them and
//! validate them against client standards.
//!
//! Reads `clause.toml` (or the path given with `--config`), layered with
//! `CLAUSE_*` environment variables, and opens the SQLite store it names.
//!
//! # Usage
//!
//! ```text
//! clause ingest extractions/
//! clause validate c-1 acme-bank
//! clause caps --above 1000000
//! clause similar "limitation of liability for data breaches"
//! clause search "data breach" --limit 10
//! clause serve
//! ```

mod embedder;
mod settings;
mod standards;

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::{Context as _, bail};
use clap::{Parser, Subcommand};
use clause_core::{
  contract::ContractId,
  document::ExtractedDocument,
  provision::CapType,
  store::CapQuery,
};
use clause_engine::{
  AttachStatus, BatchEntry, BatchOutcome, BatchReport, Engine, StandardsRegistry,
};
use clause_store_sqlite::SqliteStore;
use embedder::HttpEmbedder;
use serde::Serialize;
use settings::AppConfig;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

type AppEngine = Engine<SqliteStore, HttpEmbedder>;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(author, version, about = "Contract graph ingestion and validation")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "clause.toml", global = true)]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Ingest extraction JSON files, or every `*.json` in the given directories.
  Ingest {
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Print the batch report as JSON.
    #[arg(long)]
    json: bool,
  },

  /// List stored contracts.
  List,

  /// Print one contract as JSON.
  Show { contract_id: String },

  /// Print how many nodes and relationships a contract occupies.
  Size { contract_id: String },

  /// Delete a contract and everything it owns.
  Delete { contract_id: String },

  /// Validate a contract against a registered client's standards.
  Validate {
    contract_id: String,
    client_id:   String,

    /// Print the report as JSON.
    #[arg(long)]
    json:        bool,
  },

  /// Liability caps with a known amount, highest first.
  Caps {
    /// Only caps strictly above this amount.
    #[arg(long)]
    above:    Option<f64>,

    /// Only caps at or below this amount.
    #[arg(long)]
    at_most:  Option<f64>,

    #[arg(long)]
    cap_type: Option<String>,

    #[arg(long)]
    limit:    Option<usize>,

    /// Print count, min, max and average instead of the matches.
    #[arg(long)]
    stats:    bool,
  },

  /// Contracts that name a compliance framework.
  Framework {
    name:    String,

    /// List the contracts that do not name it instead.
    #[arg(long)]
    missing: bool,
  },

  /// Excerpts ranked by similarity to a query text.
  Similar {
    query: String,

    #[arg(long, default_value_t = 5)]
    top_k: usize,
  },

  /// Excerpts, agreement types, party names and obligation types containing
  /// a keyword. Needs no embedder.
  Search {
    keyword: String,

    #[arg(long)]
    limit:   Option<usize>,
  },

  /// Serve the JSON API.
  Serve,
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let cfg = AppConfig::load(&cli.config)?;

  if let Some(parent) = cfg.store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {}", parent.display()))?;
  }
  let store = SqliteStore::open(&cfg.store_path)
    .await
    .with_context(|| format!("failed to open store at {:?}", cfg.store_path))?;

  let embedder = HttpEmbedder::new(cfg.embedding.clone())?;

  let registry = StandardsRegistry::new();
  if let Some(dir) = &cfg.standards_dir {
    let count = standards::register_dir(&registry, dir)?;
    tracing::info!(dir = %dir.display(), count, "loaded client standards");
  }

  let engine = Arc::new(Engine::new(
    Arc::new(store),
    Arc::new(embedder),
    Arc::new(registry),
    &cfg.engine,
  ));

  let cancel = CancellationToken::new();
  tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

  match cli.command {
    Command::Ingest { paths, json } => ingest(&engine, &paths, json, &cancel).await,
    Command::List => print_json(&engine.queries.list_contracts().await?),
    Command::Show { contract_id } => {
      let id = ContractId::new(contract_id);
      print_json(&engine.queries.get_contract(&id).await?)
    }
    Command::Size { contract_id } => {
      let id = ContractId::new(contract_id);
      print_json(&engine.queries.graph_size(&id).await?)
    }
    Command::Delete { contract_id } => {
      let id = ContractId::new(contract_id);
      if !engine.writer.delete(&id, &cancel).await? {
        bail!("contract {id} not found");
      }
      println!("deleted {id}");
      Ok(())
    }
    Command::Validate {
      contract_id,
      client_id,
      json,
    } => {
      let id = ContractId::new(contract_id);
      let report = engine.validator.validate(&id, &client_id, &cancel).await?;
      if json {
        print_json(&report)
      } else {
        println!("{report}");
        Ok(())
      }
    }
    Command::Caps {
      above,
      at_most,
      cap_type,
      limit,
      stats,
    } => {
      if stats {
        return print_json(&engine.queries.liability_cap_statistics().await?);
      }
      let query = CapQuery {
        above,
        at_most,
        cap_type: cap_type.as_deref().map(CapType::parse),
        limit,
      };
      print_json(&engine.queries.find_liability_caps(&query).await?)
    }
    Command::Framework { name, missing } => {
      let contracts = if missing {
        engine.queries.contracts_missing_framework(&name).await?
      } else {
        engine.queries.contracts_with_framework(&name).await?
      };
      print_json(&contracts)
    }
    Command::Similar { query, top_k } => {
      print_json(&engine.queries.similar_excerpts(&query, top_k).await?)
    }
    Command::Search { keyword, limit } => {
      print_json(&engine.queries.keyword_search(&keyword, limit).await?)
    }
    Command::Serve => serve(engine, &cfg, cancel).await,
  }
}

// ─── Commands ─────────────────────────────────────────────────────────────────

async fn ingest(
  engine: &Arc<AppEngine>,
  paths: &[PathBuf],
  json: bool,
  cancel: &CancellationToken,
) -> anyhow::Result<()> {
  let files = collect_documents(paths)?;

  // Unreadable or unparsable files become failed entries in their slot.
  let mut slots = Vec::with_capacity(files.len());
  let mut docs = Vec::new();
  for path in &files {
    match read_document(path) {
      Ok(doc) => {
        slots.push(None);
        docs.push(doc);
      }
      Err(e) => slots.push(Some(BatchEntry {
        source_ref: path.display().to_string(),
        outcome:    BatchOutcome::Failed {
          error:     format!("{e:#}"),
          retryable: false,
        },
      })),
    }
  }

  let ingested = engine.ingestor.ingest_batch(docs, cancel).await;
  let mut ingested = ingested.entries.into_iter();
  let report = BatchReport {
    entries: slots
      .into_iter()
      .filter_map(|slot| slot.or_else(|| ingested.next()))
      .collect(),
  };

  if json {
    print_json(&report)?;
  } else {
    print_batch(&report);
  }

  let failed = report.failed();
  if failed > 0 {
    bail!("{failed} of {} documents failed", report.entries.len());
  }
  Ok(())
}

async fn serve(
  engine: Arc<AppEngine>,
  cfg: &AppConfig,
  cancel: CancellationToken,
) -> anyhow::Result<()> {
  let app = axum::Router::new()
    .nest("/api", clause_api::api_router(engine))
    .layer(TraceLayer::new_for_http());
  let address = cfg.address();

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(async move { cancel.cancelled().await })
    .await
    .context("server error")?;

  Ok(())
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
  if tokio::signal::ctrl_c().await.is_ok() {
    tracing::info!("interrupt received, cancelling");
    cancel.cancel();
  }
}

// ─── Helpers ──────────────────────────────────────────────────────────────────

/// Expand directories to their `*.json` files (sorted); keep files as given.
fn collect_documents(paths: &[PathBuf]) -> anyhow::Result<Vec<PathBuf>> {
  let mut files = Vec::new();
  for path in paths {
    if path.is_dir() {
      let mut found = Vec::new();
      let entries = std::fs::read_dir(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
      for entry in entries {
        let p = entry?.path();
        if p.is_file() && p.extension().is_some_and(|e| e == "json") {
          found.push(p);
        }
      }
      found.sort();
      files.extend(found);
    } else {
      files.push(path.clone());
    }
  }
  Ok(files)
}

fn read_document(path: &Path) -> anyhow::Result<ExtractedDocument> {
  let bytes = std::fs::read(path)
    .with_context(|| format!("failed to read {}", path.display()))?;
  let name = path
    .file_name()
    .map(|n| n.to_string_lossy().into_owned());
  Ok(ExtractedDocument::from_slice(&bytes, name)?)
}

fn print_batch(report: &BatchReport) {
  for entry in &report.entries {
    match &entry.outcome {
      BatchOutcome::Ingested(s) => {
        let w = &s.write;
        let embeddings = match &s.embeddings {
          Some(a) if a.status == AttachStatus::Unavailable => {
            "embeddings off".to_owned()
          }
          Some(a) => format!(
            "embedded {}/{} ({} failed)",
            a.embedded,
            a.pending,
            a.failures.len()
          ),
          None => "embeddings skipped".to_owned(),
        };
        println!(
          "ok    {} ({}): +{} ~{} ={} -{}, {embeddings}",
          s.contract_id, entry.source_ref, w.created, w.updated, w.unchanged, w.removed
        );
      }
      BatchOutcome::Failed { error, retryable } => {
        let tag = if *retryable { "retry" } else { "fail " };
        println!("{tag} {}: {error}", entry.source_ref);
      }
    }
  }
  println!(
    "{} ingested, {} failed",
    report.succeeded(),
    report.failed()
  );
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
  let text = serde_json::to_string_pretty(value).context("serialising output")?;
  println!("{text}");
  Ok(())
}
