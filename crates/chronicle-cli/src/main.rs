//! `chronicle`: reconstruct issue histories from tracker APIs.
//!
//! Reads `chronicle.toml` (or the path given with `--config`) and
//! `CHRONICLE_*` environment variables, then runs one of:
//!
//! ```text
//! chronicle collect [--workers N] [--dump-dir DIR]
//! chronicle show <external-id> [--at <rfc3339>]
//! chronicle serve
//! ```

use std::{path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::{Context as _, bail};
use chrono::{DateTime, Utc};
use chronicle_cli::{
  driver::{Collector, RunSummary},
  fetch::{DumpSource, HttpSource},
  settings::{Overrides, Settings},
};
use chronicle_core::{
  person::AliasResolver,
  raw::IssueId,
  source::IssueSource,
  store::IssueStore,
};
use chronicle_store_sqlite::SqliteStore;
use chronicle_wire::Adapter;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "chronicle", author, version, about = "Reconstruct issue histories")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "chronicle.toml", global = true)]
  config: PathBuf,

  /// Log level; `RUST_LOG` takes precedence.
  #[arg(long, global = true)]
  log_level: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Fetch, reconstruct and store the configured project's issues.
  Collect {
    /// Number of issues processed concurrently.
    #[arg(long)]
    workers:  Option<usize>,
    /// Read raw JSON from this directory instead of the tracker API.
    #[arg(long)]
    dump_dir: Option<PathBuf>,
  },
  /// Print a stored issue, or its state at an instant, as JSON.
  Show {
    external_id: String,
    #[arg(long)]
    at:          Option<DateTime<Utc>>,
  },
  /// Serve the read-only JSON API.
  Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
  let cli = Cli::parse();

  let mut overrides = Overrides {
    log_level: cli.log_level,
    ..Overrides::default()
  };
  if let Command::Collect { workers, dump_dir } = &cli.command {
    overrides.workers = *workers;
    overrides.dump_dir = dump_dir.clone();
  }
  let settings = Settings::load(&cli.config, overrides)
    .with_context(|| format!("failed to load {}", cli.config.display()))?;

  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log_level)),
    )
    .init();

  let store = SqliteStore::open(&settings.database)
    .await
    .with_context(|| format!("failed to open store at {:?}", settings.database))?;

  match cli.command {
    Command::Collect { .. } => {
      settings.validate().context("invalid configuration")?;
      let summary = match &settings.dump_dir {
        Some(dir) => collect(DumpSource::new(dir), store, &settings).await?,
        None => {
          let source = HttpSource::new(&settings).context("failed to set up HTTP fetching")?;
          collect(source, store, &settings).await?
        }
      };
      println!("{summary}");
      if summary.has_bugs() {
        return Ok(ExitCode::FAILURE);
      }
    }
    Command::Show { external_id, at } => {
      let id = IssueId::new(settings.tracker, external_id);
      let Some(issue) = store.get_issue(&id).await.context("failed to read issue")? else {
        bail!("issue {id} is not stored");
      };
      let json = match at {
        Some(at) => serde_json::to_string_pretty(&issue.state_at(at))?,
        None => serde_json::to_string_pretty(&issue)?,
      };
      println!("{json}");
    }
    Command::Serve => {
      let app = chronicle_api::api_router(Arc::new(store));
      let listener = TcpListener::bind(&settings.listen)
        .await
        .with_context(|| format!("failed to bind {}", settings.listen))?;
      tracing::info!("Listening on http://{}", settings.listen);
      axum::serve(listener, app).await.context("server error")?;
    }
  }

  Ok(ExitCode::SUCCESS)
}

async fn collect<Src>(source: Src, store: SqliteStore, settings: &Settings) -> anyhow::Result<RunSummary>
where
  Src: IssueSource + 'static,
{
  let collector = Collector {
    source:  Arc::new(source),
    store:   Arc::new(store),
    people:  Arc::new(AliasResolver::new(settings.people.aliases.clone())),
    adapter: Adapter::for_tracker(settings.tracker),
    project: settings.project.clone(),
    workers: settings.workers,
  };
  collector.run().await
}
