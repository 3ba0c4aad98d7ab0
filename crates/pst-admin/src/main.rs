//! `pst-admin`: maintenance commands for a primary-sources statement store.
//!
//! Reads settings from `--config` (TOML, optional) and `PST_*` environment
//! variables, opens the configured database and cache, runs one command, and
//! prints its result as JSON.
//!
//! ```
//! pst-admin import --dataset freebase --file statements.jsonl --dedup
//! pst-admin status --dataset freebase
//! PST_REDIS__URL=redis://localhost/ pst-admin populate-cache
//! ```

use std::{
  fs::File,
  io::{self, BufReader, Write as _},
  path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use pst_core::{ApprovalState, NewStatement};
use pst_service::{Backend, Settings};
use pst_store_sqlite::SqliteStore;
use serde::Serialize;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Primary-sources statement store administration")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "pst.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Import statements from a file of JSON lines.
  Import {
    /// Dataset tag given to every imported statement.
    #[arg(long)]
    dataset: String,
    #[arg(long)]
    file:    PathBuf,
    /// Run the duplicate sweep over the new statements afterwards.
    #[arg(long)]
    dedup:   bool,
  },
  /// Mark duplicates among statements with ids above `start-id`.
  Dedup {
    #[arg(long, default_value_t = 0)]
    start_id: i64,
  },
  /// Write every unapproved subject into the shared cache.
  PopulateCache,
  /// Drop every cached query result from both tiers.
  ClearCache,
  /// Print the status report, for one dataset or all of them.
  Status {
    #[arg(long)]
    dataset: Option<String>,
  },
  /// Delete every statement in the given state.
  Delete {
    #[arg(long, value_parser = parse_state)]
    state: ApprovalState,
  },
  /// List dataset tags.
  Datasets,
  /// Print the per-period activity log.
  Activity,
}

fn parse_state(s: &str) -> Result<ApprovalState, String> {
  ApprovalState::parse(s).map_err(|e| e.to_string())
}

fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_writer(io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = Settings::load(Some(cli.config)).context("failed to load settings")?;
  let backend = Backend::open(&settings).with_context(|| {
    format!("failed to open store at {}", settings.database.path.display())
  })?;

  let result = run(&backend, cli.command);
  backend.shutdown();
  result
}

fn run(backend: &Backend<SqliteStore>, command: Command) -> anyhow::Result<()> {
  match command {
    Command::Import { dataset, file, dedup } => {
      let statements = read_statements(&file)?;
      info!(count = statements.len(), file = %file.display(), "statements read");
      print(&backend.import_statements(statements, &dataset, dedup)?)
    }
    Command::Dedup { start_id } => print(&backend.mark_duplicates(start_id)?),
    Command::PopulateCache => print(&backend.populate_shared_cache()?),
    Command::ClearCache => {
      backend.clear_cache();
      info!("cache cleared");
      Ok(())
    }
    Command::Status { dataset } => {
      backend.refresh_status()?;
      print(&backend.status(dataset.as_deref())?)
    }
    Command::Delete { state } => {
      let deleted = backend.delete_statements(state)?;
      print(&serde_json::json!({ "state": state, "deleted": deleted }))
    }
    Command::Datasets => print(&backend.get_datasets()?),
    Command::Activity => print(&backend.get_activity_log()?),
  }
}

/// Parse one [`NewStatement`] per line. Blank lines are skipped.
fn read_statements(path: &Path) -> anyhow::Result<Vec<NewStatement>> {
  let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
  serde_json::Deserializer::from_reader(BufReader::new(file))
    .into_iter::<NewStatement>()
    .enumerate()
    .map(|(i, st)| st.with_context(|| format!("bad statement #{} in {}", i + 1, path.display())))
    .collect()
}

fn print<T: Serialize>(value: &T) -> anyhow::Result<()> {
  let mut out = io::stdout().lock();
  serde_json::to_writer_pretty(&mut out, value)?;
  writeln!(out)?;
  Ok(())
}
