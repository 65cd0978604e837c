use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use sable_config::WorkflowDef;
use sable_resolver::{Resolver, StandardResolver, SystemRunner, resolve_variable};
use sable_status::{Pid, RunState, RunStatus, StatusFile, load_status};

/// Sable - inspect workflow run statuses and resolve step values
#[derive(Parser)]
#[command(name = "sable")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.sable)
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Print the latest status in a status file, corrected for dead owners
  Status {
    /// Path to the status file (one JSON record per line)
    status_file: PathBuf,
  },

  /// Resolve a value: expand environment references and run backtick commands
  Resolve {
    value: String,

    /// Kill substituted commands after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,
  },

  /// Build a fresh status for a workflow, resolving every step
  Prepare {
    /// Path to the workflow file (JSON)
    workflow_file: PathBuf,
  },
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();

  let data_dir = match cli.data_dir {
    Some(dir) => dir,
    None => dirs::home_dir()
      .context("could not determine home directory")?
      .join(".sable"),
  };

  match cli.command {
    Some(Commands::Status { status_file }) => show_status(&status_file)?,
    Some(Commands::Resolve {
      value,
      timeout_secs,
    }) => resolve(&value, timeout_secs)?,
    Some(Commands::Prepare { workflow_file }) => {
      let status_path = prepare(&workflow_file, &data_dir)?;
      println!("{}", status_path.display());
    }
    None => {
      println!("sable - use --help to see available commands");
    }
  }

  Ok(())
}

fn show_status(status_file: &Path) -> Result<()> {
  let rt = tokio::runtime::Runtime::new()?;
  let loaded = rt.block_on(load_status(status_file));

  let status = match loaded {
    Ok(status) => status,
    Err(e) if e.is_malformed() => {
      warn!(path = %status_file.display(), error = %e, "ignoring undecodable status");
      None
    }
    Err(e) => {
      return Err(e)
        .with_context(|| format!("failed to read status file: {}", status_file.display()));
    }
  };

  match status {
    Some(status) => println!("{}", serde_json::to_string_pretty(&status)?),
    None => println!("never run"),
  }

  Ok(())
}

fn resolve(value: &str, timeout_secs: Option<u64>) -> Result<()> {
  let resolved = match timeout_secs {
    Some(secs) => {
      let runner = SystemRunner::with_timeout(std::time::Duration::from_secs(secs));
      StandardResolver::new(sable_resolver::ProcessEnv, runner).resolve(value)
    }
    None => resolve_variable(value),
  }
  .context("failed to resolve value")?;

  println!("{resolved}");
  Ok(())
}

fn prepare(workflow_file: &Path, data_dir: &Path) -> Result<PathBuf> {
  let content = std::fs::read_to_string(workflow_file)
    .with_context(|| format!("failed to read workflow file: {}", workflow_file.display()))?;
  let workflow: WorkflowDef = serde_json::from_str(&content)
    .with_context(|| format!("failed to parse workflow file: {}", workflow_file.display()))?;

  info!(workflow = %workflow.name, steps = workflow.steps.len(), "loaded workflow");

  let file = StatusFile::for_workflow(data_dir, &workflow.name);
  let status_path = file.path().to_path_buf();

  let rt = tokio::runtime::Runtime::new()?;
  let prior = match rt.block_on(load_status(&status_path)) {
    Ok(prior) => prior,
    Err(e) if e.is_malformed() => {
      warn!(path = %status_path.display(), error = %e, "ignoring undecodable status history");
      None
    }
    Err(e) => return Err(e).context("failed to read status history"),
  };

  let mut status = RunStatus::new(
    &workflow,
    prior.as_ref(),
    RunState::NotStarted,
    Pid::current(),
    None,
    None,
  );

  let resolver = StandardResolver::system();
  let mut failed = 0;
  for node in status.all_nodes_mut() {
    match resolver.resolve_step(&node.step) {
      Ok(resolved) => node.step = resolved,
      Err(e) => {
        warn!(step = %node.name(), error = %e, "failed to resolve step");
        node.fail(Utc::now(), &e);
        failed += 1;
      }
    }
  }
  if failed > 0 {
    status.finish(RunState::Error, Utc::now());
  }

  rt.block_on(file.append(&status))
    .with_context(|| format!("failed to write status file: {}", status_path.display()))?;

  let nodes = status.nodes.len() + status.handler_nodes().count();
  eprintln!("Prepared {} nodes ({} failed to resolve)", nodes, failed);

  Ok(status_path)
}
