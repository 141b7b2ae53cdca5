//! chartdoc command-line tool.
//!
//! Reads a chart document (stdin or `--input`), runs the load-time
//! migrations, applies one edit and writes the result (stdout or `--output`).
//! Logs go to stderr.
//!
//! # Usage
//!
//! ```text
//! chartdoc --input chart.json migrate
//! chartdoc -i chart.json threshold add --name High --type over --source ts-1
//! chartdoc -i chart.json -o out.json date-range --from 2022-03-01T00:00:00Z
//! chartdoc -i chart.json steps --workflow 7effb0fc
//! ```
//!
//! `chartdoc.toml` (or `--config`) may set `operations_path`, `pretty`,
//! `default_user_id` and `default_user_email`; `CHARTDOC_*` environment
//! variables override it.

mod commands;
mod config;

use std::{
  io::Write as _,
  path::{Path, PathBuf},
};

use anyhow::Context as _;
use chartdoc_core::{Chart, operation::load_catalog};
use clap::Parser;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::EnvFilter;

use crate::{commands::Command, config::CliConfig};

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(author, version, about = "Chart document editor")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "chartdoc.toml", global = true)]
  config: PathBuf,

  /// Chart JSON to read; stdin when omitted.
  #[arg(short, long, global = true)]
  input: Option<PathBuf>,

  /// Where to write the result; stdout when omitted.
  #[arg(short, long, global = true)]
  output: Option<PathBuf>,

  /// Single-line JSON output.
  #[arg(long, global = true)]
  compact: bool,

  #[command(subcommand)]
  command: Command,
}

fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();
  let cfg = CliConfig::load(&cli.config)?;

  let operations = match cfg.operations_path() {
    Some(path) => load_catalog(&path)
      .with_context(|| format!("failed to load operations from {}", path.display()))?,
    None => Vec::new(),
  };
  info!(count = operations.len(), "operation catalog loaded");

  let raw = read_input(cli.input.as_deref())?;
  let chart = Chart::from_json(&raw).context("failed to parse chart document")?;
  info!(chart = %chart.id, "chart loaded");
  let chart = chartdoc_update::migrate(chart, &operations);

  let outcome = commands::run(cli.command, chart, &operations, &cfg)?;
  let text = outcome.to_json(cfg.pretty && !cli.compact)?;
  write_output(cli.output.as_deref(), &text)
}

// ─── I/O ──────────────────────────────────────────────────────────────────────

fn read_input(path: Option<&Path>) -> anyhow::Result<String> {
  match path {
    Some(path) => std::fs::read_to_string(path)
      .with_context(|| format!("failed to read {}", path.display())),
    None => std::io::read_to_string(std::io::stdin()).context("failed to read stdin"),
  }
}

fn write_output(path: Option<&Path>, text: &str) -> anyhow::Result<()> {
  match path {
    Some(path) => {
      std::fs::write(path, format!("{text}\n"))
        .with_context(|| format!("failed to write {}", path.display()))?;
      info!(path = %path.display(), "chart written");
      Ok(())
    }
    None => {
      let mut stdout = std::io::stdout().lock();
      writeln!(stdout, "{text}").context("failed to write stdout")
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn global_flags_parse_after_subcommand() {
    let cli = Cli::try_parse_from([
      "chartdoc",
      "threshold",
      "show",
      "t1",
      "--input",
      "chart.json",
      "--compact",
    ])
    .unwrap();
    assert_eq!(cli.input, Some(PathBuf::from("chart.json")));
    assert!(cli.compact);
    assert_eq!(cli.config, PathBuf::from("chartdoc.toml"));
  }

  #[test]
  fn subcommand_is_required() {
    assert!(Cli::try_parse_from(["chartdoc"]).is_err());
  }
}
