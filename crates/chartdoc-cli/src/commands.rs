//! Subcommands and their mapping onto the update functions.

use anyhow::{Context as _, bail};
use chartdoc_core::{
  Chart,
  chart::UserInfo,
  operation::Operation,
  threshold::{Threshold, ThresholdFilter, ThresholdType},
};
use chartdoc_update as update;
use clap::{ArgAction, Subcommand};
use tracing::info;

use crate::config::CliConfig;

// ─── Command tree ─────────────────────────────────────────────────────────────

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Run the load-time migrations and print the upgraded chart.
  Migrate,
  /// Copy the chart for another owner.
  Duplicate {
    #[arg(long)]
    user_id: Option<String>,
    #[arg(long)]
    email:   Option<String>,
  },
  /// Change the chart's date window.
  DateRange {
    #[arg(long)]
    from: Option<String>,
    #[arg(long)]
    to:   Option<String>,
  },
  /// Enable or disable every source at once.
  Visibility {
    #[arg(long, action = ArgAction::Set)]
    enabled: bool,
  },
  /// Threshold edits.
  Threshold {
    #[command(subcommand)]
    action: ThresholdCommand,
  },
  /// Source collection edits.
  Source {
    #[command(subcommand)]
    action: SourceCommand,
  },
  /// Print the computation steps for one workflow.
  Steps {
    #[arg(long)]
    workflow: String,
  },
}

#[derive(Subcommand, Debug)]
pub enum ThresholdCommand {
  Add {
    #[arg(long)]
    id:     Option<String>,
    #[arg(long)]
    name:   String,
    #[arg(long = "type", default_value = "over")]
    kind:   ThresholdType,
    #[arg(long)]
    source: Option<String>,
  },
  Remove {
    id: String,
  },
  Rename {
    id:   String,
    name: String,
  },
  Show {
    id: String,
  },
  Hide {
    id: String,
  },
  Limits {
    id:    String,
    #[arg(long, allow_negative_numbers = true)]
    lower: Option<f64>,
    #[arg(long, allow_negative_numbers = true)]
    upper: Option<f64>,
  },
  Type {
    id:   String,
    kind: ThresholdType,
  },
  Source {
    id:        String,
    source_id: String,
  },
  /// Replace the event-duration filter.
  Filter {
    id:       String,
    #[arg(long)]
    min:      Option<f64>,
    #[arg(long)]
    max:      Option<f64>,
    #[arg(long)]
    min_unit: Option<String>,
    #[arg(long)]
    max_unit: Option<String>,
  },
}

#[derive(Subcommand, Debug)]
pub enum SourceCommand {
  /// Remove a time series or workflow and its collection entry.
  Remove { id: String },
  /// Move the collection entry at `from` to `to`.
  Reorder { from: usize, to: usize },
}

// ─── Execution ────────────────────────────────────────────────────────────────

/// What a command produced.
#[derive(Debug)]
pub enum Outcome {
  Chart(Box<Chart>),
  Steps(Vec<update::ComputationStep>),
}

impl Outcome {
  pub fn to_json(&self, pretty: bool) -> anyhow::Result<String> {
    let text = match self {
      Outcome::Chart(chart) => chart.to_json(pretty)?,
      Outcome::Steps(steps) if pretty => serde_json::to_string_pretty(steps)?,
      Outcome::Steps(steps) => serde_json::to_string(steps)?,
    };
    Ok(text)
  }
}

/// Apply `command` to an already migrated chart.
pub fn run(
  command: Command,
  chart: Chart,
  operations: &[Operation],
  config: &CliConfig,
) -> anyhow::Result<Outcome> {
  let chart = match command {
    Command::Migrate => chart,
    Command::Duplicate { user_id, email } => {
      let id = user_id
        .or_else(|| config.default_user_id.clone())
        .context("duplicate needs --user-id or default_user_id in the config")?;
      let user = UserInfo {
        id,
        email: email.or_else(|| config.default_user_email.clone()),
        display_name: None,
      };
      info!(user = %user.id, "duplicating chart");
      update::duplicate(chart, &user)
    }
    Command::DateRange { from, to } => {
      update::update_chart_date_range(chart, from.as_deref(), to.as_deref())
    }
    Command::Visibility { enabled } => update::update_visibility_for_all_sources(chart, enabled),
    Command::Threshold { action } => run_threshold(action, chart),
    Command::Source { action } => match action {
      SourceCommand::Remove { id } => update::remove_source(chart, &id),
      SourceCommand::Reorder { from, to } => {
        update::update_source_collection_order(chart, from, to)
      }
    },
    Command::Steps { workflow } => {
      let Some(target) = chart.workflow(&workflow) else {
        bail!("no workflow with id {workflow}");
      };
      let steps = update::steps_for_workflow(target, chart.workflows(), operations);
      info!(workflow, count = steps.len(), "compiled workflow");
      return Ok(Outcome::Steps(steps));
    }
  };
  Ok(Outcome::Chart(Box::new(chart)))
}

fn run_threshold(action: ThresholdCommand, chart: Chart) -> Chart {
  match action {
    ThresholdCommand::Add {
      id,
      name,
      kind,
      source,
    } => {
      let id = id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
      let mut threshold = Threshold::new(id, name, kind);
      threshold.source_id = source;
      info!(id = %threshold.id, "adding threshold");
      update::add_chart_threshold(chart, threshold)
    }
    ThresholdCommand::Remove { id } => update::remove_chart_threshold(chart, &id),
    ThresholdCommand::Rename { id, name } => update::update_chart_threshold_name(chart, &id, &name),
    ThresholdCommand::Show { id } => update::update_chart_threshold_visibility(chart, &id, true),
    ThresholdCommand::Hide { id } => update::update_chart_threshold_visibility(chart, &id, false),
    ThresholdCommand::Limits { id, lower, upper } => {
      let chart = match lower {
        Some(limit) => update::update_chart_threshold_lower_limit(chart, &id, limit),
        None => chart,
      };
      match upper {
        Some(limit) => update::update_chart_threshold_upper_limit(chart, &id, limit),
        None => chart,
      }
    }
    ThresholdCommand::Type { id, kind } => update::update_chart_threshold_type(chart, &id, kind),
    ThresholdCommand::Source { id, source_id } => {
      update::update_chart_threshold_selected_source(chart, &id, &source_id)
    }
    ThresholdCommand::Filter {
      id,
      min,
      max,
      min_unit,
      max_unit,
    } => update::update_chart_threshold_event_filters(chart, &id, ThresholdFilter {
      min_value: min,
      max_value: max,
      min_unit,
      max_unit,
    }),
  }
}

#[cfg(test)]
mod tests {
  use chartdoc_core::source::TimeSeries;
  use clap::Parser;

  use super::*;

  #[derive(Parser)]
  struct Harness {
    #[command(subcommand)]
    command: Command,
  }

  fn parse(args: &[&str]) -> Command {
    let mut argv = vec!["chartdoc"];
    argv.extend_from_slice(args);
    Harness::try_parse_from(argv).unwrap().command
  }

  fn chart() -> Chart {
    let chart = Chart::new("c1", "Pumps", "2021-12-13T16:00:00Z", "2021-12-13T19:00:00Z");
    let chart = update::add_timeseries(chart, TimeSeries::new("ts-1", "Pump 1"));
    update::add_timeseries(chart, TimeSeries::new("ts-2", "Pump 2"))
  }

  fn apply(args: &[&str], chart: Chart) -> Chart {
    match run(parse(args), chart, &[], &CliConfig::default()).unwrap() {
      Outcome::Chart(chart) => *chart,
      Outcome::Steps(_) => panic!("expected a chart"),
    }
  }

  // ── thresholds ──

  #[test]
  fn threshold_lifecycle() {
    let chart = apply(
      &["threshold", "add", "--id", "t1", "--name", "High", "--type", "between"],
      chart(),
    );
    let chart = apply(&["threshold", "limits", "t1", "--lower", "-5", "--upper", "40"], chart);
    let chart = apply(&["threshold", "hide", "t1"], chart);
    let chart = apply(&["threshold", "rename", "t1", "Band"], chart);

    let t = chart.threshold("t1").unwrap();
    assert_eq!(t.name, "Band");
    assert_eq!(t.kind, ThresholdType::Between);
    assert_eq!(t.lower_limit, Some(-5.0));
    assert_eq!(t.upper_limit, Some(40.0));
    assert!(!t.visible);

    let chart = apply(&["threshold", "remove", "t1"], chart);
    assert!(chart.thresholds().is_empty());
  }

  #[test]
  fn threshold_filter_replaces_whole_filter() {
    let chart = apply(&["threshold", "add", "--id", "t1", "--name", "High"], chart());
    let chart = apply(&["threshold", "filter", "t1", "--min", "2", "--min-unit", "minutes"], chart);
    let t = chart.threshold("t1").unwrap();
    assert_eq!(t.kind, ThresholdType::Over);
    assert_eq!(t.filter, ThresholdFilter {
      min_value: Some(2.0),
      min_unit: Some("minutes".into()),
      ..Default::default()
    });
  }

  #[test]
  fn unknown_threshold_type_is_rejected() {
    let argv = ["chartdoc", "threshold", "type", "t1", "sideways"];
    assert!(Harness::try_parse_from(argv).is_err());
  }

  // ── sources ──

  #[test]
  fn source_reorder_and_remove() {
    let chart = apply(&["source", "reorder", "0", "1"], chart());
    let ids: Vec<_> = chart.sources().iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, ["ts-1", "ts-2"]);

    let chart = apply(&["source", "remove", "ts-1"], chart);
    assert_eq!(chart.time_series().len(), 1);
    assert_eq!(chart.sources().len(), 1);
  }

  #[test]
  fn visibility_accepts_explicit_value() {
    let chart = apply(&["visibility", "--enabled", "false"], chart());
    assert!(chart.time_series().iter().all(|ts| !ts.display.enabled));
  }

  // ── chart-level ──

  #[test]
  fn duplicate_falls_back_to_configured_user() {
    let config = CliConfig {
      default_user_id: Some("ops@example.com".into()),
      ..CliConfig::default()
    };
    let Outcome::Chart(copy) = run(parse(&["duplicate"]), chart(), &[], &config).unwrap() else {
      panic!("expected a chart")
    };
    assert_eq!(copy.name, "Pumps Copy");
    assert_eq!(copy.user.as_deref(), Some("ops@example.com"));
    assert_ne!(copy.id, "c1");
  }

  #[test]
  fn duplicate_without_user_fails() {
    let result = run(parse(&["duplicate"]), chart(), &[], &CliConfig::default());
    assert!(result.is_err());
  }

  #[test]
  fn steps_for_missing_workflow_fails() {
    let result = run(
      parse(&["steps", "--workflow", "nope"]),
      chart(),
      &[],
      &CliConfig::default(),
    );
    assert!(result.is_err());
  }

  #[test]
  fn steps_serialise_as_array() {
    let outcome = Outcome::Steps(Vec::new());
    assert_eq!(outcome.to_json(false).unwrap(), "[]");
  }
}
