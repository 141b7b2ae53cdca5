//! Batch updates driven by the plot: axis drags, show/hide-all, date window.

use chartdoc_core::{
  Chart,
  chart::parse_instant,
  source::{ChartSource, SourceKind},
};
use serde::{Deserialize, Serialize};

/// A y-axis range reported for one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisRange {
  pub id:    String,
  #[serde(rename = "type")]
  pub kind:  SourceKind,
  pub range: [f64; 2],
}

/// What the plot reports after an axis interaction. `x` is either empty or
/// the new `[from, to]` date pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AxisUpdate {
  pub x: Vec<String>,
  pub y: Vec<AxisRange>,
}

/// Apply an axis update. `x` replaces the window only when it holds exactly
/// two values; each `y` entry sets `range` on every source with that id.
pub fn update_source_axis_for_chart(mut chart: Chart, update: &AxisUpdate) -> Chart {
  if let [from, to] = update.x.as_slice() {
    chart.date_from = from.clone();
    chart.date_to = to.clone();
  }

  for axis in &update.y {
    for_each_source(&mut chart, |source| {
      if source.id() == axis.id {
        source.set_range(axis.range);
      }
    });
  }
  chart
}

pub fn update_visibility_for_all_sources(mut chart: Chart, enabled: bool) -> Chart {
  for_each_source(&mut chart, |source| source.set_enabled(enabled));
  chart
}

/// Set the date window, falling back to the current value for an omitted
/// bound. The stored pair is always in chronological order.
pub fn update_chart_date_range(
  mut chart: Chart,
  date_from: Option<&str>,
  date_to: Option<&str>,
) -> Chart {
  let from = date_from.map_or_else(|| chart.date_from.clone(), str::to_string);
  let to = date_to.map_or_else(|| chart.date_to.clone(), str::to_string);

  let reversed = match (parse_instant(&from), parse_instant(&to)) {
    (Some(f), Some(t)) => f > t,
    _ => false,
  };
  (chart.date_from, chart.date_to) = if reversed { (to, from) } else { (from, to) };
  chart
}

// ── Both collections ────────────────────────────────────────────────────────

/// Borrow-friendly view over either kind of source.
trait SourceMut {
  fn id(&self) -> &str;
  fn set_range(&mut self, range: [f64; 2]);
  fn set_enabled(&mut self, enabled: bool);
}

impl<S: ChartSource> SourceMut for S {
  fn id(&self) -> &str { ChartSource::id(self) }

  fn set_range(&mut self, range: [f64; 2]) { ChartSource::set_range(self, range) }

  fn set_enabled(&mut self, enabled: bool) { ChartSource::set_enabled(self, enabled) }
}

fn for_each_source(chart: &mut Chart, mut f: impl FnMut(&mut dyn SourceMut)) {
  for ts in chart.time_series_collection.iter_mut().flatten() {
    f(ts);
  }
  for workflow in chart.workflow_collection.iter_mut().flatten() {
    f(workflow);
  }
}
