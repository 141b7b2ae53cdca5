//! Add / update / remove over the typed source collections.
//!
//! Adding appends to the typed collection and *prepends* an entry to
//! `sourceCollection`, so the newest source is listed first. Update and
//! remove are no-ops when the id is unknown.

use chartdoc_core::{
  Chart,
  source::{ChartSource, SourceEntry, SourceKind, SourcePatch, TimeSeries},
  workflow::Workflow,
};
use tracing::debug;
use uuid::Uuid;

// ─── Generic helpers ─────────────────────────────────────────────────────────

/// Tag `item` with its kind, append it to its collection and list it first
/// in `sourceCollection`.
pub fn add_item<S: ChartSource>(mut chart: Chart, mut item: S) -> Chart {
  item.set_kind();
  let entry = SourceEntry::new(item.id(), S::KIND);
  S::collection_mut(&mut chart).get_or_insert_default().push(item);
  chart.source_collection.get_or_insert_default().insert(0, entry);
  chart
}

/// Run `f` against the item with `id`, leaving its position unchanged.
pub fn update_item_with<S: ChartSource>(
  mut chart: Chart,
  id: &str,
  f: impl FnOnce(&mut S),
) -> Chart {
  let found = S::collection_mut(&mut chart)
    .as_mut()
    .and_then(|items| items.iter_mut().find(|item| item.id() == id));
  match found {
    Some(item) => f(item),
    None => debug!(id, kind = %S::KIND, "update of unknown source ignored"),
  }
  chart
}

/// Shallow-merge `patch` into the item with `id`.
pub fn update_item<S: ChartSource>(chart: Chart, id: &str, patch: &SourcePatch) -> Chart {
  update_item_with::<S>(chart, id, |item| item.apply(patch))
}

/// Drop the item with `id` from its collection and from `sourceCollection`.
pub fn remove_item<S: ChartSource>(mut chart: Chart, id: &str) -> Chart {
  if !S::collection(&chart).iter().any(|item| item.id() == id) {
    return chart;
  }
  if let Some(items) = S::collection_mut(&mut chart) {
    items.retain(|item| item.id() != id);
  }
  if let Some(sources) = &mut chart.source_collection {
    sources.retain(|entry| !(entry.id == id && entry.kind == S::KIND));
  }
  chart
}

// ─── Time series ─────────────────────────────────────────────────────────────

pub fn add_timeseries(chart: Chart, ts: TimeSeries) -> Chart { add_item(chart, ts) }

pub fn update_timeseries(chart: Chart, id: &str, patch: &SourcePatch) -> Chart {
  update_item::<TimeSeries>(chart, id, patch)
}

pub fn remove_timeseries(chart: Chart, id: &str) -> Chart {
  remove_item::<TimeSeries>(chart, id)
}

// ─── Workflows ───────────────────────────────────────────────────────────────

pub fn add_workflow(chart: Chart, workflow: Workflow) -> Chart { add_item(chart, workflow) }

/// Add several workflows in order; the last one ends up first in
/// `sourceCollection`.
pub fn add_workflows(chart: Chart, workflows: impl IntoIterator<Item = Workflow>) -> Chart {
  workflows.into_iter().fold(chart, add_workflow)
}

pub fn update_workflow(chart: Chart, id: &str, patch: &SourcePatch) -> Chart {
  update_item::<Workflow>(chart, id, patch)
}

pub fn remove_workflow(chart: Chart, id: &str) -> Chart { remove_item::<Workflow>(chart, id) }

/// Copy the workflow with `id` under a fresh id, with `" Copy"` appended to
/// its name.
pub fn duplicate_workflow(chart: Chart, id: &str) -> Chart {
  let Some(original) = chart.workflow(id) else {
    return chart;
  };
  let mut copy = original.clone();
  copy.set_id(Uuid::new_v4().to_string());
  copy.display.name = format!("{} Copy", copy.display.name);
  add_workflow(chart, copy)
}

// ─── Either collection ───────────────────────────────────────────────────────

/// Apply `patch` to whichever collection holds `id`.
pub fn update_chart_source(chart: Chart, id: &str, patch: &SourcePatch) -> Chart {
  if chart.time_series().iter().any(|ts| ts.id == id) {
    update_timeseries(chart, id, patch)
  } else {
    update_workflow(chart, id, patch)
  }
}

pub fn remove_source(chart: Chart, id: &str) -> Chart {
  remove_workflow(remove_timeseries(chart, id), id)
}

/// Build `sourceCollection` for charts saved before it existed: workflows
/// first, then time series, each in collection order.
pub fn initialize_source_collection(mut chart: Chart) -> Chart {
  if chart.source_collection.is_some() {
    return chart;
  }
  let entries = chart
    .workflows()
    .iter()
    .map(|w| SourceEntry::new(&w.id, SourceKind::Workflow))
    .chain(
      chart
        .time_series()
        .iter()
        .map(|ts| SourceEntry::new(&ts.id, SourceKind::Timeseries)),
    )
    .collect();
  chart.source_collection = Some(entries);
  chart
}

/// Move the `sourceCollection` entry at `from` to index `to`.
pub fn update_source_collection_order(mut chart: Chart, from: usize, to: usize) -> Chart {
  let Some(sources) = &mut chart.source_collection else {
    return chart;
  };
  if from >= sources.len() || to >= sources.len() {
    debug!(from, to, len = sources.len(), "reorder out of range ignored");
    return chart;
  }
  let entry = sources.remove(from);
  sources.insert(to, entry);
  chart
}
