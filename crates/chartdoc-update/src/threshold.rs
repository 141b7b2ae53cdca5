//! Threshold add / remove and per-field setters.
//!
//! New thresholds are *prepended*. Every setter returns the chart unchanged
//! when no threshold has the given id.

use chartdoc_core::{
  Chart,
  threshold::{Threshold, ThresholdFilter, ThresholdPatch, ThresholdType},
};
use tracing::debug;

pub fn add_chart_threshold(mut chart: Chart, threshold: Threshold) -> Chart {
  chart.threshold_collection.get_or_insert_default().insert(0, threshold);
  chart
}

/// Remove every threshold with `id`.
pub fn remove_chart_threshold(mut chart: Chart, id: &str) -> Chart {
  if let Some(thresholds) = &mut chart.threshold_collection {
    thresholds.retain(|t| t.id != id);
  }
  chart
}

/// Replace the stored threshold that has `threshold.id`, keeping its slot.
fn update_chart_threshold(mut chart: Chart, threshold: Threshold) -> Chart {
  let slot = chart
    .threshold_collection
    .as_mut()
    .and_then(|all| all.iter_mut().find(|t| t.id == threshold.id));
  match slot {
    Some(slot) => *slot = threshold,
    None => debug!(id = %threshold.id, "update of unknown threshold ignored"),
  }
  chart
}

/// Look up `id`, let `f` edit a copy, and store it back. `f` returns `false`
/// to signal that nothing changed.
fn edit_threshold(chart: Chart, id: &str, f: impl FnOnce(&mut Threshold) -> bool) -> Chart {
  let Some(existing) = chart.threshold(id) else {
    return chart;
  };
  let mut edited = existing.clone();
  if !f(&mut edited) {
    return chart;
  }
  update_chart_threshold(chart, edited)
}

pub fn update_chart_threshold_name(chart: Chart, id: &str, name: &str) -> Chart {
  edit_threshold(chart, id, |t| {
    if t.name == name {
      return false;
    }
    t.name = name.to_string();
    true
  })
}

pub fn update_chart_threshold_visibility(chart: Chart, id: &str, visible: bool) -> Chart {
  edit_threshold(chart, id, |t| {
    if t.visible == visible {
      return false;
    }
    t.visible = visible;
    true
  })
}

pub fn update_chart_threshold_selected_source(chart: Chart, id: &str, source_id: &str) -> Chart {
  edit_threshold(chart, id, |t| {
    if t.source_id.as_deref() == Some(source_id) {
      return false;
    }
    t.source_id = Some(source_id.to_string());
    true
  })
}

pub fn update_chart_threshold_type(chart: Chart, id: &str, kind: ThresholdType) -> Chart {
  edit_threshold(chart, id, |t| {
    t.kind = kind;
    true
  })
}

pub fn update_chart_threshold_lower_limit(chart: Chart, id: &str, limit: f64) -> Chart {
  edit_threshold(chart, id, |t| {
    t.lower_limit = Some(limit);
    true
  })
}

pub fn update_chart_threshold_upper_limit(chart: Chart, id: &str, limit: f64) -> Chart {
  edit_threshold(chart, id, |t| {
    t.upper_limit = Some(limit);
    true
  })
}

pub fn update_chart_threshold_event_filters(
  chart: Chart,
  id: &str,
  filter: ThresholdFilter,
) -> Chart {
  edit_threshold(chart, id, |t| {
    t.filter = filter;
    true
  })
}

/// Merge several fields at once; absent fields are left as they are.
pub fn update_chart_threshold_properties(chart: Chart, id: &str, patch: &ThresholdPatch) -> Chart {
  edit_threshold(chart, id, |t| {
    t.apply(patch);
    true
  })
}
