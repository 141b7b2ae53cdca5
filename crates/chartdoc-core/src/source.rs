//! Plottable sources — time series and calculation workflows — and the trait
//! that lets the update layer treat both collections uniformly.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Chart, Error, workflow::Workflow};

// ─── Kind ────────────────────────────────────────────────────────────────────

/// Which typed collection a source lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
  Timeseries,
  Workflow,
}

impl SourceKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Timeseries => "timeseries",
      Self::Workflow => "workflow",
    }
  }
}

impl fmt::Display for SourceKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for SourceKind {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "timeseries" => Ok(Self::Timeseries),
      "workflow" => Ok(Self::Workflow),
      other => Err(Error::UnknownSourceKind(other.to_string())),
    }
  }
}

/// One row of the denormalised `sourceCollection` ordering index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceEntry {
  pub id:   String,
  #[serde(rename = "type")]
  pub kind: SourceKind,
}

impl SourceEntry {
  pub fn new(id: impl Into<String>, kind: SourceKind) -> Self {
    Self { id: id.into(), kind }
  }
}

// ─── Shared display fields ───────────────────────────────────────────────────

/// Appearance and axis fields common to time series and workflows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDisplay {
  #[serde(default)]
  pub name:           String,
  #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
  pub kind:           Option<SourceKind>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub color:          Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub line_style:     Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub line_weight:    Option<f64>,
  #[serde(default = "enabled_by_default")]
  pub enabled:        bool,
  /// Y-axis bounds `[min, max]`.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub range:          Option<[f64; 2]>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub unit:           Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub preferred_unit: Option<String>,
  /// Epoch milliseconds.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub created_at:     Option<i64>,
}

fn enabled_by_default() -> bool { true }

impl SourceDisplay {
  pub fn named(name: impl Into<String>) -> Self {
    Self {
      name:           name.into(),
      kind:           None,
      color:          None,
      line_style:     None,
      line_weight:    None,
      enabled:        true,
      range:          None,
      unit:           None,
      preferred_unit: None,
      created_at:     None,
    }
  }

  /// Shallow-merge every field present in `patch`.
  pub fn apply(&mut self, patch: &SourcePatch) {
    if let Some(name) = &patch.name {
      self.name = name.clone();
    }
    if let Some(color) = &patch.color {
      self.color = Some(color.clone());
    }
    if let Some(line_style) = &patch.line_style {
      self.line_style = Some(line_style.clone());
    }
    if let Some(line_weight) = patch.line_weight {
      self.line_weight = Some(line_weight);
    }
    if let Some(enabled) = patch.enabled {
      self.enabled = enabled;
    }
    if let Some(range) = patch.range {
      self.range = Some(range);
    }
    if let Some(unit) = &patch.unit {
      self.unit = Some(unit.clone());
    }
    if let Some(preferred_unit) = &patch.preferred_unit {
      self.preferred_unit = Some(preferred_unit.clone());
    }
  }
}

/// A partial update for a source; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SourcePatch {
  pub name:           Option<String>,
  pub color:          Option<String>,
  pub line_style:     Option<String>,
  pub line_weight:    Option<f64>,
  pub enabled:        Option<bool>,
  pub range:          Option<[f64; 2]>,
  pub unit:           Option<String>,
  pub preferred_unit: Option<String>,
}

// ─── Time series ─────────────────────────────────────────────────────────────

/// A reference to an external time series bound into the chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeries {
  /// Local id, unique within `timeSeriesCollection`.
  pub id:             String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub ts_id:          Option<i64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub ts_external_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub original_unit:  Option<String>,
  #[serde(flatten)]
  pub display:        SourceDisplay,
  #[serde(flatten)]
  pub extra:          Map<String, Value>,
}

impl TimeSeries {
  pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
    Self {
      id:             id.into(),
      ts_id:          None,
      ts_external_id: None,
      original_unit:  None,
      display:        SourceDisplay::named(name),
      extra:          Map::new(),
    }
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// A member of one of the two typed source collections on a [`Chart`].
///
/// The update layer is written once against this trait and instantiated for
/// [`TimeSeries`] and [`Workflow`].
pub trait ChartSource: Clone {
  const KIND: SourceKind;

  fn id(&self) -> &str;

  fn set_id(&mut self, id: String);

  fn display(&self) -> &SourceDisplay;

  fn display_mut(&mut self) -> &mut SourceDisplay;

  /// The typed collection on `chart` that holds this kind of source.
  fn collection(chart: &Chart) -> &[Self];

  fn collection_mut(chart: &mut Chart) -> &mut Option<Vec<Self>>;

  /// Stamp the wire `type` tag with [`Self::KIND`].
  fn set_kind(&mut self) { self.display_mut().kind = Some(Self::KIND); }

  fn apply(&mut self, patch: &SourcePatch) { self.display_mut().apply(patch); }

  fn set_range(&mut self, range: [f64; 2]) { self.display_mut().range = Some(range); }

  fn set_enabled(&mut self, enabled: bool) { self.display_mut().enabled = enabled; }
}

impl ChartSource for TimeSeries {
  const KIND: SourceKind = SourceKind::Timeseries;

  fn id(&self) -> &str { &self.id }

  fn set_id(&mut self, id: String) { self.id = id; }

  fn display(&self) -> &SourceDisplay { &self.display }

  fn display_mut(&mut self) -> &mut SourceDisplay { &mut self.display }

  fn collection(chart: &Chart) -> &[Self] { chart.time_series() }

  fn collection_mut(chart: &mut Chart) -> &mut Option<Vec<Self>> {
    &mut chart.time_series_collection
  }
}

impl ChartSource for Workflow {
  const KIND: SourceKind = SourceKind::Workflow;

  fn id(&self) -> &str { &self.id }

  fn set_id(&mut self, id: String) { self.id = id; }

  fn display(&self) -> &SourceDisplay { &self.display }

  fn display_mut(&mut self) -> &mut SourceDisplay { &mut self.display }

  fn collection(chart: &Chart) -> &[Self] { chart.workflows() }

  fn collection_mut(chart: &mut Chart) -> &mut Option<Vec<Self>> {
    &mut chart.workflow_collection
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn time_series_keeps_unmodelled_fields() {
    let input = json!({
      "id": "e050",
      "name": "VAL_21_PI_1019_04:Z.X.Value",
      "type": "timeseries",
      "tsId": 7659541038688891_i64,
      "tsExternalId": "VAL_21_PI_1019_04:Z.X.Value",
      "color": "#6929c4",
      "enabled": true,
      "range": [0.00226, 0.00307],
      "displayMode": "lines",
      "description": "-",
    });
    let ts: TimeSeries = serde_json::from_value(input.clone()).unwrap();
    assert_eq!(ts.display.kind, Some(SourceKind::Timeseries));
    assert_eq!(ts.display.range, Some([0.00226, 0.00307]));
    assert_eq!(ts.extra.get("displayMode"), Some(&json!("lines")));
    assert_eq!(serde_json::to_value(&ts).unwrap(), input);
  }

  #[test]
  fn patch_only_touches_present_fields() {
    let mut display = SourceDisplay::named("ts1");
    display.color = Some("red".into());
    display.apply(&SourcePatch {
      color: Some("blue".into()),
      enabled: Some(false),
      ..SourcePatch::default()
    });
    assert_eq!(display.name, "ts1");
    assert_eq!(display.color.as_deref(), Some("blue"));
    assert!(!display.enabled);
  }

  #[test]
  fn source_kind_parses_wire_names() {
    assert_eq!("workflow".parse::<SourceKind>().unwrap(), SourceKind::Workflow);
    assert!(matches!(
      "chart".parse::<SourceKind>(),
      Err(Error::UnknownSourceKind(_))
    ));
  }
}
