//! Horizontal threshold lines drawn against a source.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumString};

/// Which side of the limit(s) counts as an event.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ThresholdType {
  Under,
  Over,
  Between,
}

/// Minimum / maximum event duration filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdFilter {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub min_value: Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub max_value: Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub min_unit:  Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub max_unit:  Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Threshold {
  pub id:          String,
  pub name:        String,
  pub visible:     bool,
  /// Time series or workflow the threshold applies to.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub source_id:   Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub upper_limit: Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub lower_limit: Option<f64>,
  #[serde(rename = "type")]
  pub kind:        ThresholdType,
  #[serde(default)]
  pub filter:      ThresholdFilter,
  #[serde(flatten)]
  pub extra:       Map<String, Value>,
}

impl Threshold {
  pub fn new(id: impl Into<String>, name: impl Into<String>, kind: ThresholdType) -> Self {
    Self {
      id: id.into(),
      name: name.into(),
      visible: true,
      source_id: None,
      upper_limit: None,
      lower_limit: None,
      kind,
      filter: ThresholdFilter::default(),
      extra: Map::new(),
    }
  }

  /// Merge every field present in `patch`.
  pub fn apply(&mut self, patch: &ThresholdPatch) {
    if let Some(name) = &patch.name {
      self.name = name.clone();
    }
    if let Some(visible) = patch.visible {
      self.visible = visible;
    }
    if let Some(source_id) = &patch.source_id {
      self.source_id = Some(source_id.clone());
    }
    if let Some(upper) = patch.upper_limit {
      self.upper_limit = Some(upper);
    }
    if let Some(lower) = patch.lower_limit {
      self.lower_limit = Some(lower);
    }
    if let Some(kind) = patch.kind {
      self.kind = kind;
    }
    if let Some(filter) = &patch.filter {
      self.filter = filter.clone();
    }
  }
}

/// A partial update for a threshold; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ThresholdPatch {
  pub name:        Option<String>,
  pub visible:     Option<bool>,
  pub source_id:   Option<String>,
  pub upper_limit: Option<f64>,
  pub lower_limit: Option<f64>,
  #[serde(rename = "type")]
  pub kind:        Option<ThresholdType>,
  pub filter:      Option<ThresholdFilter>,
}
