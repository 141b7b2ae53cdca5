//! Chart — the root document aggregating sources, thresholds and settings.
//!
//! A chart is treated as a value: nothing in this workspace mutates a shared
//! chart in place. Update functions take a `Chart` and hand back a new one.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
  Result,
  source::{SourceEntry, TimeSeries},
  threshold::Threshold,
  workflow::Workflow,
};

// ─── Ownership ───────────────────────────────────────────────────────────────

/// The person who created (or duplicated) a chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
  pub id:           String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub email:        Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub display_name: Option<String>,
}

// ─── Settings ────────────────────────────────────────────────────────────────

/// Chart-wide display toggles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSettings {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub show_y_axis:    Option<bool>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub show_min_max:   Option<bool>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub show_gridlines: Option<bool>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub merge_units:    Option<bool>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub auto_align:     Option<bool>,
  #[serde(flatten)]
  pub extra:          Map<String, Value>,
}

// ─── Chart ───────────────────────────────────────────────────────────────────

/// A user's saved chart.
///
/// The collections are optional on the wire; `None` and an empty vector both
/// mean "no entries". Keys this type does not model are kept in `extra` so a
/// load/save cycle never drops data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chart {
  pub id:                     String,
  /// Document schema version.
  pub version:                u32,
  pub name:                   String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub user:                   Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub user_info:              Option<UserInfo>,
  /// Epoch milliseconds.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub created_at:             Option<i64>,
  /// Epoch milliseconds.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub updated_at:             Option<i64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub public:                 Option<bool>,
  /// Start of the visible window (ISO-8601).
  pub date_from:              String,
  /// End of the visible window (ISO-8601).
  pub date_to:                String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub settings:               Option<ChartSettings>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub time_series_collection: Option<Vec<TimeSeries>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub workflow_collection:    Option<Vec<Workflow>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub threshold_collection:   Option<Vec<Threshold>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub source_collection:      Option<Vec<SourceEntry>>,
  #[serde(flatten)]
  pub extra:                  Map<String, Value>,
}

impl Chart {
  /// An empty chart with the given identity and window.
  pub fn new(
    id: impl Into<String>,
    name: impl Into<String>,
    date_from: impl Into<String>,
    date_to: impl Into<String>,
  ) -> Self {
    Self {
      id: id.into(),
      version: 1,
      name: name.into(),
      user: None,
      user_info: None,
      created_at: None,
      updated_at: None,
      public: None,
      date_from: date_from.into(),
      date_to: date_to.into(),
      settings: None,
      time_series_collection: None,
      workflow_collection: None,
      threshold_collection: None,
      source_collection: None,
      extra: Map::new(),
    }
  }

  pub fn from_json(input: &str) -> Result<Self> { Ok(serde_json::from_str(input)?) }

  pub fn to_json(&self, pretty: bool) -> Result<String> {
    let out = if pretty {
      serde_json::to_string_pretty(self)?
    } else {
      serde_json::to_string(self)?
    };
    Ok(out)
  }

  pub fn time_series(&self) -> &[TimeSeries] {
    self.time_series_collection.as_deref().unwrap_or_default()
  }

  pub fn workflows(&self) -> &[Workflow] {
    self.workflow_collection.as_deref().unwrap_or_default()
  }

  pub fn thresholds(&self) -> &[Threshold] {
    self.threshold_collection.as_deref().unwrap_or_default()
  }

  pub fn sources(&self) -> &[SourceEntry] {
    self.source_collection.as_deref().unwrap_or_default()
  }

  pub fn threshold(&self, id: &str) -> Option<&Threshold> {
    self.thresholds().iter().find(|t| t.id == id)
  }

  pub fn workflow(&self, id: &str) -> Option<&Workflow> {
    self.workflows().iter().find(|w| w.id == id)
  }
}

/// Parse an ISO-8601 timestamp as stored in `dateFrom`/`dateTo`.
///
/// Values without an offset, and bare dates, are read as UTC.
pub fn parse_instant(value: &str) -> Option<DateTime<Utc>> {
  if let Ok(d) = DateTime::parse_from_rfc3339(value) {
    return Some(d.with_timezone(&Utc));
  }
  if let Ok(d) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
    return Some(d.and_utc());
  }
  NaiveDate::parse_from_str(value, "%Y-%m-%d")
    .ok()
    .and_then(|d| d.and_hms_opt(0, 0, 0))
    .map(|d| d.and_utc())
}
