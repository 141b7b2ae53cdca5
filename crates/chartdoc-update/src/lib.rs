//! Pure update functions over the chart document.
//!
//! Every function here takes a [`Chart`] by value and returns the updated
//! chart. Nothing fails: targeting an id that is not present returns the
//! chart unchanged.
//!
//! # Quick start
//!
//! ```no_run
//! use chartdoc_core::{Chart, threshold::{Threshold, ThresholdType}};
//! use chartdoc_update::{add_chart_threshold, update_chart_threshold_name};
//!
//! let chart = Chart::new("c1", "Pumps", "2021-12-13T16:00:00Z", "2021-12-13T19:00:00Z");
//! let chart = add_chart_threshold(chart, Threshold::new("t1", "High", ThresholdType::Over));
//! let chart = update_chart_threshold_name(chart, "t1", "Very high");
//! assert_eq!(chart.thresholds()[0].name, "Very high");
//! ```

pub mod axis;
pub mod collection;
pub mod duplicate;
pub mod migrate;
pub mod steps;
pub mod threshold;

pub use axis::{
  AxisRange, AxisUpdate, update_chart_date_range, update_source_axis_for_chart,
  update_visibility_for_all_sources,
};
pub use chartdoc_core::Chart;
pub use collection::{
  add_item, add_timeseries, add_workflow, add_workflows, duplicate_workflow,
  initialize_source_collection, remove_item, remove_source, remove_timeseries,
  remove_workflow, update_chart_source, update_item, update_item_with,
  update_source_collection_order, update_timeseries, update_workflow,
};
pub use duplicate::duplicate;
pub use migrate::{
  migrate, update_workflows_from_v1_to_v2, update_workflows_to_support_versions,
  upgraded_operation_name,
};
pub use steps::{ComputationStep, StepInput, steps_for_workflow};
pub use threshold::{
  add_chart_threshold, remove_chart_threshold, update_chart_threshold_event_filters,
  update_chart_threshold_lower_limit, update_chart_threshold_name,
  update_chart_threshold_properties, update_chart_threshold_selected_source,
  update_chart_threshold_type, update_chart_threshold_upper_limit,
  update_chart_threshold_visibility,
};

/// Current time as epoch milliseconds, the unit every timestamp in the
/// document uses.
pub(crate) fn now_millis() -> i64 { chrono::Utc::now().timestamp_millis() }


// ─── Shared test helpers ──────────────────────────────────────────────────────
