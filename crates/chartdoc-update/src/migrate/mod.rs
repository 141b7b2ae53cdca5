//! One-shot upgraders run when a chart is loaded.
//!
//! Migrations only move documents forward: v1 workflows become v2, and v2
//! function nodes gain explicit operation versions. Nothing is ever
//! downgraded.

mod rename;
mod v1_to_v2;
mod versions;

use chartdoc_core::{Chart, operation::Operation};

pub use rename::upgraded_operation_name;
pub use v1_to_v2::update_workflows_from_v1_to_v2;
pub use versions::update_workflows_to_support_versions;

use crate::collection::initialize_source_collection;

/// Operation version assumed when a document does not name one.
pub const DEFAULT_OPERATION_VERSION: &str = "1.0";

/// The full on-load pipeline.
pub fn migrate(chart: Chart, operations: &[Operation]) -> Chart {
  let chart = initialize_source_collection(chart);
  let chart = update_workflows_from_v1_to_v2(chart, operations);
  update_workflows_to_support_versions(chart)
}
