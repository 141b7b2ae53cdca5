//! Copying a chart into another user's ownership.

use chartdoc_core::{Chart, chart::UserInfo};
use uuid::Uuid;

use crate::now_millis;

/// Deep copy `chart` for `user`: fresh id and timestamps, `" Copy"` name
/// suffix, private. Dates, version and every collection are kept.
pub fn duplicate(chart: Chart, user: &UserInfo) -> Chart {
  let now = now_millis();
  Chart {
    id: Uuid::new_v4().to_string(),
    name: format!("{} Copy", chart.name),
    user: Some(user.id.clone()),
    user_info: Some(user.clone()),
    created_at: Some(now),
    updated_at: Some(now),
    public: Some(false),
    ..chart
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test_helpers::populated_chart;

  #[test]
  fn duplicate_resets_ownership_and_identity() {
    let mut original = populated_chart();
    original.public = Some(true);
    original.user = Some("someone-else".into());
    original.created_at = Some(1_647_350_374_178);

    let user = UserInfo {
      id:           "user-1".into(),
      email:        Some("user-1@example.com".into()),
      display_name: None,
    };
    let copy = duplicate(original.clone(), &user);

    assert_ne!(copy.id, original.id);
    assert_eq!(copy.name, "Demo: Power Consumption Copy");
    assert_eq!(copy.public, Some(false));
    assert_eq!(copy.user.as_deref(), Some("user-1"));
    assert_eq!(copy.user_info, Some(user));
    assert!(copy.created_at > original.created_at);
    assert_eq!(copy.created_at, copy.updated_at);

    assert_eq!(copy.date_from, original.date_from);
    assert_eq!(copy.date_to, original.date_to);
    assert_eq!(copy.version, original.version);
    assert_eq!(copy.time_series_collection, original.time_series_collection);
    assert_eq!(copy.workflow_collection, original.workflow_collection);
    assert_eq!(copy.threshold_collection, original.threshold_collection);
  }
}
