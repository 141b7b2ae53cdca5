use chartdoc_core::{
  Chart,
  workflow::{FlowElement, FlowNode, FunctionNodeData, NodeKind, SelectedOperation},
};
use tracing::debug;

use super::DEFAULT_OPERATION_VERSION;

/// Placeholder version written by documents saved before operations were
/// versioned.
const UNVERSIONED: &str = "0.0";

/// Give every function node of every v2 workflow an explicit operation and
/// version, and copy legacy parameter values across.
pub fn update_workflows_to_support_versions(mut chart: Chart) -> Chart {
  let workflows = chart.workflow_collection.iter_mut().flatten();
  for workflow in workflows.filter(|w| w.is_v2()) {
    let Some(flow) = &mut workflow.flow else {
      continue;
    };
    for element in &mut flow.elements {
      if let FlowElement::Node(FlowNode {
        id,
        kind: NodeKind::Function(data),
        ..
      }) = element
      {
        normalize_function(id, data);
      }
    }
  }
  chart
}

fn normalize_function(id: &str, data: &mut FunctionNodeData) {
  if let Some(selected) = &mut data.selected_operation {
    match selected.version.as_deref() {
      None | Some(UNVERSIONED) => {
        selected.version = Some(DEFAULT_OPERATION_VERSION.to_string());
      }
      Some(_) => {}
    }
  } else if let Some(op) = data.tool_function.as_ref().and_then(|t| t.op.clone()) {
    debug!(node = id, op, "selected operation taken from legacy tool function");
    data.selected_operation = Some(SelectedOperation {
      op,
      version: Some(DEFAULT_OPERATION_VERSION.to_string()),
    });
  } else {
    return;
  }

  if data.parameter_values.is_none() {
    data.parameter_values = data.function_data.clone();
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;
  use crate::test_helpers::empty_chart;

  fn function_element(id: &str, data: serde_json::Value) -> serde_json::Value {
    json!({
      "id": id,
      "type": "ToolboxFunction",
      "position": { "x": 0.0, "y": 0.0 },
      "data": data,
    })
  }

  fn chart_with_elements(elements: Vec<serde_json::Value>) -> Chart {
    let mut chart = empty_chart();
    chart.workflow_collection = Some(vec![
      serde_json::from_value(json!({
        "id": "wf",
        "name": "calc",
        "version": "v2",
        "flow": { "position": [0, 0], "zoom": 1, "elements": elements },
      }))
      .unwrap(),
    ]);
    chart
  }

  fn selected(chart: &Chart, index: usize) -> Option<&SelectedOperation> {
    let flow = chart.workflows()[0].flow.as_ref().unwrap();
    let NodeKind::Function(data) = &flow.nodes().nth(index).unwrap().kind else {
      panic!("expected function node")
    };
    data.selected_operation.as_ref()
  }

  #[test]
  fn versions_are_filled_and_normalised() {
    let chart = chart_with_elements(vec![
      function_element("a", json!({ "selectedOperation": { "op": "wavelet_filter" } })),
      function_element("b", json!({ "selectedOperation": { "op": "wavelet_filter", "version": "0.0" } })),
      function_element("c", json!({ "selectedOperation": { "op": "wavelet_filter", "version": "2.0" } })),
    ]);
    let chart = update_workflows_to_support_versions(chart);

    assert_eq!(selected(&chart, 0).unwrap().version.as_deref(), Some("1.0"));
    assert_eq!(selected(&chart, 1).unwrap().version.as_deref(), Some("1.0"));
    assert_eq!(selected(&chart, 2).unwrap().version.as_deref(), Some("2.0"));
  }

  #[test]
  fn legacy_tool_function_is_promoted() {
    let chart = chart_with_elements(vec![function_element(
      "a",
      json!({
        "functionData": { "level": 2, "wavelet": "db8" },
        "toolFunction": { "op": "wavelet_filter" },
      }),
    )]);
    let chart = update_workflows_to_support_versions(chart);

    assert_eq!(
      selected(&chart, 0),
      Some(&SelectedOperation {
        op:      "wavelet_filter".into(),
        version: Some("1.0".into()),
      })
    );
    let flow = chart.workflows()[0].flow.as_ref().unwrap();
    let NodeKind::Function(data) = &flow.nodes().next().unwrap().kind else {
      panic!("expected function node")
    };
    assert_eq!(
      data.parameter_values.as_ref().and_then(|p| p.get("wavelet")),
      Some(&json!("db8"))
    );
    // Legacy fields stay in place.
    assert!(data.tool_function.is_some());
    assert!(data.function_data.is_some());
  }

  #[test]
  fn existing_parameter_values_win() {
    let chart = chart_with_elements(vec![function_element(
      "a",
      json!({
        "functionData": { "level": 2 },
        "parameterValues": { "level": 5 },
        "selectedOperation": { "op": "wavelet_filter", "version": "1.0" },
      }),
    )]);
    let chart = update_workflows_to_support_versions(chart);
    let flow = chart.workflows()[0].flow.as_ref().unwrap();
    let NodeKind::Function(data) = &flow.nodes().next().unwrap().kind else {
      panic!("expected function node")
    };
    assert_eq!(data.parameter_values.as_ref().unwrap().get("level"), Some(&json!(5)));
  }

  #[test]
  fn nodes_without_any_operation_are_untouched() {
    let before = chart_with_elements(vec![function_element("a", json!({ "toolFunction": {} }))]);
    let after = update_workflows_to_support_versions(before.clone());
    assert_eq!(after, before);
  }

  #[test]
  fn legacy_workflows_are_skipped() {
    let mut before = empty_chart();
    before.workflow_collection = Some(vec![
      serde_json::from_value(json!({ "id": "old", "version": "", "nodes": [], "connections": {} }))
        .unwrap(),
    ]);
    let after = update_workflows_to_support_versions(before.clone());
    assert_eq!(after, before);
  }
}
