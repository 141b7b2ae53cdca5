use chartdoc_core::{
  Chart,
  operation::{AUTO_ALIGN_PARAM, Operation, find_operation_ignore_case},
  source::{SourceKind, TimeSeries},
  workflow::{
    ConstantNodeData, Flow, FlowEdge, FlowElement, FlowNode, FunctionNodeData, LegacyNode,
    NodeEffect, NodeKind, Position, SelectedOperation, SourceNodeData, Workflow,
    WorkflowSettings, WorkflowVersion,
  },
};
use serde_json::{Map, Value};
use tracing::debug;

use super::{DEFAULT_OPERATION_VERSION, rename::upgraded_operation_name};

/// Key inside a legacy node's `functionData` that names its operation; every
/// other key is a parameter value.
const TOOL_FUNCTION_KEY: &str = "toolFunction";

/// Convert every v1 workflow to the v2 flow layout. The legacy `nodes` and
/// `connections` are kept alongside the new `flow`.
///
/// Nodes whose reference is unknown, or whose operation is not in
/// `operations`, are dropped. Edges are always carried over.
pub fn update_workflows_from_v1_to_v2(mut chart: Chart, operations: &[Operation]) -> Chart {
  let Some(mut workflows) = chart.workflow_collection.take() else {
    return chart;
  };
  for workflow in workflows.iter_mut().filter(|w| !w.is_v2()) {
    convert_workflow(workflow, chart.time_series(), operations);
  }
  chart.workflow_collection = Some(workflows);
  chart
}

fn convert_workflow(workflow: &mut Workflow, time_series: &[TimeSeries], operations: &[Operation]) {
  let edges = workflow.legacy_connections().iter().map(|c| {
    FlowElement::Edge(FlowEdge::new(
      &c.id,
      &c.output_pin.node_id,
      Some(c.output_pin.pin_id.clone()),
      &c.input_pin.node_id,
      Some(c.input_pin.pin_id.clone()),
    ))
  });
  let nodes = workflow
    .legacy_nodes()
    .iter()
    .filter_map(|node| convert_node(node, time_series, operations))
    .map(FlowElement::Node);
  let elements: Vec<_> = edges.chain(nodes).collect();

  debug!(
    workflow = %workflow.id,
    elements = elements.len(),
    legacy_nodes = workflow.legacy_nodes().len(),
    "converted workflow to v2"
  );

  workflow.version = Some(WorkflowVersion::V2);
  workflow.flow = Some(Flow {
    elements,
    ..Flow::default()
  });
  workflow.settings = Some(WorkflowSettings::default());
}

fn convert_node(
  node: &LegacyNode,
  time_series: &[TimeSeries],
  operations: &[Operation],
) -> Option<FlowNode> {
  let Some(effect) = node.effect() else {
    debug!(
      node = %node.id,
      reference = ?node.function_effect_reference,
      "dropping node with unknown reference"
    );
    return None;
  };

  let kind = match effect {
    NodeEffect::Constant => NodeKind::Constant(ConstantNodeData {
      value: node
        .function_data
        .as_ref()
        .and_then(|d| d.get("value"))
        .cloned()
        .unwrap_or_default(),
      extra: Map::new(),
    }),
    NodeEffect::SourceReference => {
      let source_type = node.data_str("type").unwrap_or_default();
      let source_id = node.data_str("sourceId").unwrap_or_default();
      let selected_source_id = if source_type == SourceKind::Timeseries.as_str() {
        resolve_external_id(time_series, source_id)
      } else {
        source_id.to_string()
      };
      NodeKind::Input(SourceNodeData {
        selected_source_id,
        source_type: source_type.to_string(),
        extra: Map::new(),
      })
    }
    NodeEffect::TimeSeriesReference => {
      let external_id = node
        .data_str("timeSeriesExternalId")
        .or_else(|| node.data_str("timeseriesExternalId"))
        .unwrap_or_default();
      NodeKind::Input(SourceNodeData {
        selected_source_id: resolve_external_id(time_series, external_id),
        source_type:        SourceKind::Timeseries.to_string(),
        extra:              Map::new(),
      })
    }
    NodeEffect::ToolboxFunction => NodeKind::Function(convert_function(node, operations)?),
    NodeEffect::Output => NodeKind::Output,
  };

  let position = Position {
    x: node.x.unwrap_or_default(),
    y: node.y.unwrap_or_default(),
  };
  Some(FlowNode::new(&node.id, position, kind))
}

/// The local id of the time series with `external_id`, or the external id
/// itself when the chart has no such series.
fn resolve_external_id(time_series: &[TimeSeries], external_id: &str) -> String {
  time_series
    .iter()
    .find(|ts| ts.ts_external_id.as_deref() == Some(external_id))
    .map_or_else(|| external_id.to_string(), |ts| ts.id.clone())
}

fn convert_function(node: &LegacyNode, operations: &[Operation]) -> Option<FunctionNodeData> {
  let legacy = node.function_data.as_ref();
  let tool = legacy.and_then(|d| d.get(TOOL_FUNCTION_KEY));

  let Some(op) = tool.and_then(|t| t.get("op")).and_then(Value::as_str) else {
    debug!(node = %node.id, "dropping function node without an operation");
    return None;
  };
  // Legacy upper-case keys survive; only renamed operations change.
  let op = upgraded_operation_name(op);
  let Some(operation) = find_operation_ignore_case(operations, op) else {
    debug!(node = %node.id, op, "dropping function node with unknown operation");
    return None;
  };

  let requested = tool.and_then(|t| t.get("version")).and_then(Value::as_str);
  let version = requested
    .filter(|v| operation.find_version(v).is_some())
    .map(str::to_string)
    .or_else(|| operation.oldest_version().map(|v| v.version.clone()))
    .unwrap_or_else(|| DEFAULT_OPERATION_VERSION.to_string());

  let own: Map<String, Value> = legacy
    .into_iter()
    .flatten()
    .filter(|(key, _)| key.as_str() != TOOL_FUNCTION_KEY)
    .map(|(key, value)| (key.clone(), value.clone()))
    .collect();
  let parameter_values = if own.is_empty() {
    default_parameters(operation)
  } else {
    own
  };

  Some(FunctionNodeData {
    selected_operation: Some(SelectedOperation {
      op:      op.to_string(),
      version: Some(version),
    }),
    parameter_values: Some(parameter_values),
    ..FunctionNodeData::default()
  })
}

/// Defaults of the oldest version's parameters. The auto-align parameter is
/// driven by workflow settings and parameters without a default are left out.
fn default_parameters(operation: &Operation) -> Map<String, Value> {
  operation
    .oldest_version()
    .map(|v| v.parameters.as_slice())
    .unwrap_or_default()
    .iter()
    .filter(|p| p.param != AUTO_ALIGN_PARAM)
    .filter_map(|p| Some((p.param.clone(), p.default_value.clone()?)))
    .collect()
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;
  use crate::test_helpers::operations;

  /// A chart holding one v1 workflow built from `nodes` and `connections`,
  /// plus the two time series the source nodes refer to.
  fn legacy_chart(nodes: Value, connections: Value) -> Chart {
    serde_json::from_value(json!({
      "id": "8e0342c5-dd24-42b8-9b9d-a71ff86ced9d",
      "version": 1,
      "name": "New chart",
      "dateFrom": "2022-01-30T23:00:27.249Z",
      "dateTo": "2022-03-02T22:59:27.249Z",
      "timeSeriesCollection": [
        {
          "id": "e050378a-42e0-4a7e-b0c2-7ad1f2512f78",
          "name": "VAL_21_PI_1019_04:Z.X.Value",
          "type": "timeseries",
          "tsExternalId": "VAL_21_PI_1019_04:Z.X.Value",
          "enabled": true,
        },
        {
          "id": "77e94c4b-f530-4d1e-a026-be174f0f55bd",
          "name": "VAL_21_PT_1019_04:Z.X.Value",
          "type": "timeseries",
          "tsExternalId": "VAL_21_PT_1019_04:Z.X.Value",
          "enabled": true,
        },
      ],
      "workflowCollection": [{
        "id": "7effb0fc-dcf7-4a37-8dc9-b4db561082e8",
        "name": "New Calculation",
        "type": "workflow",
        "version": "",
        "calls": [],
        "nodes": nodes,
        "connections": connections,
      }],
    }))
    .unwrap()
  }

  fn source_node(id: &str, data: Value, x: f64, y: f64) -> Value {
    let reference = if data.get("sourceId").is_some() {
      "SOURCE_REFERENCE"
    } else {
      "TIME_SERIES_REFERENCE"
    };
    json!({
      "id": id,
      "functionEffectReference": reference,
      "functionData": data,
      "x": x,
      "y": y,
      "inputPins": [],
      "outputPins": [{ "id": "result", "type": "TIMESERIES" }],
    })
  }

  fn converted(chart: &Chart) -> &Flow {
    let workflow = &chart.workflows()[0];
    assert!(workflow.is_v2());
    workflow.flow.as_ref().unwrap()
  }

  #[test]
  fn connections_become_edges_ahead_of_nodes() {
    let chart = legacy_chart(
      json!([
        source_node(
          "d0d8a17f",
          json!({ "type": "timeseries", "sourceId": "VAL_21_PT_1019_04:Z.X.Value" }),
          77.0,
          225.0,
        ),
        {
          "id": "284f5de8",
          "functionEffectReference": "TOOLBOX_FUNCTION",
          "functionData": { "toolFunction": { "op": "ADD", "version": "1.0" } },
          "x": 448.0,
          "y": 33.0,
        },
        {
          "id": "6e6eea91",
          "functionEffectReference": "OUTPUT",
          "x": 1128.0,
          "y": 128.0,
          "inputPins": [{ "id": "datapoints", "types": ["TIMESERIES"] }],
        },
      ]),
      json!({
        "Itjm1x9uLqvoxCv3AG9oo": {
          "id": "Itjm1x9uLqvoxCv3AG9oo",
          "outputPin": { "pinId": "result", "nodeId": "d0d8a17f" },
          "inputPin": { "pinId": "b", "nodeId": "284f5de8" },
        },
        "3EihQBpDy9ex-Uu5gcUxm": {
          "id": "3EihQBpDy9ex-Uu5gcUxm",
          "inputPin": { "pinId": "datapoints", "nodeId": "6e6eea91" },
          "outputPin": { "nodeId": "284f5de8", "pinId": "out-result" },
        },
      }),
    );

    let chart = update_workflows_from_v1_to_v2(chart, &operations());
    let workflow = &chart.workflows()[0];
    assert_eq!(workflow.settings.as_ref().map(|s| s.auto_align), Some(true));
    assert_eq!(workflow.legacy_nodes().len(), 3);
    assert_eq!(workflow.legacy_connections().len(), 2);

    let flow = converted(&chart);
    assert_eq!(flow.position, [0.0, 0.0]);
    assert_eq!(flow.zoom, 1.0);
    // `json!` objects iterate in key order, so the connections arrive sorted.
    let ids: Vec<_> = flow.elements.iter().map(FlowElement::id).collect();
    assert_eq!(ids, [
      "3EihQBpDy9ex-Uu5gcUxm",
      "Itjm1x9uLqvoxCv3AG9oo",
      "d0d8a17f",
      "284f5de8",
      "6e6eea91",
    ]);

    let edge = flow.edges().nth(1).unwrap();
    assert_eq!(edge.source, "d0d8a17f");
    assert_eq!(edge.source_handle.as_deref(), Some("result"));
    assert_eq!(edge.target, "284f5de8");
    assert_eq!(edge.target_handle.as_deref(), Some("b"));

    let serialized = serde_json::to_value(flow.nodes().nth(1).unwrap()).unwrap();
    assert_eq!(
      serialized,
      json!({
        "id": "284f5de8",
        "type": "ToolboxFunction",
        "position": { "x": 448.0, "y": 33.0 },
        "data": {
          "selectedOperation": { "op": "ADD", "version": "1.0" },
          "parameterValues": {},
        },
      })
    );
    let output = serde_json::to_value(flow.nodes().nth(2).unwrap()).unwrap();
    assert_eq!(
      output,
      json!({
        "id": "6e6eea91",
        "type": "CalculationOutput",
        "position": { "x": 1128.0, "y": 128.0 },
      })
    );
  }

  #[test]
  fn external_ids_resolve_to_local_time_series() {
    let chart = legacy_chart(
      json!([
        source_node(
          "src",
          json!({ "type": "timeseries", "sourceId": "VAL_21_PI_1019_04:Z.X.Value" }),
          11.0,
          112.0,
        ),
        source_node(
          "lower",
          json!({ "timeseriesExternalId": "VAL_21_PI_1019_04:Z.X.Value" }),
          11.0,
          112.0,
        ),
        source_node(
          "camel",
          json!({ "timeSeriesExternalId": "VAL_21_PT_1019_04:Z.X.Value" }),
          11.0,
          112.0,
        ),
        source_node(
          "unknown",
          json!({ "type": "timeseries", "sourceId": "NOT_IN_CHART" }),
          0.0,
          0.0,
        ),
      ]),
      json!({}),
    );

    let chart = update_workflows_from_v1_to_v2(chart, &operations());
    let selected: Vec<_> = converted(&chart)
      .nodes()
      .map(|n| n.kind.source_data().unwrap().selected_source_id.as_str())
      .collect();
    assert_eq!(selected, [
      "e050378a-42e0-4a7e-b0c2-7ad1f2512f78",
      "e050378a-42e0-4a7e-b0c2-7ad1f2512f78",
      "77e94c4b-f530-4d1e-a026-be174f0f55bd",
      "NOT_IN_CHART",
    ]);
    assert!(
      converted(&chart)
        .nodes()
        .all(|n| n.kind.source_data().unwrap().kind() == Some(SourceKind::Timeseries))
    );
  }

  #[test]
  fn empty_source_and_function_nodes() {
    let chart = legacy_chart(
      json!([
        source_node("ba550fc4", json!({ "sourceId": "", "type": "" }), 142.0, 113.0),
        {
          "id": "a1df3603",
          "functionEffectReference": "TOOLBOX_FUNCTION",
          "functionData": { "toolFunction": {} },
          "x": 483.0,
          "y": 193.0,
          "inputPins": [],
          "outputPins": [],
        },
        {
          "id": "268b60f5",
          "functionEffectReference": "OUTPUT",
          "x": 800.0,
          "y": 123.0,
        },
      ]),
      json!([]),
    );

    let chart = update_workflows_from_v1_to_v2(chart, &operations());
    let flow = converted(&chart);
    assert_eq!(flow.edges().count(), 0);
    assert_eq!(
      serde_json::to_value(&flow.elements).unwrap(),
      json!([
        {
          "id": "ba550fc4",
          "type": "CalculationInput",
          "position": { "x": 142.0, "y": 113.0 },
          "data": { "selectedSourceId": "", "type": "" },
        },
        {
          "id": "268b60f5",
          "type": "CalculationOutput",
          "position": { "x": 800.0, "y": 123.0 },
        },
      ])
    );
  }

  #[test]
  fn constants_and_parameters() {
    let chart = legacy_chart(
      json!([
        {
          "id": "const",
          "functionEffectReference": "CONSTANT",
          "functionData": { "value": 20 },
          "x": 96.0,
          "y": 332.0,
        },
        {
          "id": "resample",
          "functionEffectReference": "TOOLBOX_FUNCTION",
          "functionData": { "toolFunction": { "op": "RESAMPLE", "version": "9.9" } },
        },
        {
          "id": "smooth",
          "functionEffectReference": "TOOLBOX_FUNCTION",
          "functionData": { "toolFunction": { "op": "SG_SMOOTHER" }, "polyorder": 3 },
        },
        {
          "id": "mystery",
          "functionEffectReference": "TOOLBOX_FUNCTION",
          "functionData": { "toolFunction": { "op": "NO_SUCH_OP" } },
        },
        { "id": "plot", "functionEffectReference": "PLOT" },
      ]),
      json!({}),
    );

    let chart = update_workflows_from_v1_to_v2(chart, &operations());
    let nodes: Vec<_> = converted(&chart).nodes().collect();
    assert_eq!(nodes.len(), 3);

    let NodeKind::Constant(constant) = &nodes[0].kind else {
      panic!("expected constant")
    };
    assert_eq!(constant.value, json!(20));

    let NodeKind::Function(resample) = &nodes[1].kind else {
      panic!("expected function")
    };
    assert_eq!(
      resample.selected_operation,
      Some(SelectedOperation {
        op:      "resample_to_granularity".into(),
        version: Some("1.0".into()),
      })
    );
    assert_eq!(
      resample.parameter_values,
      Some(
        json!({ "granularity": "1h", "aggregate": "mean" })
          .as_object()
          .cloned()
          .unwrap()
      )
    );
    assert_eq!(nodes[1].position, Position::default());

    let NodeKind::Function(smooth) = &nodes[2].kind else {
      panic!("expected function")
    };
    assert_eq!(smooth.selected_operation.as_ref().map(|s| s.op.as_str()), Some("sg"));
    assert_eq!(
      smooth.parameter_values,
      Some(json!({ "polyorder": 3 }).as_object().cloned().unwrap())
    );
  }

  #[test]
  fn v2_workflows_are_left_alone() {
    let mut chart = legacy_chart(json!([]), json!({}));
    chart.workflow_collection = Some(vec![Workflow::new_v2("w", "already new")]);
    let before = chart.clone();
    assert_eq!(update_workflows_from_v1_to_v2(chart, &operations()), before);
  }
}
