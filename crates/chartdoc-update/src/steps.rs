//! Compile a v2 workflow into the ordered step list a calculation backend
//! runs.
//!
//! Steps are found by walking backwards from the output node, so anything
//! not feeding the output is ignored. Referenced calculations (input nodes
//! pointing at another workflow) are inlined first.

use std::collections::HashSet;

use chartdoc_core::{
  operation::{
    AUTO_ALIGN_PARAM, Operation, OperationVersion, compare_versions, find_operation_ignore_case,
  },
  source::SourceKind,
  workflow::{FlowEdge, FlowElement, FlowNode, NodeKind, Workflow},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::migrate::DEFAULT_OPERATION_VERSION;

/// Operation run by the output node: forwards its single input.
pub const PASSTHROUGH_OP: &str = "PASSTHROUGH";

// ─── Step types ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
  /// Output of an earlier step; the value is its index.
  Result,
  Const,
  /// A time series id.
  Ts,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepInput {
  #[serde(rename = "type")]
  pub kind:  InputKind,
  pub value: Value,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub param: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputationStep {
  pub step:    usize,
  pub op:      String,
  pub version: String,
  pub inputs:  Vec<StepInput>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub params:  Option<Map<String, Value>>,
}

// ─── Compiler ────────────────────────────────────────────────────────────────

/// Build the steps for `workflow`. `workflows` is searched for referenced
/// calculations. Returns an empty list when the workflow has no usable
/// output or its graph contains a loop.
pub fn steps_for_workflow(
  workflow: &Workflow,
  workflows: &[Workflow],
  operations: &[Operation],
) -> Vec<ComputationStep> {
  let Some(flow) = workflow.flow.as_ref().filter(|_| workflow.is_v2()) else {
    return Vec::new();
  };

  let connected = drop_unconnected(&flow.elements);
  let elements = inline_references(connected, workflows, &[workflow.id.clone()]);
  let graph = Graph { elements: &elements };

  let Some(output) = graph.nodes().find(|n| matches!(n.kind, NodeKind::Output)) else {
    debug!(workflow = %workflow.id, "no output node");
    return Vec::new();
  };

  let Some(ordered) = graph.inputs_first(output) else {
    warn!(workflow = %workflow.id, "loop in calculation graph");
    return Vec::new();
  };

  let runnable: Vec<&FlowNode> = ordered
    .into_iter()
    .filter(|n| matches!(n.kind, NodeKind::Function(_) | NodeKind::Output))
    .collect();

  runnable
    .iter()
    .enumerate()
    .map(|(i, node)| compile_step(i, node, &runnable, &graph, workflow, operations))
    .collect()
}

fn compile_step(
  index: usize,
  node: &FlowNode,
  runnable: &[&FlowNode],
  graph: &Graph,
  workflow: &Workflow,
  operations: &[Operation],
) -> ComputationStep {
  let NodeKind::Function(data) = &node.kind else {
    let inputs = graph
      .incomers(&node.id)
      .into_iter()
      .filter_map(|source| input_from(source, runnable, None))
      .collect();
    return ComputationStep {
      step: index,
      op: PASSTHROUGH_OP.to_string(),
      version: DEFAULT_OPERATION_VERSION.to_string(),
      inputs,
      params: None,
    };
  };

  let Some(selected) = &data.selected_operation else {
    debug!(node = %node.id, "function node without operation runs as passthrough");
    return ComputationStep {
      step:    index,
      op:      PASSTHROUGH_OP.to_string(),
      version: DEFAULT_OPERATION_VERSION.to_string(),
      inputs:  Vec::new(),
      params:  None,
    };
  };

  let operation = find_operation_ignore_case(operations, &selected.op);
  let version = resolve_version(operation, selected.version.as_deref());
  let op_version = operation.and_then(|o| o.find_version(&version));

  let inputs = op_version
    .map(|v| function_inputs(node, v, runnable, graph))
    .unwrap_or_default();

  let mut params = data.parameter_values.clone().unwrap_or_default();
  if op_version.is_some_and(|s| s.declares(AUTO_ALIGN_PARAM)) {
    params.insert(AUTO_ALIGN_PARAM.to_string(), Value::Bool(workflow.auto_align()));
  }

  ComputationStep {
    step: index,
    op: selected.op.clone(),
    version,
    inputs,
    params: (!params.is_empty()).then_some(params),
  }
}

/// The selected version when the catalog has it, else the oldest catalog
/// version, else the default.
fn resolve_version(operation: Option<&Operation>, selected: Option<&str>) -> String {
  let mut available: Vec<&str> = operation
    .map(|o| o.versions.iter().map(|v| v.version.as_str()).collect())
    .unwrap_or_default();
  available.sort_by(|a, b| compare_versions(a, b));

  match selected {
    Some(v) if available.contains(&v) => v.to_string(),
    _ => available
      .first()
      .copied()
      .unwrap_or(DEFAULT_OPERATION_VERSION)
      .to_string(),
  }
}

/// One input per declared input param, taken from the edge into that handle.
fn function_inputs(
  node: &FlowNode,
  op_version: &OperationVersion,
  runnable: &[&FlowNode],
  graph: &Graph,
) -> Vec<StepInput> {
  op_version
    .inputs
    .iter()
    .filter_map(|input| {
      let edge = graph.edges().find(|e| {
        e.target == node.id && e.target_handle.as_deref() == Some(input.param.as_str())
      })?;
      let source = graph.node(&edge.source)?;
      input_from(source, runnable, Some(&input.param))
    })
    .collect()
}

fn input_from(source: &FlowNode, runnable: &[&FlowNode], param: Option<&str>) -> Option<StepInput> {
  let (kind, value) = match &source.kind {
    NodeKind::Function(_) | NodeKind::Output => {
      let index = runnable.iter().position(|n| n.id == source.id)?;
      (InputKind::Result, Value::from(index))
    }
    NodeKind::Constant(c) => (InputKind::Const, c.value.clone()),
    NodeKind::Input(d) | NodeKind::Source(d) => {
      let id = if d.kind() == Some(SourceKind::Timeseries) {
        d.selected_source_id.clone()
      } else {
        String::new()
      };
      (InputKind::Ts, Value::String(id))
    }
    NodeKind::Unrecognized { type_name, .. } => {
      debug!(node = %source.id, ?type_name, "unresolvable input");
      return None;
    }
  };
  Some(StepInput {
    kind,
    value,
    param: param.map(str::to_string),
  })
}

// ─── Graph preparation ───────────────────────────────────────────────────────

/// Drop nodes that have neither incoming nor outgoing edges. Unrecognized
/// elements and edges are kept.
fn drop_unconnected(elements: &[FlowElement]) -> Vec<FlowElement> {
  let graph = Graph { elements };
  elements
    .iter()
    .filter(|el| match el {
      FlowElement::Node(n) if !matches!(n.kind, NodeKind::Unrecognized { .. }) => {
        graph.edges().any(|e| e.source == n.id || e.target == n.id)
      }
      _ => true,
    })
    .cloned()
    .collect()
}

/// Replace every input node that references another workflow with that
/// workflow's elements, minus its output node and output edge. The output
/// edge is re-pointed at every target of the reference.
///
/// `visited` holds the workflow ids already being expanded; meeting one again
/// (a cycle) or a reference that cannot be expanded stops further inlining.
fn inline_references(
  mut elements: Vec<FlowElement>,
  workflows: &[Workflow],
  visited: &[String],
) -> Vec<FlowElement> {
  let references: Vec<(String, String)> = elements
    .iter()
    .filter_map(FlowElement::as_node)
    .filter_map(|n| {
      let data = n.kind.source_data()?;
      (data.kind() == Some(SourceKind::Workflow)).then(|| (n.id.clone(), data.selected_source_id.clone()))
    })
    .collect();
  if references.is_empty() {
    return elements;
  }

  let mut next_visited = visited.to_vec();
  let mut stop = false;

  for (reference_id, workflow_id) in references {
    let Some(referenced) = workflows.iter().find(|w| w.id == workflow_id) else {
      warn!(workflow = %workflow_id, "referenced calculation not found");
      stop = true;
      continue;
    };
    if visited.contains(&referenced.id) {
      warn!(workflow = %workflow_id, "circular calculation reference");
      stop = true;
      continue;
    }
    next_visited.push(referenced.id.clone());

    let inner = referenced
      .flow
      .as_ref()
      .map(|f| f.elements.as_slice())
      .unwrap_or_default();
    let inner_graph = Graph { elements: inner };
    let Some(inner_output) = inner_graph.nodes().find(|n| matches!(n.kind, NodeKind::Output)) else {
      stop = true;
      continue;
    };
    let Some(output_edge) = inner_graph.edges().find(|e| e.target == inner_output.id) else {
      stop = true;
      continue;
    };

    let outgoing: Vec<FlowEdge> = Graph { elements: &elements }
      .edges()
      .filter(|e| e.source == reference_id)
      .cloned()
      .collect();
    if outgoing.is_empty() {
      stop = true;
      continue;
    }

    elements.retain(|el| match el {
      FlowElement::Node(n) => n.id != reference_id,
      FlowElement::Edge(e) => e.source != reference_id && e.target != reference_id,
    });
    elements.extend(
      inner
        .iter()
        .filter(|el| el.id() != inner_output.id && el.id() != output_edge.id)
        .cloned(),
    );
    elements.extend(outgoing.into_iter().map(|edge| {
      FlowElement::Edge(FlowEdge {
        target: edge.target,
        target_handle: edge.target_handle,
        ..output_edge.clone()
      })
    }));
  }

  if stop {
    return elements;
  }
  inline_references(elements, workflows, &next_visited)
}

// ─── Graph queries ───────────────────────────────────────────────────────────

struct Graph<'a> {
  elements: &'a [FlowElement],
}

impl<'a> Graph<'a> {
  fn nodes(&self) -> impl Iterator<Item = &'a FlowNode> + use<'a> {
    let elements: &'a [FlowElement] = self.elements;
    elements.iter().filter_map(FlowElement::as_node)
  }

  fn edges(&self) -> impl Iterator<Item = &'a FlowEdge> + use<'a> {
    let elements: &'a [FlowElement] = self.elements;
    elements.iter().filter_map(FlowElement::as_edge)
  }

  fn node(&self, id: &str) -> Option<&'a FlowNode> { self.nodes().find(|n| n.id == id) }

  /// Nodes with an edge into `id`, in element order.
  fn incomers(&self, id: &str) -> Vec<&'a FlowNode> {
    let sources: HashSet<&str> = self
      .edges()
      .filter(|e| e.target == id)
      .map(|e| e.source.as_str())
      .collect();
    self.nodes().filter(|n| sources.contains(n.id.as_str())).collect()
  }

  /// Every node upstream of `output` followed by `output` itself, each node
  /// after all of its inputs. Later incomers come ahead of earlier ones.
  /// `None` when a path loops back on itself.
  fn inputs_first(&self, output: &'a FlowNode) -> Option<Vec<&'a FlowNode>> {
    let mut ordered = Vec::new();
    let mut path = Vec::new();
    let mut done = HashSet::new();
    self.visit(output, &mut path, &mut done, &mut ordered)?;
    Some(ordered)
  }

  fn visit(
    &self,
    node: &'a FlowNode,
    path: &mut Vec<&'a str>,
    done: &mut HashSet<&'a str>,
    ordered: &mut Vec<&'a FlowNode>,
  ) -> Option<()> {
    if done.contains(node.id.as_str()) {
      return Some(());
    }
    if path.contains(&node.id.as_str()) {
      return None;
    }
    path.push(&node.id);
    for incomer in self.incomers(&node.id).into_iter().rev() {
      self.visit(incomer, path, done, ordered)?;
    }
    path.pop();
    done.insert(&node.id);
    ordered.push(node);
    Some(())
  }
}
