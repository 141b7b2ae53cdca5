//! Calculation workflows.
//!
//! A workflow is stored in one of two graph shapes:
//!
//! - **v1** (`version` absent or `""`): an adjacency map — a node list plus
//!   id-keyed connections between `(nodeId, pinId)` pairs.
//! - **v2** (`version == "v2"`): a flow-graph element list where every element
//!   is either an edge or a node tagged by its `type`.
//!
//! The two shapes are kept as distinct types; `chartdoc-update` converts v1 to
//! v2 one way only.

use std::fmt;

use serde::{
  Deserialize, Deserializer, Serialize, Serializer,
  de::{MapAccess, SeqAccess, Visitor},
  ser::SerializeMap,
};
use serde_json::{Map, Value};
use strum::{AsRefStr, Display, EnumString};

use crate::source::{SourceDisplay, SourceKind};

// ─── Workflow ────────────────────────────────────────────────────────────────

/// Graph format discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkflowVersion {
  #[serde(rename = "")]
  Legacy,
  #[serde(rename = "v2")]
  V2,
}

/// Per-workflow calculation settings (v2 only).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSettings {
  #[serde(default = "auto_align_by_default")]
  pub auto_align: bool,
  #[serde(flatten)]
  pub extra:      Map<String, Value>,
}

fn auto_align_by_default() -> bool { true }

impl Default for WorkflowSettings {
  fn default() -> Self {
    Self {
      auto_align: true,
      extra:      Map::new(),
    }
  }
}

/// A user-authored calculation bound into the chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
  /// Unique within `workflowCollection`.
  pub id:          String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub version:     Option<WorkflowVersion>,
  // ── v1 payload ──────────────────────────────────────────────────────────
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub nodes:       Option<Vec<LegacyNode>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub connections: Option<LegacyConnections>,
  // ── v2 payload ──────────────────────────────────────────────────────────
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub flow:        Option<Flow>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub settings:    Option<WorkflowSettings>,
  #[serde(flatten)]
  pub display:     SourceDisplay,
  #[serde(flatten)]
  pub extra:       Map<String, Value>,
}

impl Workflow {
  /// An empty v2 workflow.
  pub fn new_v2(id: impl Into<String>, name: impl Into<String>) -> Self {
    Self {
      id:          id.into(),
      version:     Some(WorkflowVersion::V2),
      nodes:       None,
      connections: None,
      flow:        Some(Flow::default()),
      settings:    Some(WorkflowSettings::default()),
      display:     SourceDisplay::named(name),
      extra:       Map::new(),
    }
  }

  pub fn is_v2(&self) -> bool { self.version == Some(WorkflowVersion::V2) }

  pub fn legacy_nodes(&self) -> &[LegacyNode] { self.nodes.as_deref().unwrap_or_default() }

  pub fn legacy_connections(&self) -> &[LegacyConnection] {
    self.connections.as_ref().map(|c| c.0.as_slice()).unwrap_or_default()
  }

  pub fn auto_align(&self) -> bool {
    self.settings.as_ref().is_none_or(|s| s.auto_align)
  }
}

// ─── v1: adjacency map ───────────────────────────────────────────────────────

/// What a legacy node does; the wire value of `functionEffectReference`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display, AsRefStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeEffect {
  Constant,
  ToolboxFunction,
  SourceReference,
  TimeSeriesReference,
  Output,
}

/// A pin on a legacy node. Only the id matters to the converters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyPin {
  pub id:    String,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyNode {
  pub id:                        String,
  /// Kept as the raw string so unknown references survive a round trip; see
  /// [`LegacyNode::effect`].
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub function_effect_reference: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub function_data:             Option<Map<String, Value>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub x:                         Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub y:                         Option<f64>,
  #[serde(default)]
  pub input_pins:                Vec<LegacyPin>,
  #[serde(default)]
  pub output_pins:               Vec<LegacyPin>,
  #[serde(flatten)]
  pub extra:                     Map<String, Value>,
}

impl LegacyNode {
  pub fn effect(&self) -> Option<NodeEffect> {
    self.function_effect_reference.as_deref()?.parse().ok()
  }

  /// A string field of `functionData`, if present.
  pub fn data_str(&self, key: &str) -> Option<&str> {
    self.function_data.as_ref()?.get(key)?.as_str()
  }
}

/// One endpoint of a legacy connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PinRef {
  pub node_id: String,
  pub pin_id:  String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyConnection {
  pub id:         String,
  pub output_pin: PinRef,
  pub input_pin:  PinRef,
}

/// Legacy connections in document order.
///
/// Stored on the wire as an object keyed by connection id; an empty array is
/// also accepted since older documents used one for "no connections".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegacyConnections(pub Vec<LegacyConnection>);

impl Serialize for LegacyConnections {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(self.0.len()))?;
    for connection in &self.0 {
      map.serialize_entry(&connection.id, connection)?;
    }
    map.end()
  }
}

impl<'de> Deserialize<'de> for LegacyConnections {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    struct ConnectionsVisitor;

    impl<'de> Visitor<'de> for ConnectionsVisitor {
      type Value = LegacyConnections;

      fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an id-keyed map or a list of connections")
      }

      fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut out = Vec::new();
        while let Some((_, connection)) = access.next_entry::<String, LegacyConnection>()? {
          out.push(connection);
        }
        Ok(LegacyConnections(out))
      }

      fn visit_seq<A: SeqAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut out = Vec::new();
        while let Some(connection) = access.next_element::<LegacyConnection>()? {
          out.push(connection);
        }
        Ok(LegacyConnections(out))
      }
    }

    deserializer.deserialize_any(ConnectionsVisitor)
  }
}

// ─── v2: flow-graph element list ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
  pub x: f64,
  pub y: f64,
}

/// The persisted flow: viewport plus elements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flow {
  #[serde(default)]
  pub position: [f64; 2],
  #[serde(default = "default_zoom")]
  pub zoom:     f64,
  #[serde(default)]
  pub elements: Vec<FlowElement>,
}

fn default_zoom() -> f64 { 1.0 }

impl Default for Flow {
  fn default() -> Self {
    Self {
      position: [0.0, 0.0],
      zoom:     default_zoom(),
      elements: Vec::new(),
    }
  }
}

impl Flow {
  pub fn nodes(&self) -> impl Iterator<Item = &FlowNode> {
    self.elements.iter().filter_map(FlowElement::as_node)
  }

  pub fn edges(&self) -> impl Iterator<Item = &FlowEdge> {
    self.elements.iter().filter_map(FlowElement::as_edge)
  }
}

/// Element type tags used by v2 flows.
pub mod node_type {
  pub const INPUT: &str = "CalculationInput";
  pub const OUTPUT: &str = "CalculationOutput";
  pub const FUNCTION: &str = "ToolboxFunction";
  pub const CONSTANT: &str = "Constant";
  pub const SOURCE: &str = "Source";
}

/// Data of an input (source) node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceNodeData {
  #[serde(default)]
  pub selected_source_id: String,
  /// `"timeseries"`, `"workflow"`, or empty when no source is picked yet.
  #[serde(rename = "type", default)]
  pub source_type:        String,
  #[serde(flatten)]
  pub extra:              Map<String, Value>,
}

impl SourceNodeData {
  pub fn kind(&self) -> Option<SourceKind> { self.source_type.parse().ok() }
}

/// The operation a function node runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedOperation {
  pub op:      String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub version: Option<String>,
}

/// The pre-versioning operation reference (`toolFunction`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolFunction {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub op:      Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub version: Option<String>,
  #[serde(flatten)]
  pub extra:   Map<String, Value>,
}

/// Data of a toolbox-function node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionNodeData {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub selected_operation: Option<SelectedOperation>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub parameter_values:   Option<Map<String, Value>>,
  /// Legacy parameter values.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub function_data:      Option<Map<String, Value>>,
  /// Legacy operation reference.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub tool_function:      Option<ToolFunction>,
  #[serde(flatten)]
  pub extra:              Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConstantNodeData {
  #[serde(default)]
  pub value: Value,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

/// The typed payload of a flow node, keyed by the element `type`.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
  Input(SourceNodeData),
  /// Older tag for an input node.
  Source(SourceNodeData),
  Output,
  Function(FunctionNodeData),
  Constant(ConstantNodeData),
  /// Any other tag; kept untouched.
  Unrecognized {
    type_name: Option<String>,
    data:      Option<Value>,
  },
}

impl NodeKind {
  fn from_parts(
    type_name: Option<String>,
    data: Option<Value>,
  ) -> Result<Self, serde_json::Error> {
    fn payload<T: Default + serde::de::DeserializeOwned>(
      data: Option<Value>,
    ) -> Result<T, serde_json::Error> {
      Ok(data.map(serde_json::from_value).transpose()?.unwrap_or_default())
    }

    Ok(match type_name.as_deref() {
      Some(node_type::INPUT) => Self::Input(payload(data)?),
      Some(node_type::SOURCE) => Self::Source(payload(data)?),
      Some(node_type::OUTPUT) => Self::Output,
      Some(node_type::FUNCTION) => Self::Function(payload(data)?),
      Some(node_type::CONSTANT) => Self::Constant(payload(data)?),
      _ => Self::Unrecognized { type_name, data },
    })
  }

  pub fn type_name(&self) -> Option<&str> {
    match self {
      Self::Input(_) => Some(node_type::INPUT),
      Self::Source(_) => Some(node_type::SOURCE),
      Self::Output => Some(node_type::OUTPUT),
      Self::Function(_) => Some(node_type::FUNCTION),
      Self::Constant(_) => Some(node_type::CONSTANT),
      Self::Unrecognized { type_name, .. } => type_name.as_deref(),
    }
  }

  /// Source data for either input tag.
  pub fn source_data(&self) -> Option<&SourceNodeData> {
    match self {
      Self::Input(d) | Self::Source(d) => Some(d),
      _ => None,
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlowNode {
  pub id:       String,
  pub position: Position,
  pub kind:     NodeKind,
  pub extra:    Map<String, Value>,
}

impl FlowNode {
  pub fn new(id: impl Into<String>, position: Position, kind: NodeKind) -> Self {
    Self {
      id: id.into(),
      position,
      kind,
      extra: Map::new(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowEdge {
  pub id:            String,
  #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
  pub edge_type:     Option<String>,
  pub source:        String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub source_handle: Option<String>,
  pub target:        String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub target_handle: Option<String>,
  #[serde(flatten)]
  pub extra:         Map<String, Value>,
}

impl FlowEdge {
  pub fn new(
    id: impl Into<String>,
    source: impl Into<String>,
    source_handle: Option<String>,
    target: impl Into<String>,
    target_handle: Option<String>,
  ) -> Self {
    Self {
      id: id.into(),
      edge_type: None,
      source: source.into(),
      source_handle,
      target: target.into(),
      target_handle,
      extra: Map::new(),
    }
  }
}

/// One entry of a flow's element list. An element with both `source` and
/// `target` is an edge; anything else is a node.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawElement")]
pub enum FlowElement {
  Edge(FlowEdge),
  Node(FlowNode),
}

impl FlowElement {
  pub fn id(&self) -> &str {
    match self {
      Self::Edge(e) => &e.id,
      Self::Node(n) => &n.id,
    }
  }

  pub fn as_node(&self) -> Option<&FlowNode> {
    match self {
      Self::Node(n) => Some(n),
      Self::Edge(_) => None,
    }
  }

  pub fn as_edge(&self) -> Option<&FlowEdge> {
    match self {
      Self::Edge(e) => Some(e),
      Self::Node(_) => None,
    }
  }
}

// ── Wire representation ─────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawElement {
  id:            String,
  #[serde(rename = "type", default)]
  element_type:  Option<String>,
  #[serde(default)]
  source:        Option<String>,
  #[serde(default)]
  source_handle: Option<String>,
  #[serde(default)]
  target:        Option<String>,
  #[serde(default)]
  target_handle: Option<String>,
  #[serde(default)]
  position:      Option<Position>,
  #[serde(default)]
  data:          Option<Value>,
  #[serde(flatten)]
  extra:         Map<String, Value>,
}

impl TryFrom<RawElement> for FlowElement {
  type Error = serde_json::Error;

  fn try_from(raw: RawElement) -> Result<Self, Self::Error> {
    if let (Some(source), Some(target)) = (raw.source.clone(), raw.target.clone()) {
      return Ok(Self::Edge(FlowEdge {
        id: raw.id,
        edge_type: raw.element_type,
        source,
        source_handle: raw.source_handle,
        target,
        target_handle: raw.target_handle,
        extra: raw.extra,
      }));
    }

    // A node carrying only one endpoint keeps it as an ordinary field.
    let mut extra = raw.extra;
    if let Some(source) = raw.source {
      extra.insert("source".into(), Value::String(source));
    }
    if let Some(target) = raw.target {
      extra.insert("target".into(), Value::String(target));
    }

    Ok(Self::Node(FlowNode {
      id: raw.id,
      position: raw.position.unwrap_or_default(),
      kind: NodeKind::from_parts(raw.element_type, raw.data)?,
      extra,
    }))
  }
}

#[derive(Serialize)]
#[serde(untagged)]
enum NodeDataRef<'a> {
  Source(&'a SourceNodeData),
  Function(&'a FunctionNodeData),
  Constant(&'a ConstantNodeData),
  Raw(&'a Value),
}

#[derive(Serialize)]
struct NodeRef<'a> {
  id:        &'a str,
  #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
  node_type: Option<&'a str>,
  position:  &'a Position,
  #[serde(skip_serializing_if = "Option::is_none")]
  data:      Option<NodeDataRef<'a>>,
  #[serde(flatten)]
  extra:     &'a Map<String, Value>,
}

impl Serialize for FlowNode {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let data = match &self.kind {
      NodeKind::Input(d) | NodeKind::Source(d) => Some(NodeDataRef::Source(d)),
      NodeKind::Function(d) => Some(NodeDataRef::Function(d)),
      NodeKind::Constant(d) => Some(NodeDataRef::Constant(d)),
      NodeKind::Output => None,
      NodeKind::Unrecognized { data, .. } => data.as_ref().map(NodeDataRef::Raw),
    };
    NodeRef {
      id: &self.id,
      node_type: self.kind.type_name(),
      position: &self.position,
      data,
      extra: &self.extra,
    }
    .serialize(serializer)
  }
}

impl Serialize for FlowElement {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    match self {
      Self::Edge(e) => e.serialize(serializer),
      Self::Node(n) => n.serialize(serializer),
    }
  }
}
