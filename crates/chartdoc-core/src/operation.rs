//! The calculation-backend operation catalog.
//!
//! Migrations and the step compiler only read this metadata; it is loaded
//! from a JSON array of [`Operation`]s.

use std::{cmp::Ordering, path::Path};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Result;

/// Parameter injected from the workflow-level auto-align setting. Never given
/// a default during migration.
pub const AUTO_ALIGN_PARAM: &str = "align_timesteps";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
  Int,
  Float,
  Str,
  Bool,
  #[serde(other)]
  Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationParameter {
  pub param:         String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name:          Option<String>,
  #[serde(rename = "type")]
  pub kind:          ParameterType,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub default_value: Option<Value>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub options:       Option<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationInput {
  pub param: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name:  Option<String>,
  #[serde(default)]
  pub types: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationVersion {
  pub version:     String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name:        Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(default)]
  pub inputs:      Vec<OperationInput>,
  #[serde(default)]
  pub outputs:     Vec<Value>,
  #[serde(default)]
  pub parameters:  Vec<OperationParameter>,
}

impl OperationVersion {
  pub fn declares(&self, param: &str) -> bool {
    self.parameters.iter().any(|p| p.param == param)
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
  pub op:          String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name:        Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub category:    Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(default)]
  pub versions:    Vec<OperationVersion>,
}

impl Operation {
  pub fn find_version(&self, version: &str) -> Option<&OperationVersion> {
    self.versions.iter().find(|v| v.version == version)
  }

  /// The lowest version by dotted-numeric order.
  pub fn oldest_version(&self) -> Option<&OperationVersion> {
    self
      .versions
      .iter()
      .min_by(|a, b| compare_versions(&a.version, &b.version))
  }
}

/// Case-insensitive key match.
pub fn find_operation_ignore_case<'a>(
  operations: &'a [Operation],
  op: &str,
) -> Option<&'a Operation> {
  operations.iter().find(|o| o.op.eq_ignore_ascii_case(op))
}

/// Compare two dotted version strings component by component, numerically
/// where both components are numbers.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
  let mut left = a.split('.');
  let mut right = b.split('.');
  loop {
    match (left.next(), right.next()) {
      (None, None) => return Ordering::Equal,
      (Some(_), None) => return Ordering::Greater,
      (None, Some(_)) => return Ordering::Less,
      (Some(l), Some(r)) => {
        let ord = match (l.parse::<u64>(), r.parse::<u64>()) {
          (Ok(l), Ok(r)) => l.cmp(&r),
          _ => l.cmp(r),
        };
        if ord != Ordering::Equal {
          return ord;
        }
      }
    }
  }
}

/// Parse a catalog from its JSON text.
pub fn parse_catalog(input: &str) -> Result<Vec<Operation>> {
  Ok(serde_json::from_str(input)?)
}

/// Load a catalog file. A missing file yields an empty catalog.
pub fn load_catalog(path: &Path) -> Result<Vec<Operation>> {
  match std::fs::read_to_string(path) {
    Ok(text) => parse_catalog(&text),
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
    Err(e) => Err(e.into()),
  }
}
