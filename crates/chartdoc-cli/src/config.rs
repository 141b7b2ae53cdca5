//! Layered CLI configuration: optional TOML file, then `CHARTDOC_*`
//! environment variables.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CliConfig {
  /// JSON file holding the operation catalog.
  pub operations_path:    Option<PathBuf>,
  /// Pretty-print output unless `--compact` is given.
  pub pretty:             bool,
  /// Owner used by `duplicate` when `--user-id` is omitted.
  pub default_user_id:    Option<String>,
  pub default_user_email: Option<String>,
}

impl Default for CliConfig {
  fn default() -> Self {
    Self {
      operations_path:    None,
      pretty:             true,
      default_user_id:    None,
      default_user_email: None,
    }
  }
}

impl CliConfig {
  /// Read `path` (if it exists) and apply environment overrides.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(expand_tilde(path)).required(false))
      .add_source(config::Environment::with_prefix("CHARTDOC"))
      .build()
      .context("failed to read config file")?;

    settings
      .try_deserialize()
      .context("failed to deserialise CliConfig")
  }

  /// The catalog path with `~` expanded.
  pub fn operations_path(&self) -> Option<PathBuf> {
    self.operations_path.as_deref().map(expand_tilde)
  }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn temp_file(contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("chartdoc-{}.toml", uuid::Uuid::new_v4()));
    std::fs::write(&path, contents).unwrap();
    path
  }

  #[test]
  fn missing_file_gives_defaults() {
    let cfg = CliConfig::load(Path::new("/nonexistent/chartdoc.toml")).unwrap();
    assert!(cfg.pretty);
    assert_eq!(cfg.default_user_id, None);
  }

  #[test]
  fn file_values_are_read() {
    let path = temp_file(
      "operations_path = \"/srv/ops.json\"\npretty = false\ndefault_user_id = \"ops@example.com\"\n",
    );
    let cfg = CliConfig::load(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(cfg.operations_path(), Some(PathBuf::from("/srv/ops.json")));
    assert!(!cfg.pretty);
    assert_eq!(cfg.default_user_id.as_deref(), Some("ops@example.com"));
  }

  #[test]
  fn tilde_expands_against_home() {
    let Ok(home) = std::env::var("HOME") else {
      return;
    };
    assert_eq!(
      expand_tilde(Path::new("~/ops.json")),
      PathBuf::from(home).join("ops.json")
    );
    assert_eq!(expand_tilde(Path::new("/abs/ops.json")), PathBuf::from("/abs/ops.json"));
  }
}
