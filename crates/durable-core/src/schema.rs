//! Schema capability of a table with respect to row-level merge.

use serde::Serialize;

use crate::registry::TableBackupConfig;

/// Whether a table carries the metadata columns merge depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "capability", rename_all = "snake_case")]
pub enum SchemaCapability {
  HasMergeFields,
  MissingMergeFields { missing: Vec<String> },
}

impl SchemaCapability {
  /// Classify a table from its column names.
  pub fn from_columns<S: AsRef<str>>(config: &TableBackupConfig, columns: &[S]) -> Self {
    let missing: Vec<String> = config
      .merge_fields()
      .into_iter()
      .filter(|field| !columns.iter().any(|c| c.as_ref() == *field))
      .map(str::to_owned)
      .collect();

    if missing.is_empty() {
      Self::HasMergeFields
    } else {
      Self::MissingMergeFields { missing }
    }
  }

  /// Whether the timestamp column, required for conflict resolution, exists.
  pub fn can_merge(&self, config: &TableBackupConfig) -> bool {
    match self {
      Self::HasMergeFields => true,
      Self::MissingMergeFields { missing } => {
        !missing.iter().any(|m| *m == config.timestamp_field)
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn classifies_columns() {
    let cfg = TableBackupConfig::new("profile");

    let full = SchemaCapability::from_columns(&cfg, &["id", "updated_at", "deleted_at"]);
    assert_eq!(full, SchemaCapability::HasMergeFields);
    assert!(full.can_merge(&cfg));

    let partial = SchemaCapability::from_columns(&cfg, &["id", "updated_at"]);
    assert_eq!(
      partial,
      SchemaCapability::MissingMergeFields { missing: vec!["deleted_at".into()] }
    );
    assert!(partial.can_merge(&cfg));

    let bare = SchemaCapability::from_columns(&cfg, &["id", "name"]);
    assert!(!bare.can_merge(&cfg));
  }
}
