//! Row-level table merge.
//!
//! [`merge_table`] reconciles one table from `source` into `dest` by primary
//! key. Rows missing from `dest` are inserted. Rows present on both sides are
//! overwritten only when the source timestamp is strictly newer, so `dest`
//! wins ties and a repeated merge writes nothing. A source row whose
//! timestamp does not parse is rejected on either path.
//!
//! The same function serves both directions: live → backup for periodic
//! backups and backup → live for restores.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use durable_core::{
  registry::TableBackupConfig,
  report::{MergeReport, MergeStrategy},
  timestamp,
};
use rusqlite::{Connection, OptionalExtension as _, params_from_iter, types::Value};
use tracing::{error, info, warn};

use crate::{
  Error, Result, schema,
  sql::{insert_sql, quote_ident, read_rows},
};

/// Merge `config.table_name` from `source` into `dest` in one transaction.
///
/// Falls back to [`replace_table`] when the source has no timestamp column.
pub fn merge_table(
  source: &Connection,
  dest:   &mut Connection,
  config: &TableBackupConfig,
) -> Result<MergeReport> {
  let table = config.table_name.as_str();

  if !schema::capability(source, config)?.can_merge(config) {
    warn!(
      table,
      column = %config.timestamp_field,
      "timestamp column missing, replacing table instead of merging"
    );
    return replace_table(source, dest, table);
  }

  let data = read_rows(source, table)?;
  let pk_idx = data.position(&config.primary_key_field).ok_or_else(|| Error::MissingColumn {
    table:  table.to_owned(),
    column: config.primary_key_field.clone(),
  })?;
  // `can_merge` guarantees the timestamp column exists in the source.
  let ts_idx = data.position(&config.timestamp_field).ok_or_else(|| Error::MissingColumn {
    table:  table.to_owned(),
    column: config.timestamp_field.clone(),
  })?;

  let non_pk: Vec<usize> = (0..data.columns.len()).filter(|&i| i != pk_idx).collect();
  let pk_col = quote_ident(&config.primary_key_field);

  let select_sql = format!(
    "SELECT {} FROM {} WHERE {pk_col} = ?1",
    quote_ident(&config.timestamp_field),
    quote_ident(table),
  );
  let update_sql = format!(
    "UPDATE {} SET {} WHERE {pk_col} = ?{}",
    quote_ident(table),
    non_pk
      .iter()
      .enumerate()
      .map(|(n, &i)| format!("{} = ?{}", quote_ident(&data.columns[i]), n + 1))
      .collect::<Vec<_>>()
      .join(", "),
    non_pk.len() + 1,
  );
  let insert_sql = insert_sql(table, &data.columns);

  let mut report = MergeReport::new(MergeStrategy::Timestamp);
  let tx = dest.transaction()?;
  schema::ensure_table_like(source, &tx, table)?;
  schema::ensure_merge_fields(&tx, config)?;
  {
    let mut select = tx.prepare(&select_sql)?;
    let mut insert = tx.prepare(&insert_sql)?;
    let mut update = tx.prepare(&update_sql)?;

    for row in &data.rows {
      let pk = &row[pk_idx];
      let existing: Option<Value> = select.query_row([pk], |r| r.get(0)).optional()?;

      let decision = match &existing {
        Some(dest_ts) => source_is_newer(&row[ts_idx], dest_ts),
        None => timestamp_of(&row[ts_idx]).map(|_| true),
      };

      match decision {
        Ok(true) if existing.is_none() => {
          insert.execute(params_from_iter(row.iter()))?;
          report.inserted += 1;
        }
        Ok(true) => {
          let values = non_pk.iter().map(|&i| &row[i]).chain(std::iter::once(pk));
          update.execute(params_from_iter(values))?;
          report.updated += 1;
        }
        Ok(false) => report.unchanged += 1,
        Err(e) => {
          error!(table, key = ?pk, error = %e, "skipping row with malformed timestamp");
          report.rejected += 1;
        }
      }
    }
  }
  tx.commit()?;

  info!(
    table,
    inserted = report.inserted,
    updated = report.updated,
    unchanged = report.unchanged,
    rejected = report.rejected,
    "merged table"
  );
  Ok(report)
}

/// Empty `dest.table` and refill it with every row of `source.table`.
///
/// Anything only the destination held is lost; used for tables without
/// timestamp metadata.
pub fn replace_table(source: &Connection, dest: &mut Connection, table: &str) -> Result<MergeReport> {
  let data = read_rows(source, table)?;
  let mut report = MergeReport::new(MergeStrategy::Replace);

  let tx = dest.transaction()?;
  schema::ensure_table_like(source, &tx, table)?;
  tx.execute(&format!("DELETE FROM {}", quote_ident(table)), [])?;
  {
    let mut insert = tx.prepare(&insert_sql(table, &data.columns))?;
    for row in &data.rows {
      insert.execute(params_from_iter(row.iter()))?;
      report.inserted += 1;
    }
  }
  tx.commit()?;

  info!(table, rows = report.inserted, "replaced table");
  Ok(report)
}

fn timestamp_of(value: &Value) -> Result<Option<DateTime<Utc>>> {
  match value {
    Value::Null => Ok(None),
    Value::Text(s) => Ok(Some(timestamp::parse(s)?)),
    other => Err(durable_core::Error::InvalidTimestamp(format!("{other:?}")).into()),
  }
}

fn source_is_newer(source: &Value, dest: &Value) -> Result<bool> {
  let ordering = timestamp::compare(timestamp_of(source)?, timestamp_of(dest)?);
  Ok(ordering == Ordering::Greater)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn text(s: &str) -> Value { Value::Text(s.into()) }

  #[test]
  fn newer_source_wins_and_ties_keep_dest() {
    let old = text("2024-01-01T00:00:00");
    let new = text("2024-01-02T00:00:00Z");
    assert!(source_is_newer(&new, &old).unwrap());
    assert!(!source_is_newer(&old, &new).unwrap());
    assert!(!source_is_newer(&new, &new).unwrap());
  }

  #[test]
  fn null_timestamps_lose() {
    assert!(source_is_newer(&text("2024-01-01T00:00:00Z"), &Value::Null).unwrap());
    assert!(!source_is_newer(&Value::Null, &Value::Null).unwrap());
  }

  #[test]
  fn non_text_timestamp_is_rejected() {
    assert!(source_is_newer(&Value::Integer(5), &Value::Null).is_err());
    assert!(source_is_newer(&text("soon"), &Value::Null).is_err());
  }
}
