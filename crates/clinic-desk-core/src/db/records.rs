//! Column-generic row operations.
//!
//! Rows travel as JSON objects so the gateway above can stay agnostic of the
//! concrete entity types, the same way a hosted REST backend would.

use std::collections::HashMap;

use rusqlite::params_from_iter;
use rusqlite::types::{Value as SqlValue, ValueRef};
use serde_json::Value;

use super::{Database, DbError, DbResult};
use crate::query::{Embed, Filter, Query, Row, Table};

impl Database {
    /// Select rows matching `query`, ordered and with embeds attached.
    pub fn select_rows(&self, table: Table, query: &Query) -> DbResult<Vec<Row>> {
        if let Some(column) = query.unknown_column(table) {
            return Err(DbError::UnknownColumn {
                table: table.name(),
                column,
            });
        }

        let mut params = Vec::new();
        let where_sql = query.filter.to_sql(&mut params);
        let order_sql = query
            .order_by
            .as_ref()
            .map(|o| o.to_sql())
            .unwrap_or_else(|| "id ASC".to_string());

        let sql = format!(
            "SELECT {} FROM {} WHERE {} ORDER BY {}",
            table.columns().join(", "),
            table.name(),
            where_sql,
            order_sql,
        );

        let mut rows = self.query_rows(&sql, table.columns(), &params)?;
        for embed in &query.embeds {
            self.attach_embed(&mut rows, embed)?;
        }
        Ok(rows)
    }

    /// Exact count of rows matching `filter`.
    pub fn count_rows(&self, table: Table, filter: &Filter) -> DbResult<u64> {
        if let Some(column) = filter.unknown_column(table) {
            return Err(DbError::UnknownColumn {
                table: table.name(),
                column,
            });
        }

        let mut params = Vec::new();
        let where_sql = filter.to_sql(&mut params);
        let sql = format!("SELECT COUNT(*) FROM {} WHERE {}", table.name(), where_sql);
        let sql_params = to_sql_params(&params);

        let count: i64 = self
            .conn
            .query_row(&sql, params_from_iter(sql_params.iter()), |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Insert a row and return its id.
    pub fn insert_row(&self, table: Table, row: &Row) -> DbResult<i64> {
        check_columns(table, row)?;

        if row.is_empty() {
            self.conn
                .execute(&format!("INSERT INTO {} DEFAULT VALUES", table.name()), [])?;
        } else {
            let columns: Vec<&str> = row.keys().map(String::as_str).collect();
            let placeholders = vec!["?"; columns.len()].join(", ");
            let sql = format!(
                "INSERT INTO {} ({}) VALUES ({})",
                table.name(),
                columns.join(", "),
                placeholders,
            );
            let values: Vec<Value> = row.values().cloned().collect();
            let sql_params = to_sql_params(&values);
            self.conn.execute(&sql, params_from_iter(sql_params.iter()))?;
        }

        Ok(self.conn.last_insert_rowid())
    }

    /// Update the given columns of one row. Returns false if no row has `id`.
    pub fn update_row(&self, table: Table, id: i64, patch: &Row) -> DbResult<bool> {
        check_columns(table, patch)?;
        if patch.is_empty() {
            return Err(DbError::Constraint("Update with no columns".into()));
        }
        if patch.contains_key("id") {
            return Err(DbError::Constraint("Record id cannot be changed".into()));
        }

        let assignments: Vec<String> = patch.keys().map(|c| format!("{c} = ?")).collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE id = ?",
            table.name(),
            assignments.join(", "),
        );
        let mut values: Vec<Value> = patch.values().cloned().collect();
        values.push(Value::from(id));
        let sql_params = to_sql_params(&values);

        let rows_affected = self.conn.execute(&sql, params_from_iter(sql_params.iter()))?;
        Ok(rows_affected > 0)
    }

    /// Delete one row. Returns false if no row has `id`.
    pub fn delete_row(&self, table: Table, id: i64) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute(&format!("DELETE FROM {} WHERE id = ?", table.name()), [id])?;
        Ok(rows_affected > 0)
    }

    /// Ids of rows in `table` whose `column` equals `id`.
    pub fn referencing_ids(&self, table: Table, column: &str, id: i64) -> DbResult<Vec<i64>> {
        if !table.has_column(column) {
            return Err(DbError::UnknownColumn {
                table: table.name(),
                column: column.to_string(),
            });
        }
        let mut stmt = self.conn.prepare(&format!(
            "SELECT id FROM {} WHERE {} = ? ORDER BY id",
            table.name(),
            column
        ))?;
        let rows = stmt.query_map([id], |row| row.get(0))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    fn query_rows(&self, sql: &str, columns: &[&str], params: &[Value]) -> DbResult<Vec<Row>> {
        let mut stmt = self.conn.prepare(sql)?;
        let sql_params = to_sql_params(params);

        let rows = stmt.query_map(params_from_iter(sql_params.iter()), |row| {
            let mut out = Row::new();
            for (i, column) in columns.iter().enumerate() {
                out.insert((*column).to_string(), from_sql_value(row.get_ref(i)?));
            }
            Ok(out)
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Resolve `embed` for every row with one `IN (...)` lookup.
    fn attach_embed(&self, rows: &mut [Row], embed: &Embed) -> DbResult<()> {
        let mut ids: Vec<i64> = rows
            .iter()
            .filter_map(|r| r.get(embed.foreign_key).and_then(Value::as_i64))
            .collect();
        ids.sort_unstable();
        ids.dedup();

        let mut found: HashMap<i64, Row> = HashMap::new();
        if !ids.is_empty() {
            let mut columns = vec!["id"];
            columns.extend(embed.columns.iter().copied().filter(|c| *c != "id"));
            let sql = format!(
                "SELECT {} FROM {} WHERE id IN ({})",
                columns.join(", "),
                embed.table.name(),
                vec!["?"; ids.len()].join(", "),
            );
            let params: Vec<Value> = ids.iter().map(|id| Value::from(*id)).collect();
            for mut referenced in self.query_rows(&sql, &columns, &params)? {
                let Some(id) = referenced.get("id").and_then(Value::as_i64) else {
                    continue;
                };
                if !embed.columns.contains(&"id") {
                    referenced.remove("id");
                }
                found.insert(id, referenced);
            }
        }

        for row in rows.iter_mut() {
            let lookup = row
                .get(embed.foreign_key)
                .and_then(Value::as_i64)
                .and_then(|id| found.get(&id))
                .cloned()
                .map(Value::Object)
                .unwrap_or(Value::Null);
            row.insert(embed.alias.to_string(), lookup);
        }
        Ok(())
    }
}

fn check_columns(table: Table, row: &Row) -> DbResult<()> {
    match row.keys().find(|c| !table.has_column(c)) {
        Some(column) => Err(DbError::UnknownColumn {
            table: table.name(),
            column: column.clone(),
        }),
        None => Ok(()),
    }
}

fn to_sql_params(values: &[Value]) -> Vec<SqlValue> {
    values.iter().map(to_sql_value).collect()
}

fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        // Nested values are stored as JSON text
        other => SqlValue::Text(other.to_string()),
    }
}

fn from_sql_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        // No blob columns in the schema
        ValueRef::Blob(_) => Value::Null,
    }
}
