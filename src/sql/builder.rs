//! Builds parameterized SELECT, upsert and keyed UPDATE statements for persisted records.
//!
//! Record values travel as one JSONB parameter expanded with
//! `jsonb_populate_record(NULL::<table>, $n)`, which converts every field to
//! its column's type on the server.

use serde_json::{Map, Value};

/// Quote identifier for PostgreSQL (safe: only from model declarations).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Table name, optionally schema-qualified ("schema.table").
fn qualified_table(table: &str) -> String {
    match table.split_once('.') {
        Some((schema, name)) => format!("{}.{}", quoted(schema), quoted(name)),
        None => quoted(table),
    }
}

/// Row of `table` typed from the JSON object in param `$n`.
fn populated(table: &str, n: usize) -> String {
    format!("jsonb_populate_record(NULL::{}, ${})", table, n)
}

/// A SQL statement with positional parameters ($1, $2, ...).
#[derive(Clone, Debug, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Statement {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Append a parameter; the SQL must reference it as `$n` in bind order.
    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.params.push(value.into());
        self
    }

    fn push_param(&mut self, v: Value) -> usize {
        self.params.push(v);
        self.params.len()
    }

    /// `WHERE r.pk = <key typed as the pk column>`.
    fn key_filter(&mut self, table: &str, primary_key: &str, id: Value) -> String {
        let mut key = Map::new();
        key.insert(primary_key.to_string(), id);
        let n = self.push_param(Value::Object(key));
        format!(
            "r.{pk} = (SELECT k.{pk} FROM {} AS k)",
            populated(table, n),
            pk = quoted(primary_key)
        )
    }
}

/// Trivial round trip used by connection checks.
pub fn ping() -> Statement {
    Statement::new("SELECT 1")
}

/// SELECT * by primary key. The key is the sole param, as `{pk: id}`.
pub fn select_by_id(table: &str, primary_key: &str, id: Value) -> Statement {
    let table = qualified_table(table);
    let mut q = Statement::new(String::new());
    let filter = q.key_filter(&table, primary_key, id);
    q.sql = format!("SELECT r.* FROM {} AS r WHERE {}", table, filter);
    q
}

/// Column names to write. A null primary key is left to the column default.
fn written_columns<'a>(primary_key: &str, values: &'a Map<String, Value>) -> Vec<&'a str> {
    values
        .iter()
        .filter(|(col, val)| !(col.as_str() == primary_key && val.is_null()))
        .map(|(col, _)| col.as_str())
        .collect()
}

/// INSERT ... ON CONFLICT (pk) DO UPDATE ... RETURNING *.
pub fn upsert(table: &str, primary_key: &str, values: &Map<String, Value>) -> Statement {
    let table = qualified_table(table);
    let columns = written_columns(primary_key, values);
    if columns.is_empty() {
        return Statement::new(format!("INSERT INTO {} AS r DEFAULT VALUES RETURNING r.*", table));
    }
    let mut q = Statement::new(String::new());
    let n = q.push_param(Value::Object(values.clone()));
    let names: Vec<String> = columns.iter().map(|c| quoted(c)).collect();
    let selected: Vec<String> = names.iter().map(|c| format!("p.{}", c)).collect();
    let mut updates: Vec<String> = names
        .iter()
        .filter(|c| **c != quoted(primary_key))
        .map(|c| format!("{} = EXCLUDED.{}", c, c))
        .collect();
    if updates.is_empty() {
        // key-only record: a no-op update so RETURNING still yields the row
        updates.push(format!("{} = EXCLUDED.{}", quoted(primary_key), quoted(primary_key)));
    }
    let conflict = if columns.contains(&primary_key) {
        format!(
            " ON CONFLICT ({}) DO UPDATE SET {}",
            quoted(primary_key),
            updates.join(", ")
        )
    } else {
        String::new()
    };
    q.sql = format!(
        "INSERT INTO {t} AS r ({}) SELECT {} FROM {} AS p{} RETURNING r.*",
        names.join(", "),
        selected.join(", "),
        populated(&table, n),
        conflict,
        t = table,
    );
    q
}

/// UPDATE the row whose primary key is `key`, RETURNING *.
///
/// A non-null primary key in `values` moves the row to that key; a null one
/// keeps `key`.
pub fn update_by_key(
    table: &str,
    primary_key: &str,
    key: Value,
    values: &Map<String, Value>,
) -> Statement {
    let table = qualified_table(table);
    let mut columns = written_columns(primary_key, values);
    let mut q = Statement::new(String::new());
    if columns.is_empty() {
        columns.push(primary_key);
    }
    let mut data = values.clone();
    if data.get(primary_key).map_or(true, Value::is_null) {
        data.insert(primary_key.to_string(), key.clone());
    }
    let n = q.push_param(Value::Object(data));
    let assignments: Vec<String> = columns
        .iter()
        .map(|c| format!("{} = p.{}", quoted(c), quoted(c)))
        .collect();
    let filter = q.key_filter(&table, primary_key, key);
    q.sql = format!(
        "UPDATE {} AS r SET {} FROM {} AS p WHERE {} RETURNING r.*",
        table,
        assignments.join(", "),
        populated(&table, n),
        filter
    );
    q
}
