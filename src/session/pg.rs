//! PostgreSQL session over a sqlx pool.

use super::{Entity, RecordState, Session};
use crate::sql::{select_by_id, update_by_key, upsert, PgBindValue, Statement};
use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::postgres::types::PgInterval;
use sqlx::postgres::{PgRow, PgTypeKind};
use sqlx::{PgConnection, PgPool, Postgres, Transaction};

/// Session holding at most one open transaction. Nested `begin` calls become savepoints.
pub struct PgSession {
    pool: PgPool,
    tx: Option<Transaction<'static, Postgres>>,
    savepoints: u32,
    pending: Vec<Entity>,
}

impl PgSession {
    pub fn new(pool: PgPool) -> Self {
        PgSession {
            pool,
            tx: None,
            savepoints: 0,
            pending: Vec::new(),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn in_transaction(&self) -> bool {
        self.tx.is_some()
    }

    /// Connection of the open transaction, beginning one if needed.
    async fn connection(&mut self) -> Result<&mut PgConnection, sqlx::Error> {
        let tx = match self.tx.take() {
            Some(tx) => tx,
            None => {
                tracing::debug!("begin transaction");
                self.pool.begin().await?
            }
        };
        Ok(&mut **self.tx.insert(tx))
    }

    async fn fetch(&mut self, statement: &Statement) -> Result<Vec<PgRow>, sqlx::Error> {
        tracing::debug!(sql = %statement.sql, params = ?statement.params, "query");
        let conn = self.connection().await?;
        let mut query = sqlx::query(&statement.sql);
        for p in &statement.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        query.fetch_all(&mut *conn).await
    }

    async fn simple(&mut self, sql: String) -> Result<(), sqlx::Error> {
        tracing::debug!(sql = %sql, "query");
        let conn = self.connection().await?;
        sqlx::query(&sql).execute(&mut *conn).await?;
        Ok(())
    }
}

#[async_trait]
impl Session for PgSession {
    fn add(&mut self, entity: Entity) {
        self.pending.push(entity);
    }

    async fn flush(&mut self) -> Result<Vec<Entity>, sqlx::Error> {
        let pending = std::mem::take(&mut self.pending);
        let mut out = Vec::with_capacity(pending.len());
        for entity in pending {
            let q = match &entity.persisted_key {
                Some(key) => update_by_key(
                    entity.table,
                    entity.primary_key,
                    key.clone(),
                    &entity.columns(),
                ),
                None => upsert(entity.table, entity.primary_key, &entity.columns()),
            };
            // an update of a vanished row matches nothing
            let row = self
                .fetch(&q)
                .await?
                .into_iter()
                .next()
                .ok_or(sqlx::Error::RowNotFound)?;
            let mut written = Entity::new(entity.table, entity.primary_key, row_to_map(&row)?);
            written.set_state(RecordState::Persistent);
            out.push(written);
        }
        Ok(out)
    }

    async fn commit(&mut self) -> Result<(), sqlx::Error> {
        if !self.pending.is_empty() {
            self.flush().await?;
        }
        if self.savepoints > 0 {
            let sql = format!("RELEASE SAVEPOINT sp_{}", self.savepoints);
            self.simple(sql).await?;
            self.savepoints -= 1;
            return Ok(());
        }
        if let Some(tx) = self.tx.take() {
            tracing::debug!("commit transaction");
            tx.commit().await?;
        }
        Ok(())
    }

    async fn refresh(&mut self, entity: &mut Entity) -> Result<(), sqlx::Error> {
        let id = entity.id().cloned().ok_or(sqlx::Error::RowNotFound)?;
        let q = select_by_id(entity.table, entity.primary_key, id);
        let row = self
            .fetch(&q)
            .await?
            .into_iter()
            .next()
            .ok_or(sqlx::Error::RowNotFound)?;
        entity.values = row_to_map(&row)?;
        entity.persisted_key = None;
        entity.set_state(RecordState::Persistent);
        Ok(())
    }

    async fn execute(&mut self, statement: &Statement) -> Result<Vec<Value>, sqlx::Error> {
        let rows = self.fetch(statement).await?;
        rows.iter()
            .map(|r| row_to_map(r).map(Value::Object))
            .collect()
    }

    async fn rollback(&mut self) -> Result<(), sqlx::Error> {
        self.pending.clear();
        self.savepoints = 0;
        if let Some(tx) = self.tx.take() {
            tracing::debug!("rollback transaction");
            tx.rollback().await?;
        }
        Ok(())
    }

    async fn begin(&mut self) -> Result<(), sqlx::Error> {
        if self.tx.is_none() {
            self.connection().await?;
            return Ok(());
        }
        let sql = format!("SAVEPOINT sp_{}", self.savepoints + 1);
        self.simple(sql).await?;
        self.savepoints += 1;
        Ok(())
    }
}

fn row_to_map(row: &PgRow) -> Result<Map<String, Value>, sqlx::Error> {
    use sqlx::Column;
    use sqlx::Row;
    let mut map = Map::new();
    for col in row.columns() {
        let name = col.name();
        map.insert(name.to_string(), cell_to_value(row, name)?);
    }
    Ok(map)
}

/// Decode one cell. Types with no JSON mapping are a decode error, never a silent null.
fn cell_to_value(row: &PgRow, name: &str) -> Result<Value, sqlx::Error> {
    use sqlx::{Row, TypeInfo, ValueRef};
    let raw = row.try_get_raw(name)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let type_info = raw.type_info().into_owned();

    if let Ok(n) = row.try_get::<i16, _>(name) {
        return Ok(Value::Number(n.into()));
    }
    if let Ok(n) = row.try_get::<i32, _>(name) {
        return Ok(Value::Number(n.into()));
    }
    if let Ok(n) = row.try_get::<i64, _>(name) {
        return Ok(Value::Number(n.into()));
    }
    if let Ok(n) = row.try_get::<f32, _>(name) {
        return Ok(float(n as f64));
    }
    if let Ok(n) = row.try_get::<f64, _>(name) {
        return Ok(float(n));
    }
    if let Ok(d) = row.try_get::<sqlx::types::Decimal, _>(name) {
        return Ok(d
            .normalize()
            .to_string()
            .parse::<serde_json::Number>()
            .map(Value::Number)
            .unwrap_or_else(|_| Value::String(d.to_string())));
    }
    if let Ok(b) = row.try_get::<bool, _>(name) {
        return Ok(Value::Bool(b));
    }
    if let Ok(u) = row.try_get::<uuid::Uuid, _>(name) {
        return Ok(Value::String(u.to_string()));
    }
    if let Ok(d) = row.try_get::<chrono::DateTime<chrono::Utc>, _>(name) {
        return Ok(Value::String(d.to_rfc3339()));
    }
    if let Ok(d) = row.try_get::<chrono::NaiveDateTime, _>(name) {
        return Ok(Value::String(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string()));
    }
    if let Ok(d) = row.try_get::<chrono::NaiveDate, _>(name) {
        return Ok(Value::String(d.format("%Y-%m-%d").to_string()));
    }
    if let Ok(t) = row.try_get::<chrono::NaiveTime, _>(name) {
        return Ok(Value::String(t.format("%H:%M:%S%.f").to_string()));
    }
    if let Ok(s) = row.try_get::<String, _>(name) {
        return Ok(Value::String(s));
    }
    if let Ok(j) = row.try_get::<Value, _>(name) {
        return Ok(j);
    }
    if let Ok(i) = row.try_get::<PgInterval, _>(name) {
        return Ok(serde_json::json!({
            "months": i.months,
            "days": i.days,
            "microseconds": i.microseconds,
        }));
    }
    if let Ok(v) = row.try_get::<Vec<i64>, _>(name) {
        return Ok(Value::from(v));
    }
    if let Ok(v) = row.try_get::<Vec<i32>, _>(name) {
        return Ok(Value::from(v));
    }
    if let Ok(v) = row.try_get::<Vec<String>, _>(name) {
        return Ok(Value::from(v));
    }
    if let Ok(v) = row.try_get::<Vec<bool>, _>(name) {
        return Ok(Value::from(v));
    }
    if let Ok(v) = row.try_get::<Vec<f64>, _>(name) {
        return Ok(Value::Array(v.into_iter().map(float).collect()));
    }
    if let Ok(v) = row.try_get::<Vec<uuid::Uuid>, _>(name) {
        return Ok(Value::from(v.iter().map(|u| u.to_string()).collect::<Vec<_>>()));
    }
    // enum labels travel as their text in both wire formats
    if let PgTypeKind::Enum(_) = type_info.kind() {
        if let Ok(label) = raw.as_str() {
            return Ok(Value::String(label.to_string()));
        }
    }
    Err(sqlx::Error::ColumnDecode {
        index: format!("{:?}", name),
        source: format!("no JSON mapping for column type {}", type_info.name()).into(),
    })
}

/// Non-finite floats have no JSON number form.
fn float(n: f64) -> Value {
    serde_json::Number::from_f64(n)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}
