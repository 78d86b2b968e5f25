//! Shared fixtures: an in-memory recording session and sample models.
#![allow(dead_code)]

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use weblite_framework::session::{Entity, Model, RecordState, Session};
use weblite_framework::sql::Statement;

/// Session that records every call and keeps flushed rows in memory.
#[derive(Default)]
pub struct RecordingSession {
    pub calls: Vec<&'static str>,
    pub statements: Vec<Statement>,
    pub staged: Vec<Entity>,
    /// Entities as they were handed to `flush`.
    pub flushed_input: Vec<Entity>,
    pub rows: Vec<Entity>,
    pub execute_results: VecDeque<Vec<Value>>,
    /// Column overwritten in every row `flush` hands back.
    flushed_value: Option<(&'static str, Value)>,
    fail_on: Option<&'static str>,
    failure: Option<fn() -> sqlx::Error>,
    fail_rollback: bool,
    next_id: i64,
}

impl RecordingSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `op` fail with the error `make` builds.
    pub fn failing(op: &'static str, make: fn() -> sqlx::Error) -> Self {
        RecordingSession {
            fail_on: Some(op),
            failure: Some(make),
            ..Self::default()
        }
    }

    pub fn with_rollback_failure(mut self) -> Self {
        self.fail_rollback = true;
        self
    }

    pub fn with_flushed_value(mut self, column: &'static str, value: Value) -> Self {
        self.flushed_value = Some((column, value));
        self
    }

    pub fn returning(mut self, rows: Vec<Value>) -> Self {
        self.execute_results.push_back(rows);
        self
    }

    pub fn count(&self, op: &str) -> usize {
        self.calls.iter().filter(|c| **c == op).count()
    }

    fn record(&mut self, op: &'static str) -> Result<(), sqlx::Error> {
        self.calls.push(op);
        match (self.fail_on, self.failure) {
            (Some(target), Some(make)) if target == op => Err(make()),
            _ => Ok(()),
        }
    }
}

pub fn io_error() -> sqlx::Error {
    sqlx::Error::Io(std::io::Error::new(
        std::io::ErrorKind::ConnectionRefused,
        "connection refused",
    ))
}

pub fn protocol_error() -> sqlx::Error {
    sqlx::Error::Protocol("unexpected message".into())
}

#[async_trait]
impl Session for RecordingSession {
    fn add(&mut self, entity: Entity) {
        self.calls.push("add");
        self.staged.push(entity);
    }

    async fn flush(&mut self) -> Result<Vec<Entity>, sqlx::Error> {
        self.record("flush")?;
        self.flushed_input.extend(self.staged.iter().cloned());
        let mut written = Vec::new();
        for mut entity in std::mem::take(&mut self.staged) {
            let stored_key = entity.persisted_key.take();
            if entity.id().is_none() {
                let key = match &stored_key {
                    Some(key) => key.clone(),
                    None => {
                        self.next_id += 1;
                        Value::from(self.next_id)
                    }
                };
                entity.values.insert(entity.primary_key.to_string(), key);
            }
            entity.set_state(RecordState::Persistent);
            let replaced = stored_key.or_else(|| entity.id().cloned());
            self.rows
                .retain(|r| !(r.table == entity.table && r.id().cloned() == replaced));
            self.rows.push(entity.clone());
            if let Some((column, value)) = &self.flushed_value {
                entity.values.insert(column.to_string(), value.clone());
            }
            written.push(entity);
        }
        Ok(written)
    }

    async fn commit(&mut self) -> Result<(), sqlx::Error> {
        self.record("commit")
    }

    async fn refresh(&mut self, entity: &mut Entity) -> Result<(), sqlx::Error> {
        self.record("refresh")?;
        let stored = self
            .rows
            .iter()
            .find(|r| r.table == entity.table && r.id().is_some() && r.id() == entity.id())
            .ok_or(sqlx::Error::RowNotFound)?;
        entity.values = stored.values.clone();
        Ok(())
    }

    async fn execute(&mut self, statement: &Statement) -> Result<Vec<Value>, sqlx::Error> {
        self.statements.push(statement.clone());
        self.record("execute")?;
        Ok(self.execute_results.pop_front().unwrap_or_default())
    }

    async fn rollback(&mut self) -> Result<(), sqlx::Error> {
        self.calls.push("rollback");
        self.staged.clear();
        if self.fail_rollback {
            return Err(io_error());
        }
        Ok(())
    }

    async fn begin(&mut self) -> Result<(), sqlx::Error> {
        self.record("begin")
    }
}

// ---------------------------------------------------------------------------
// Sample records
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub id_: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(rename = "_state", default)]
    pub state: RecordState,
}

impl Model for User {
    const TABLE: &'static str = "users";
    const PRIMARY_KEY: &'static str = "id_";
}

pub fn user(id: Option<i64>, name: &str) -> User {
    User {
        id_: id,
        name: name.to_string(),
        email: None,
        state: RecordState::Transient,
    }
}
