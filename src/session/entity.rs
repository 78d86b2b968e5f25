//! Persisted records and their type-erased form staged on a session.

use crate::error::AppError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Name of the internal bookkeeping field a session owns. Never copied by updates.
pub const STATE_FIELD: &str = "_state";

/// Persistence lifecycle of a record, as tracked by the session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordState {
    #[default]
    Transient,
    Persistent,
}

/// A record type mapped to a table. Fields are declared through serde.
///
/// Models that want to observe their lifecycle declare
/// `#[serde(rename = "_state", default)] state: RecordState`.
pub trait Model: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Table name, optionally schema-qualified.
    const TABLE: &'static str;
    const PRIMARY_KEY: &'static str = "id";
}

/// Serialize any record into its field map. Non-object records are a mapping error.
pub fn to_field_map<T: Serialize + ?Sized>(value: &T) -> Result<Map<String, Value>, AppError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(AppError::repository(format!(
            "record must serialize to a mapping, got {}",
            json_kind(&other)
        ))),
        Err(e) => Err(AppError::repository(format!("failed to serialize record: {}", e))),
    }
}

/// Build a record from a field map.
pub fn from_field_map<T: DeserializeOwned>(map: Map<String, Value>) -> Result<T, AppError> {
    serde_json::from_value(Value::Object(map))
        .map_err(|e| AppError::repository(format!("failed to build record: {}", e)))
}

pub(crate) fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Type-erased model: what a session stages, flushes and refreshes.
#[derive(Clone, Debug, PartialEq)]
pub struct Entity {
    pub table: &'static str,
    pub primary_key: &'static str,
    pub values: Map<String, Value>,
    /// Key of the stored row this entity replaces. Set for updates; the
    /// session writes to that row even when `values` carries another key.
    pub persisted_key: Option<Value>,
}

impl Entity {
    pub fn new(table: &'static str, primary_key: &'static str, values: Map<String, Value>) -> Self {
        Entity {
            table,
            primary_key,
            values,
            persisted_key: None,
        }
    }

    pub fn from_model<M: Model>(model: &M) -> Result<Self, AppError> {
        Ok(Entity::new(M::TABLE, M::PRIMARY_KEY, to_field_map(model)?))
    }

    /// Stage `model` as the new content of the row stored under `key`.
    pub fn for_update<M: Model>(model: &M, key: Value) -> Result<Self, AppError> {
        let mut entity = Entity::from_model(model)?;
        entity.persisted_key = Some(key);
        Ok(entity)
    }

    pub fn into_model<M: Model>(self) -> Result<M, AppError> {
        from_field_map(self.values)
    }

    /// Primary key value, if set.
    pub fn id(&self) -> Option<&Value> {
        self.values.get(self.primary_key).filter(|v| !v.is_null())
    }

    pub fn state(&self) -> RecordState {
        self.values
            .get(STATE_FIELD)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default()
    }

    pub fn set_state(&mut self, state: RecordState) {
        let v = match state {
            RecordState::Transient => "transient",
            RecordState::Persistent => "persistent",
        };
        self.values.insert(STATE_FIELD.into(), Value::String(v.into()));
    }

    /// Column values, without session bookkeeping.
    pub fn columns(&self) -> Map<String, Value> {
        self.values
            .iter()
            .filter(|(k, _)| k.as_str() != STATE_FIELD)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Note {
        id: Option<i64>,
        body: String,
        #[serde(rename = "_state", default)]
        state: RecordState,
    }

    impl Model for Note {
        const TABLE: &'static str = "notes";
    }

    #[test]
    fn entity_round_trips_model() {
        let note = Note {
            id: Some(3),
            body: "hi".into(),
            state: RecordState::Transient,
        };
        let entity = Entity::from_model(&note).unwrap();
        assert_eq!(entity.table, "notes");
        assert_eq!(entity.id(), Some(&json!(3)));
        assert_eq!(entity.into_model::<Note>().unwrap(), note);
    }

    #[test]
    fn state_is_tracked_but_not_a_column() {
        let mut entity = Entity::from_model(&Note {
            id: None,
            body: "x".into(),
            state: RecordState::Transient,
        })
        .unwrap();
        assert_eq!(entity.id(), None);
        entity.set_state(RecordState::Persistent);
        assert_eq!(entity.state(), RecordState::Persistent);
        assert!(!entity.columns().contains_key(STATE_FIELD));
        let note: Note = entity.into_model().unwrap();
        assert_eq!(note.state, RecordState::Persistent);
    }

    #[test]
    fn update_entities_remember_the_stored_key() {
        let note = Note {
            id: Some(1000),
            body: "moved".into(),
            state: RecordState::Transient,
        };
        assert_eq!(Entity::from_model(&note).unwrap().persisted_key, None);
        let entity = Entity::for_update(&note, json!(3)).unwrap();
        assert_eq!(entity.persisted_key, Some(json!(3)));
        assert_eq!(entity.id(), Some(&json!(1000)));
    }

    #[test]
    fn scalars_are_not_records() {
        assert!(to_field_map(&5).is_err());
    }
}
