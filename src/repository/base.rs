//! Generic repository over a session with rollback-on-error semantics.

use super::{GetById, ModelMapper};
use crate::error::AppError;
use crate::session::{
    from_field_map, is_connectivity_error, to_field_map, Entity, Model, RecordState, Session,
    STATE_FIELD,
};
use crate::sql::{ping, select_by_id, Statement};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

/// Wraps a caller-owned session. Pass `&mut session` to keep ownership outside.
///
/// `M` is the repository's [`ModelMapper`]; it ties the repository to one
/// DTO type and one model type. Model-less repositories use `()`.
///
/// Every session failure rolls back the active transaction before the
/// original error is returned.
pub struct BaseRepository<S, M = ()> {
    session: S,
    mapper: M,
}

impl<S: Session> BaseRepository<S> {
    pub fn new(session: S) -> Self {
        BaseRepository { session, mapper: () }
    }
}

impl<S: Session, M> BaseRepository<S, M> {
    pub fn with_mapper(session: S, mapper: M) -> Self {
        BaseRepository { session, mapper }
    }

    pub fn mapper(&self) -> &M {
        &self.mapper
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut S {
        &mut self.session
    }

    pub fn into_session(self) -> S {
        self.session
    }

    /// Stage an instance for the next flush.
    pub fn add<T: Model>(&mut self, instance: &T) -> Result<(), AppError> {
        let entity = Entity::from_model(instance)?;
        self.session.add(entity);
        Ok(())
    }

    pub async fn commit(&mut self) -> Result<(), AppError> {
        match self.session.commit().await {
            Ok(()) => Ok(()),
            Err(e) => Err(self.rollback_after(e).await),
        }
    }

    pub async fn flush(&mut self) -> Result<(), AppError> {
        self.flush_entities().await.map(|_| ())
    }

    /// Run a statement. Without the active transaction it runs in its own nested scope.
    pub async fn execute(
        &mut self,
        statement: &Statement,
        use_active_transaction: bool,
    ) -> Result<Vec<Value>, AppError> {
        let result = if use_active_transaction {
            self.session.execute(statement).await
        } else {
            self.execute_scoped(statement).await
        };
        match result {
            Ok(rows) => Ok(rows),
            Err(e) => Err(self.rollback_after(e).await),
        }
    }

    /// Reload an instance from the database.
    pub async fn refresh<T: Model>(&mut self, instance: &mut T) -> Result<(), AppError> {
        let mut entity = Entity::from_model(instance)?;
        if let Err(e) = self.session.refresh(&mut entity).await {
            return Err(self.rollback_after(e).await);
        }
        match entity.into_model() {
            Ok(model) => {
                *instance = model;
                Ok(())
            }
            Err(e) => Err(self.rolled_back(e).await),
        }
    }

    /// Fetch one model by primary key.
    pub async fn get_by_id<T: Model>(&mut self, id: Value) -> Result<Option<T>, AppError> {
        let q = select_by_id(T::TABLE, T::PRIMARY_KEY, id);
        let rows = self.execute(&q, true).await?;
        match rows.into_iter().next() {
            Some(Value::Object(values)) => {
                let mut entity = Entity::new(T::TABLE, T::PRIMARY_KEY, values);
                entity.set_state(RecordState::Persistent);
                Ok(Some(entity.into_model()?))
            }
            _ => Ok(None),
        }
    }

    /// Add and flush; returns the model with database-generated values.
    pub async fn add_record<T: Model>(&mut self, model: T) -> Result<T, AppError> {
        self.add(&model)?;
        self.flush_written(model).await
    }

    /// Copy fields of `new_data` onto `existing`, then write them to the row
    /// stored under `existing`'s primary key.
    ///
    /// Fields named in `ignore_fields` and the session's `_state` field keep
    /// their existing values. A null primary key in `new_data` keeps the
    /// stored key; a different one moves the row to it.
    pub async fn update<T: Model>(
        &mut self,
        existing: T,
        new_data: &T,
        ignore_fields: &[&str],
    ) -> Result<T, AppError> {
        let stored_key = Entity::from_model(&existing)?.id().cloned();
        let mut merged = to_field_map(&existing)?;
        for (name, value) in to_field_map(new_data)? {
            if name == STATE_FIELD || ignore_fields.contains(&name.as_str()) {
                continue;
            }
            if name == T::PRIMARY_KEY && value.is_null() {
                continue;
            }
            merged.insert(name, value);
        }
        let updated: T = from_field_map(merged)?;
        let entity = match stored_key {
            Some(key) => Entity::for_update(&updated, key)?,
            None => Entity::from_model(&updated)?,
        };
        self.session.add(entity);
        self.flush_written(updated).await
    }

    /// `SELECT 1`: false when the database is unreachable.
    pub async fn is_connection_exist(&mut self) -> Result<bool, AppError> {
        match self.execute(&ping(), true).await {
            Ok(_) => Ok(true),
            Err(AppError::Db(e)) if is_connectivity_error(&e) => {
                tracing::warn!(error = %e, "database connection check failed");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Flush and map the last written row back to a model; `fallback` when
    /// the session wrote nothing.
    async fn flush_written<T: Model>(&mut self, fallback: T) -> Result<T, AppError> {
        let mut written = self.flush_entities().await?;
        match written.pop().map(Entity::into_model::<T>) {
            Some(Ok(model)) => Ok(model),
            Some(Err(e)) => Err(self.rolled_back(e).await),
            None => Ok(fallback),
        }
    }

    async fn flush_entities(&mut self) -> Result<Vec<Entity>, AppError> {
        match self.session.flush().await {
            Ok(written) => Ok(written),
            Err(e) => Err(self.rollback_after(e).await),
        }
    }

    async fn execute_scoped(&mut self, statement: &Statement) -> Result<Vec<Value>, sqlx::Error> {
        self.session.begin().await?;
        let rows = self.session.execute(statement).await?;
        self.session.commit().await?;
        Ok(rows)
    }

    async fn rollback_after(&mut self, err: sqlx::Error) -> AppError {
        self.rolled_back(AppError::Db(err)).await
    }

    /// Roll back, keeping the original error. A failed rollback is only logged.
    async fn rolled_back(&mut self, err: AppError) -> AppError {
        tracing::error!(error = %err, "session operation failed, rolling back");
        if let Err(rollback_err) = self.session.rollback().await {
            tracing::warn!(error = %rollback_err, "rollback failed");
        }
        err
    }
}

impl<S: Session, M: ModelMapper> BaseRepository<S, M> {
    /// Fetch by primary key, as a DTO.
    pub async fn find_dto(&mut self, id: Value) -> Result<Option<M::Dto>, AppError> {
        let model = self.get_by_id::<M::Model>(id).await?;
        Ok(model.map(|m| self.mapper.model_to_dto(&m)))
    }

    /// Convert, add and flush a DTO; returns it with database-generated values.
    pub async fn add_dto(&mut self, dto: &M::Dto) -> Result<M::Dto, AppError> {
        let model = self.mapper.dto_to_model(dto);
        let saved = self.add_record(model).await?;
        Ok(self.mapper.model_to_dto(&saved))
    }
}

#[async_trait]
impl<S, M> GetById for BaseRepository<S, M>
where
    S: Session,
    M: ModelMapper + Send,
    M::Dto: Serialize + Send,
{
    type Entity = M::Dto;

    async fn get_by_id(&mut self, id: &Value) -> Result<Option<M::Dto>, AppError> {
        self.find_dto(id.clone()).await
    }
}
