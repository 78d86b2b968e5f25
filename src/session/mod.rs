//! Unit-of-work session: the capability surface repositories are built on.

mod entity;
mod pg;

pub use entity::{from_field_map, to_field_map, Entity, Model, RecordState, STATE_FIELD};
pub use pg::PgSession;

use crate::sql::Statement;
use async_trait::async_trait;
use serde_json::Value;

/// Database session owned by the caller. One logical operation at a time.
///
/// Transactions begin implicitly on first use. `begin` opens a nested scope
/// that the next `commit` closes; `rollback` discards everything, including
/// staged entities.
#[async_trait]
pub trait Session: Send {
    /// Stage an entity for the next flush.
    fn add(&mut self, entity: Entity);

    /// Write staged entities. Returns them as persisted, in staging order.
    async fn flush(&mut self) -> Result<Vec<Entity>, sqlx::Error>;

    async fn commit(&mut self) -> Result<(), sqlx::Error>;

    /// Reload an entity's values by primary key.
    async fn refresh(&mut self, entity: &mut Entity) -> Result<(), sqlx::Error>;

    /// Run a statement, returning result rows as JSON objects.
    async fn execute(&mut self, statement: &Statement) -> Result<Vec<Value>, sqlx::Error>;

    async fn rollback(&mut self) -> Result<(), sqlx::Error>;

    async fn begin(&mut self) -> Result<(), sqlx::Error>;
}

#[async_trait]
impl<T: Session + ?Sized> Session for &mut T {
    fn add(&mut self, entity: Entity) {
        (**self).add(entity)
    }

    async fn flush(&mut self) -> Result<Vec<Entity>, sqlx::Error> {
        (**self).flush().await
    }

    async fn commit(&mut self) -> Result<(), sqlx::Error> {
        (**self).commit().await
    }

    async fn refresh(&mut self, entity: &mut Entity) -> Result<(), sqlx::Error> {
        (**self).refresh(entity).await
    }

    async fn execute(&mut self, statement: &Statement) -> Result<Vec<Value>, sqlx::Error> {
        (**self).execute(statement).await
    }

    async fn rollback(&mut self) -> Result<(), sqlx::Error> {
        (**self).rollback().await
    }

    async fn begin(&mut self) -> Result<(), sqlx::Error> {
        (**self).begin().await
    }
}

/// Errors meaning the database could not be reached, as opposed to a failed statement.
pub fn is_connectivity_error(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
    )
}
