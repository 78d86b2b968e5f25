//! Repository layer: a session-backed base plus the capabilities services consume.

mod base;
mod common;

pub use base::BaseRepository;
pub use common::CommonRepo;

use crate::error::AppError;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

/// DTO and model conversion, implemented by each concrete repository.
pub trait ModelMapper {
    type Dto;
    type Model: crate::session::Model;

    fn model_to_dto(&self, model: &Self::Model) -> Self::Dto;

    fn dto_to_model(&self, dto: &Self::Dto) -> Self::Model;
}

/// Fetch a single entity by id. Consumed by ownership checks.
#[async_trait]
pub trait GetById: Send {
    type Entity: Serialize + Send;

    async fn get_by_id(&mut self, id: &Value) -> Result<Option<Self::Entity>, AppError>;
}
