//! Service layer: conversions between DTOs and schemas, access checks, health.

mod base;
mod health;

pub use base::{
    ensure_user_has_access, map_dto_to_schema, map_schema_to_dto, user_has_access, BaseService,
    Overrides,
};
pub use health::HealthService;
