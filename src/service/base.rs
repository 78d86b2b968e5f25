//! DTO and schema conversion for services, plus the resource ownership check.

use crate::error::AppError;
use crate::repository::GetById;
use crate::schema::{declared_fields, Schema};
use crate::session::{from_field_map, to_field_map};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

/// Extra fields merged over a schema dump before the DTO is built.
pub type Overrides = Map<String, Value>;

/// Conversions every concrete service provides. Implementations usually
/// delegate to [`map_dto_to_schema`] and [`map_schema_to_dto`].
pub trait BaseService {
    type Dto: Serialize + DeserializeOwned;
    type Schema: Schema;

    fn dto_to_schema(&self, dto: &Self::Dto) -> Result<Self::Schema, AppError>;

    fn schema_to_dto<R: Schema>(
        &self,
        schema: &R,
        overrides: &Overrides,
    ) -> Result<Self::Dto, AppError>;

    fn bulk_dto_to_schema(&self, dtos: &[Self::Dto]) -> Result<Vec<Self::Schema>, AppError> {
        dtos.iter().map(|dto| self.dto_to_schema(dto)).collect()
    }

    fn bulk_schema_to_dto<R: Schema>(
        &self,
        schemas: &[R],
        overrides: &Overrides,
    ) -> Result<Vec<Self::Dto>, AppError> {
        schemas
            .iter()
            .map(|schema| self.schema_to_dto(schema, overrides))
            .collect()
    }
}

/// Copy the DTO fields that `S` declares. Fields the DTO lacks are left to the schema's defaults.
pub fn map_dto_to_schema<D, S>(dto: &D) -> Result<S, AppError>
where
    D: Serialize,
    S: Schema,
{
    let mut source = to_field_map(dto)?;
    let data: Map<String, Value> = declared_fields::<S>()
        .filter_map(|name| source.remove(name).map(|v| (name.to_string(), v)))
        .collect();
    from_field_map(data).map_err(|e| {
        AppError::repository(format!("failed to build schema {}: {}", S::NAME, e))
    })
}

/// Dump the schema, merge `overrides` on top and build the DTO.
pub fn map_schema_to_dto<R, D>(schema: &R, overrides: &Overrides) -> Result<D, AppError>
where
    R: Schema,
    D: DeserializeOwned,
{
    let mut data = schema.dump().map_err(|e| {
        AppError::repository(format!("schema {} must dump to a mapping: {}", R::NAME, e))
    })?;
    data.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
    from_field_map(data)
}

/// True when the entity exists and its `field_name` equals `expected`.
/// Numbers compare by value, so a stored `10` matches an expected `10.0`.
pub async fn user_has_access<R>(
    repository: &mut R,
    entity_id: &Value,
    field_name: &str,
    expected: &Value,
) -> Result<bool, AppError>
where
    R: GetById + ?Sized,
{
    let entity = match repository.get_by_id(entity_id).await? {
        Some(entity) => entity,
        None => return Ok(false),
    };
    let fields = to_field_map(&entity)?;
    Ok(fields.get(field_name).is_some_and(|actual| same_value(actual, expected)))
}

fn same_value(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => a == b,
            _ => a.as_f64().is_some_and(|a| b.as_f64() == Some(a)),
        },
        _ => actual == expected,
    }
}

/// Like [`user_has_access`], but a denied check is `AppError::AccessDenied`.
pub async fn ensure_user_has_access<R>(
    repository: &mut R,
    entity_id: &Value,
    field_name: &str,
    expected: &Value,
) -> Result<(), AppError>
where
    R: GetById + ?Sized,
{
    if user_has_access(repository, entity_id, field_name, expected).await? {
        Ok(())
    } else {
        tracing::info!(entity_id = %entity_id, field = field_name, "access denied");
        Err(AppError::AccessDenied)
    }
}
