//! Request and response schemas with explicitly declared field tables.
//!
//! A schema lists its fields in `FIELDS`; conversions and example generation
//! work from that table, never from the type's runtime shape.
//!
//! ```ignore
//! #[derive(Serialize, Deserialize)]
//! struct ResumeOut {
//!     id: i64,
//!     title: String,
//! }
//!
//! impl Schema for ResumeOut {
//!     const NAME: &'static str = "ResumeOut";
//!     const FIELDS: &'static [FieldSpec] = &[
//!         FieldSpec::new("id").alias("resumeId").description("Resume id").examples(&["1"]),
//!         FieldSpec::new("title").alias("title").description("Title").examples(&["Engineer"]),
//!     ];
//! }
//! ```

pub mod validators;

use crate::error::{AppError, ConfigError};
use crate::session::{from_field_map, to_field_map};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

/// One declared schema field. `name` is the serde field name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub alias: &'static str,
    pub description: &'static str,
    pub examples: &'static [&'static str],
}

impl FieldSpec {
    pub const fn new(name: &'static str) -> Self {
        FieldSpec {
            name,
            alias: "",
            description: "",
            examples: &[],
        }
    }

    pub const fn alias(self, alias: &'static str) -> Self {
        FieldSpec { alias, ..self }
    }

    pub const fn description(self, description: &'static str) -> Self {
        FieldSpec { description, ..self }
    }

    /// Examples are JSON literals; anything that does not parse is taken as a plain string.
    pub const fn examples(self, examples: &'static [&'static str]) -> Self {
        FieldSpec { examples, ..self }
    }

    fn example_value(&self) -> Option<Value> {
        let raw = self.examples.first()?;
        Some(serde_json::from_str(raw).unwrap_or_else(|_| Value::String((*raw).to_string())))
    }
}

/// A validated external-facing record with a declared field table.
pub trait Schema: Serialize + DeserializeOwned {
    const NAME: &'static str;
    const FIELDS: &'static [FieldSpec];

    /// Field values keyed by field name.
    fn dump(&self) -> Result<Map<String, Value>, AppError> {
        to_field_map(self)
    }
}

/// Names of the fields `S` declares, in declaration order.
pub fn declared_fields<S: Schema>() -> impl Iterator<Item = &'static str> {
    S::FIELDS.iter().map(|f| f.name)
}

/// Every field must carry an alias, a description and exactly one example.
pub fn validate_declaration<S: Schema>() -> Result<(), ConfigError> {
    for field in S::FIELDS {
        let reason = if field.alias.is_empty() {
            Some("has no alias".to_string())
        } else if field.description.is_empty() {
            Some("has no description".to_string())
        } else if field.examples.len() != 1 {
            Some(format!("must declare exactly one example, got {}", field.examples.len()))
        } else {
            None
        };
        if let Some(reason) = reason {
            return Err(ConfigError::InvalidSchema {
                schema: S::NAME,
                field: field.name,
                reason,
            });
        }
    }
    Ok(())
}

/// Build an instance of `S` from each field's example.
pub fn generate_example<S: Schema>() -> Result<S, AppError> {
    validate_declaration::<S>()?;
    let values: Map<String, Value> = S::FIELDS
        .iter()
        .filter_map(|f| Some((f.name.to_string(), f.example_value()?)))
        .collect();
    from_field_map(values).map_err(|e| {
        AppError::repository(format!("example for schema {} does not build: {}", S::NAME, e))
    })
}

/// Dump keyed by alias. Fields without an alias, or not declared, keep their name.
pub fn dump_by_alias<S: Schema>(schema: &S) -> Result<Map<String, Value>, AppError> {
    let mut out = Map::new();
    for (name, value) in schema.dump()? {
        let key = S::FIELDS
            .iter()
            .find(|f| f.name == name && !f.alias.is_empty())
            .map(|f| f.alias.to_string())
            .unwrap_or(name);
        out.insert(key, value);
    }
    Ok(out)
}
