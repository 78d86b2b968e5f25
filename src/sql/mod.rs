//! Parameterized statements. Identifiers come from model declarations, values are always bound.

mod builder;
pub mod params;
pub use builder::*;
pub use params::*;
