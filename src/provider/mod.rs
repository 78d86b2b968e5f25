//! Clients for external services.

pub mod s3;

pub use s3::S3Provider;
