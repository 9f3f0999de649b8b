//! Shared van telemetry domain primitives.
//!
//! This crate owns the request/record contracts, the error taxonomy and the
//! speed alert policy. It intentionally excludes AWS SDK and Lambda runtime
//! concerns; those live in `fleet_telemetry_lambda`.

pub mod alert;
pub mod change;
pub mod error;
pub mod page;
pub mod record;
