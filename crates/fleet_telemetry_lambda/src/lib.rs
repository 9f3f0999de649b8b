//! AWS-oriented adapters and handlers for the van telemetry Lambdas.
//!
//! This crate owns runtime integration details (Lambda handlers, DynamoDB
//! and webhook adapters, configuration and logging). Domain contracts live in
//! `fleet_telemetry_core`.

pub mod adapters;
pub mod config;
pub mod handlers;
pub mod logging;
