use std::env;
use std::fmt::Display;
use std::str::FromStr;

use fleet_telemetry_core::alert::{SpeedPolicy, DEFAULT_SPEED_LIMIT_KMH};
use fleet_telemetry_core::page::{DEFAULT_MAX_PAGE_SIZE, DEFAULT_SCAN_PAGE_SIZE};
use tracing::info;

use crate::handlers::ingest::IngestSettings;

pub const DEFAULT_TELEMETRY_TABLE: &str = "vanTelemetry";
pub const DEFAULT_CLIENT_TABLE: &str = "client";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key} ({value:?}): {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Settings for the ingest Lambda, read once at cold start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestConfig {
    pub telemetry_table: String,
    pub scan_page_size: usize,
    pub max_page_size: usize,
}

impl IngestConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let config = Self {
            telemetry_table: load(&lookup, "TELEMETRY_TABLE", DEFAULT_TELEMETRY_TABLE.to_string())?,
            scan_page_size: load(&lookup, "SCAN_PAGE_SIZE", DEFAULT_SCAN_PAGE_SIZE)?,
            max_page_size: load(&lookup, "MAX_PAGE_SIZE", DEFAULT_MAX_PAGE_SIZE)?,
        };

        if config.scan_page_size == 0 {
            return Err(invalid("SCAN_PAGE_SIZE", 0, "must be positive"));
        }
        if config.max_page_size == 0 {
            return Err(invalid("MAX_PAGE_SIZE", 0, "must be positive"));
        }
        // A cursor-only paged read falls back to the scan page size as its limit.
        if config.scan_page_size > config.max_page_size {
            return Err(invalid(
                "SCAN_PAGE_SIZE",
                config.scan_page_size,
                format!("must not exceed MAX_PAGE_SIZE ({})", config.max_page_size),
            ));
        }

        Ok(config)
    }

    pub fn ingest_settings(&self) -> IngestSettings {
        IngestSettings {
            scan_page_size: self.scan_page_size,
            max_page_size: self.max_page_size,
        }
    }
}

/// Settings for the notification Lambda, read once at cold start.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationConfig {
    pub client_table: String,
    pub speed_limit_kmh: f64,
}

impl NotificationConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let config = Self {
            client_table: load(&lookup, "CLIENT_TABLE", DEFAULT_CLIENT_TABLE.to_string())?,
            speed_limit_kmh: load(&lookup, "SPEED_LIMIT_KMH", DEFAULT_SPEED_LIMIT_KMH)?,
        };

        if !config.speed_limit_kmh.is_finite() || config.speed_limit_kmh < 0.0 {
            return Err(invalid(
                "SPEED_LIMIT_KMH",
                config.speed_limit_kmh,
                "must be a finite, non-negative number",
            ));
        }

        Ok(config)
    }

    pub fn speed_policy(&self) -> SpeedPolicy {
        SpeedPolicy::new(self.speed_limit_kmh)
    }
}

fn load<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr + Display,
    T::Err: Display,
{
    match lookup(key).filter(|value| !value.trim().is_empty()) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|error: T::Err| invalid(key, &value, error)),
        None => {
            info!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}

fn invalid(key: &'static str, value: impl Display, reason: impl Display) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
