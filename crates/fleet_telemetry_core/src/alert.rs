use serde::{Deserialize, Serialize};

use crate::change::ChangeEvent;
use crate::record::{CLIENT_ID, SPEED};

pub const DEFAULT_SPEED_LIMIT_KMH: f64 = 100.0;

/// Outcome of parsing a speed attribute delivered as text.
#[derive(Debug, Clone, PartialEq)]
pub enum SpeedReading {
    Number(f64),
    ParseFailure(String),
}

impl SpeedReading {
    /// Accepts surrounding whitespace only; non-finite values are failures.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().parse::<f64>() {
            Ok(value) if value.is_finite() => Self::Number(value),
            _ => Self::ParseFailure(raw.to_string()),
        }
    }
}

/// How a single change event relates to the speed limit.
#[derive(Debug, Clone, PartialEq)]
pub enum Assessment {
    /// Not an insert or modify.
    Ignored { kind: String },
    /// No new image, or the image has no clientID or speed.
    MissingFields,
    UnparsableSpeed { client_id: String, raw: String },
    WithinLimit { client_id: String, speed: f64 },
    OverLimit { client_id: String, speed: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedPolicy {
    limit_kmh: f64,
}

impl Default for SpeedPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_SPEED_LIMIT_KMH)
    }
}

impl SpeedPolicy {
    pub fn new(limit_kmh: f64) -> Self {
        Self { limit_kmh }
    }

    pub fn limit_kmh(&self) -> f64 {
        self.limit_kmh
    }

    /// Strictly above the limit; a speed equal to it is fine.
    pub fn is_exceeded_by(&self, speed: f64) -> bool {
        speed > self.limit_kmh
    }

    pub fn assess(&self, event: &ChangeEvent) -> Assessment {
        if !event.kind.writes_new_image() {
            return Assessment::Ignored {
                kind: event.kind.as_str().to_string(),
            };
        }

        let Some(image) = event.new_image.as_ref() else {
            return Assessment::MissingFields;
        };
        let (Some(client_id), Some(raw_speed)) = (
            image.string(CLIENT_ID).filter(|value| !value.is_empty()),
            image.scalar_text(SPEED).filter(|value| !value.is_empty()),
        ) else {
            return Assessment::MissingFields;
        };

        let client_id = client_id.to_string();
        match SpeedReading::parse(raw_speed) {
            SpeedReading::ParseFailure(raw) => Assessment::UnparsableSpeed { client_id, raw },
            SpeedReading::Number(speed) if self.is_exceeded_by(speed) => {
                Assessment::OverLimit { client_id, speed }
            }
            SpeedReading::Number(speed) => Assessment::WithinLimit { client_id, speed },
        }
    }

    pub fn alert_for(&self, speed: f64) -> AlertMessage {
        AlertMessage {
            content: format!(
                "**Alerta:** Tu furgoneta ha superado los {} km/h (velocidad actual: {}).",
                self.limit_kmh, speed
            ),
        }
    }
}

/// Discord webhook payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertMessage {
    pub content: String,
}
