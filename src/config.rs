//! Finder configuration: reference point, radius, timezone and source settings.
//!
//! Values are injected by the caller (CLI flags, a JSON file, or code); the
//! pipeline itself reads no environment variables.

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::ConfigError;
use crate::facility::Coordinates;

/// Coimbatore city center.
pub const DEFAULT_REFERENCE: Coordinates = Coordinates::new(11.100824, 77.026695);
pub const DEFAULT_RADIUS_M: u32 = 7000;
pub const DEFAULT_TIMEZONE: &str = "Asia/Kolkata";
pub const DEFAULT_TIMEOUT_SECS: u64 = 180;
pub const OVERPASS_URL: &str = "https://overpass-api.de/api/interpreter";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinderConfig {
    /// Search center and distance origin.
    pub reference: Coordinates,
    pub radius_m: u32,
    /// IANA timezone used to evaluate opening hours.
    pub timezone: String,
    pub timeout_secs: u64,
    pub endpoint: String,
}

impl Default for FinderConfig {
    fn default() -> Self {
        Self {
            reference: DEFAULT_REFERENCE,
            radius_m: DEFAULT_RADIUS_M,
            timezone: DEFAULT_TIMEZONE.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            endpoint: OVERPASS_URL.to_string(),
        }
    }
}

impl FinderConfig {
    /// Load from a JSON file; missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.reference.in_range() {
            return Err(ConfigError::InvalidCoordinates {
                lat: self.reference.lat,
                lon: self.reference.lon,
            });
        }
        if self.radius_m == 0 {
            return Err(ConfigError::InvalidRadius);
        }
        self.tz()?;
        Ok(())
    }

    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse()
            .map_err(|_| ConfigError::UnknownTimezone(self.timezone.clone()))
    }

    pub fn radius_km(&self) -> f64 {
        f64::from(self.radius_m) / 1000.0
    }
}
