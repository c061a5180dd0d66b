//! Error types for the facility finder.
//!
//! Only the data source can genuinely fail. Everything downstream of it
//! (normalization, dedup, opening hours, distance, filtering) degrades to
//! documented fallback values instead.

use thiserror::Error;

/// Failures from the external point-of-interest data source.
///
/// All variants are the "source unavailable" kind: the finder reports them
/// as an empty result plus a message, never as a fatal error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// Network or transport failure.
    #[error("Data source unavailable: {0}")]
    Unavailable(String),

    /// The request did not finish within the configured timeout.
    #[error("Data source timed out after {0}s")]
    Timeout(u64),

    /// The source answered, but the body could not be decoded.
    #[error("Invalid data source response: {0}")]
    InvalidResponse(String),
}

/// Errors from loading or validating a [`FinderConfig`](crate::config::FinderConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Unknown timezone '{0}'. Use IANA format (e.g. Asia/Kolkata).")]
    UnknownTimezone(String),

    #[error("Invalid coordinates ({lat}, {lon}). Lat: -90..90, Lon: -180..180")]
    InvalidCoordinates { lat: f64, lon: f64 },

    #[error("Search radius must be positive")]
    InvalidRadius,
}
