//! External point-of-interest data sources.
//!
//! A source answers one blocking question: which tagged records lie within
//! `radius_m` of `center`. Timeouts are the source's responsibility.

pub mod overpass;

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::SourceError;
use crate::facility::Coordinates;
use crate::normalize::RawElement;

pub use overpass::OverpassSource;

/// A blocking point-of-interest query.
pub trait DataSource: Send + Sync {
    fn query(
        &self,
        center: Coordinates,
        radius_m: u32,
        timeout_secs: u64,
    ) -> Result<Vec<RawElement>, SourceError>;
}

/// A source that always returns the same answer.
///
/// Used for offline runs from a saved Overpass response and in tests.
pub struct StaticSource {
    response: Result<Vec<RawElement>, SourceError>,
    calls: AtomicUsize,
}

impl StaticSource {
    pub fn new(records: Vec<RawElement>) -> Self {
        Self { response: Ok(records), calls: AtomicUsize::new(0) }
    }

    pub fn failing(error: SourceError) -> Self {
        Self { response: Err(error), calls: AtomicUsize::new(0) }
    }

    /// Build from a saved Overpass JSON body.
    pub fn from_overpass_json(body: &str) -> Result<Self, SourceError> {
        Ok(Self::new(overpass::parse_response(body)?))
    }

    /// Number of queries answered so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DataSource for StaticSource {
    fn query(&self, _center: Coordinates, _radius_m: u32, _timeout_secs: u64) -> Result<Vec<RawElement>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.response.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_source_counts_calls() {
        let source = StaticSource::new(vec![RawElement::default()]);
        let c = Coordinates::new(0.0, 0.0);
        assert_eq!(source.query(c, 100, 1).unwrap().len(), 1);
        assert_eq!(source.query(c, 100, 1).unwrap().len(), 1);
        assert_eq!(source.calls(), 2);
    }

    #[test]
    fn test_failing_source() {
        let source = StaticSource::failing(SourceError::Timeout(5));
        assert_eq!(
            source.query(Coordinates::new(0.0, 0.0), 1, 5),
            Err(SourceError::Timeout(5))
        );
    }
}
