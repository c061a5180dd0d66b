//! OpenStreetMap Overpass API provider for hospitals and clinics.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::io;
use std::time::Duration;
use tracing::{debug, warn};

use super::DataSource;
use crate::config::OVERPASS_URL;
use crate::error::SourceError;
use crate::facility::{Bounds, Coordinates};
use crate::normalize::{RawElement, RecordKind};

const USER_AGENT: &str = "ClinicFinder/0.3 (facility-discovery)";

/// Blocking Overpass client.
pub struct OverpassSource {
    endpoint: String,
}

impl OverpassSource {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self { endpoint: endpoint.into() }
    }
}

impl Default for OverpassSource {
    fn default() -> Self {
        Self::new(OVERPASS_URL)
    }
}

impl DataSource for OverpassSource {
    fn query(&self, center: Coordinates, radius_m: u32, timeout_secs: u64) -> Result<Vec<RawElement>, SourceError> {
        let query = build_query(center, radius_m, timeout_secs);
        debug!(endpoint = %self.endpoint, radius_m, "posting overpass query");

        let response = ureq::post(&self.endpoint)
            .set("User-Agent", USER_AGENT)
            .timeout(Duration::from_secs(timeout_secs))
            .send_form(&[("data", query.as_str())])
            .map_err(|e| map_transport_error(e, timeout_secs))?;

        let parsed: OverpassResponse = response
            .into_json()
            .map_err(|e| SourceError::InvalidResponse(e.to_string()))?;
        Ok(parsed.into_records())
    }
}

/// Overpass QL for hospital and clinic nodes, ways and relations around a point.
pub fn build_query(center: Coordinates, radius_m: u32, timeout_secs: u64) -> String {
    let around = format!("(around:{},{},{})", radius_m, center.lat, center.lon);
    let mut q = format!("[out:json][timeout:{}];\n(\n", timeout_secs);
    for filter in [r#"["amenity"~"hospital|clinic"]"#, r#"["healthcare"="hospital"]"#] {
        for element in ["node", "way", "relation"] {
            q.push_str(&format!("  {}{}{};\n", element, filter, around));
        }
    }
    q.push_str(");\nout center tags;\n");
    q
}

fn map_transport_error(e: ureq::Error, timeout_secs: u64) -> SourceError {
    match e {
        ureq::Error::Status(code, _) => {
            warn!(code, "overpass returned error status");
            SourceError::Unavailable(format!("HTTP status {}", code))
        }
        ureq::Error::Transport(t) if is_timeout(&t) => SourceError::Timeout(timeout_secs),
        ureq::Error::Transport(t) => SourceError::Unavailable(t.to_string()),
    }
}

/// Timeouts surface as I/O transport errors wrapping `TimedOut` or
/// `WouldBlock` (socket read deadline).
fn is_timeout(t: &ureq::Transport) -> bool {
    t.kind() == ureq::ErrorKind::Io
        && std::error::Error::source(t)
            .and_then(|e| e.downcast_ref::<io::Error>())
            .is_some_and(|e| matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock))
}

// ─── Response decoding ──────────────────────────────────────────

#[derive(Deserialize)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<OverpassElement>,
}

impl OverpassResponse {
    fn into_records(self) -> Vec<RawElement> {
        self.elements.into_iter().map(RawElement::from).collect()
    }
}

#[derive(Deserialize)]
struct OverpassElement {
    #[serde(rename = "type")]
    element_type: String,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
    #[serde(default)]
    center: Option<LatLon>,
    #[serde(default)]
    bounds: Option<OverpassBounds>,
    #[serde(default)]
    tags: BTreeMap<String, String>,
}

#[derive(Deserialize)]
struct LatLon {
    lat: f64,
    lon: f64,
}

#[derive(Deserialize)]
struct OverpassBounds {
    minlat: f64,
    minlon: f64,
    maxlat: f64,
    maxlon: f64,
}

impl From<OverpassElement> for RawElement {
    fn from(el: OverpassElement) -> Self {
        let kind = match el.element_type.as_str() {
            "node" => Some(RecordKind::Point),
            "way" | "relation" => Some(RecordKind::Area),
            _ => None,
        };
        let coordinates = match (el.lat, el.lon) {
            (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon)),
            _ => None,
        };
        RawElement {
            kind,
            tags: el.tags,
            coordinates,
            center: el.center.map(|c| Coordinates::new(c.lat, c.lon)),
            bounds: el.bounds.map(|b| Bounds {
                min_lat: b.minlat,
                min_lon: b.minlon,
                max_lat: b.maxlat,
                max_lon: b.maxlon,
            }),
        }
    }
}

/// Decode an Overpass `[out:json]` body into raw records.
pub fn parse_response(body: &str) -> Result<Vec<RawElement>, SourceError> {
    let parsed: OverpassResponse =
        serde_json::from_str(body).map_err(|e| SourceError::InvalidResponse(e.to_string()))?;
    Ok(parsed.into_records())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "version": 0.6,
        "elements": [
            { "type": "node", "id": 1, "lat": 11.0168, "lon": 76.9558,
              "tags": { "amenity": "hospital", "name": "Govt Hospital" } },
            { "type": "way", "id": 2,
              "center": { "lat": 11.03, "lon": 77.01 },
              "tags": { "amenity": "clinic", "name": "Care Clinic" } },
            { "type": "relation", "id": 3,
              "bounds": { "minlat": 11.0, "minlon": 77.0, "maxlat": 11.2, "maxlon": 77.2 } },
            { "type": "area", "id": 4 }
        ]
    }"#;

    #[test]
    fn test_parse_elements() {
        let records = parse_response(SAMPLE).unwrap();
        assert_eq!(records.len(), 4);

        assert_eq!(records[0].kind, Some(RecordKind::Point));
        assert_eq!(records[0].coordinates, Some(Coordinates::new(11.0168, 76.9558)));
        assert_eq!(records[0].tags.get("name").map(String::as_str), Some("Govt Hospital"));

        assert_eq!(records[1].kind, Some(RecordKind::Area));
        assert_eq!(records[1].center, Some(Coordinates::new(11.03, 77.01)));
        assert!(records[1].coordinates.is_none());

        let b = records[2].bounds.unwrap();
        assert_eq!((b.min_lat, b.max_lon), (11.0, 77.2));
        assert!(records[2].tags.is_empty());

        assert_eq!(records[3].kind, None);
    }

    #[test]
    fn test_parse_missing_elements_is_empty() {
        assert!(parse_response(r#"{ "version": 0.6 }"#).unwrap().is_empty());
    }

    #[test]
    fn test_parse_garbage_is_invalid_response() {
        assert!(matches!(
            parse_response("<html>rate limited</html>"),
            Err(SourceError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_transport_timeout_detected_by_kind() {
        let timed_out = ureq::Error::from(io::Error::new(io::ErrorKind::TimedOut, "deadline elapsed"));
        assert_eq!(map_transport_error(timed_out, 30), SourceError::Timeout(30));

        let refused = ureq::Error::from(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"));
        assert!(matches!(map_transport_error(refused, 30), SourceError::Unavailable(_)));
    }

    #[test]
    fn test_build_query() {
        let q = build_query(Coordinates::new(11.1, 77.0), 7000, 180);
        assert!(q.starts_with("[out:json][timeout:180];"));
        assert!(q.contains(r#"node["amenity"~"hospital|clinic"](around:7000,11.1,77);"#));
        assert!(q.contains(r#"relation["healthcare"="hospital"](around:7000,11.1,77);"#));
        assert_eq!(q.matches("(around:").count(), 6);
        assert!(q.trim_end().ends_with("out center tags;"));
    }
}
