//! Canonical facility types shared by every pipeline stage.

use chrono::DateTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::distance;
use crate::hours;

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Both components are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lon.is_finite()
    }

    /// Both components are inside the valid WGS84 ranges.
    pub fn in_range(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lon)
    }
}

/// Bounding box of an area record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl Bounds {
    pub fn midpoint(&self) -> Coordinates {
        Coordinates {
            lat: (self.min_lat + self.max_lat) / 2.0,
            lon: (self.min_lon + self.max_lon) / 2.0,
        }
    }
}

/// Tri-state opening status. `Unknown` is a real outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpenStatus {
    Open,
    Closed,
    Unknown,
}

impl OpenStatus {
    /// Human-readable label for listings.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Open => "Open now",
            Self::Closed => "Closed now",
            Self::Unknown => "Open/Closed: Unknown",
        }
    }
}

impl fmt::Display for OpenStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "Open"),
            Self::Closed => write!(f, "Closed"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Dedup identity: name plus coordinates rounded to 5 decimals (~1 m).
///
/// Rounded values are kept as integers scaled by 1e5 so the key is
/// `Eq + Hash` without float comparison.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct IdentityKey {
    pub name: String,
    pub lat_e5: i64,
    pub lon_e5: i64,
}

impl IdentityKey {
    pub fn new(name: &str, coords: Coordinates) -> Self {
        Self {
            name: name.to_string(),
            lat_e5: round_e5(coords.lat),
            lon_e5: round_e5(coords.lon),
        }
    }
}

fn round_e5(v: f64) -> i64 {
    (v * 1e5).round() as i64
}

/// A normalized hospital or clinic.
///
/// Everything except `distance_km` and `status` is fixed at normalization.
/// Those two are filled together by [`Facility::annotate`] once per fetch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Facility {
    pub identity: IdentityKey,
    pub name: String,
    pub address: String,
    pub coordinates: Coordinates,
    /// True when the coordinate is the reference point standing in for a
    /// missing one.
    pub approximate: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    pub raw_tags: BTreeMap<String, String>,
    pub opening_hours: Option<String>,
    pub distance_km: Option<f64>,
    pub status: Option<OpenStatus>,
}

impl Facility {
    /// Compute distance from `reference` and opening status at `at`.
    pub fn annotate(mut self, reference: Coordinates, at: &DateTime<Tz>) -> Self {
        self.distance_km = Some(distance::haversine_km(reference, self.coordinates));
        self.status = Some(hours::evaluate(self.opening_hours.as_deref(), at));
        self
    }

    /// Status for filtering; an unannotated facility counts as unknown.
    pub fn effective_status(&self) -> OpenStatus {
        self.status.unwrap_or(OpenStatus::Unknown)
    }

    /// Google Maps search link for the facility's coordinate.
    pub fn maps_url(&self) -> String {
        format!(
            "https://www.google.com/maps/search/?api=1&query={},{}",
            self.coordinates.lat, self.coordinates.lon
        )
    }

    /// Raw tags as `key: value` lines for a details view.
    pub fn tag_lines(&self) -> String {
        if self.raw_tags.is_empty() {
            return "No tags".to_string();
        }
        self.raw_tags
            .iter()
            .map(|(k, v)| format!("{}: {}", k, v))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Format coordinates as `11.1008° N, 77.0267° E`.
pub fn format_coords(c: Coordinates) -> String {
    let ns = if c.lat >= 0.0 { 'N' } else { 'S' };
    let ew = if c.lon >= 0.0 { 'E' } else { 'W' };
    format!("{:.4}\u{00B0} {}, {:.4}\u{00B0} {}", c.lat.abs(), ns, c.lon.abs(), ew)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_rounds_to_five_decimals() {
        let a = IdentityKey::new("X", Coordinates::new(11.100001, 77.030002));
        let b = IdentityKey::new("X", Coordinates::new(11.100004, 77.029998));
        assert_eq!(a, b);
        assert_eq!(a.lat_e5, 1_110_000);
    }

    #[test]
    fn test_identity_differs_on_name() {
        let c = Coordinates::new(1.0, 2.0);
        assert_ne!(IdentityKey::new("A", c), IdentityKey::new("B", c));
    }

    #[test]
    fn test_bounds_midpoint() {
        let b = Bounds { min_lat: 10.0, min_lon: 70.0, max_lat: 12.0, max_lon: 71.0 };
        assert_eq!(b.midpoint(), Coordinates::new(11.0, 70.5));
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(OpenStatus::Open.label(), "Open now");
        assert_eq!(OpenStatus::Closed.label(), "Closed now");
        assert_eq!(OpenStatus::Unknown.label(), "Open/Closed: Unknown");
    }

    #[test]
    fn test_format_coords_hemispheres() {
        assert_eq!(format_coords(Coordinates::new(11.1, 77.0)), "11.1000° N, 77.0000° E");
        assert_eq!(format_coords(Coordinates::new(-33.8688, -70.5)), "33.8688° S, 70.5000° W");
    }

    #[test]
    fn test_coordinates_in_range() {
        assert!(Coordinates::new(90.0, -180.0).in_range());
        assert!(!Coordinates::new(90.5, 0.0).in_range());
        assert!(!Coordinates::new(f64::NAN, 0.0).is_finite());
    }

    #[test]
    fn test_tag_lines() {
        let c = Coordinates::new(11.02, 76.96);
        let mut f = Facility {
            identity: IdentityKey::new("Ganga Hospital", c),
            name: "Ganga Hospital".to_string(),
            address: "Address not available".to_string(),
            coordinates: c,
            approximate: false,
            category: None,
            rating: None,
            price: None,
            raw_tags: BTreeMap::new(),
            opening_hours: None,
            distance_km: None,
            status: None,
        };
        assert_eq!(f.tag_lines(), "No tags");

        f.raw_tags.insert("name".to_string(), "Ganga Hospital".to_string());
        f.raw_tags.insert("amenity".to_string(), "hospital".to_string());
        assert_eq!(f.tag_lines(), "amenity: hospital\nname: Ganga Hospital");
    }
}
