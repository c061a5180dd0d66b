//! Raw tagged records into canonical [`Facility`] values.
//!
//! Normalization never fails: every missing field degrades to a named
//! fallback, and a missing coordinate is replaced by the reference point with
//! `approximate = true`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::facility::{Bounds, Coordinates, Facility, IdentityKey};

/// Name used when no name-like tag is present.
pub const UNNAMED: &str = "Unnamed facility";

/// Address used when no address-like tag is present.
pub const NO_ADDRESS: &str = "Address not available";

const NAME_KEYS: [&str; 5] = ["name", "name:en", "official_name", "operator", "brand"];

const ADDRESS_KEYS: [&str; 6] = [
    "addr:full",
    "addr:street",
    "addr:housenumber",
    "addr:city",
    "addr:postcode",
    "addr:state",
];

const ADDRESS_FALLBACK_KEYS: [&str; 4] = ["street", "place", "name", "operator"];

const CATEGORY_KEYS: [&str; 2] = ["healthcare", "amenity"];
const RATING_KEYS: [&str; 2] = ["rating", "stars"];
const PRICE_KEYS: [&str; 2] = ["fee", "charge"];

/// Geometry kind of a source record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordKind {
    /// A single point with its own coordinate.
    Point,
    /// A way or relation, located by a center or bounding box.
    Area,
}

/// One record as delivered by a [`DataSource`](crate::source::DataSource).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawElement {
    pub kind: Option<RecordKind>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
    #[serde(default)]
    pub center: Option<Coordinates>,
    #[serde(default)]
    pub bounds: Option<Bounds>,
}

impl RawElement {
    pub fn point(tags: BTreeMap<String, String>, coordinates: Coordinates) -> Self {
        Self {
            kind: Some(RecordKind::Point),
            tags,
            coordinates: Some(coordinates),
            ..Default::default()
        }
    }

    pub fn area(tags: BTreeMap<String, String>, center: Option<Coordinates>, bounds: Option<Bounds>) -> Self {
        Self {
            kind: Some(RecordKind::Area),
            tags,
            center,
            bounds,
            ..Default::default()
        }
    }
}

/// Build a [`Facility`] from a raw record. `reference` stands in for a
/// missing coordinate.
pub fn normalize(record: &RawElement, reference: Coordinates) -> Facility {
    let tags = &record.tags;
    let name = first_tag(tags, &NAME_KEYS).unwrap_or(UNNAMED).to_string();
    let address = normalize_address(tags);

    let (coordinates, approximate) = match resolve_coordinates(record) {
        Some(c) => (c, false),
        None => (reference, true),
    };

    Facility {
        identity: IdentityKey::new(&name, coordinates),
        name,
        address,
        coordinates,
        approximate,
        category: first_tag(tags, &CATEGORY_KEYS).map(str::to_string),
        rating: first_tag(tags, &RATING_KEYS).and_then(parse_rating),
        price: first_tag(tags, &PRICE_KEYS).and_then(parse_price),
        raw_tags: tags.clone(),
        opening_hours: tag(tags, "opening_hours").map(str::to_string),
        distance_km: None,
        status: None,
    }
}

/// Join address parts in a fixed order, skipping repeats.
pub fn normalize_address(tags: &BTreeMap<String, String>) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for key in ADDRESS_KEYS {
        if let Some(v) = tag(tags, key) {
            if !parts.contains(&v) {
                parts.push(v);
            }
        }
    }
    if parts.is_empty() {
        if let Some(v) = first_tag(tags, &ADDRESS_FALLBACK_KEYS) {
            parts.push(v);
        }
    }
    if parts.is_empty() {
        NO_ADDRESS.to_string()
    } else {
        parts.join(", ")
    }
}

fn resolve_coordinates(record: &RawElement) -> Option<Coordinates> {
    let candidate = match record.kind {
        Some(RecordKind::Point) => record.coordinates,
        Some(RecordKind::Area) => record.center.or_else(|| record.bounds.map(|b| b.midpoint())),
        // Unknown kind: take whatever geometry the record carries.
        None => record
            .coordinates
            .or(record.center)
            .or_else(|| record.bounds.map(|b| b.midpoint())),
    };
    candidate.filter(Coordinates::is_finite)
}

/// A tag value, treating blank strings as absent.
fn tag<'a>(tags: &'a BTreeMap<String, String>, key: &str) -> Option<&'a str> {
    tags.get(key).map(|v| v.trim()).filter(|v| !v.is_empty())
}

fn first_tag<'a>(tags: &'a BTreeMap<String, String>, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|k| tag(tags, k))
}

fn parse_rating(v: &str) -> Option<f64> {
    v.parse::<f64>().ok().filter(|r| r.is_finite() && *r >= 0.0)
}

/// `no`/`free` is zero; otherwise the first number in the value, if any.
fn parse_price(v: &str) -> Option<f64> {
    let lower = v.to_lowercase();
    if lower == "no" || lower == "free" {
        return Some(0.0);
    }
    let start = v.find(|c: char| c.is_ascii_digit())?;
    let number: String = v[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    number.trim_end_matches('.').parse().ok()
}
