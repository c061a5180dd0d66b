//! Text/status filtering and sorting over a facility snapshot.
//!
//! Everything here is pure: the same input slice and [`FacilityQuery`]
//! always produce the same output, and sorting is stable so ties keep their
//! snapshot order.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::facility::{Facility, OpenStatus};

/// Which opening status to keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StatusFilter {
    #[default]
    All,
    OpenNow,
    Closed,
    Unknown,
}

impl StatusFilter {
    pub fn matches(&self, status: OpenStatus) -> bool {
        match self {
            Self::All => true,
            Self::OpenNow => status == OpenStatus::Open,
            Self::Closed => status == OpenStatus::Closed,
            Self::Unknown => status == OpenStatus::Unknown,
        }
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "All"),
            Self::OpenNow => write!(f, "Open now"),
            Self::Closed => write!(f, "Closed"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

impl FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" | "" => Ok(Self::All),
            "open" | "open now" | "open-now" | "opennow" => Ok(Self::OpenNow),
            "closed" => Ok(Self::Closed),
            "unknown" => Ok(Self::Unknown),
            _ => Err(format!("Unknown status filter '{}'. Use all, open, closed or unknown.", s)),
        }
    }
}

/// Result ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortKey {
    /// Snapshot order, no reordering. Shown as "Default".
    Insertion,
    /// Nearest first.
    #[default]
    Distance,
    /// Highest rated first.
    Rating,
    /// Cheapest first.
    Price,
    /// Category A to Z.
    Category,
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Insertion => write!(f, "Default"),
            Self::Distance => write!(f, "Distance (Near\u{2192}Far)"),
            Self::Rating => write!(f, "Rating (High\u{2192}Low)"),
            Self::Price => write!(f, "Price (Low\u{2192}High)"),
            Self::Category => write!(f, "Category (A\u{2192}Z)"),
        }
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "default" | "none" | "insertion" => Ok(Self::Insertion),
            "distance" | "near" | "" => Ok(Self::Distance),
            "rating" => Ok(Self::Rating),
            "price" | "fee" => Ok(Self::Price),
            "category" | "specialization" => Ok(Self::Category),
            _ => Err(format!(
                "Unknown sort key '{}'. Use default, distance, rating, price or category.",
                s
            )),
        }
    }
}

/// A complete filter + sort request.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FacilityQuery {
    /// Case-insensitive substring of name or address; empty matches all.
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub status: StatusFilter,
    #[serde(default)]
    pub sort: SortKey,
}

impl FacilityQuery {
    pub fn new(text: impl Into<String>, status: StatusFilter, sort: SortKey) -> Self {
        Self { text: text.into(), status, sort }
    }

    /// Filter then sort, returning a fresh vector.
    pub fn apply(&self, facilities: &[Facility]) -> Vec<Facility> {
        let needle = self.text.trim().to_lowercase();
        let mut out: Vec<Facility> = facilities
            .iter()
            .filter(|f| matches_text(f, &needle))
            .filter(|f| self.status.matches(f.effective_status()))
            .cloned()
            .collect();
        sort_facilities(&mut out, self.sort);
        out
    }
}

fn matches_text(f: &Facility, needle: &str) -> bool {
    needle.is_empty()
        || f.name.to_lowercase().contains(needle)
        || f.address.to_lowercase().contains(needle)
}

/// Stable in-place sort. Facilities missing the sort value go last.
pub fn sort_facilities(facilities: &mut [Facility], key: SortKey) {
    match key {
        SortKey::Insertion => {}
        SortKey::Distance => facilities.sort_by(|a, b| missing_last(a.distance_km, b.distance_km, false)),
        SortKey::Rating => facilities.sort_by(|a, b| missing_last(a.rating, b.rating, true)),
        SortKey::Price => facilities.sort_by(|a, b| missing_last(a.price, b.price, false)),
        SortKey::Category => facilities.sort_by(|a, b| {
            match (&a.category, &b.category) {
                (Some(x), Some(y)) => x.to_lowercase().cmp(&y.to_lowercase()),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
        }),
    }
}

fn missing_last(a: Option<f64>, b: Option<f64>, descending: bool) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) if descending => y.total_cmp(&x),
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Sort keys worth offering for this result set.
///
/// `Insertion` is always offered; the others only when at least one
/// facility carries the value they sort by.
pub fn available_sort_keys(facilities: &[Facility]) -> Vec<SortKey> {
    let mut keys = vec![SortKey::Insertion];
    if facilities.iter().any(|f| f.distance_km.is_some()) {
        keys.push(SortKey::Distance);
    }
    if facilities.iter().any(|f| f.rating.is_some()) {
        keys.push(SortKey::Rating);
    }
    if facilities.iter().any(|f| f.price.is_some()) {
        keys.push(SortKey::Price);
    }
    if facilities.iter().any(|f| f.category.is_some()) {
        keys.push(SortKey::Category);
    }
    keys
}
