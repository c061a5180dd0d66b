//! Collapse repeated facilities by identity key.

use std::collections::HashSet;
use tracing::debug;

use crate::facility::Facility;

/// Keep the first facility seen for each identity key, in first-seen order.
pub fn dedup(facilities: Vec<Facility>) -> Vec<Facility> {
    let before = facilities.len();
    let mut seen = HashSet::with_capacity(before);
    let unique: Vec<Facility> = facilities
        .into_iter()
        .filter(|f| seen.insert(f.identity.clone()))
        .collect();

    if unique.len() < before {
        debug!(dropped = before - unique.len(), kept = unique.len(), "deduplicated facilities");
    }
    unique
}
