//! Fetch cycle orchestration: source → normalize → dedup → annotate → filter.
//!
//! Each fetch takes a [`FetchTicket`] with a monotonically increasing
//! sequence number. A completion is committed only if its ticket is still the
//! latest issued; late results from superseded fetches are dropped. There is
//! no in-flight cancellation.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, info, warn};

use crate::config::FinderConfig;
use crate::dedup::dedup;
use crate::error::{ConfigError, SourceError};
use crate::facility::{Coordinates, Facility};
use crate::normalize::{normalize, RawElement};
use crate::query::{available_sort_keys, FacilityQuery, SortKey};
use crate::source::DataSource;

/// Run the pure part of the pipeline over one batch of raw records.
pub fn run_pipeline(records: &[RawElement], reference: Coordinates, at: &DateTime<Tz>) -> Vec<Facility> {
    let normalized: Vec<Facility> = records.iter().map(|r| normalize(r, reference)).collect();
    dedup(normalized)
        .into_iter()
        .map(|f| f.annotate(reference, at))
        .collect()
}

// ─── Fetch sequencing ───────────────────────────────────────────

/// Issues fetch sequence numbers, starting at 1.
#[derive(Debug, Default)]
pub struct FetchSequencer {
    issued: AtomicU64,
}

impl FetchSequencer {
    pub fn next(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn latest(&self) -> u64 {
        self.issued.load(Ordering::SeqCst)
    }

    pub fn is_latest(&self, seq: u64) -> bool {
        self.latest() == seq
    }
}

/// Identifies one fetch and the parameters it was issued with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FetchTicket {
    pub seq: u64,
    pub reference: Coordinates,
    pub radius_m: u32,
}

/// What happened to a completed fetch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RefreshOutcome {
    /// The snapshot was replaced with `found` facilities.
    Updated { seq: u64, found: usize },
    /// The source failed; the snapshot was replaced with an empty one.
    Failed { seq: u64, message: String },
    /// A newer fetch was issued first; this result was discarded.
    Stale { seq: u64 },
}

/// The committed result of one fetch cycle. Immutable once published.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub seq: u64,
    pub reference: Coordinates,
    pub radius_m: u32,
    pub facilities: Vec<Facility>,
    pub failure: Option<SourceError>,
    /// `None` until the first fetch completes.
    pub evaluated_at: Option<DateTime<Tz>>,
}

impl Snapshot {
    fn empty(reference: Coordinates, radius_m: u32) -> Self {
        Self {
            seq: 0,
            reference,
            radius_m,
            facilities: Vec::new(),
            failure: None,
            evaluated_at: None,
        }
    }
}

// ─── Search results ─────────────────────────────────────────────

/// A full search: where to look and how to present the results.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub reference: Coordinates,
    pub radius_m: u32,
    pub query: FacilityQuery,
}

/// Filtered, ordered view of a snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResults {
    pub facilities: Vec<Facility>,
    /// Facilities in the snapshot before filtering.
    pub total_found: usize,
    pub radius_m: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    /// A newer fetch was issued before this search's own fetch committed.
    /// The facilities then belong to that newer fetch, or are empty if it
    /// has not completed yet.
    pub superseded: bool,
    pub sort_options: Vec<SortKey>,
}

impl SearchResults {
    /// One-line status, e.g. `Found 12 results within 7.0 km`.
    pub fn summary(&self) -> String {
        if self.superseded {
            return "Search superseded by a newer request".to_string();
        }
        match &self.failure {
            Some(msg) => format!("Failed to fetch data: {}", msg),
            None => format!(
                "Found {} results within {:.1} km",
                self.total_found,
                f64::from(self.radius_m) / 1000.0
            ),
        }
    }
}

/// Plain-text listing of search results.
pub fn render_listing(results: &SearchResults) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", results.summary());
    if results.facilities.is_empty() {
        let _ = writeln!(out, "\n  No facilities match your search/filter.");
        return out;
    }
    for f in &results.facilities {
        let dist = f
            .distance_km
            .map(|d| format!("{:.1} km", d))
            .unwrap_or_default();
        let approx = if f.approximate { ", approximate location" } else { "" };
        let _ = writeln!(out);
        let _ = writeln!(out, "  {}    ({}{})", f.name, dist, approx);
        let _ = writeln!(out, "    {}", f.address);
        let _ = writeln!(
            out,
            "    Opening hours: {}",
            f.opening_hours.as_deref().unwrap_or("Not provided")
        );
        let _ = writeln!(out, "    {}", f.effective_status().label());
        let _ = writeln!(out, "    {}", f.maps_url());
    }
    out
}

// ─── Finder ─────────────────────────────────────────────────────

/// Owns the data source and the latest committed snapshot.
pub struct FacilityFinder {
    source: Arc<dyn DataSource>,
    config: FinderConfig,
    tz: Tz,
    sequencer: FetchSequencer,
    /// Reference point and radius of the most recent fetch, reused by refresh.
    params: Mutex<(Coordinates, u32)>,
    snapshot: RwLock<Arc<Snapshot>>,
    fixed_now: Option<DateTime<Utc>>,
}

impl FacilityFinder {
    pub fn new(config: FinderConfig, source: Arc<dyn DataSource>) -> Result<Self, ConfigError> {
        config.validate()?;
        let tz = config.tz()?;
        let snapshot = Snapshot::empty(config.reference, config.radius_m);
        Ok(Self {
            source,
            tz,
            sequencer: FetchSequencer::default(),
            params: Mutex::new((config.reference, config.radius_m)),
            snapshot: RwLock::new(Arc::new(snapshot)),
            fixed_now: None,
            config,
        })
    }

    /// Evaluate opening hours at `at` instead of the wall clock.
    pub fn with_fixed_time(mut self, at: DateTime<Utc>) -> Self {
        self.fixed_now = Some(at);
        self
    }

    pub fn config(&self) -> &FinderConfig {
        &self.config
    }

    fn now(&self) -> DateTime<Tz> {
        self.fixed_now.unwrap_or_else(Utc::now).with_timezone(&self.tz)
    }

    /// The latest committed snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Issue a ticket for a fetch around `reference`. Any earlier ticket
    /// becomes stale.
    pub fn begin_fetch(&self, reference: Coordinates, radius_m: u32) -> FetchTicket {
        let mut params = self.params.lock().unwrap_or_else(PoisonError::into_inner);
        let seq = self.sequencer.next();
        *params = (reference, radius_m);
        drop(params);
        info!(seq, radius_m, lat = reference.lat, lon = reference.lon, "fetch started");
        FetchTicket { seq, reference, radius_m }
    }

    /// Blocking source query for `ticket`.
    pub fn fetch(&self, ticket: &FetchTicket) -> Result<Vec<RawElement>, SourceError> {
        self.source
            .query(ticket.reference, ticket.radius_m, self.config.timeout_secs)
    }

    /// Commit a fetch result if `ticket` is still the latest.
    pub fn complete(&self, ticket: FetchTicket, result: Result<Vec<RawElement>, SourceError>) -> RefreshOutcome {
        if !self.sequencer.is_latest(ticket.seq) {
            debug!(seq = ticket.seq, latest = self.sequencer.latest(), "discarding stale fetch");
            return RefreshOutcome::Stale { seq: ticket.seq };
        }

        let now = self.now();
        let (snapshot, outcome) = match result {
            Ok(records) => {
                let facilities = run_pipeline(&records, ticket.reference, &now);
                info!(seq = ticket.seq, raw = records.len(), found = facilities.len(), "fetch completed");
                let outcome = RefreshOutcome::Updated { seq: ticket.seq, found: facilities.len() };
                let snapshot = Snapshot {
                    seq: ticket.seq,
                    reference: ticket.reference,
                    radius_m: ticket.radius_m,
                    facilities,
                    failure: None,
                    evaluated_at: Some(now),
                };
                (snapshot, outcome)
            }
            Err(e) => {
                warn!(seq = ticket.seq, error = %e, "fetch failed");
                let outcome = RefreshOutcome::Failed { seq: ticket.seq, message: e.to_string() };
                let snapshot = Snapshot {
                    seq: ticket.seq,
                    reference: ticket.reference,
                    radius_m: ticket.radius_m,
                    facilities: Vec::new(),
                    failure: Some(e),
                    evaluated_at: Some(now),
                };
                (snapshot, outcome)
            }
        };

        let mut current = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        // Re-check under the lock: a newer fetch may have been issued or
        // committed while the pipeline ran.
        if !self.sequencer.is_latest(ticket.seq) || current.seq >= ticket.seq {
            debug!(seq = ticket.seq, "discarding fetch superseded during processing");
            return RefreshOutcome::Stale { seq: ticket.seq };
        }
        *current = Arc::new(snapshot);
        outcome
    }

    /// Re-run the full pipeline with the last used reference point and radius.
    pub fn refresh(&self) -> RefreshOutcome {
        let (reference, radius_m) = *self.params.lock().unwrap_or_else(PoisonError::into_inner);
        let ticket = self.begin_fetch(reference, radius_m);
        let result = self.fetch(&ticket);
        self.complete(ticket, result)
    }

    /// Run [`refresh`](Self::refresh) on the blocking thread pool.
    pub fn spawn_refresh(self: Arc<Self>) -> tokio::task::JoinHandle<RefreshOutcome> {
        tokio::task::spawn_blocking(move || self.refresh())
    }

    /// Fetch around the request's reference point, then filter and sort.
    pub fn search(&self, request: &SearchRequest) -> SearchResults {
        let ticket = self.begin_fetch(request.reference, request.radius_m);
        let result = self.fetch(&ticket);
        match self.complete(ticket, result) {
            RefreshOutcome::Stale { seq } => self.superseded_view(seq, request),
            _ => self.view(&request.query),
        }
    }

    fn superseded_view(&self, seq: u64, request: &SearchRequest) -> SearchResults {
        let snapshot = self.snapshot();
        if snapshot.seq > seq {
            return SearchResults { superseded: true, ..self.view(&request.query) };
        }
        SearchResults {
            facilities: Vec::new(),
            total_found: 0,
            radius_m: request.radius_m,
            failure: None,
            superseded: true,
            sort_options: available_sort_keys(&[]),
        }
    }

    /// Filter and sort the current snapshot without fetching.
    pub fn view(&self, query: &FacilityQuery) -> SearchResults {
        let snapshot = self.snapshot();
        SearchResults {
            facilities: query.apply(&snapshot.facilities),
            total_found: snapshot.facilities.len(),
            radius_m: snapshot.radius_m,
            failure: snapshot.failure.as_ref().map(ToString::to_string),
            superseded: false,
            sort_options: available_sort_keys(&snapshot.facilities),
        }
    }
}
