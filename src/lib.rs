//! Clinic Finder: nearby hospital and clinic discovery over OpenStreetMap.
//!
//! Raw tagged records from a [`source::DataSource`] flow through
//! [`normalize`] → [`dedup`] → distance and opening-hours annotation →
//! [`query`], orchestrated per fetch cycle by [`finder::FacilityFinder`].

pub mod config;
pub mod dedup;
pub mod distance;
pub mod error;
pub mod facility;
pub mod finder;
pub mod hours;
pub mod normalize;
pub mod query;
pub mod server;
pub mod source;

pub use config::FinderConfig;
pub use error::{ConfigError, SourceError};
pub use facility::{Coordinates, Facility, OpenStatus};
pub use finder::{FacilityFinder, RefreshOutcome, SearchRequest, SearchResults};
pub use query::{FacilityQuery, SortKey, StatusFilter};
