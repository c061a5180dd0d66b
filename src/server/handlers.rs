use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::facility::Coordinates;
use crate::finder::{RefreshOutcome, SearchRequest, SearchResults};
use crate::query::{FacilityQuery, SortKey, StatusFilter};

use super::state::AppState;

// ─── Error response ──────────────────────────────────────────────

#[derive(Serialize)]
struct ApiErrorBody {
    error: String,
    code: u16,
}

#[derive(Debug)]
pub struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: self.1,
            code: self.0.as_u16(),
        };
        (self.0, Json(body)).into_response()
    }
}

fn api_error(status: StatusCode, msg: impl Into<String>) -> ApiError {
    ApiError(status, msg.into())
}

// ─── GET /api/health ─────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub seq: u64,
    pub facilities: usize,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let snapshot = state.finder.snapshot();
    Json(HealthResponse {
        status: "ok",
        seq: snapshot.seq,
        facilities: snapshot.facilities.len(),
    })
}

// ─── GET /api/facilities ─────────────────────────────────────────

#[derive(Deserialize, Default)]
pub struct ViewQuery {
    pub q: Option<String>,
    pub status: Option<String>,
    pub sort: Option<String>,
}

impl ViewQuery {
    fn to_query(&self) -> Result<FacilityQuery, ApiError> {
        let status = match self.status.as_deref() {
            Some(s) => s.parse::<StatusFilter>().map_err(|e| api_error(StatusCode::BAD_REQUEST, e))?,
            None => StatusFilter::All,
        };
        let sort = match self.sort.as_deref() {
            Some(s) => s.parse::<SortKey>().map_err(|e| api_error(StatusCode::BAD_REQUEST, e))?,
            None => SortKey::default(),
        };
        Ok(FacilityQuery::new(self.q.clone().unwrap_or_default(), status, sort))
    }
}

/// Filter the current snapshot; never touches the data source.
pub async fn facilities(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ViewQuery>,
) -> Result<Json<SearchResults>, ApiError> {
    let query = params.to_query()?;
    Ok(Json(state.finder.view(&query)))
}

// ─── GET /api/search ─────────────────────────────────────────────

#[derive(Deserialize, Default)]
pub struct SearchQuery {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub radius: Option<u32>,
    pub q: Option<String>,
    pub status: Option<String>,
    pub sort: Option<String>,
}

impl SearchQuery {
    fn view(&self) -> ViewQuery {
        ViewQuery {
            q: self.q.clone(),
            status: self.status.clone(),
            sort: self.sort.clone(),
        }
    }
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchQuery>,
) -> Result<Json<SearchResults>, ApiError> {
    let start = Instant::now();
    let config = state.finder.config();

    let reference = match (params.lat, params.lon) {
        (Some(lat), Some(lon)) => Coordinates::new(lat, lon),
        (None, None) => config.reference,
        _ => return Err(api_error(StatusCode::BAD_REQUEST, "Provide both 'lat' and 'lon', or neither")),
    };
    if !reference.in_range() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "Invalid coordinates. Lat: -90..90, Lon: -180..180",
        ));
    }
    let radius_m = params.radius.unwrap_or(config.radius_m);
    if radius_m == 0 {
        return Err(api_error(StatusCode::BAD_REQUEST, "Radius must be positive"));
    }

    let request = SearchRequest {
        reference,
        radius_m,
        query: params.view().to_query()?,
    };

    let finder = state.finder.clone();
    let results = tokio::task::spawn_blocking(move || finder.search(&request))
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, format!("Search task failed: {}", e)))?;

    info!(
        lat = reference.lat,
        lon = reference.lon,
        radius_m,
        shown = results.facilities.len(),
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        "GET /api/search"
    );
    Ok(Json(results))
}

// ─── POST /api/refresh ───────────────────────────────────────────

pub async fn refresh(State(state): State<Arc<AppState>>) -> Result<Json<RefreshOutcome>, ApiError> {
    let outcome = state
        .finder
        .clone()
        .spawn_refresh()
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, format!("Refresh task failed: {}", e)))?;
    info!(?outcome, "POST /api/refresh");
    Ok(Json(outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FinderConfig;
    use crate::finder::FacilityFinder;
    use crate::normalize::RawElement;
    use crate::source::StaticSource;
    use std::collections::BTreeMap;

    fn state() -> State<Arc<AppState>> {
        let mut tags = BTreeMap::new();
        tags.insert("name".to_string(), "Ganga Hospital".to_string());
        tags.insert("opening_hours".to_string(), "24/7".to_string());
        let source = Arc::new(StaticSource::new(vec![RawElement::point(
            tags,
            Coordinates::new(11.02, 76.96),
        )]));
        let finder = FacilityFinder::new(FinderConfig::default(), source).unwrap();
        State(Arc::new(AppState { finder: Arc::new(finder) }))
    }

    #[tokio::test]
    async fn test_refresh_then_view() {
        let st = state();
        let Json(outcome) = refresh(st.clone()).await.unwrap();
        assert_eq!(outcome, RefreshOutcome::Updated { seq: 1, found: 1 });

        let params = ViewQuery { status: Some("open".into()), ..Default::default() };
        let Json(results) = facilities(st, Query(params)).await.unwrap();
        assert_eq!(results.facilities.len(), 1);
    }

    #[tokio::test]
    async fn test_bad_status_is_400() {
        let params = ViewQuery { status: Some("sometimes".into()), ..Default::default() };
        let err = facilities(state(), Query(params)).await.unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_search_rejects_half_coordinates() {
        let params = SearchQuery { lat: Some(11.0), ..Default::default() };
        let err = search(state(), Query(params)).await.unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_search_uses_configured_reference() {
        let Json(results) = search(state(), Query(SearchQuery::default())).await.unwrap();
        assert_eq!(results.radius_m, 7000);
        assert_eq!(results.total_found, 1);
    }
}
