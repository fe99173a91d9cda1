use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::geography::Coordinate;
use crate::sources::{DataSource, FacilityRecord, SourceError, SourceStatus};

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

/// HTTP status for a failed source call.
pub(super) fn status_for(err: &SourceError) -> StatusCode {
    match err {
        SourceError::InvalidCount(_) => StatusCode::BAD_REQUEST,
        SourceError::NotFound(_) => StatusCode::NOT_FOUND,
        SourceError::InsufficientRecords { .. } => StatusCode::PARTIAL_CONTENT,
        e if e.is_provider_failure() => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Turn a ranking result into a response. A short result is still sent,
/// with 206 instead of 200.
fn records_response(route: &str, result: Result<Vec<FacilityRecord>, SourceError>) -> Response {
    match result {
        Ok(records) => (StatusCode::OK, Json(records)).into_response(),
        Err(SourceError::InsufficientRecords { requested, partial }) => {
            warn!(route, requested, found = partial.len(), "fewer records than requested");
            (StatusCode::PARTIAL_CONTENT, Json(partial)).into_response()
        }
        Err(e) => {
            let status = status_for(&e);
            warn!(route, status = status.as_u16(), error = %e, "request failed");
            api_error(status, e.to_string()).into_response()
        }
    }
}

/// Run a blocking source call off the async runtime.
async fn run_blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        api_error(StatusCode::INTERNAL_SERVER_ERROR, format!("worker failed: {}", e))
    })
}

// ─── Parameter parsing ───────────────────────────────────────────

fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, ApiError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("Missing '{}' parameter", name),
        )),
    }
}

pub(super) fn parse_count(raw: &Option<String>) -> Result<i64, ApiError> {
    let raw = required(raw, "n")?;
    raw.parse::<i64>().map_err(|_| {
        api_error(StatusCode::BAD_REQUEST, format!("Invalid value for n: '{}'", raw))
    })
}

pub(super) fn parse_coordinate(
    latitude: &Option<String>,
    longitude: &Option<String>,
) -> Result<Coordinate, ApiError> {
    let parse = |raw: &str, name: &str| {
        raw.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, format!("Invalid {}: '{}'", name, raw)))
    };
    let lat = parse(required(latitude, "latitude")?, "latitude")?;
    let lon = parse(required(longitude, "longitude")?, "longitude")?;

    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "Invalid coordinates. Latitude: -90..90, Longitude: -180..180",
        ));
    }
    Ok(Coordinate::new(lat, lon))
}

/// Zip codes are passed through as text but must be all digits.
pub(super) fn parse_zip_code(raw: &Option<String>) -> Result<String, ApiError> {
    let zip = required(raw, "zipCode")?;
    if !zip.chars().all(|c| c.is_ascii_digit()) {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("Invalid zip code: '{}'", zip),
        ));
    }
    Ok(zip.to_string())
}

fn lookup_source(state: &AppState, name: &Option<String>) -> Result<Arc<dyn DataSource>, ApiError> {
    let name = required(name, "datasource")?;
    state.source(name).ok_or_else(|| {
        api_error(
            StatusCode::BAD_REQUEST,
            format!(
                "Unknown data source '{}'. Available: {}",
                name,
                state.registry.names().join(", ")
            ),
        )
    })
}

// ─── GET /nearestNJson ───────────────────────────────────────────

#[derive(Deserialize, Default)]
pub struct NearestQuery {
    pub n: Option<String>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub datasource: Option<String>,
}

pub async fn nearest_json(
    State(state): State<Arc<AppState>>,
    Query(params): Query<NearestQuery>,
) -> Result<Response, ApiError> {
    let start = Instant::now();

    let source = lookup_source(&state, &params.datasource)?;
    let n = parse_count(&params.n)?;
    let origin = parse_coordinate(&params.latitude, &params.longitude)?;

    let name = source.name().to_string();
    let result = run_blocking(move || source.nearest_n(n, origin)).await?;

    info!(
        route = "/nearestNJson",
        source = %name,
        n,
        %origin,
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        "served"
    );
    Ok(records_response("/nearestNJson", result))
}

// ─── GET /nearestNJsonByZipCode ──────────────────────────────────

#[derive(Deserialize, Default)]
pub struct NearestByZipQuery {
    pub n: Option<String>,
    #[serde(rename = "zipCode")]
    pub zip_code: Option<String>,
    pub datasource: Option<String>,
}

pub async fn nearest_json_by_zip_code(
    State(state): State<Arc<AppState>>,
    Query(params): Query<NearestByZipQuery>,
) -> Result<Response, ApiError> {
    let start = Instant::now();

    let source = lookup_source(&state, &params.datasource)?;
    let n = parse_count(&params.n)?;
    let zip_code = parse_zip_code(&params.zip_code)?;

    let name = source.name().to_string();
    let zip = zip_code.clone();
    let result = run_blocking(move || source.nearest_n_by_zip_code(n, &zip)).await?;

    info!(
        route = "/nearestNJsonByZipCode",
        source = %name,
        n,
        zip_code = %zip_code,
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        "served"
    );
    Ok(records_response("/nearestNJsonByZipCode", result))
}

// ─── GET /api/sources ────────────────────────────────────────────

pub async fn list_sources(State(state): State<Arc<AppState>>) -> Json<Vec<SourceStatus>> {
    Json(state.registry.statuses())
}

// ─── POST /api/sources/{name}/refresh ────────────────────────────

pub async fn refresh_source(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<SourceStatus>, ApiError> {
    let source = state.source(&name).ok_or_else(|| {
        api_error(StatusCode::NOT_FOUND, format!("Unknown data source '{}'", name))
    })?;

    let worker = Arc::clone(&source);
    run_blocking(move || worker.refresh()).await?.map_err(|e| {
        let status = status_for(&e);
        warn!(source = %name, error = %e, "refresh failed");
        api_error(status, e.to_string())
    })?;

    Ok(Json(source.status()))
}
