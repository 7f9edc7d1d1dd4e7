//! HTTP adapter over the hazard core.
//!
//! The reporter is taken from the `x-reporter-id` header. Authenticating
//! that value is the job of whatever sits in front of this service.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        FromRequest, FromRequestParts, Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Config;
use crate::emergency::{EmergencyCoordinator, EmergencyResponse, SafeRouteRecommendation};
use crate::error::HazardError;
use crate::geo_math::GeoPoint;
use crate::hazard::{
    HazardCategory, HazardFilter, HazardId, HazardPatch, HazardRecord, NearbyHazard, NewHazard,
    ReporterId,
};
use crate::index::HazardIndex;
use crate::proximity::ProximityQueryService;

pub const REPORTER_HEADER: &str = "x-reporter-id";

pub struct AppState {
    pub index: Arc<HazardIndex>,
    pub proximity: ProximityQueryService,
    pub coordinator: EmergencyCoordinator,
}

impl AppState {
    pub fn new(index: Arc<HazardIndex>, config: &Config) -> Result<Self, HazardError> {
        let proximity = ProximityQueryService::new(index.clone())
            .with_default_radius(config.default_search_radius_meters)?;
        let coordinator = EmergencyCoordinator::new(proximity.clone())
            .with_distances(config.emergency_radius_meters, config.route_buffer_meters)?;
        Ok(Self {
            index,
            proximity,
            coordinator,
        })
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/api/hazards/report", post(report_hazard))
        .route("/api/hazards/nearby", get(nearby_hazards))
        .route("/api/hazards/category/:category", get(hazards_by_category))
        .route(
            "/api/hazards/:id",
            get(get_hazard).put(update_hazard).delete(delete_hazard),
        )
        .route("/api/emergency/report", post(report_emergency))
        .route(
            "/api/emergency/safe-route",
            get(safe_route).post(safe_route_via),
        )
        .with_state(state)
}

// --- Errors ---

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Hazard(#[from] HazardError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Hazard(HazardError::Validation(_)) | ApiError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Hazard(HazardError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Hazard(HazardError::AlreadyDeleted(_)) => StatusCode::CONFLICT,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
        };
        if status.is_client_error() {
            tracing::warn!("Rejected request: {}", self);
        }

        let body = Json(ApiResponse::<()>::error(self.to_string()));
        (status, body).into_response()
    }
}

// --- Extractors ---

// Same as axum's extractors, but rejections go through `ApiError`.

#[derive(FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

// --- API DTOs ---

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn success_with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message.into()),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HazardReportRequest {
    pub category: HazardCategory,
    pub description: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub image_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HazardUpdateRequest {
    pub category: Option<HazardCategory>,
    pub description: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NearbyQuery {
    pub latitude: f64,
    pub longitude: f64,
    pub radius: Option<f64>,
    pub category: Option<String>,
    pub since: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyQuery {
    pub latitude: f64,
    pub longitude: f64,
    pub emergency_type: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafeRouteQuery {
    pub start_lat: f64,
    pub start_lng: f64,
    pub end_lat: f64,
    pub end_lng: f64,
}

#[derive(Debug, Deserialize)]
pub struct WaypointRouteRequest {
    pub waypoints: Vec<[f64; 2]>, // [lat, lon]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HazardResponse {
    pub id: HazardId,
    pub category: HazardCategory,
    pub description: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub image_url: Option<String>,
    pub reporter_id: ReporterId,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_meters: Option<f64>,
}

impl From<HazardRecord> for HazardResponse {
    fn from(record: HazardRecord) -> Self {
        Self {
            id: record.id(),
            category: record.category(),
            latitude: record.location().latitude(),
            longitude: record.location().longitude(),
            deleted_at: record.deleted_at(),
            created_at: record.created_at(),
            reporter_id: record.reporter_id().clone(),
            description: record.description,
            image_url: record.image_ref,
            distance_meters: None,
        }
    }
}

impl From<NearbyHazard> for HazardResponse {
    fn from(nearby: NearbyHazard) -> Self {
        Self {
            distance_meters: Some(nearby.distance_meters),
            ..Self::from(nearby.hazard)
        }
    }
}

// --- Handlers ---

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

fn reporter_from(headers: &HeaderMap) -> Result<ReporterId, ApiError> {
    headers
        .get(REPORTER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ReporterId::from)
        .ok_or_else(|| ApiError::Unauthorized(format!("missing {} header", REPORTER_HEADER)))
}

fn ensure_reporter(index: &HazardIndex, id: HazardId, caller: &ReporterId) -> Result<(), ApiError> {
    let owner = index.reporter_of(id)?;
    if &owner != caller {
        return Err(ApiError::Forbidden(format!(
            "only the original reporter can modify hazard {}",
            id
        )));
    }
    Ok(())
}

async fn report_hazard(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ApiJson(payload): ApiJson<HazardReportRequest>,
) -> ApiResult<HazardResponse> {
    let reporter_id = reporter_from(&headers)?;
    let record = state.index.insert(NewHazard {
        reporter_id,
        category: payload.category,
        description: payload.description,
        latitude: payload.latitude,
        longitude: payload.longitude,
        image_ref: payload.image_url,
    })?;
    Ok(Json(ApiResponse::success_with_message(
        "Hazard reported",
        record.into(),
    )))
}

async fn nearby_hazards(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<NearbyQuery>,
) -> ApiResult<Vec<HazardResponse>> {
    let category = query
        .category
        .as_deref()
        .map(str::parse::<HazardCategory>)
        .transpose()?;
    let filter = HazardFilter {
        category,
        reported_since: query.since,
    };
    let hazards = state
        .proximity
        .nearby(query.latitude, query.longitude, query.radius, &filter)?;
    Ok(Json(ApiResponse::success(
        hazards.into_iter().map(HazardResponse::from).collect(),
    )))
}

async fn hazards_by_category(
    State(state): State<Arc<AppState>>,
    ApiPath(category): ApiPath<String>,
) -> ApiResult<Vec<HazardResponse>> {
    let category: HazardCategory = category.parse()?;
    let hazards = state.proximity.by_category(category);
    Ok(Json(ApiResponse::success(
        hazards.into_iter().map(HazardResponse::from).collect(),
    )))
}

async fn get_hazard(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<u64>,
) -> ApiResult<HazardResponse> {
    let record = state.index.get(HazardId(id))?;
    Ok(Json(ApiResponse::success(record.into())))
}

async fn update_hazard(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<u64>,
    headers: HeaderMap,
    ApiJson(payload): ApiJson<HazardUpdateRequest>,
) -> ApiResult<HazardResponse> {
    let id = HazardId(id);
    let caller = reporter_from(&headers)?;
    ensure_reporter(&state.index, id, &caller)?;

    let location = match (payload.latitude, payload.longitude) {
        (Some(lat), Some(lon)) => Some((lat, lon)),
        (None, None) => None,
        _ => {
            return Err(ApiError::BadRequest(
                "latitude and longitude must be given together".to_string(),
            ));
        }
    };
    let record = state.index.update(
        id,
        HazardPatch {
            category: payload.category,
            description: payload.description,
            location,
            image_ref: payload.image_url,
        },
    )?;
    Ok(Json(ApiResponse::success_with_message(
        "Hazard updated",
        record.into(),
    )))
}

async fn delete_hazard(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<u64>,
    headers: HeaderMap,
) -> ApiResult<()> {
    let id = HazardId(id);
    let caller = reporter_from(&headers)?;
    ensure_reporter(&state.index, id, &caller)?;

    state.index.soft_delete(id)?;
    Ok(Json(ApiResponse::success_with_message("Hazard deleted", ())))
}

async fn report_emergency(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<EmergencyQuery>,
) -> ApiResult<EmergencyResponse> {
    let response = state.coordinator.handle_emergency(
        query.latitude,
        query.longitude,
        &query.emergency_type,
    )?;
    Ok(Json(ApiResponse::success_with_message(
        "Emergency received",
        response,
    )))
}

async fn safe_route(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<SafeRouteQuery>,
) -> ApiResult<SafeRouteRecommendation> {
    let recommendation = state.coordinator.recommend_safe_route(
        query.start_lat,
        query.start_lng,
        query.end_lat,
        query.end_lng,
    )?;
    Ok(Json(ApiResponse::success(recommendation)))
}

async fn safe_route_via(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<WaypointRouteRequest>,
) -> ApiResult<SafeRouteRecommendation> {
    let waypoints = payload
        .waypoints
        .iter()
        .map(|&[lat, lon]| GeoPoint::new(lat, lon))
        .collect::<Result<Vec<_>, _>>()?;
    let recommendation = state.coordinator.recommend_safe_route_via(&waypoints)?;
    Ok(Json(ApiResponse::success(recommendation)))
}
