use std::sync::Arc;

use axum::extract::{Path, Query, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use chrono::Utc;
use fieldnotes_core::models::validation::{validate_client_note, validate_device_id};
use fieldnotes_core::models::{
    BoundingBox, ClientNote, Device, Location, Note, NoteId, PageInfo, PageParams, SyncBatch,
    SyncOutcome,
};
use fieldnotes_core::services::{DatabaseService, ListNotesInput, NoteInput, NoteUpdate};
use fieldnotes_core::util::{normalize_text_option, owner_fingerprint};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::{extract_bearer_token, AuthenticatedUser, JwtVerifier};
use crate::config::AppConfig;
use crate::error::AppError;
use crate::rate_limit::{EndpointRateLimiter, ProtectedEndpoint, RateLimitMetricsSnapshot};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    db: DatabaseService,
    jwt_verifier: Arc<JwtVerifier>,
    endpoint_rate_limiter: Arc<EndpointRateLimiter>,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, db: DatabaseService) -> Self {
        Self {
            db: db.with_batch_limit(config.sync_batch_limit),
            jwt_verifier: Arc::new(JwtVerifier::new(config.clone())),
            endpoint_rate_limiter: Arc::new(EndpointRateLimiter::from_config(config.as_ref())),
            config,
        }
    }
}

pub fn app_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/devices", get(list_devices).post(register_device))
        .route("/sync", post(batch_sync))
        .route("/notes", get(list_notes).post(create_note))
        .route(
            "/notes/{id}",
            get(get_note).patch(update_note).delete(delete_note),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/healthz", get(healthz))
        .nest("/v1", protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods(Any),
        )
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: i64,
    rate_limit: RateLimitMetricsSnapshot,
}

async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().timestamp(),
        rate_limit: state.endpoint_rate_limiter.metrics_snapshot().await,
    })
}

async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_bearer_token(request.headers())?;
    let user = state.jwt_verifier.verify_access_token(token).map_err(|error| {
        tracing::warn!(error = %error, "Rejected bearer token");
        error
    })?;
    tracing::debug!(
        user = owner_fingerprint(&user.user_id),
        session = user.session_id.as_deref().unwrap_or("none"),
        "Authenticated request"
    );
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

#[derive(Debug, Deserialize)]
struct RegisterDeviceRequest {
    device_id: String,
    #[serde(default)]
    platform: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

async fn register_device(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(request): Json<RegisterDeviceRequest>,
) -> Result<(StatusCode, Json<Device>), AppError> {
    state
        .endpoint_rate_limiter
        .check(ProtectedEndpoint::Notes, &user.user_id)
        .await?;

    let device_id = request.device_id.trim();
    validate_device_id(device_id)?;
    let device = Device::new(
        user.user_id.as_str(),
        device_id,
        normalize_text_option(request.platform).unwrap_or_default(),
        normalize_text_option(request.name).unwrap_or_default(),
    );

    let device = state.db.register_device(&device).await?;
    tracing::info!(
        endpoint = "devices",
        user = owner_fingerprint(&user.user_id),
        device = %device.device_id,
        "Registered device"
    );
    Ok((StatusCode::CREATED, Json(device)))
}

#[derive(Debug, Serialize)]
struct DeviceListResponse {
    devices: Vec<Device>,
}

async fn list_devices(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<DeviceListResponse>, AppError> {
    state
        .endpoint_rate_limiter
        .check(ProtectedEndpoint::Notes, &user.user_id)
        .await?;

    let devices = state.db.list_devices(&user.user_id).await?;
    Ok(Json(DeviceListResponse { devices }))
}

#[derive(Debug, Deserialize)]
struct SyncRequest {
    device_id: String,
    #[serde(default)]
    sync_cursor: Option<i64>,
    #[serde(default)]
    notes: Vec<ClientNote>,
}

async fn batch_sync(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(request): Json<SyncRequest>,
) -> Result<Json<SyncOutcome>, AppError> {
    state
        .endpoint_rate_limiter
        .check(ProtectedEndpoint::Sync, &user.user_id)
        .await?;

    let device_id = request.device_id.trim().to_string();
    validate_device_id(&device_id)?;
    for note in &request.notes {
        validate_client_note(note)?;
    }

    let outcome = state
        .db
        .batch_sync(SyncBatch {
            owner_id: user.user_id,
            device_id,
            sync_cursor: request.sync_cursor,
            notes: request.notes,
        })
        .await?;
    Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
struct CreateNoteRequest {
    title: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    latitude: Option<f64>,
    #[serde(default)]
    longitude: Option<f64>,
    #[serde(default)]
    altitude: Option<f64>,
    #[serde(default)]
    accuracy: Option<f64>,
    #[serde(default)]
    client_id: Option<String>,
}

async fn create_note(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(request): Json<CreateNoteRequest>,
) -> Result<(StatusCode, Json<Note>), AppError> {
    state
        .endpoint_rate_limiter
        .check(ProtectedEndpoint::Notes, &user.user_id)
        .await?;

    let location = location_from_parts(
        request.latitude,
        request.longitude,
        request.altitude,
        request.accuracy,
    )?;
    let note = state
        .db
        .create_note(
            &user.user_id,
            NoteInput {
                title: request.title,
                content: request.content,
                location,
                client_id: request.client_id,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(note)))
}

#[derive(Debug, Deserialize)]
struct ListNotesQuery {
    page: Option<u32>,
    per_page: Option<u32>,
    min_lat: Option<f64>,
    max_lat: Option<f64>,
    min_lng: Option<f64>,
    max_lng: Option<f64>,
}

impl ListNotesQuery {
    fn bounding_box(&self) -> Result<Option<BoundingBox>, AppError> {
        match (self.min_lat, self.max_lat, self.min_lng, self.max_lng) {
            (Some(min_lat), Some(max_lat), Some(min_lng), Some(max_lng)) => {
                Ok(Some(BoundingBox::new(min_lat, max_lat, min_lng, max_lng)))
            }
            (None, None, None, None) => Ok(None),
            _ => Err(AppError::bad_request(
                "min_lat, max_lat, min_lng and max_lng must be provided together",
            )),
        }
    }
}

#[derive(Debug, Serialize)]
struct NoteListResponse {
    notes: Vec<Note>,
    pagination: PageInfo,
}

async fn list_notes(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(query): Query<ListNotesQuery>,
) -> Result<Json<NoteListResponse>, AppError> {
    state
        .endpoint_rate_limiter
        .check(ProtectedEndpoint::Notes, &user.user_id)
        .await?;

    let input = ListNotesInput {
        page: PageParams::new(query.page, query.per_page),
        bounding_box: query.bounding_box()?,
    };
    let (notes, pagination) = state.db.list_notes(&user.user_id, input).await?;
    Ok(Json(NoteListResponse { notes, pagination }))
}

async fn get_note(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> Result<Json<Note>, AppError> {
    state
        .endpoint_rate_limiter
        .check(ProtectedEndpoint::Notes, &user.user_id)
        .await?;

    let id = parse_note_id(&id)?;
    let note = state.db.get_note(&user.user_id, &id).await?;
    Ok(Json(note))
}

#[derive(Debug, Deserialize)]
struct UpdateNoteRequest {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    latitude: Option<f64>,
    #[serde(default)]
    longitude: Option<f64>,
    #[serde(default)]
    altitude: Option<f64>,
    #[serde(default)]
    accuracy: Option<f64>,
}

async fn update_note(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
    Json(request): Json<UpdateNoteRequest>,
) -> Result<Json<Note>, AppError> {
    state
        .endpoint_rate_limiter
        .check(ProtectedEndpoint::Notes, &user.user_id)
        .await?;

    let id = parse_note_id(&id)?;
    let location = location_from_parts(
        request.latitude,
        request.longitude,
        request.altitude,
        request.accuracy,
    )?;
    let note = state
        .db
        .update_note(
            &user.user_id,
            &id,
            NoteUpdate {
                title: request.title,
                content: request.content,
                location,
            },
        )
        .await?;
    Ok(Json(note))
}

async fn delete_note(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state
        .endpoint_rate_limiter
        .check(ProtectedEndpoint::Notes, &user.user_id)
        .await?;

    let id = parse_note_id(&id)?;
    state.db.delete_note(&user.user_id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn parse_note_id(raw: &str) -> Result<NoteId, AppError> {
    raw.parse()
        .map_err(|_| AppError::bad_request(format!("Invalid note id: {raw}")))
}

/// Latitude and longitude travel together; the rest only with them
fn location_from_parts(
    latitude: Option<f64>,
    longitude: Option<f64>,
    altitude: Option<f64>,
    accuracy: Option<f64>,
) -> Result<Option<Location>, AppError> {
    if latitude.is_some() != longitude.is_some() {
        return Err(AppError::bad_request(
            "latitude and longitude must be provided together",
        ));
    }
    Ok(Location::from_parts(latitude, longitude, altitude, accuracy))
}
