//! HTTP surface of the node.
//!
//! Every call that needs a caller reads it from the `x-caller` header: the
//! hex identity the fronting gateway has already authenticated.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, Path, Query, Request, State};
use axum::http::request::Parts;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use provenance_common::{
    CommandOutcome, Identity, LedgerCommand, LedgerError, LedgerEvent, LedgerOp, Product,
    ProductId, ProductStatus, ProductSummary, Waypoint,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};

use crate::store::{LedgerStore, StoreError};

pub const CALLER_HEADER: &str = "x-caller";

pub type AppState = Arc<LedgerStore>;

// ─── Errors ─────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("missing x-caller header")]
    MissingCaller,

    #[error("invalid caller: {0}")]
    InvalidCaller(LedgerError),

    /// The path, query or body could not be decoded.
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Ledger(e) => ApiError::Ledger(e),
            other => ApiError::Store(other),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingCaller | ApiError::InvalidCaller(_) => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Ledger(e) => match e {
                LedgerError::Unauthorized(_) => StatusCode::FORBIDDEN,
                LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
                LedgerError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
                LedgerError::AlreadyAuthorized(_) => StatusCode::CONFLICT,
                LedgerError::InvalidState(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, %status, "request rejected");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

// ─── Caller extraction ──────────────────────────────────────────────────────

/// The authenticated identity making the request.
pub struct Caller(pub Identity);

impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(CALLER_HEADER)
            .ok_or(ApiError::MissingCaller)?;
        let text = value.to_str().map_err(|_| {
            ApiError::InvalidCaller(LedgerError::InvalidArgument(
                "header is not ASCII".into(),
            ))
        })?;
        text.parse().map(Caller).map_err(ApiError::InvalidCaller)
    }
}

// ─── Input extractors ───────────────────────────────────────────────────────
//
// axum's own extractors reject with plain text. These wrap them so every
// error leaves as an `ErrorResponse`.

/// JSON body.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(ApiJson(value))
    }
}

/// Path parameters.
pub struct ApiPath<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    Path<T>: FromRequestParts<S, Rejection = PathRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state).await?;
        Ok(ApiPath(value))
    }
}

/// Query string.
pub struct ApiQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    Query<T>: FromRequestParts<S, Rejection = QueryRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(ApiQuery(value))
    }
}

// ─── API types ──────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub location: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub id: ProductId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JourneyRequest {
    pub location: String,
    /// Variant name or ordinal; parsed here so a bad value is a 400.
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IdentityRequest {
    pub identity: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CountResponse {
    pub count: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub exists: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthorizedResponse {
    pub authorized: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub administrator: Identity,
    pub products: u64,
    pub journal_len: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct EventsQuery {
    #[serde(default)]
    pub since: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SequencedEvent {
    pub seq: usize,
    pub event: LedgerEvent,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EventsResponse {
    pub events: Vec<SequencedEvent>,
    /// Pass back as `since` to poll for newer events.
    pub next: usize,
}

// ─── Handlers ───────────────────────────────────────────────────────────────

async fn health_handler(State(store): State<AppState>) -> Json<HealthResponse> {
    let snapshot = store.read().await;
    Json(HealthResponse {
        status: "ok".to_string(),
        administrator: snapshot.administrator().clone(),
        products: snapshot.state.total_count(),
        journal_len: snapshot.journal.len(),
    })
}

async fn count_handler(State(store): State<AppState>) -> Json<CountResponse> {
    let snapshot = store.read().await;
    Json(CountResponse {
        count: snapshot.state.total_count(),
    })
}

async fn register_handler(
    State(store): State<AppState>,
    Caller(caller): Caller,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<Json<RegisterResponse>, ApiError> {
    let command = LedgerCommand::now(
        caller,
        LedgerOp::Register {
            name: req.name,
            description: req.description,
            initial_location: req.location,
        },
    );
    match store.execute(command).await? {
        CommandOutcome::Registered(id) => Ok(Json(RegisterResponse { id })),
        CommandOutcome::Done => Err(ApiError::Ledger(LedgerError::InvalidState(
            "register produced no id".into(),
        ))),
    }
}

async fn journey_handler(
    State(store): State<AppState>,
    Caller(caller): Caller,
    ApiPath(id): ApiPath<u64>,
    ApiJson(req): ApiJson<JourneyRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    let status: ProductStatus = req.status.parse()?;
    let command = LedgerCommand::now(
        caller,
        LedgerOp::AppendJourney {
            id: ProductId(id),
            location: req.location,
            status,
        },
    );
    store.execute(command).await?;
    Ok(Json(OkResponse { ok: true }))
}

async fn details_handler(
    State(store): State<AppState>,
    Caller(caller): Caller,
    ApiPath(id): ApiPath<u64>,
) -> Result<Json<Product>, ApiError> {
    let snapshot = store.read().await;
    let product = snapshot.state.details(&caller, ProductId(id))?;
    Ok(Json(product.clone()))
}

async fn history_handler(
    State(store): State<AppState>,
    Caller(caller): Caller,
    ApiPath(id): ApiPath<u64>,
) -> Result<Json<Vec<Waypoint>>, ApiError> {
    let snapshot = store.read().await;
    let history = snapshot.state.history(&caller, ProductId(id))?;
    Ok(Json(history.to_vec()))
}

async fn summary_handler(
    State(store): State<AppState>,
    ApiPath(id): ApiPath<u64>,
) -> Result<Json<ProductSummary>, ApiError> {
    let snapshot = store.read().await;
    Ok(Json(snapshot.state.summary(ProductId(id))?))
}

async fn verify_handler(
    State(store): State<AppState>,
    ApiPath(id): ApiPath<u64>,
) -> Json<VerifyResponse> {
    let snapshot = store.read().await;
    Json(VerifyResponse {
        exists: snapshot.state.verify(ProductId(id)),
    })
}

async fn grant_access_handler(
    State(store): State<AppState>,
    Caller(caller): Caller,
    ApiPath(id): ApiPath<u64>,
    ApiJson(req): ApiJson<IdentityRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    let identity: Identity = req.identity.parse()?;
    let command = LedgerCommand::now(
        caller,
        LedgerOp::GrantAccess {
            id: ProductId(id),
            identity,
        },
    );
    store.execute(command).await?;
    Ok(Json(OkResponse { ok: true }))
}

async fn authorize_user_handler(
    State(store): State<AppState>,
    Caller(caller): Caller,
    ApiJson(req): ApiJson<IdentityRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    let identity: Identity = req.identity.parse()?;
    store
        .execute(LedgerCommand::now(caller, LedgerOp::AuthorizeUser { identity }))
        .await?;
    Ok(Json(OkResponse { ok: true }))
}

async fn is_authorized_handler(
    State(store): State<AppState>,
    ApiPath(identity): ApiPath<String>,
) -> Result<Json<AuthorizedResponse>, ApiError> {
    let identity: Identity = identity.parse()?;
    let snapshot = store.read().await;
    Ok(Json(AuthorizedResponse {
        authorized: snapshot.state.is_authorized(&identity),
    }))
}

async fn events_handler(
    State(store): State<AppState>,
    ApiQuery(query): ApiQuery<EventsQuery>,
) -> Json<EventsResponse> {
    let snapshot = store.read().await;
    let start = query.since.min(snapshot.events.len());
    let events = snapshot.events[start..]
        .iter()
        .enumerate()
        .map(|(offset, event)| SequencedEvent {
            seq: start + offset,
            event: event.clone(),
        })
        .collect();
    Json(EventsResponse {
        events,
        next: snapshot.events.len(),
    })
}

// ─── Router ─────────────────────────────────────────────────────────────────

pub fn router(store: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/products", post(register_handler))
        .route("/products/count", get(count_handler))
        .route("/products/{id}", get(details_handler))
        .route("/products/{id}/summary", get(summary_handler))
        .route("/products/{id}/history", get(history_handler))
        .route("/products/{id}/verify", get(verify_handler))
        .route("/products/{id}/journey", post(journey_handler))
        .route("/products/{id}/access", post(grant_access_handler))
        .route("/users", post(authorize_user_handler))
        .route("/users/{identity}/authorized", get(is_authorized_handler))
        .route("/events", get(events_handler))
        .layer(cors)
        .with_state(store)
}
