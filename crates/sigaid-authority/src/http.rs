//! The Authority HTTP API: an axum router over [`Authority`].
//!
//! Paths, methods, bodies, and status codes follow the wire contract.
//! Service callers authenticate with `X-API-Key` or `Authorization:
//! Bearer`; agent-facing endpoints authenticate by signature or token
//! inside the body instead.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use sigaid_core::canonical;
use sigaid_core::ct_eq;
use sigaid_core::wire::{
    AcquireLeaseRequest, ErrorResponse, RegisterAgentRequest, ReleaseLeaseRequest,
    RenewLeaseRequest, StateHeadResponse, StateHistoryResponse, VerifyRequest,
};
use sigaid_core::StateEntry;

use crate::authority::{AppendResult, Authority};
use crate::error::AuthorityError;

/// Shared handler state.
pub type AppState = Arc<Authority>;

/// Build the `/v1` router for an Authority instance.
pub fn router(authority: AppState) -> Router {
    Router::new()
        .route("/v1/agents", post(register_agent))
        .route("/v1/agents/:agent_id", get(get_agent))
        .route("/v1/leases", post(acquire_lease))
        .route(
            "/v1/leases/:agent_id",
            put(renew_lease).delete(release_lease).get(lease_status),
        )
        .route("/v1/state/:agent_id", post(append_state).get(state_head))
        .route("/v1/state/:agent_id/history", get(state_history))
        .route("/v1/verify", post(verify_proof))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&authority),
            require_api_key,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(authority)
}

/// Serve the router on a TCP listener until the task is dropped.
pub async fn serve(authority: AppState, listener: tokio::net::TcpListener) -> std::io::Result<()> {
    axum::serve(listener, router(authority)).await
}

/// Install the tracing subscriber for authority deployments, honoring
/// `RUST_LOG` and defaulting to info-level authority spans.
pub fn init_tracing() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sigaid_authority=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

// ── Auth middleware ─────────────────────────────────────────────────────

async fn require_api_key(
    State(authority): State<AppState>,
    headers: HeaderMap,
    request: axum::extract::Request,
    next: Next,
) -> Response {
    let Some(expected) = authority.config().api_key.as_deref() else {
        return next.run(request).await;
    };

    let presented = headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .or_else(|| {
            headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
        });

    match presented {
        Some(key) if ct_eq(key.as_bytes(), expected.as_bytes()) => next.run(request).await,
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse::new("permission_denied")),
        )
            .into_response(),
    }
}

// ── Error mapping ───────────────────────────────────────────────────────

struct ApiError(AuthorityError);

impl From<AuthorityError> for ApiError {
    fn from(e: AuthorityError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self.0 {
            AuthorityError::AgentNotFound(id) => (
                StatusCode::NOT_FOUND,
                ErrorResponse::new("agent_not_found").with_message(id.clone()),
            ),
            AuthorityError::AgentExists(id) => (
                StatusCode::CONFLICT,
                ErrorResponse::new("agent_exists").with_message(id.clone()),
            ),
            AuthorityError::InvalidSignature => {
                (StatusCode::UNAUTHORIZED, ErrorResponse::new("invalid_signature"))
            }
            AuthorityError::ClockSkew => {
                (StatusCode::UNAUTHORIZED, ErrorResponse::new("clock_skew"))
            }
            AuthorityError::NonceReplayed => {
                (StatusCode::UNAUTHORIZED, ErrorResponse::new("nonce_replayed"))
            }
            AuthorityError::LeaseHeld {
                holder_session_id,
                expires_at,
            } => {
                let mut body = ErrorResponse::new("lease_held");
                body.holder_session_id = Some(holder_session_id.clone());
                body.expires_at = Some(canonical::format_timestamp(*expires_at));
                (StatusCode::CONFLICT, body)
            }
            AuthorityError::SessionMismatch => {
                (StatusCode::FORBIDDEN, ErrorResponse::new("session_mismatch"))
            }
            AuthorityError::LeaseExpired => {
                (StatusCode::GONE, ErrorResponse::new("lease_expired"))
            }
            AuthorityError::NoActiveLease => {
                (StatusCode::FORBIDDEN, ErrorResponse::new("no_active_lease"))
            }
            AuthorityError::TokenInvalid => {
                (StatusCode::UNAUTHORIZED, ErrorResponse::new("token_invalid"))
            }
            AuthorityError::Fork { current_head } => {
                let mut body = ErrorResponse::new("fork");
                body.current_head = Some(StateHeadResponse::from_head(current_head));
                (StatusCode::CONFLICT, body)
            }
            AuthorityError::SequenceMismatch { expected } => {
                let mut body = ErrorResponse::new("sequence_mismatch");
                body.expected_sequence = Some(*expected);
                (StatusCode::CONFLICT, body)
            }
            AuthorityError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new("bad_request").with_message(msg.clone()),
            ),
            AuthorityError::PermissionDenied => {
                (StatusCode::FORBIDDEN, ErrorResponse::new("permission_denied"))
            }
            AuthorityError::Store(e) => {
                tracing::error!(error = %e, "store failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("internal"),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

// ── Handlers ────────────────────────────────────────────────────────────

async fn register_agent(
    State(authority): State<AppState>,
    Json(body): Json<RegisterAgentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let info = authority.register_agent(&body)?;
    Ok((StatusCode::CREATED, Json(info)))
}

async fn get_agent(
    State(authority): State<AppState>,
    Path(agent_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let info = authority.get_agent(&agent_id)?;
    Ok(Json(info))
}

async fn acquire_lease(
    State(authority): State<AppState>,
    Json(body): Json<AcquireLeaseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let grant = authority.acquire_lease(&body)?;
    Ok(Json(grant))
}

async fn renew_lease(
    State(authority): State<AppState>,
    Path(agent_id): Path<String>,
    Json(body): Json<RenewLeaseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let grant = authority.renew_lease(&agent_id, &body)?;
    Ok(Json(grant))
}

async fn release_lease(
    State(authority): State<AppState>,
    Path(agent_id): Path<String>,
    Json(body): Json<ReleaseLeaseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    authority.release_lease(&agent_id, &body)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn lease_status(
    State(authority): State<AppState>,
    Path(agent_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    // 404 for unknown agents, matching the other per-agent routes.
    authority.get_agent(&agent_id)?;
    Ok(Json(authority.lease_status(&agent_id)))
}

/// Body for `POST /v1/state/{agent_id}`: the full entry plus the lease
/// token authorizing the append.
#[derive(Debug, Deserialize)]
struct AppendStateBody {
    entry: StateEntry,
    lease_token: String,
}

async fn append_state(
    State(authority): State<AppState>,
    Path(agent_id): Path<String>,
    Json(body): Json<AppendStateBody>,
) -> Result<impl IntoResponse, ApiError> {
    let result = authority
        .append_entry(&agent_id, &body.entry, &body.lease_token)
        .await?;
    let (status, head) = match result {
        AppendResult::Committed(head) => (StatusCode::CREATED, head),
        AppendResult::AlreadyCommitted(head) => (StatusCode::OK, head),
    };
    Ok((status, Json(StateHeadResponse::from_head(&head))))
}

async fn state_head(
    State(authority): State<AppState>,
    Path(agent_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let head = authority.state_head_response(&agent_id).await?;
    Ok(Json(head))
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    #[serde(default)]
    offset: u64,
    #[serde(default = "default_limit")]
    limit: u64,
}

fn default_limit() -> u64 {
    100
}

async fn state_history(
    State(authority): State<AppState>,
    Path(agent_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = query.limit.min(1000);
    let (entries, total) = authority
        .state_history(&agent_id, query.offset, limit)
        .await?;
    Ok(Json(StateHistoryResponse { entries, total }))
}

async fn verify_proof(
    State(authority): State<AppState>,
    Json(body): Json<VerifyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(authority.verify_proof(&body).await))
}
