#![forbid(unsafe_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use muleguard_adapter::config::ConsoleConfig;
use muleguard_adapter::{
    now_unix_ms, AdapterError, AdapterRuntime, ApiKeyView, ConfirmRequest, DeleteKeyResponse,
    ErrorBody, HealthResponse, IssueKeyRequest, IssueKeyResponse, VerificationView,
    VerifyRequest,
};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

type Shared = State<Arc<AdapterRuntime>>;

// Request bodies are small JSON documents; identifiers carry no length rule
// of their own, so the transport bounds them.
const MAX_REQUEST_BODY_BYTES: usize = 16 * 1024;
type Rejection = (StatusCode, Json<ErrorBody>);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ConsoleConfig::from_env();
    let addr: SocketAddr = config.http_bind.parse()?;
    let runtime = Arc::new(AdapterRuntime::from_config(&config)?);

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/verify", post(verify))
        .route("/v1/keys", get(list_keys).post(issue_key))
        .route("/v1/keys/:id/revoke", post(revoke_key))
        .route("/v1/keys/:id/delete", post(delete_key))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .with_state(runtime);

    tracing::info!(
        %addr,
        lookup_latency_ms = config.lookup_latency.as_millis() as u64,
        seed_demo_keys = config.seed_demo_keys,
        "muleguard_http listening"
    );
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::warn!("ctrl-c handler unavailable; serving until killed");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

fn reject(err: AdapterError) -> Rejection {
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        tracing::error!(error = %err, "request failed");
    }
    (status, Json(err.body()))
}

async fn healthz(State(runtime): Shared) -> Result<Json<HealthResponse>, Rejection> {
    runtime.health().map(Json).map_err(reject)
}

async fn verify(
    State(runtime): Shared,
    Json(req): Json<VerifyRequest>,
) -> Result<Json<VerificationView>, Rejection> {
    runtime.verify(req).await.map(Json).map_err(reject)
}

async fn list_keys(State(runtime): Shared) -> Result<Json<Vec<ApiKeyView>>, Rejection> {
    runtime.list_keys().map(Json).map_err(reject)
}

async fn issue_key(
    State(runtime): Shared,
    Json(req): Json<IssueKeyRequest>,
) -> Result<(StatusCode, Json<IssueKeyResponse>), Rejection> {
    runtime
        .issue_key(&req, now_unix_ms())
        .map(|issued| (StatusCode::CREATED, Json(issued)))
        .map_err(reject)
}

async fn revoke_key(
    State(runtime): Shared,
    Path(id): Path<String>,
    confirm: Option<Json<ConfirmRequest>>,
) -> Result<Json<ApiKeyView>, Rejection> {
    runtime
        .revoke_key(&id, confirm.map(|Json(c)| c), now_unix_ms())
        .map(Json)
        .map_err(reject)
}

async fn delete_key(
    State(runtime): Shared,
    Path(id): Path<String>,
    confirm: Option<Json<ConfirmRequest>>,
) -> Result<Json<DeleteKeyResponse>, Rejection> {
    runtime
        .delete_key(&id, confirm.map(|Json(c)| c))
        .map(Json)
        .map_err(reject)
}
