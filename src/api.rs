use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body,
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use log::{error, info, warn};

use crate::config::{Config, SourceIpMode, TargetMode};
use crate::provider::{self, ProviderError, RecordStore};
use crate::validate::{self, ValidationError};

const NOT_ENOUGH_DATA: &str = "Not enough data to update";
const UNABLE_TO_VALIDATE: &str = "Unable to validate";
const ACCEPTED: &str = "Call to update accepted";

pub struct AppState {
    pub source_ip: SourceIpMode,
    pub target: TargetMode,
    pub max_body_bytes: usize,
    pub store: Arc<dyn RecordStore>,
}

impl AppState {
    pub fn new(config: &Config, store: Arc<dyn RecordStore>) -> Self {
        Self {
            source_ip: config.server.source_ip,
            target: config.target_mode(),
            max_body_bytes: config.server.max_body_bytes,
            store,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/update", post(update_dns))
        .route("/health", get(health_check))
        .layer(middleware::from_fn(access_log))
        .with_state(Arc::new(state))
}

async fn access_log(request: Request, next: Next) -> Response {
    let start = Instant::now();

    // Extract request info
    let method = request.method().clone();
    let uri = request.uri();
    let path = match uri.query() {
        Some(q) => format!("{}?{}", uri.path(), q),
        None => uri.path().to_string(),
    };
    let user_agent = request
        .headers()
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();
    let ip = forwarded_ip(request.headers())
        .or_else(|| peer_ip(&request))
        .unwrap_or_else(|| "-".to_string());

    // Process request
    let response = next.run(request).await;

    // Extract response info
    let status = response.status().as_u16();
    let length = response
        .headers()
        .get("content-length")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");

    let duration = start.elapsed();

    // Access log format: method path "user-agent" ip status length duration
    info!(
        target: "access",
        "{} {} \"{}\" {} {} {} {:.3}ms",
        method, path, user_agent, ip, status, length, duration.as_secs_f64() * 1000.0
    );

    response
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok"
    }))
}

async fn update_dns(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let observed = match state.source_ip {
        SourceIpMode::Forwarded => forwarded_ip(request.headers()),
        SourceIpMode::Peer => peer_ip(&request),
    }
    .unwrap_or_default();

    let body = match body::to_bytes(request.into_body(), state.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => return rejection(ValidationError::MalformedBody(e.to_string())),
    };

    let validated = match &state.target {
        TargetMode::RequestSupplied => validate::validate(&body, &observed),
        target => validate::validate_for(&body, &observed, target),
    };
    let req = match validated {
        Ok(req) => req,
        Err(e) => return rejection(e),
    };

    match provider::update(state.store.as_ref(), &req).await {
        Ok(ack) => {
            info!(
                "DNS update accepted: {} -> {} (change {}, status {})",
                req.target_hostname,
                req.claimed_ip,
                ack.change_id.as_deref().unwrap_or("-"),
                ack.status.as_deref().unwrap_or("-")
            );
            text(StatusCode::ACCEPTED, ACCEPTED.to_string())
        }
        Err(e) => failure(e),
    }
}

fn rejection(err: ValidationError) -> Response {
    warn!("Rejected update request: {}", err);

    match err {
        ValidationError::MissingSourceIp
        | ValidationError::EmptyBody
        | ValidationError::MissingField(_) => {
            text(StatusCode::BAD_REQUEST, NOT_ENOUGH_DATA.to_string())
        }
        ValidationError::InvalidAddress(ip) => {
            text(StatusCode::BAD_REQUEST, format!("Invalid IP address: {}", ip))
        }
        // Parse failures answer 500, as deployed clients already expect.
        ValidationError::MalformedBody(message) => text(StatusCode::INTERNAL_SERVER_ERROR, message),
        ValidationError::IdentityMismatch { .. } | ValidationError::TargetMismatch { .. } => {
            text(StatusCode::INTERNAL_SERVER_ERROR, UNABLE_TO_VALIDATE.to_string())
        }
    }
}

fn failure(err: ProviderError) -> Response {
    error!("DNS update failed: {}", err);
    text(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}

fn text(status: StatusCode, body: String) -> Response {
    (status, [(header::CONTENT_TYPE, "text/html")], body).into_response()
}

/// First hop of `X-Forwarded-For`, falling back to `X-Real-IP`.
fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.split(',').next().unwrap_or("").trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
}

fn peer_ip(request: &Request) -> Option<String> {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        // Dual-stack listeners report IPv4 peers as `::ffff:a.b.c.d`.
        .map(|ConnectInfo(addr)| addr.ip().to_canonical().to_string())
}
