//! HTTP surface of the gateway.
//!
//! Two kinds of routes: the control endpoints under `/_sw/` that deliver
//! host events to the worker, and the catch-all proxy route that turns
//! every other request into a fetch event. Proxied responses carry an
//! `x-larder-served-from` header naming the interceptor branch that
//! produced them.

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get, post};
use larder_core::Error;
use larder_core::model::ResourceRequest;
use larder_worker::{EventOutcome, FetchOutcome, Worker, WorkerEvent};
use serde_json::json;
use url::Url;

/// Names the interceptor branch that produced a proxied response.
pub const SERVED_FROM_HEADER: &str = "x-larder-served-from";

#[derive(Clone)]
pub struct AppState {
    pub worker: Arc<Worker>,
    pub upstream: Url,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/_sw/status", get(status))
        .route("/_sw/message", post(message))
        .route("/_sw/push", post(push))
        .route("/_sw/notification-click", post(notification_click))
        .route("/_sw/sync/{tag}", post(sync))
        .route("/_sw", any(unknown_control))
        .route("/_sw/", any(unknown_control))
        .route("/_sw/{*rest}", any(unknown_control))
        .fallback(proxy)
        .with_state(state)
}

async fn status(State(state): State<AppState>) -> Response {
    let body = json!({
        "state": state.worker.state().await,
        "active_generation": state.worker.active_tag(),
    });
    axum::Json(body).into_response()
}

async fn message(
    State(state): State<AppState>,
    axum::Json(value): axum::Json<serde_json::Value>,
) -> Response {
    dispatch(&state, WorkerEvent::Message(value)).await
}

async fn push(State(state): State<AppState>, body: String) -> Response {
    let payload = if body.is_empty() { None } else { Some(body) };
    dispatch(&state, WorkerEvent::Push(payload)).await
}

async fn notification_click(State(state): State<AppState>) -> Response {
    dispatch(&state, WorkerEvent::NotificationClick).await
}

async fn sync(State(state): State<AppState>, Path(tag): Path<String>) -> Response {
    dispatch(&state, WorkerEvent::Sync(tag)).await
}

async fn unknown_control(uri: Uri) -> Response {
    // Control-prefix paths are never proxied upstream.
    let body = json!({"error": format!("unknown control endpoint {}", uri.path())});
    (StatusCode::NOT_FOUND, axum::Json(body)).into_response()
}

async fn dispatch(state: &AppState, event: WorkerEvent) -> Response {
    match state.worker.handle_event(event).await {
        Ok(outcome) => axum::Json(outcome_body(&outcome)).into_response(),
        Err(e) => error_response(&e),
    }
}

fn outcome_body(outcome: &EventOutcome) -> serde_json::Value {
    match outcome {
        EventOutcome::Installed { tag, precached, took_over } => {
            json!({"outcome": "installed", "tag": tag, "precached": precached, "took_over": took_over})
        }
        EventOutcome::Activated(report) => json!({"outcome": "activated", "activation": report}),
        EventOutcome::Retired => json!({"outcome": "retired"}),
        EventOutcome::TakeoverArmed => json!({"outcome": "takeover-armed"}),
        EventOutcome::TookOver(report) => json!({"outcome": "took-over", "activation": report}),
        EventOutcome::AlreadyActive => json!({"outcome": "already-active"}),
        EventOutcome::NotificationShown { title, body } => {
            json!({"outcome": "notification-shown", "title": title, "body": body})
        }
        EventOutcome::WindowFocused(id) => json!({"outcome": "window-focused", "client": id}),
        EventOutcome::WindowOpened => json!({"outcome": "window-opened"}),
        EventOutcome::SyncAcknowledged(tag) => json!({"outcome": "sync-acknowledged", "tag": tag}),
        EventOutcome::Ignored => json!({"outcome": "ignored"}),
    }
}

/// Forward one application request through the worker.
async fn proxy(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    let target = match state.upstream.join(path_and_query) {
        Ok(url) => url,
        Err(e) => {
            return error_response(&Error::MalformedRequest(format!(
                "cannot resolve {path_and_query}: {e}"
            )));
        }
    };
    // A network-path reference like `//other.host/x` would join onto a
    // different origin; only the configured upstream may be fetched.
    if target.origin() != state.upstream.origin() {
        return error_response(&Error::MalformedRequest(format!(
            "{path_and_query} resolves outside the upstream origin"
        )));
    }

    let request = ResourceRequest {
        method: method.to_string(),
        url: target,
        headers: headers
            .iter()
            .filter_map(|(name, value)| {
                value.to_str().ok().map(|v| (name.to_string(), v.to_string()))
            })
            .collect(),
        body,
    };

    match state.worker.handle_fetch(request).await {
        Ok(outcome) => respond(outcome),
        Err(e) => error_response(&e),
    }
}

/// Replay a stored or live response to the client; the pending cache write,
/// if any, is detached and finishes in the background.
fn respond(outcome: FetchOutcome) -> Response {
    let FetchOutcome { response, served_from, pending_write } = outcome;
    drop(pending_write);

    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut builder = Response::builder().status(status);
    for (name, value) in &response.headers {
        // Recomputed from the body we actually send.
        if name.eq_ignore_ascii_case("content-length") {
            continue;
        }
        if let (Ok(name), Ok(value)) =
            (HeaderName::try_from(name.as_str()), HeaderValue::try_from(value.as_str()))
        {
            builder = builder.header(name, value);
        }
    }
    builder = builder.header(SERVED_FROM_HEADER, served_from.as_str());

    builder
        .body(Body::from(response.body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

fn error_response(error: &Error) -> Response {
    let status = match error {
        Error::MalformedRequest(_) => StatusCode::BAD_REQUEST,
        Error::NetworkUnreachable(_) | Error::FetchTooLarge(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    tracing::warn!(error = %error, status = %status, "request failed");
    (status, error.to_string()).into_response()
}
