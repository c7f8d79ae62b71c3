use std::convert::Infallible;
use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, State};
use axum::http::Uri;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::routing::{get, post};
use axum::{Json, Router};
use beqwatch_core::error::ApiError;
use beqwatch_core::types::{Device, Event};
use beqwatch_engine::{SessionSnapshot, StatusEvent};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use crate::error::AppError;
use crate::state::AppState;
use crate::webhook::{self, IgnoreReason, PlexWebhook};
use crate::worker::QueuedEvent;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/webhook", webhook_router())
        .nest("/api/v1", api_router())
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn webhook_router() -> Router<AppState> {
    Router::new()
        .route("/plex", post(plex_webhook))
        .route("/event", post(event_webhook))
}

fn api_router() -> Router<AppState> {
    Router::new()
        .route("/sessions", get(list_sessions))
        .route("/devices", get(list_devices))
        .route("/events", get(sse_events))
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

async fn not_found(uri: Uri) -> AppError {
    ApiError::NotFound(uri.path().to_string()).into()
}

// ---------------------------------------------------------------------------
// Webhooks
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub status: &'static str,
    /// Correlates the webhook with the worker's log lines.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<IgnoreReason>,
}

impl WebhookAck {
    fn queued(id: String) -> Self {
        Self {
            status: "queued",
            id: Some(id),
            reason: None,
        }
    }

    fn ignored(reason: IgnoreReason) -> Self {
        debug!(reason = ?reason, "webhook ignored");
        Self {
            status: "ignored",
            id: None,
            reason: Some(reason),
        }
    }
}

async fn plex_webhook(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<WebhookAck>, AppError> {
    let mut payload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        if field.name() == Some("payload") {
            let text = field
                .text()
                .await
                .map_err(|e| ApiError::BadRequest(e.to_string()))?;
            payload = Some(text);
        }
        // thumbnails and other parts are skipped
    }

    let payload =
        payload.ok_or_else(|| ApiError::BadRequest("missing 'payload' field".into()))?;
    let hook = PlexWebhook::parse(&payload)
        .map_err(|e| ApiError::BadRequest(format!("malformed plex payload: {e}")))?;

    if let Err(reason) = state.filters.check(&hook) {
        return Ok(Json(WebhookAck::ignored(reason)));
    }
    let event = hook.into_event();
    if let Err(reason) = webhook::check_event(&event) {
        return Ok(Json(WebhookAck::ignored(reason)));
    }
    enqueue(&state, event).await
}

async fn event_webhook(
    State(state): State<AppState>,
    payload: Result<Json<Event>, JsonRejection>,
) -> Result<Json<WebhookAck>, AppError> {
    let Json(event) = payload?;
    if let Err(reason) = webhook::check_event(&event) {
        return Ok(Json(WebhookAck::ignored(reason)));
    }
    enqueue(&state, event).await
}

async fn enqueue(state: &AppState, event: Event) -> Result<Json<WebhookAck>, AppError> {
    let action = event.action;
    let session = event.session_key();
    let queued = QueuedEvent::new(event);
    let id = queued.id.clone();
    match tokio::time::timeout(state.enqueue_timeout, state.queue.send(queued)).await {
        Ok(Ok(())) => {
            debug!(id = %id, action = %action, session = %session, "event queued");
            Ok(Json(WebhookAck::queued(id)))
        }
        Ok(Err(_)) => Err(ApiError::ServiceUnavailable("event worker is not running".into()).into()),
        Err(_) => {
            warn!(action = %action, session = %session, "event queue full, rejecting webhook");
            Err(ApiError::TooManyRequests("event queue is full".into()).into())
        }
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

async fn list_sessions(State(state): State<AppState>) -> Json<Vec<SessionSnapshot>> {
    Json(state.orchestrator.sessions().await)
}

async fn list_devices(State(state): State<AppState>) -> Json<Vec<Device>> {
    Json(state.devices.as_ref().clone())
}

// ---------------------------------------------------------------------------
// SSE events
// ---------------------------------------------------------------------------

async fn sse_events(
    State(state): State<AppState>,
) -> Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>> {
    let mut rx = state.status.subscribe();

    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(evt) => {
                    let event_type = match &evt {
                        StatusEvent::Playing { .. } => "playing",
                        StatusEvent::Lights { .. } => "lights",
                        StatusEvent::VolumeHint { .. } => "volume_hint",
                        StatusEvent::ProfileLoaded { .. } => "profile_loaded",
                        StatusEvent::ProfileUnloaded { .. } => "profile_unloaded",
                        StatusEvent::SyncStarted { .. } => "sync_started",
                        StatusEvent::SyncFinished { .. } => "sync_finished",
                    };
                    if let Ok(data) = serde_json::to_string(&evt) {
                        yield Ok(SseEvent::default().event(event_type).data(data));
                    }
                }
                Err(RecvError::Lagged(n)) => {
                    yield Ok(SseEvent::default()
                        .event("error")
                        .data(format!(r#"{{"lagged":{n}}}"#)));
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
