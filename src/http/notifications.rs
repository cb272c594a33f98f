use super::AppState;
use crate::{
    backend::ClinicBackend,
    error::ClinicResult,
    event_bus::NotificationEvent,
    identity::Identity,
    types::{Notification, Role},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, patch, post},
    Json, Router,
};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::convert::Infallible;
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SendRequest {
    user_id: Uuid,
    message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct BroadcastRequest {
    message: String,
    #[serde(default)]
    target_role: Option<Role>,
}

pub fn routes<B: ClinicBackend>() -> Router<AppState<B>> {
    Router::new()
        .route(
            "/notifications",
            get(unread_notifications).post(send_notification),
        )
        .route("/notifications/all", get(all_notifications))
        .route("/notifications/broadcast", post(broadcast))
        .route("/notifications/stream", get(stream))
        .route("/notifications/:id/mark-read", patch(mark_read))
}

async fn unread_notifications<B: ClinicBackend>(
    State(state): State<AppState<B>>,
    identity: Identity,
) -> ClinicResult<Json<Vec<Notification>>> {
    Ok(Json(state.notifier.unread_for(&identity)?))
}

async fn all_notifications<B: ClinicBackend>(
    State(state): State<AppState<B>>,
    identity: Identity,
) -> ClinicResult<Json<Vec<Notification>>> {
    Ok(Json(state.notifier.all(&identity)?))
}

async fn send_notification<B: ClinicBackend>(
    State(state): State<AppState<B>>,
    identity: Identity,
    Json(request): Json<SendRequest>,
) -> ClinicResult<(StatusCode, Json<Notification>)> {
    let notification = state
        .notifier
        .send(&identity, request.user_id, request.message)?;
    Ok((StatusCode::CREATED, Json(notification)))
}

async fn broadcast<B: ClinicBackend>(
    State(state): State<AppState<B>>,
    identity: Identity,
    Json(request): Json<BroadcastRequest>,
) -> ClinicResult<Json<Value>> {
    let recipients = state
        .notifier
        .broadcast(&identity, &request.message, request.target_role)?;
    Ok(Json(json!({ "recipients": recipients })))
}

async fn mark_read<B: ClinicBackend>(
    State(state): State<AppState<B>>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> ClinicResult<StatusCode> {
    state.notifier.mark_read(&identity, id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Live feed of the caller's own notifications.
async fn stream<B: ClinicBackend>(
    State(state): State<AppState<B>>,
    identity: Identity,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let channel = state.channel.clone();
    let user_id = identity.user_id;

    let events = state.bus.subscribe().filter_map(move |message| {
        let channel = channel.clone();
        async move {
            let message = match message {
                Ok(message) => message,
                Err(err) => {
                    warn!(%err, %user_id, "Notification stream lagged");
                    return None;
                }
            };
            if message.channel != channel {
                return None;
            }
            let event: NotificationEvent = serde_json::from_str(&message.payload).ok()?;
            (event.user_id == user_id).then(|| {
                Ok(Event::default()
                    .event(event.kind.as_str())
                    .data(message.payload))
            })
        }
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}
