use super::AppState;
use crate::{
    backend::ClinicBackend,
    error::{ClinicError, ClinicResult},
    identity::Identity,
    types::{Appointment, Role},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct BookingRequest {
    doctor_id: Uuid,
    /// Defaults to the caller's own patient record.
    #[serde(default)]
    patient_id: Option<Uuid>,
    start: DateTime<Utc>,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ReasonRequest {
    reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RescheduleRequest {
    start: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CompleteRequest {
    #[serde(default)]
    notes: Option<String>,
}

pub fn routes<B: ClinicBackend>() -> Router<AppState<B>> {
    Router::new()
        .route(
            "/appointments",
            get(list_appointments).post(book_appointment),
        )
        .route("/appointments/reminders", post(send_reminders))
        .route(
            "/appointments/:id",
            get(get_appointment).delete(remove_appointment),
        )
        .route("/appointments/:id/cancel", post(cancel_appointment))
        .route("/appointments/:id/reschedule", post(reschedule_appointment))
        .route("/appointments/:id/approve", post(approve_appointment))
        .route("/appointments/:id/reject", post(reject_appointment))
        .route("/appointments/:id/complete", post(complete_appointment))
}

async fn list_appointments<B: ClinicBackend>(
    State(state): State<AppState<B>>,
    identity: Identity,
) -> ClinicResult<Json<Vec<Appointment>>> {
    Ok(Json(state.scheduler.appointments_for(&identity)?))
}

async fn book_appointment<B: ClinicBackend>(
    State(state): State<AppState<B>>,
    identity: Identity,
    Json(booking): Json<BookingRequest>,
) -> ClinicResult<(StatusCode, Json<Appointment>)> {
    let patient_id = match (booking.patient_id, identity.role) {
        (Some(patient_id), _) => patient_id,
        (None, Role::Patient) => identity.patient_profile(&state.backend)?.id,
        (None, _) => return Err(ClinicError::Validation("patient_id is required".into())),
    };

    let appointment = state
        .scheduler
        .book_appointment(
            &identity,
            booking.doctor_id,
            patient_id,
            booking.start,
            booking.reason,
        )
        .inspect_err(|err| warn!(%err, doctor_id = %booking.doctor_id, "Booking refused"))?;
    Ok((StatusCode::CREATED, Json(appointment)))
}

async fn get_appointment<B: ClinicBackend>(
    State(state): State<AppState<B>>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> ClinicResult<Json<Appointment>> {
    Ok(Json(state.scheduler.appointment_for(&identity, id)?))
}

async fn remove_appointment<B: ClinicBackend>(
    State(state): State<AppState<B>>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> ClinicResult<StatusCode> {
    state.scheduler.remove_appointment(&identity, id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn cancel_appointment<B: ClinicBackend>(
    State(state): State<AppState<B>>,
    identity: Identity,
    Path(id): Path<Uuid>,
    Json(request): Json<ReasonRequest>,
) -> ClinicResult<Json<Appointment>> {
    Ok(Json(
        state
            .scheduler
            .cancel_appointment(&identity, id, request.reason)?,
    ))
}

async fn reschedule_appointment<B: ClinicBackend>(
    State(state): State<AppState<B>>,
    identity: Identity,
    Path(id): Path<Uuid>,
    Json(request): Json<RescheduleRequest>,
) -> ClinicResult<Json<Appointment>> {
    Ok(Json(
        state
            .scheduler
            .reschedule_appointment(&identity, id, request.start)?,
    ))
}

async fn approve_appointment<B: ClinicBackend>(
    State(state): State<AppState<B>>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> ClinicResult<Json<Appointment>> {
    Ok(Json(state.scheduler.approve_appointment(&identity, id)?))
}

async fn reject_appointment<B: ClinicBackend>(
    State(state): State<AppState<B>>,
    identity: Identity,
    Path(id): Path<Uuid>,
    Json(request): Json<ReasonRequest>,
) -> ClinicResult<Json<Appointment>> {
    Ok(Json(
        state
            .scheduler
            .reject_appointment(&identity, id, request.reason)?,
    ))
}

async fn complete_appointment<B: ClinicBackend>(
    State(state): State<AppState<B>>,
    identity: Identity,
    Path(id): Path<Uuid>,
    request: Option<Json<CompleteRequest>>,
) -> ClinicResult<Json<Appointment>> {
    let notes = request.and_then(|Json(request)| request.notes);
    Ok(Json(state.scheduler.complete_appointment(&identity, id, notes)?))
}

async fn send_reminders<B: ClinicBackend>(
    State(state): State<AppState<B>>,
    identity: Identity,
) -> ClinicResult<Json<Value>> {
    let sent = state.scheduler.send_reminders(&identity, Utc::now())?;
    Ok(Json(json!({ "sent": sent })))
}
