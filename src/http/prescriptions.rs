use super::AppState;
use crate::{
    backend::ClinicBackend,
    error::ClinicResult,
    identity::Identity,
    renewal::RenewalOutcome,
    types::{Prescription, PrescriptionDraft},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RenewalResponse {
    approve: bool,
    #[serde(default)]
    note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct InteractionQuery {
    patient_id: Uuid,
    medication: String,
}

pub fn routes<B: ClinicBackend>() -> Router<AppState<B>> {
    Router::new()
        .route(
            "/prescriptions",
            get(list_prescriptions).post(issue_prescription),
        )
        .route("/prescriptions/interactions", get(check_interactions))
        .route(
            "/prescriptions/:id",
            get(get_prescription).delete(remove_prescription),
        )
        .route("/prescriptions/:id/renewal-request", post(request_renewal))
        .route(
            "/prescriptions/:id/renewal-response",
            post(respond_to_renewal),
        )
        .route("/prescriptions/:id/renew", post(renew))
}

async fn list_prescriptions<B: ClinicBackend>(
    State(state): State<AppState<B>>,
    identity: Identity,
) -> ClinicResult<Json<Vec<Prescription>>> {
    Ok(Json(state.prescriptions.prescriptions_for(&identity)?))
}

async fn issue_prescription<B: ClinicBackend>(
    State(state): State<AppState<B>>,
    identity: Identity,
    Json(draft): Json<PrescriptionDraft>,
) -> ClinicResult<(StatusCode, Json<Prescription>)> {
    let prescription = state.prescriptions.issue_prescription(&identity, draft)?;
    Ok((StatusCode::CREATED, Json(prescription)))
}

async fn get_prescription<B: ClinicBackend>(
    State(state): State<AppState<B>>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> ClinicResult<Json<Prescription>> {
    Ok(Json(state.prescriptions.prescription_for(&identity, id)?))
}

async fn remove_prescription<B: ClinicBackend>(
    State(state): State<AppState<B>>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> ClinicResult<StatusCode> {
    state.prescriptions.remove_prescription(&identity, id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn request_renewal<B: ClinicBackend>(
    State(state): State<AppState<B>>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> ClinicResult<Json<Prescription>> {
    Ok(Json(state.prescriptions.request_renewal(&identity, id)?))
}

async fn respond_to_renewal<B: ClinicBackend>(
    State(state): State<AppState<B>>,
    identity: Identity,
    Path(id): Path<Uuid>,
    Json(response): Json<RenewalResponse>,
) -> ClinicResult<Json<RenewalOutcome>> {
    Ok(Json(state.prescriptions.respond_to_renewal(
        &identity,
        id,
        response.approve,
        response.note,
    )?))
}

async fn renew<B: ClinicBackend>(
    State(state): State<AppState<B>>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> ClinicResult<(StatusCode, Json<Prescription>)> {
    let renewed = state.prescriptions.renew(&identity, id)?;
    Ok((StatusCode::CREATED, Json(renewed)))
}

async fn check_interactions<B: ClinicBackend>(
    State(state): State<AppState<B>>,
    identity: Identity,
    Query(query): Query<InteractionQuery>,
) -> ClinicResult<Json<Value>> {
    let interaction =
        state
            .prescriptions
            .check_for_interactions(&identity, query.patient_id, &query.medication)?;
    Ok(Json(json!({ "interaction": interaction })))
}
