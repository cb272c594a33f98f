use super::AppState;
use crate::{
    backend::ClinicBackend,
    error::ClinicResult,
    identity::Identity,
    types::{
        Doctor, DoctorDraft, Patient, PatientDraft, Role, Schedule, ScheduleDraft, User,
        UserDraft,
    },
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, put},
    Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct DoctorFilter {
    specialization: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SlotQuery {
    date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SlotCheck {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct SlotAvailability {
    available: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RoleRequest {
    role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StatusRequest {
    active: bool,
}

pub fn routes<B: ClinicBackend>() -> Router<AppState<B>> {
    Router::new()
        .route("/doctors", get(list_doctors).post(create_doctor))
        .route("/doctors/:id", get(get_doctor))
        .route("/doctors/:id/slots", get(available_slots))
        .route("/doctors/:id/slots/check", get(check_slot))
        .route(
            "/doctors/:id/schedules",
            get(list_schedules).post(add_schedule),
        )
        .route(
            "/schedules/:id",
            put(update_schedule).delete(remove_schedule),
        )
        .route("/patients", get(list_patients).post(create_patient))
        .route("/patients/:id", get(get_patient).put(update_patient))
        .route("/users", get(list_users).post(create_user))
        .route("/users/:id", get(get_user))
        .route("/users/:id/role", put(set_role))
        .route("/users/:id/status", patch(set_status))
}

async fn list_doctors<B: ClinicBackend>(
    State(state): State<AppState<B>>,
    _identity: Identity,
    Query(filter): Query<DoctorFilter>,
) -> ClinicResult<Json<Vec<Doctor>>> {
    Ok(Json(state.directory.doctors(filter.specialization.as_deref())?))
}

async fn create_doctor<B: ClinicBackend>(
    State(state): State<AppState<B>>,
    identity: Identity,
    Json(draft): Json<DoctorDraft>,
) -> ClinicResult<(StatusCode, Json<Doctor>)> {
    let doctor = state.directory.create_doctor(&identity, draft)?;
    Ok((StatusCode::CREATED, Json(doctor)))
}

async fn get_doctor<B: ClinicBackend>(
    State(state): State<AppState<B>>,
    _identity: Identity,
    Path(id): Path<Uuid>,
) -> ClinicResult<Json<Doctor>> {
    Ok(Json(state.directory.doctor(id)?))
}

async fn available_slots<B: ClinicBackend>(
    State(state): State<AppState<B>>,
    _identity: Identity,
    Path(id): Path<Uuid>,
    Query(query): Query<SlotQuery>,
) -> ClinicResult<Json<Vec<DateTime<Utc>>>> {
    Ok(Json(state.scheduler.available_slots(id, query.date)?))
}

async fn check_slot<B: ClinicBackend>(
    State(state): State<AppState<B>>,
    _identity: Identity,
    Path(id): Path<Uuid>,
    Query(query): Query<SlotCheck>,
) -> ClinicResult<Json<SlotAvailability>> {
    let available = state
        .scheduler
        .is_slot_available(id, query.start, query.end, None)?;
    Ok(Json(SlotAvailability { available }))
}

async fn list_schedules<B: ClinicBackend>(
    State(state): State<AppState<B>>,
    _identity: Identity,
    Path(id): Path<Uuid>,
) -> ClinicResult<Json<Vec<Schedule>>> {
    Ok(Json(state.directory.schedules(id)?))
}

async fn add_schedule<B: ClinicBackend>(
    State(state): State<AppState<B>>,
    identity: Identity,
    Path(id): Path<Uuid>,
    Json(draft): Json<ScheduleDraft>,
) -> ClinicResult<(StatusCode, Json<Schedule>)> {
    let schedule = state.directory.add_schedule(&identity, id, draft)?;
    Ok((StatusCode::CREATED, Json(schedule)))
}

async fn update_schedule<B: ClinicBackend>(
    State(state): State<AppState<B>>,
    identity: Identity,
    Path(id): Path<Uuid>,
    Json(draft): Json<ScheduleDraft>,
) -> ClinicResult<Json<Schedule>> {
    Ok(Json(state.directory.update_schedule(&identity, id, draft)?))
}

async fn remove_schedule<B: ClinicBackend>(
    State(state): State<AppState<B>>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> ClinicResult<StatusCode> {
    state.directory.remove_schedule(&identity, id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_patients<B: ClinicBackend>(
    State(state): State<AppState<B>>,
    identity: Identity,
) -> ClinicResult<Json<Vec<Patient>>> {
    Ok(Json(state.directory.patients(&identity)?))
}

async fn create_patient<B: ClinicBackend>(
    State(state): State<AppState<B>>,
    identity: Identity,
    Json(draft): Json<PatientDraft>,
) -> ClinicResult<(StatusCode, Json<Patient>)> {
    let patient = state.directory.create_patient(&identity, draft)?;
    Ok((StatusCode::CREATED, Json(patient)))
}

async fn get_patient<B: ClinicBackend>(
    State(state): State<AppState<B>>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> ClinicResult<Json<Patient>> {
    Ok(Json(state.directory.patient(&identity, id)?))
}

async fn update_patient<B: ClinicBackend>(
    State(state): State<AppState<B>>,
    identity: Identity,
    Path(id): Path<Uuid>,
    Json(draft): Json<PatientDraft>,
) -> ClinicResult<Json<Patient>> {
    Ok(Json(state.directory.update_patient(&identity, id, draft)?))
}

async fn list_users<B: ClinicBackend>(
    State(state): State<AppState<B>>,
    identity: Identity,
) -> ClinicResult<Json<Vec<User>>> {
    Ok(Json(state.directory.users(&identity)?))
}

async fn create_user<B: ClinicBackend>(
    State(state): State<AppState<B>>,
    identity: Identity,
    Json(draft): Json<UserDraft>,
) -> ClinicResult<(StatusCode, Json<User>)> {
    let user = state.directory.create_user(&identity, draft)?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn get_user<B: ClinicBackend>(
    State(state): State<AppState<B>>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> ClinicResult<Json<User>> {
    Ok(Json(state.directory.user(&identity, id)?))
}

async fn set_role<B: ClinicBackend>(
    State(state): State<AppState<B>>,
    identity: Identity,
    Path(id): Path<Uuid>,
    Json(request): Json<RoleRequest>,
) -> ClinicResult<Json<User>> {
    Ok(Json(state.directory.set_role(&identity, id, request.role)?))
}

async fn set_status<B: ClinicBackend>(
    State(state): State<AppState<B>>,
    identity: Identity,
    Path(id): Path<Uuid>,
    Json(request): Json<StatusRequest>,
) -> ClinicResult<Json<User>> {
    let user = state.directory.set_active(&identity, id, request.active)?;
    Ok(Json(user))
}
