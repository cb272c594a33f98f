use crate::{
    backend::ClinicBackend,
    configuration::Configuration,
    directory::Directory,
    error::ClinicError,
    event_bus::BroadcastBus,
    identity::Identity,
    notification::Notifier,
    renewal::PrescriptionManager,
    report::Reports,
    scheduling::AppointmentScheduler,
};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

mod appointments;
mod directory;
mod notifications;
mod prescriptions;
mod reports;

/// Header carrying the id of the user asserted by the upstream identity provider.
pub const USER_HEADER: &str = "x-user-id";

#[derive(Clone)]
pub struct AppState<B: ClinicBackend> {
    pub backend: B,
    pub scheduler: AppointmentScheduler<B>,
    pub prescriptions: PrescriptionManager<B>,
    pub notifier: Notifier<B>,
    pub directory: Directory<B>,
    pub reports: Reports<B>,
    pub bus: BroadcastBus,
    pub channel: String,
}

impl<B: ClinicBackend> AppState<B> {
    pub fn new<C: Configuration>(backend: B, configuration: &C) -> Self {
        let bus = BroadcastBus::default();
        let channel = configuration.notification_channel();
        let notifier = Notifier::new(backend.clone(), Arc::new(bus.clone()), channel.clone());

        Self {
            scheduler: AppointmentScheduler::new(
                backend.clone(),
                notifier.clone(),
                configuration.scheduling_policy(),
            ),
            prescriptions: PrescriptionManager::new(backend.clone(), notifier.clone()),
            directory: Directory::new(backend.clone()),
            reports: Reports::new(backend.clone()),
            notifier,
            backend,
            bus,
            channel,
        }
    }
}

pub fn create_app<B: ClinicBackend, C: Configuration>(backend: B, configuration: C) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .merge(appointments::routes())
        .merge(directory::routes())
        .merge(prescriptions::routes())
        .merge(notifications::routes())
        .merge(reports::routes())
        .with_state(AppState::new(backend, &configuration))
        .layer(cors)
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

#[async_trait]
impl<B: ClinicBackend> FromRequestParts<AppState<B>> for Identity {
    type Rejection = ClinicError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<B>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts.headers.get(USER_HEADER).ok_or_else(|| {
            ClinicError::Unauthorized(format!("Missing {USER_HEADER} header"))
        })?;
        let user_id = header
            .to_str()
            .ok()
            .and_then(|value| Uuid::parse_str(value.trim()).ok())
            .ok_or_else(|| {
                ClinicError::Unauthorized(format!("Malformed {USER_HEADER} header"))
            })?;

        let user = state.backend.user(user_id).map_err(|err| match err {
            ClinicError::NotFound(_) => ClinicError::Unauthorized("Unknown user".into()),
            other => other,
        })?;
        if !user.active {
            return Err(ClinicError::Forbidden("User is deactivated".into()));
        }
        Ok(Identity::new(user.id, user.role))
    }
}
