use super::AppState;
use crate::{
    backend::ClinicBackend, error::ClinicResult, identity::Identity, report::DashboardStats,
};
use axum::{
    extract::{Query, State},
    http::header,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const CSV_CONTENT_TYPE: &str = "text/csv; charset=utf-8";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RangeQuery {
    from: DateTime<Utc>,
    to: DateTime<Utc>,
}

pub fn routes<B: ClinicBackend>() -> Router<AppState<B>> {
    Router::new()
        .route("/reports/appointments.csv", get(appointments_report))
        .route("/reports/schedule.csv", get(schedule_report))
        .route("/admin/dashboard", get(dashboard))
}

async fn appointments_report<B: ClinicBackend>(
    State(state): State<AppState<B>>,
    identity: Identity,
    Query(range): Query<RangeQuery>,
) -> ClinicResult<impl IntoResponse> {
    let csv = state
        .reports
        .appointments_report(&identity, range.from, range.to)?;
    Ok(([(header::CONTENT_TYPE, CSV_CONTENT_TYPE)], csv))
}

async fn schedule_report<B: ClinicBackend>(
    State(state): State<AppState<B>>,
    identity: Identity,
    Query(range): Query<RangeQuery>,
) -> ClinicResult<impl IntoResponse> {
    let csv = state
        .reports
        .doctor_schedule_report(&identity, range.from, range.to)?;
    Ok(([(header::CONTENT_TYPE, CSV_CONTENT_TYPE)], csv))
}

async fn dashboard<B: ClinicBackend>(
    State(state): State<AppState<B>>,
    identity: Identity,
) -> ClinicResult<Json<DashboardStats>> {
    Ok(Json(state.reports.dashboard(&identity)?))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        backend::ClinicBackend,
        http::USER_HEADER,
        report::CSV_HEADER,
        testutils::{appointment_at, next_weekday_at, spawn_app},
    };
    use axum::http::StatusCode;
    use chrono::{Duration, Weekday};
    use reqwest::Client;
    use serde_json::Value;

    #[tokio::test]
    async fn test_appointments_csv() {
        let app = spawn_app().await;
        let monday = next_weekday_at(Weekday::Mon, 9, 0);
        let appointment = appointment_at(app.seed.doctor.id, app.seed.patient.id, monday);
        app.store.reserve_appointment(&appointment, None).unwrap();

        let response = Client::new()
            .get(format!("{}/reports/appointments.csv", app.address))
            .query(&[
                ("from", (monday - Duration::days(1)).to_rfc3339()),
                ("to", (monday + Duration::days(1)).to_rfc3339()),
            ])
            .header(USER_HEADER, app.seed.admin.id.to_string())
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK.as_u16());
        assert_eq!(
            response.headers()[header::CONTENT_TYPE.as_str()],
            CSV_CONTENT_TYPE
        );

        let body = response.text().await.unwrap();
        let mut lines = body.lines();
        assert_eq!(lines.next(), Some(CSV_HEADER));
        let row = lines.next().unwrap();
        assert!(row.contains("Jane Doe,Dr. Gregory House,Pending"));
        assert_eq!(lines.next(), None);
    }

    #[tokio::test]
    async fn test_schedule_report_requires_doctor() {
        let app = spawn_app().await;
        let now = Utc::now();

        let response = Client::new()
            .get(format!("{}/reports/schedule.csv", app.address))
            .query(&[
                ("from", now.to_rfc3339()),
                ("to", (now + Duration::days(7)).to_rfc3339()),
            ])
            .header(USER_HEADER, app.seed.admin.id.to_string())
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN.as_u16());

        let response = Client::new()
            .get(format!("{}/reports/schedule.csv", app.address))
            .query(&[
                ("from", now.to_rfc3339()),
                ("to", (now + Duration::days(7)).to_rfc3339()),
            ])
            .header(USER_HEADER, app.seed.doctor.user_id.to_string())
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK.as_u16());
        assert_eq!(response.text().await.unwrap().trim_end(), CSV_HEADER);
    }

    #[tokio::test]
    async fn test_dashboard() {
        let app = spawn_app().await;
        let client = Client::new();

        let response = client
            .get(format!("{}/admin/dashboard", app.address))
            .header(USER_HEADER, app.seed.patient.user_id.to_string())
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN.as_u16());

        let stats: Value = client
            .get(format!("{}/admin/dashboard", app.address))
            .header(USER_HEADER, app.seed.admin.id.to_string())
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(stats["total_users"], 3);
        assert_eq!(stats["total_doctors"], 1);
        assert_eq!(stats["total_patients"], 1);
        assert_eq!(stats["appointments_by_status"]["Pending"], 0);
    }
}
