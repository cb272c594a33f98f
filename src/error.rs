use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;
use validator::ValidationErrors;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClinicError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    PolicyViolation(String),
    #[error("{0}")]
    InvalidState(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("Storage error: {0}")]
    Storage(String),
}

pub type ClinicResult<T> = Result<T, ClinicError>;

impl ClinicError {
    pub fn kind(&self) -> &'static str {
        match self {
            ClinicError::NotFound(_) => "not_found",
            ClinicError::Validation(_) => "validation_error",
            ClinicError::PolicyViolation(_) => "policy_violation",
            ClinicError::InvalidState(_) => "invalid_state",
            ClinicError::Forbidden(_) => "forbidden",
            ClinicError::Unauthorized(_) => "unauthorized",
            ClinicError::Storage(_) => "storage_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ClinicError::NotFound(_) => StatusCode::NOT_FOUND,
            ClinicError::Validation(_) => StatusCode::BAD_REQUEST,
            ClinicError::PolicyViolation(_) | ClinicError::InvalidState(_) => StatusCode::CONFLICT,
            ClinicError::Forbidden(_) => StatusCode::FORBIDDEN,
            ClinicError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ClinicError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ValidationErrors> for ClinicError {
    fn from(errors: ValidationErrors) -> Self {
        ClinicError::Validation(errors.to_string())
    }
}

impl From<diesel::result::Error> for ClinicError {
    fn from(err: diesel::result::Error) -> Self {
        use diesel::result::{DatabaseErrorKind, Error};

        match err {
            Error::NotFound => ClinicError::NotFound("Record".into()),
            Error::DatabaseError(DatabaseErrorKind::SerializationFailure, _) => {
                ClinicError::Validation("Time slot was booked concurrently".into())
            }
            Error::DatabaseError(_, info)
                if info.constraint_name() == Some("appointments_no_overlap") =>
            {
                ClinicError::Validation("Time slot already booked".into())
            }
            Error::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                ClinicError::Validation(info.message().to_string())
            }
            Error::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info) => {
                ClinicError::Validation(info.message().to_string())
            }
            other => ClinicError::Storage(other.to_string()),
        }
    }
}

impl IntoResponse for ClinicError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(err = %self, "Request failed");
        }

        let body = Json(json!({
            "success": false,
            "kind": self.kind(),
            "message": self.to_string(),
        }));

        (status, body).into_response()
    }
}
