use crate::{
    backend::ClinicBackend,
    error::{ClinicError, ClinicResult},
    types::{Doctor, Patient, Role},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The authenticated user on whose behalf an operation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: Uuid,
    pub role: Role,
}

impl Identity {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> ClinicResult<()> {
        self.require_any(&[Role::Admin])
    }

    pub fn require_any(&self, roles: &[Role]) -> ClinicResult<()> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            Err(ClinicError::Forbidden(format!(
                "Role {} is not allowed to perform this action",
                self.role
            )))
        }
    }

    /// The doctor profile linked to this user.
    pub fn doctor_profile<B: ClinicBackend>(&self, backend: &B) -> ClinicResult<Doctor> {
        backend.doctor_by_user(self.user_id).map_err(|err| match err {
            ClinicError::NotFound(_) => {
                ClinicError::Forbidden("No doctor profile for this user".into())
            }
            other => other,
        })
    }

    /// The patient profile linked to this user.
    pub fn patient_profile<B: ClinicBackend>(&self, backend: &B) -> ClinicResult<Patient> {
        backend.patient_by_user(self.user_id).map_err(|err| match err {
            ClinicError::NotFound(_) => {
                ClinicError::Forbidden("No patient profile for this user".into())
            }
            other => other,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_role_gates() {
        let admin = Identity::new(Uuid::new_v4(), Role::Admin);
        let patient = Identity::new(Uuid::new_v4(), Role::Patient);

        admin.require_admin().unwrap();
        assert!(matches!(patient.require_admin(), Err(ClinicError::Forbidden(_))));
        patient.require_any(&[Role::Doctor, Role::Patient]).unwrap();
    }
}
