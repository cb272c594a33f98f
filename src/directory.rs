use crate::{
    backend::ClinicBackend,
    error::{ClinicError, ClinicResult},
    identity::Identity,
    types::{
        Doctor, DoctorDraft, Patient, PatientDraft, Role, Schedule, ScheduleDraft, User,
        UserDraft,
    },
};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

fn validate_window(draft: &ScheduleDraft) -> ClinicResult<()> {
    draft.validate()?;
    if draft.start_time >= draft.end_time {
        return Err(ClinicError::Validation(
            "Schedule must end after it starts".into(),
        ));
    }
    Ok(())
}

/// Users, doctor and patient profiles, and doctors' weekly schedules.
#[derive(Clone)]
pub struct Directory<B: ClinicBackend> {
    backend: B,
}

impl<B: ClinicBackend> Directory<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn users(&self, identity: &Identity) -> ClinicResult<Vec<User>> {
        identity.require_admin()?;
        self.backend.users()
    }

    pub fn user(&self, identity: &Identity, id: Uuid) -> ClinicResult<User> {
        if identity.user_id != id {
            identity.require_admin()?;
        }
        self.backend.user(id)
    }

    pub fn create_user(&self, identity: &Identity, draft: UserDraft) -> ClinicResult<User> {
        identity.require_admin()?;
        draft.validate()?;
        let user = draft.into_user(Utc::now());
        self.backend.add_user(user.clone())?;
        info!(user_id = %user.id, role = %user.role, "Created user");
        Ok(user)
    }

    pub fn set_role(&self, identity: &Identity, id: Uuid, role: Role) -> ClinicResult<User> {
        identity.require_admin()?;
        let mut user = self.backend.user(id)?;
        user.role = role;
        self.backend.update_user(&user)?;
        info!(user_id = %id, %role, "Changed user role");
        Ok(user)
    }

    pub fn set_active(&self, identity: &Identity, id: Uuid, active: bool) -> ClinicResult<User> {
        identity.require_admin()?;
        if identity.user_id == id && !active {
            return Err(ClinicError::Validation(
                "Admins can't deactivate themselves".into(),
            ));
        }
        let mut user = self.backend.user(id)?;
        user.active = active;
        self.backend.update_user(&user)?;
        info!(user_id = %id, active, "Changed user status");
        Ok(user)
    }

    /// All doctors, optionally only those whose specialization contains `specialization`.
    pub fn doctors(&self, specialization: Option<&str>) -> ClinicResult<Vec<Doctor>> {
        let doctors = self.backend.doctors()?;
        Ok(match specialization.map(str::to_lowercase) {
            Some(wanted) => doctors
                .into_iter()
                .filter(|d| d.specialization.to_lowercase().contains(&wanted))
                .collect(),
            None => doctors,
        })
    }

    pub fn doctor(&self, id: Uuid) -> ClinicResult<Doctor> {
        self.backend.doctor(id)
    }

    pub fn create_doctor(&self, identity: &Identity, draft: DoctorDraft) -> ClinicResult<Doctor> {
        identity.require_admin()?;
        draft.validate()?;
        self.require_role(draft.user_id, Role::Doctor)?;
        let doctor = draft.into_doctor();
        self.backend.add_doctor(doctor.clone())?;
        info!(doctor_id = %doctor.id, "Created doctor profile");
        Ok(doctor)
    }

    fn require_role(&self, user_id: Uuid, role: Role) -> ClinicResult<()> {
        let user = self.backend.user(user_id).map_err(|err| match err {
            ClinicError::NotFound(_) => ClinicError::Validation("User does not exist".into()),
            other => other,
        })?;
        if user.role != role {
            return Err(ClinicError::Validation(format!(
                "User has role {} instead of {role}",
                user.role
            )));
        }
        Ok(())
    }

    pub fn patients(&self, identity: &Identity) -> ClinicResult<Vec<Patient>> {
        identity.require_any(&[Role::Admin, Role::Doctor])?;
        self.backend.patients()
    }

    pub fn patient(&self, identity: &Identity, id: Uuid) -> ClinicResult<Patient> {
        let patient = self.backend.patient(id)?;
        if identity.role == Role::Patient && patient.user_id != identity.user_id {
            return Err(ClinicError::Forbidden(
                "Patients can only view their own record".into(),
            ));
        }
        Ok(patient)
    }

    pub fn create_patient(
        &self,
        identity: &Identity,
        draft: PatientDraft,
    ) -> ClinicResult<Patient> {
        identity.require_admin()?;
        draft.validate()?;
        self.require_role(draft.user_id, Role::Patient)?;
        let patient = draft.into_patient(Uuid::new_v4());
        self.backend.add_patient(patient.clone())?;
        info!(patient_id = %patient.id, "Created patient profile");
        Ok(patient)
    }

    /// Replaces a patient's details. The linked user never changes.
    pub fn update_patient(
        &self,
        identity: &Identity,
        id: Uuid,
        draft: PatientDraft,
    ) -> ClinicResult<Patient> {
        let existing = self.backend.patient(id)?;
        if !identity.is_admin() && existing.user_id != identity.user_id {
            return Err(ClinicError::Forbidden(
                "Patients can only edit their own record".into(),
            ));
        }
        draft.validate()?;
        let patient = Patient {
            user_id: existing.user_id,
            ..draft.into_patient(id)
        };
        self.backend.update_patient(&patient)?;
        Ok(patient)
    }

    pub fn schedules(&self, doctor_id: Uuid) -> ClinicResult<Vec<Schedule>> {
        self.backend.doctor(doctor_id)?;
        self.backend.schedules(doctor_id)
    }

    fn authorize_schedule_owner(&self, identity: &Identity, doctor_id: Uuid) -> ClinicResult<()> {
        match identity.role {
            Role::Admin => Ok(()),
            Role::Doctor if identity.doctor_profile(&self.backend)?.id == doctor_id => Ok(()),
            _ => Err(ClinicError::Forbidden(
                "Only the doctor or an admin can manage this schedule".into(),
            )),
        }
    }

    pub fn add_schedule(
        &self,
        identity: &Identity,
        doctor_id: Uuid,
        draft: ScheduleDraft,
    ) -> ClinicResult<Schedule> {
        self.authorize_schedule_owner(identity, doctor_id)?;
        validate_window(&draft)?;
        self.backend.doctor(doctor_id)?;
        let schedule = Schedule {
            id: Uuid::new_v4(),
            doctor_id,
            day_of_week: draft.day_of_week,
            start_time: draft.start_time,
            end_time: draft.end_time,
            max_appointments: draft.max_appointments,
        };
        self.backend.add_schedule(schedule.clone())?;
        info!(
            schedule_id = %schedule.id,
            %doctor_id,
            day = %schedule.day_of_week,
            "Added schedule"
        );
        Ok(schedule)
    }

    pub fn update_schedule(
        &self,
        identity: &Identity,
        id: Uuid,
        draft: ScheduleDraft,
    ) -> ClinicResult<Schedule> {
        let existing = self.backend.schedule(id)?;
        self.authorize_schedule_owner(identity, existing.doctor_id)?;
        validate_window(&draft)?;
        let schedule = Schedule {
            day_of_week: draft.day_of_week,
            start_time: draft.start_time,
            end_time: draft.end_time,
            max_appointments: draft.max_appointments,
            ..existing
        };
        self.backend.update_schedule(&schedule)?;
        Ok(schedule)
    }

    pub fn remove_schedule(&self, identity: &Identity, id: Uuid) -> ClinicResult<()> {
        let existing = self.backend.schedule(id)?;
        self.authorize_schedule_owner(identity, existing.doctor_id)?;
        self.backend.remove_schedule(id)
    }
}
