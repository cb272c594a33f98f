use crate::error::{ClinicError, ClinicResult};
use crate::types::{
    Appointment, AppointmentStatus, Doctor, Notification, Patient, Prescription, Schedule, User,
};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Why `[start, end)` can't be booked, given the doctor's windows and existing bookings.
pub fn slot_conflict(
    schedules: &[Schedule],
    booked: &[Appointment],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    exclude: Option<Uuid>,
) -> Option<&'static str> {
    if end <= start {
        return Some("Appointment must end after it starts");
    }
    let Some(window) = schedules.iter().find(|s| s.covers(start, end)) else {
        return Some("Doctor is not available at this time");
    };

    let active = booked
        .iter()
        .filter(|a| a.blocks_slot() && Some(a.id) != exclude);
    if active.clone().any(|a| a.overlaps(start, end)) {
        return Some("Time slot already booked");
    }

    let in_window = active
        .filter(|a| {
            a.start.date_naive() == start.date_naive() && window.covers(a.start, a.end)
        })
        .count();
    if in_window >= window.max_appointments.max(0) as usize {
        return Some("Doctor is fully booked for this window");
    }
    None
}

/// Compares the stored status of an appointment with the one the caller last read.
pub fn expect_status(
    stored: Option<AppointmentStatus>,
    previous: AppointmentStatus,
) -> ClinicResult<()> {
    match stored {
        Some(status) if status == previous => Ok(()),
        Some(_) => Err(ClinicError::InvalidState(
            "Appointment was changed concurrently".into(),
        )),
        None => Err(ClinicError::NotFound("Appointment".into())),
    }
}

/// Persistence seam of the clinic. Lookups by id return `ClinicError::NotFound` when absent.
pub trait ClinicBackend: Clone + Send + Sync + 'static {
    fn users(&self) -> ClinicResult<Vec<User>>;
    fn user(&self, id: Uuid) -> ClinicResult<User>;
    fn add_user(&self, user: User) -> ClinicResult<()>;
    fn update_user(&self, user: &User) -> ClinicResult<()>;

    fn patients(&self) -> ClinicResult<Vec<Patient>>;
    fn patient(&self, id: Uuid) -> ClinicResult<Patient>;
    fn patient_by_user(&self, user_id: Uuid) -> ClinicResult<Patient>;
    fn add_patient(&self, patient: Patient) -> ClinicResult<()>;
    fn update_patient(&self, patient: &Patient) -> ClinicResult<()>;

    fn doctors(&self) -> ClinicResult<Vec<Doctor>>;
    fn doctor(&self, id: Uuid) -> ClinicResult<Doctor>;
    fn doctor_by_user(&self, user_id: Uuid) -> ClinicResult<Doctor>;
    fn add_doctor(&self, doctor: Doctor) -> ClinicResult<()>;

    /// Windows of one doctor, ordered by weekday and start time.
    fn schedules(&self, doctor_id: Uuid) -> ClinicResult<Vec<Schedule>>;
    fn schedule(&self, id: Uuid) -> ClinicResult<Schedule>;
    fn add_schedule(&self, schedule: Schedule) -> ClinicResult<()>;
    fn update_schedule(&self, schedule: &Schedule) -> ClinicResult<()>;
    fn remove_schedule(&self, id: Uuid) -> ClinicResult<()>;

    /// Non-deleted appointments ordered by start.
    fn appointments(&self) -> ClinicResult<Vec<Appointment>>;
    fn appointment(&self, id: Uuid) -> ClinicResult<Appointment>;
    fn doctor_appointments(&self, doctor_id: Uuid) -> ClinicResult<Vec<Appointment>>;
    fn patient_appointments(&self, patient_id: Uuid) -> ClinicResult<Vec<Appointment>>;
    /// Stores `appointment` if `slot_conflict` finds nothing against its doctor's windows and
    /// bookings. Without `previous` the appointment is inserted; with it the stored row is
    /// replaced and must still be in that status. Check and write happen atomically.
    fn reserve_appointment(
        &self,
        appointment: &Appointment,
        previous: Option<AppointmentStatus>,
    ) -> ClinicResult<()>;
    /// Writes status, notes and flags without re-checking the time range, if the stored row
    /// is still in status `previous`.
    fn update_appointment(
        &self,
        appointment: &Appointment,
        previous: AppointmentStatus,
    ) -> ClinicResult<()>;

    fn prescriptions(&self) -> ClinicResult<Vec<Prescription>>;
    fn prescription(&self, id: Uuid) -> ClinicResult<Prescription>;
    fn patient_prescriptions(&self, patient_id: Uuid) -> ClinicResult<Vec<Prescription>>;
    fn doctor_prescriptions(&self, doctor_id: Uuid) -> ClinicResult<Vec<Prescription>>;
    fn add_prescription(&self, prescription: Prescription) -> ClinicResult<()>;
    fn update_prescription(&self, prescription: &Prescription) -> ClinicResult<()>;
    fn remove_prescription(&self, id: Uuid) -> ClinicResult<()>;

    fn notifications(&self) -> ClinicResult<Vec<Notification>>;
    fn notification(&self, id: Uuid) -> ClinicResult<Notification>;
    /// Unread notifications of a user, newest first.
    fn unread_notifications(&self, user_id: Uuid) -> ClinicResult<Vec<Notification>>;
    fn add_notification(&self, notification: Notification) -> ClinicResult<()>;
    fn mark_notification_read(&self, id: Uuid) -> ClinicResult<()>;
}
