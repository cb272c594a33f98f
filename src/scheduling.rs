use crate::{
    backend::{slot_conflict, ClinicBackend},
    error::{ClinicError, ClinicResult},
    identity::Identity,
    notification::Notifier,
    types::{Appointment, AppointmentStatus, DayOfWeek, NotificationKind, Role},
};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulingPolicy {
    pub appointment_length: Duration,
    /// Minimum notice for a cancellation.
    pub cancellation_window: Duration,
    /// How far ahead reminders are sent.
    pub reminder_lead: Duration,
}

impl Default for SchedulingPolicy {
    fn default() -> Self {
        Self {
            appointment_length: Duration::minutes(30),
            cancellation_window: Duration::hours(48),
            reminder_lead: Duration::hours(24),
        }
    }
}

#[derive(Clone)]
pub struct AppointmentScheduler<B: ClinicBackend> {
    backend: B,
    notifier: Notifier<B>,
    policy: SchedulingPolicy,
}

impl<B: ClinicBackend> AppointmentScheduler<B> {
    pub fn new(backend: B, notifier: Notifier<B>, policy: SchedulingPolicy) -> Self {
        Self {
            backend,
            notifier,
            policy,
        }
    }

    pub fn is_slot_available(
        &self,
        doctor_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude: Option<Uuid>,
    ) -> ClinicResult<bool> {
        self.backend.doctor(doctor_id)?;
        let schedules = self.backend.schedules(doctor_id)?;
        let booked = self.backend.doctor_appointments(doctor_id)?;
        Ok(slot_conflict(&schedules, &booked, start, end, exclude).is_none())
    }

    /// Bookable slot starts of a doctor on `date`, stepping by the appointment length.
    pub fn available_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> ClinicResult<Vec<DateTime<Utc>>> {
        self.backend.doctor(doctor_id)?;
        let schedules = self.backend.schedules(doctor_id)?;
        let booked = self.backend.doctor_appointments(doctor_id)?;
        let now = Utc::now();
        let length = self.policy.appointment_length;

        let mut slots = Vec::new();
        let day = DayOfWeek::from(date.weekday());
        for window in schedules.iter().filter(|s| s.day_of_week == day) {
            let close = date.and_time(window.end_time).and_utc();
            let mut start = date.and_time(window.start_time).and_utc();
            while start + length <= close {
                let end = start + length;
                if start > now && slot_conflict(&schedules, &booked, start, end, None).is_none() {
                    slots.push(start);
                }
                start = end;
            }
        }
        slots.sort_unstable();
        Ok(slots)
    }

    pub fn book_appointment(
        &self,
        identity: &Identity,
        doctor_id: Uuid,
        patient_id: Uuid,
        start: DateTime<Utc>,
        reason: Option<String>,
    ) -> ClinicResult<Appointment> {
        identity.require_any(&[Role::Admin, Role::Patient])?;

        let patient = self.backend.patient(patient_id).map_err(|err| match err {
            ClinicError::NotFound(_) => ClinicError::Validation("Patient does not exist".into()),
            other => other,
        })?;
        if identity.role == Role::Patient && patient.user_id != identity.user_id {
            return Err(ClinicError::Forbidden(
                "Patients can only book appointments for themselves".into(),
            ));
        }
        self.backend.doctor(doctor_id).map_err(|err| match err {
            ClinicError::NotFound(_) => ClinicError::Validation("Doctor does not exist".into()),
            other => other,
        })?;

        let now = Utc::now();
        if start <= now {
            return Err(ClinicError::Validation(
                "Appointments can't be booked in the past".into(),
            ));
        }
        let appointment = Appointment {
            id: Uuid::new_v4(),
            doctor_id,
            patient_id,
            start,
            end: start + self.policy.appointment_length,
            status: AppointmentStatus::Pending,
            reason,
            cancellation_reason: None,
            notes: None,
            deleted: false,
            created_at: now,
        };
        self.backend.reserve_appointment(&appointment, None)?;
        info!(
            appointment_id = %appointment.id,
            %doctor_id,
            %patient_id,
            %start,
            "Booked appointment"
        );

        self.notifier
            .appointment_event(&appointment, NotificationKind::AppointmentConfirmation);
        Ok(appointment)
    }

    /// Admins, the appointment's doctor and its patient.
    fn authorize_participant(
        &self,
        identity: &Identity,
        appointment: &Appointment,
    ) -> ClinicResult<()> {
        let allowed = match identity.role {
            Role::Admin => true,
            Role::Doctor => {
                identity.doctor_profile(&self.backend)?.id == appointment.doctor_id
            }
            Role::Patient => {
                identity.patient_profile(&self.backend)?.id == appointment.patient_id
            }
        };
        if allowed {
            Ok(())
        } else {
            Err(ClinicError::Forbidden(
                "Not a participant of this appointment".into(),
            ))
        }
    }

    fn authorize_doctor(&self, identity: &Identity, appointment: &Appointment) -> ClinicResult<()> {
        identity.require_any(&[Role::Admin, Role::Doctor])?;
        self.authorize_participant(identity, appointment)
    }

    pub fn appointment_for(&self, identity: &Identity, id: Uuid) -> ClinicResult<Appointment> {
        let appointment = self.backend.appointment(id)?;
        self.authorize_participant(identity, &appointment)?;
        Ok(appointment)
    }

    pub fn appointments_for(&self, identity: &Identity) -> ClinicResult<Vec<Appointment>> {
        match identity.role {
            Role::Admin => self.backend.appointments(),
            Role::Doctor => self
                .backend
                .doctor_appointments(identity.doctor_profile(&self.backend)?.id),
            Role::Patient => self
                .backend
                .patient_appointments(identity.patient_profile(&self.backend)?.id),
        }
    }

    fn transition(appointment: &mut Appointment, next: AppointmentStatus) -> ClinicResult<()> {
        if appointment.status.is_terminal() {
            return Err(ClinicError::InvalidState(format!(
                "Appointment is already {}",
                appointment.status
            )));
        }
        if !appointment.status.can_transition_to(next) {
            return Err(ClinicError::InvalidState(format!(
                "Appointment is {} and can't become {next}",
                appointment.status
            )));
        }
        appointment.status = next;
        Ok(())
    }

    pub fn cancel_appointment(
        &self,
        identity: &Identity,
        id: Uuid,
        reason: String,
    ) -> ClinicResult<Appointment> {
        let mut appointment = self.backend.appointment(id)?;
        self.authorize_participant(identity, &appointment)?;
        let previous = appointment.status;

        if appointment.start < Utc::now() + self.policy.cancellation_window {
            return Err(ClinicError::PolicyViolation(format!(
                "Appointments can only be cancelled at least {} hours in advance",
                self.policy.cancellation_window.num_hours()
            )));
        }
        Self::transition(&mut appointment, AppointmentStatus::Cancelled)?;
        appointment.cancellation_reason = Some(reason);
        self.backend.update_appointment(&appointment, previous)?;
        info!(appointment_id = %id, "Cancelled appointment");

        self.notifier
            .appointment_event(&appointment, NotificationKind::Cancellation);
        Ok(appointment)
    }

    /// Moves an appointment to `new_start`, keeping its length.
    pub fn reschedule_appointment(
        &self,
        identity: &Identity,
        id: Uuid,
        new_start: DateTime<Utc>,
    ) -> ClinicResult<Appointment> {
        let mut appointment = self.backend.appointment(id)?;
        self.authorize_participant(identity, &appointment)?;
        let previous = appointment.status;
        Self::transition(&mut appointment, AppointmentStatus::Rescheduled)?;

        if new_start <= Utc::now() {
            return Err(ClinicError::Validation(
                "Appointments can't be moved into the past".into(),
            ));
        }
        appointment.end = new_start + (appointment.end - appointment.start);
        appointment.start = new_start;
        self.backend
            .reserve_appointment(&appointment, Some(previous))?;
        info!(appointment_id = %id, %new_start, "Rescheduled appointment");

        self.notifier
            .appointment_event(&appointment, NotificationKind::Reschedule);
        Ok(appointment)
    }

    pub fn approve_appointment(&self, identity: &Identity, id: Uuid) -> ClinicResult<Appointment> {
        let mut appointment = self.backend.appointment(id)?;
        self.authorize_doctor(identity, &appointment)?;
        let previous = appointment.status;
        Self::transition(&mut appointment, AppointmentStatus::Approved)?;
        self.backend.update_appointment(&appointment, previous)?;

        self.notifier
            .appointment_event(&appointment, NotificationKind::Approval);
        Ok(appointment)
    }

    pub fn reject_appointment(
        &self,
        identity: &Identity,
        id: Uuid,
        reason: String,
    ) -> ClinicResult<Appointment> {
        let mut appointment = self.backend.appointment(id)?;
        self.authorize_doctor(identity, &appointment)?;
        let previous = appointment.status;
        Self::transition(&mut appointment, AppointmentStatus::Rejected)?;
        appointment.cancellation_reason = Some(reason);
        self.backend.update_appointment(&appointment, previous)?;

        self.notifier
            .appointment_event(&appointment, NotificationKind::Rejection);
        Ok(appointment)
    }

    pub fn complete_appointment(
        &self,
        identity: &Identity,
        id: Uuid,
        notes: Option<String>,
    ) -> ClinicResult<Appointment> {
        let mut appointment = self.backend.appointment(id)?;
        self.authorize_doctor(identity, &appointment)?;
        let previous = appointment.status;
        Self::transition(&mut appointment, AppointmentStatus::Completed)?;
        if notes.is_some() {
            appointment.notes = notes;
        }
        self.backend.update_appointment(&appointment, previous)?;

        self.notifier
            .appointment_event(&appointment, NotificationKind::Completion);
        Ok(appointment)
    }

    /// Soft delete. The record stays in storage but no longer blocks its slot.
    pub fn remove_appointment(&self, identity: &Identity, id: Uuid) -> ClinicResult<()> {
        identity.require_admin()?;
        let mut appointment = self.backend.appointment(id)?;
        appointment.deleted = true;
        self.backend
            .update_appointment(&appointment, appointment.status)?;
        info!(appointment_id = %id, "Removed appointment");
        Ok(())
    }

    /// Reminds patients of confirmed appointments starting within the reminder lead.
    pub fn send_reminders(&self, identity: &Identity, now: DateTime<Utc>) -> ClinicResult<usize> {
        identity.require_admin()?;
        let horizon = now + self.policy.reminder_lead;
        let due: Vec<Appointment> = self
            .backend
            .appointments()?
            .into_iter()
            .filter(|a| {
                matches!(
                    a.status,
                    AppointmentStatus::Approved | AppointmentStatus::Rescheduled
                ) && a.start > now
                    && a.start <= horizon
            })
            .collect();

        for appointment in &due {
            self.notifier
                .appointment_event(appointment, NotificationKind::Reminder);
        }
        info!(count = due.len(), "Sent appointment reminders");
        Ok(due.len())
    }
}
