use crate::{
    backend::ClinicBackend,
    error::{ClinicError, ClinicResult},
    identity::Identity,
    types::{Appointment, AppointmentStatus, Doctor, Patient, Role},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

pub const CSV_HEADER: &str = "Date,Time,Patient,Doctor,Status,Reason";
const RECENT_APPOINTMENTS: usize = 10;

/// Renders one line per appointment. Fields are written as is, without quoting.
pub fn appointments_csv(
    appointments: &[Appointment],
    patients: &HashMap<Uuid, Patient>,
    doctors: &HashMap<Uuid, Doctor>,
) -> String {
    let mut csv = String::from(CSV_HEADER);
    csv.push('\n');
    for appointment in appointments {
        let patient = patients
            .get(&appointment.patient_id)
            .map(Patient::full_name)
            .unwrap_or_else(|| "Unknown".into());
        let doctor = doctors
            .get(&appointment.doctor_id)
            .map(|d| format!("Dr. {}", d.full_name()))
            .unwrap_or_else(|| "Unknown".into());
        csv.push_str(&format!(
            "{},{},{},{},{},{}\n",
            appointment.start.format("%Y-%m-%d"),
            appointment.start.format("%H:%M"),
            patient,
            doctor,
            appointment.status,
            appointment.reason.as_deref().unwrap_or_default()
        ));
    }
    csv
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardStats {
    pub total_users: usize,
    pub total_doctors: usize,
    pub total_patients: usize,
    pub total_appointments: usize,
    pub appointments_by_status: BTreeMap<String, usize>,
    pub recent_appointments: Vec<Appointment>,
}

#[derive(Clone)]
pub struct Reports<B: ClinicBackend> {
    backend: B,
}

impl<B: ClinicBackend> Reports<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    fn render(&self, appointments: &[Appointment]) -> ClinicResult<String> {
        let patients = self
            .backend
            .patients()?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();
        let doctors = self
            .backend
            .doctors()?
            .into_iter()
            .map(|d| (d.id, d))
            .collect();
        Ok(appointments_csv(appointments, &patients, &doctors))
    }

    fn in_range(
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> ClinicResult<impl Fn(&Appointment) -> bool> {
        if to < from {
            return Err(ClinicError::Validation(
                "Report range ends before it starts".into(),
            ));
        }
        Ok(move |a: &Appointment| from <= a.start && a.start <= to)
    }

    /// Every appointment starting in `[from, to]`.
    pub fn appointments_report(
        &self,
        identity: &Identity,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> ClinicResult<String> {
        identity.require_admin()?;
        let in_range = Self::in_range(from, to)?;
        let appointments: Vec<Appointment> = self
            .backend
            .appointments()?
            .into_iter()
            .filter(|a| in_range(a))
            .collect();
        self.render(&appointments)
    }

    /// The calling doctor's own appointments starting in `[from, to]`.
    pub fn doctor_schedule_report(
        &self,
        identity: &Identity,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> ClinicResult<String> {
        identity.require_any(&[Role::Doctor])?;
        let in_range = Self::in_range(from, to)?;
        let doctor = identity.doctor_profile(&self.backend)?;
        let appointments: Vec<Appointment> = self
            .backend
            .doctor_appointments(doctor.id)?
            .into_iter()
            .filter(|a| in_range(a))
            .collect();
        self.render(&appointments)
    }

    pub fn dashboard(&self, identity: &Identity) -> ClinicResult<DashboardStats> {
        identity.require_admin()?;
        let appointments = self.backend.appointments()?;

        let mut appointments_by_status = BTreeMap::new();
        for status in [
            AppointmentStatus::Pending,
            AppointmentStatus::Approved,
            AppointmentStatus::Rejected,
            AppointmentStatus::Rescheduled,
            AppointmentStatus::Completed,
            AppointmentStatus::Cancelled,
        ] {
            let count = appointments.iter().filter(|a| a.status == status).count();
            appointments_by_status.insert(status.to_string(), count);
        }

        let mut recent_appointments = appointments.clone();
        recent_appointments.sort_unstable_by(|a, b| b.created_at.cmp(&a.created_at));
        recent_appointments.truncate(RECENT_APPOINTMENTS);

        Ok(DashboardStats {
            total_users: self.backend.users()?.len(),
            total_doctors: self.backend.doctors()?.len(),
            total_patients: self.backend.patients()?.len(),
            total_appointments: appointments.len(),
            appointments_by_status,
            recent_appointments,
        })
    }
}
