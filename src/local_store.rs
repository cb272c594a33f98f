use crate::{
    backend::{expect_status, slot_conflict, ClinicBackend},
    error::{ClinicError, ClinicResult},
    types::{
        Appointment, AppointmentStatus, Doctor, Notification, Patient, Prescription, Schedule,
        User,
    },
};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};
use tracing::error;
use uuid::Uuid;

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    patients: HashMap<Uuid, Patient>,
    doctors: HashMap<Uuid, Doctor>,
    schedules: HashMap<Uuid, Schedule>,
    appointments: HashMap<Uuid, Appointment>,
    prescriptions: HashMap<Uuid, Prescription>,
    notifications: HashMap<Uuid, Notification>,
}

impl Tables {
    fn doctor_schedules(&self, doctor_id: Uuid) -> Vec<Schedule> {
        let mut schedules: Vec<Schedule> = self
            .schedules
            .values()
            .filter(|s| s.doctor_id == doctor_id)
            .cloned()
            .collect();
        schedules.sort_unstable_by_key(|s| (s.day_of_week as u8, s.start_time));
        schedules
    }

    fn stored_status(&self, id: Uuid) -> Option<AppointmentStatus> {
        self.appointments
            .get(&id)
            .filter(|a| !a.deleted)
            .map(|a| a.status)
    }
}

/// Impersistent backend used when no database is configured.
#[derive(Debug, Clone, Default)]
pub struct LocalStore {
    tables: Arc<Mutex<Tables>>,
}

impl LocalStore {
    fn tables(&self) -> ClinicResult<MutexGuard<'_, Tables>> {
        self.tables.lock().map_err(|err| {
            error!(%err, "Local store lock poisoned");
            ClinicError::Storage("Local store unavailable".into())
        })
    }

    /// Stores an appointment without any slot checks.
    #[cfg(test)]
    pub fn insert_appointment(&self, appointment: Appointment) {
        self.tables
            .lock()
            .unwrap()
            .appointments
            .insert(appointment.id, appointment);
    }
}

fn find<T: Clone>(map: &HashMap<Uuid, T>, id: Uuid, what: &str) -> ClinicResult<T> {
    map.get(&id)
        .cloned()
        .ok_or_else(|| ClinicError::NotFound(what.into()))
}

fn replace<T>(map: &mut HashMap<Uuid, T>, id: Uuid, value: T, what: &str) -> ClinicResult<()> {
    match map.get_mut(&id) {
        Some(entry) => {
            *entry = value;
            Ok(())
        }
        None => Err(ClinicError::NotFound(what.into())),
    }
}

fn sorted_appointments<'a>(
    appointments: impl Iterator<Item = &'a Appointment>,
) -> Vec<Appointment> {
    let mut appointments: Vec<Appointment> =
        appointments.filter(|a| !a.deleted).cloned().collect();
    appointments.sort_unstable_by(|a, b| a.start.cmp(&b.start));
    appointments
}

impl ClinicBackend for LocalStore {
    fn users(&self) -> ClinicResult<Vec<User>> {
        let mut users: Vec<User> = self.tables()?.users.values().cloned().collect();
        users.sort_unstable_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(users)
    }

    fn user(&self, id: Uuid) -> ClinicResult<User> {
        find(&self.tables()?.users, id, "User")
    }

    fn add_user(&self, user: User) -> ClinicResult<()> {
        let mut tables = self.tables()?;
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(ClinicError::Validation(format!(
                "Email {} already registered",
                user.email
            )));
        }
        tables.users.insert(user.id, user);
        Ok(())
    }

    fn update_user(&self, user: &User) -> ClinicResult<()> {
        replace(&mut self.tables()?.users, user.id, user.clone(), "User")
    }

    fn patients(&self) -> ClinicResult<Vec<Patient>> {
        let mut patients: Vec<Patient> = self.tables()?.patients.values().cloned().collect();
        patients.sort_unstable_by(|a, b| a.last_name.cmp(&b.last_name));
        Ok(patients)
    }

    fn patient(&self, id: Uuid) -> ClinicResult<Patient> {
        find(&self.tables()?.patients, id, "Patient")
    }

    fn patient_by_user(&self, user_id: Uuid) -> ClinicResult<Patient> {
        self.tables()?
            .patients
            .values()
            .find(|p| p.user_id == user_id)
            .cloned()
            .ok_or_else(|| ClinicError::NotFound("Patient".into()))
    }

    fn add_patient(&self, patient: Patient) -> ClinicResult<()> {
        let mut tables = self.tables()?;
        if !tables.users.contains_key(&patient.user_id) {
            return Err(ClinicError::Validation(
                "Patient user does not exist".into(),
            ));
        }
        if tables
            .patients
            .values()
            .any(|p| p.user_id == patient.user_id)
        {
            return Err(ClinicError::Validation(
                "User already has a patient profile".into(),
            ));
        }
        tables.patients.insert(patient.id, patient);
        Ok(())
    }

    fn update_patient(&self, patient: &Patient) -> ClinicResult<()> {
        replace(
            &mut self.tables()?.patients,
            patient.id,
            patient.clone(),
            "Patient",
        )
    }

    fn doctors(&self) -> ClinicResult<Vec<Doctor>> {
        let mut doctors: Vec<Doctor> = self.tables()?.doctors.values().cloned().collect();
        doctors.sort_unstable_by(|a, b| a.last_name.cmp(&b.last_name));
        Ok(doctors)
    }

    fn doctor(&self, id: Uuid) -> ClinicResult<Doctor> {
        find(&self.tables()?.doctors, id, "Doctor")
    }

    fn doctor_by_user(&self, user_id: Uuid) -> ClinicResult<Doctor> {
        self.tables()?
            .doctors
            .values()
            .find(|d| d.user_id == user_id)
            .cloned()
            .ok_or_else(|| ClinicError::NotFound("Doctor".into()))
    }

    fn add_doctor(&self, doctor: Doctor) -> ClinicResult<()> {
        let mut tables = self.tables()?;
        if !tables.users.contains_key(&doctor.user_id) {
            return Err(ClinicError::Validation("Doctor user does not exist".into()));
        }
        if tables.doctors.values().any(|d| d.user_id == doctor.user_id) {
            return Err(ClinicError::Validation(
                "User already has a doctor profile".into(),
            ));
        }
        tables.doctors.insert(doctor.id, doctor);
        Ok(())
    }

    fn schedules(&self, doctor_id: Uuid) -> ClinicResult<Vec<Schedule>> {
        Ok(self.tables()?.doctor_schedules(doctor_id))
    }

    fn schedule(&self, id: Uuid) -> ClinicResult<Schedule> {
        find(&self.tables()?.schedules, id, "Schedule")
    }

    fn add_schedule(&self, schedule: Schedule) -> ClinicResult<()> {
        self.tables()?.schedules.insert(schedule.id, schedule);
        Ok(())
    }

    fn update_schedule(&self, schedule: &Schedule) -> ClinicResult<()> {
        replace(
            &mut self.tables()?.schedules,
            schedule.id,
            schedule.clone(),
            "Schedule",
        )
    }

    fn remove_schedule(&self, id: Uuid) -> ClinicResult<()> {
        if self.tables()?.schedules.remove(&id).is_none() {
            return Err(ClinicError::NotFound("Schedule".into()));
        }
        Ok(())
    }

    fn appointments(&self) -> ClinicResult<Vec<Appointment>> {
        Ok(sorted_appointments(self.tables()?.appointments.values()))
    }

    fn appointment(&self, id: Uuid) -> ClinicResult<Appointment> {
        self.tables()?
            .appointments
            .get(&id)
            .filter(|a| !a.deleted)
            .cloned()
            .ok_or_else(|| ClinicError::NotFound("Appointment".into()))
    }

    fn doctor_appointments(&self, doctor_id: Uuid) -> ClinicResult<Vec<Appointment>> {
        Ok(sorted_appointments(
            self.tables()?
                .appointments
                .values()
                .filter(|a| a.doctor_id == doctor_id),
        ))
    }

    fn patient_appointments(&self, patient_id: Uuid) -> ClinicResult<Vec<Appointment>> {
        Ok(sorted_appointments(
            self.tables()?
                .appointments
                .values()
                .filter(|a| a.patient_id == patient_id),
        ))
    }

    fn reserve_appointment(
        &self,
        appointment: &Appointment,
        previous: Option<AppointmentStatus>,
    ) -> ClinicResult<()> {
        let mut tables = self.tables()?;
        if let Some(previous) = previous {
            expect_status(tables.stored_status(appointment.id), previous)?;
        }

        let schedules = tables.doctor_schedules(appointment.doctor_id);
        let booked: Vec<Appointment> = tables
            .appointments
            .values()
            .filter(|a| a.doctor_id == appointment.doctor_id)
            .cloned()
            .collect();
        if let Some(reason) = slot_conflict(
            &schedules,
            &booked,
            appointment.start,
            appointment.end,
            Some(appointment.id),
        ) {
            return Err(ClinicError::Validation(reason.into()));
        }

        tables
            .appointments
            .insert(appointment.id, appointment.clone());
        Ok(())
    }

    fn update_appointment(
        &self,
        appointment: &Appointment,
        previous: AppointmentStatus,
    ) -> ClinicResult<()> {
        let mut tables = self.tables()?;
        expect_status(tables.stored_status(appointment.id), previous)?;
        tables
            .appointments
            .insert(appointment.id, appointment.clone());
        Ok(())
    }

    fn prescriptions(&self) -> ClinicResult<Vec<Prescription>> {
        let mut prescriptions: Vec<Prescription> =
            self.tables()?.prescriptions.values().cloned().collect();
        prescriptions.sort_unstable_by(|a, b| a.prescribed_date.cmp(&b.prescribed_date));
        Ok(prescriptions)
    }

    fn prescription(&self, id: Uuid) -> ClinicResult<Prescription> {
        find(&self.tables()?.prescriptions, id, "Prescription")
    }

    fn patient_prescriptions(&self, patient_id: Uuid) -> ClinicResult<Vec<Prescription>> {
        Ok(self
            .prescriptions()?
            .into_iter()
            .filter(|p| p.patient_id == patient_id)
            .collect())
    }

    fn doctor_prescriptions(&self, doctor_id: Uuid) -> ClinicResult<Vec<Prescription>> {
        Ok(self
            .prescriptions()?
            .into_iter()
            .filter(|p| p.doctor_id == doctor_id)
            .collect())
    }

    fn add_prescription(&self, prescription: Prescription) -> ClinicResult<()> {
        self.tables()?
            .prescriptions
            .insert(prescription.id, prescription);
        Ok(())
    }

    fn update_prescription(&self, prescription: &Prescription) -> ClinicResult<()> {
        replace(
            &mut self.tables()?.prescriptions,
            prescription.id,
            prescription.clone(),
            "Prescription",
        )
    }

    fn remove_prescription(&self, id: Uuid) -> ClinicResult<()> {
        if self.tables()?.prescriptions.remove(&id).is_none() {
            return Err(ClinicError::NotFound("Prescription".into()));
        }
        Ok(())
    }

    fn notifications(&self) -> ClinicResult<Vec<Notification>> {
        let mut notifications: Vec<Notification> =
            self.tables()?.notifications.values().cloned().collect();
        notifications.sort_unstable_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(notifications)
    }

    fn notification(&self, id: Uuid) -> ClinicResult<Notification> {
        find(&self.tables()?.notifications, id, "Notification")
    }

    fn unread_notifications(&self, user_id: Uuid) -> ClinicResult<Vec<Notification>> {
        Ok(self
            .notifications()?
            .into_iter()
            .filter(|n| n.user_id == user_id && !n.is_read)
            .collect())
    }

    fn add_notification(&self, notification: Notification) -> ClinicResult<()> {
        self.tables()?
            .notifications
            .insert(notification.id, notification);
        Ok(())
    }

    fn mark_notification_read(&self, id: Uuid) -> ClinicResult<()> {
        match self.tables()?.notifications.get_mut(&id) {
            Some(notification) => {
                notification.is_read = true;
                Ok(())
            }
            None => Err(ClinicError::NotFound("Notification".into())),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testutils::{appointment_at, next_weekday_at, seed, Seed};
    use chrono::{Duration, Weekday};
    use std::thread;

    fn seeded() -> (LocalStore, Seed) {
        let store = LocalStore::default();
        let seed = seed(&store);
        (store, seed)
    }

    #[test]
    fn test_reserve_rejects_overlap_for_same_doctor() {
        let (store, seed) = seeded();
        let start = next_weekday_at(Weekday::Mon, 9, 0);

        let first = appointment_at(seed.doctor.id, seed.patient.id, start);
        store.reserve_appointment(&first, None).unwrap();

        let overlapping = appointment_at(
            seed.doctor.id,
            seed.patient.id,
            start + Duration::minutes(15),
        );
        assert_eq!(
            store.reserve_appointment(&overlapping, None),
            Err(ClinicError::Validation("Time slot already booked".into()))
        );

        let adjacent = appointment_at(
            seed.doctor.id,
            seed.patient.id,
            start + Duration::minutes(30),
        );
        store.reserve_appointment(&adjacent, None).unwrap();

        assert_eq!(store.doctor_appointments(seed.doctor.id).unwrap().len(), 2);
    }

    #[test]
    fn test_reserve_checks_schedule_window() {
        let (store, seed) = seeded();
        let tuesday = appointment_at(
            seed.doctor.id,
            seed.patient.id,
            next_weekday_at(Weekday::Tue, 9, 0),
        );
        assert_eq!(
            store.reserve_appointment(&tuesday, None),
            Err(ClinicError::Validation(
                "Doctor is not available at this time".into()
            ))
        );
    }

    #[test]
    fn test_concurrent_bookings_respect_window_capacity() {
        let (store, seed) = seeded();
        let mut schedule = seed.schedule.clone();
        schedule.max_appointments = 1;
        store.update_schedule(&schedule).unwrap();

        let handles: Vec<_> = (9..17)
            .map(|hour| {
                let store = store.clone();
                let appointment = appointment_at(
                    seed.doctor.id,
                    seed.patient.id,
                    next_weekday_at(Weekday::Mon, hour, 0),
                );
                thread::spawn(move || store.reserve_appointment(&appointment, None))
            })
            .collect();
        let booked = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(Result::is_ok)
            .count();

        assert_eq!(booked, 1);
        assert_eq!(store.doctor_appointments(seed.doctor.id).unwrap().len(), 1);
    }

    #[test]
    fn test_reserve_ignores_cancelled_and_own_booking() {
        let (store, seed) = seeded();
        let start = next_weekday_at(Weekday::Mon, 10, 0);

        let mut first = appointment_at(seed.doctor.id, seed.patient.id, start);
        store.reserve_appointment(&first, None).unwrap();

        // moving within its own range only conflicts with itself
        first.start += Duration::minutes(10);
        first.end += Duration::minutes(10);
        store
            .reserve_appointment(&first, Some(AppointmentStatus::Pending))
            .unwrap();

        first.status = AppointmentStatus::Cancelled;
        store
            .update_appointment(&first, AppointmentStatus::Pending)
            .unwrap();

        let second = appointment_at(seed.doctor.id, seed.patient.id, start);
        store.reserve_appointment(&second, None).unwrap();
    }

    #[test]
    fn test_stale_writes_are_refused() {
        let (store, seed) = seeded();
        let start = next_weekday_at(Weekday::Mon, 11, 0);
        let booked = appointment_at(seed.doctor.id, seed.patient.id, start);
        store.reserve_appointment(&booked, None).unwrap();

        let mut cancelled = booked.clone();
        cancelled.status = AppointmentStatus::Cancelled;
        store
            .update_appointment(&cancelled, AppointmentStatus::Pending)
            .unwrap();

        let mut moved = booked.clone();
        moved.start += Duration::hours(1);
        moved.end += Duration::hours(1);
        moved.status = AppointmentStatus::Rescheduled;
        assert!(matches!(
            store.reserve_appointment(&moved, Some(AppointmentStatus::Pending)),
            Err(ClinicError::InvalidState(_))
        ));
        assert!(matches!(
            store.update_appointment(&booked, AppointmentStatus::Pending),
            Err(ClinicError::InvalidState(_))
        ));
        assert_eq!(
            store.appointment(booked.id).unwrap().status,
            AppointmentStatus::Cancelled
        );
    }

    #[test]
    fn test_deleted_appointments_are_hidden() {
        let (store, seed) = seeded();
        let mut appointment = appointment_at(
            seed.doctor.id,
            seed.patient.id,
            next_weekday_at(Weekday::Mon, 9, 0),
        );
        store.reserve_appointment(&appointment, None).unwrap();

        appointment.deleted = true;
        store
            .update_appointment(&appointment, AppointmentStatus::Pending)
            .unwrap();

        assert!(store.appointments().unwrap().is_empty());
        assert!(matches!(
            store.appointment(appointment.id),
            Err(ClinicError::NotFound(_))
        ));
    }

    #[test]
    fn test_missing_records_are_not_found() {
        let store = LocalStore::default();
        assert!(matches!(
            store.user(Uuid::new_v4()),
            Err(ClinicError::NotFound(_))
        ));
        assert!(matches!(
            store.remove_schedule(Uuid::new_v4()),
            Err(ClinicError::NotFound(_))
        ));
        assert!(matches!(
            store.mark_notification_read(Uuid::new_v4()),
            Err(ClinicError::NotFound(_))
        ));
    }
}
