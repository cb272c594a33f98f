use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex,
};

use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc, Weekday};
use uuid::Uuid;

use crate::{
    backend::ClinicBackend,
    configuration::Configuration,
    directory::Directory,
    error::{ClinicError, ClinicResult},
    event_bus::BroadcastBus,
    http::create_app,
    identity::Identity,
    local_store::LocalStore,
    notification::{Notifier, DEFAULT_CHANNEL},
    renewal::PrescriptionManager,
    report::Reports,
    scheduling::{AppointmentScheduler, SchedulingPolicy},
    types::{
        Appointment, AppointmentStatus, DayOfWeek, Doctor, Notification, Patient, Prescription,
        Role, Schedule, User,
    },
};

/// The first `weekday` at least three days from now, at `hour:minute` UTC.
pub fn next_weekday_at(weekday: Weekday, hour: u32, minute: u32) -> DateTime<Utc> {
    let mut date = Utc::now().date_naive() + Duration::days(3);
    while date.weekday() != weekday {
        date = date.succ_opt().unwrap();
    }
    date.and_hms_opt(hour, minute, 0).unwrap().and_utc()
}

pub fn appointment_at(doctor_id: Uuid, patient_id: Uuid, start: DateTime<Utc>) -> Appointment {
    Appointment {
        id: Uuid::new_v4(),
        doctor_id,
        patient_id,
        start,
        end: start + Duration::minutes(30),
        status: AppointmentStatus::Pending,
        reason: None,
        cancellation_reason: None,
        notes: None,
        deleted: false,
        created_at: Utc::now(),
    }
}

fn user(first_name: &str, last_name: &str, role: Role) -> User {
    User {
        id: Uuid::new_v4(),
        email: format!(
            "{}.{}.{}@example.com",
            first_name.to_lowercase(),
            last_name.to_lowercase(),
            Uuid::new_v4().simple()
        ),
        first_name: first_name.into(),
        last_name: last_name.into(),
        role,
        active: true,
        created_at: Utc::now(),
    }
}

pub fn add_patient<B: ClinicBackend>(backend: &B, first_name: &str, last_name: &str) -> Patient {
    let user = user(first_name, last_name, Role::Patient);
    let patient = Patient {
        id: Uuid::new_v4(),
        user_id: user.id,
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
        email: user.email.clone(),
        phone_number: "+1 555 0199".into(),
        address: String::new(),
        date_of_birth: None,
        blood_type: String::new(),
        allergies: String::new(),
        medical_history: String::new(),
        insurance_info: String::new(),
    };
    backend.add_user(user).unwrap();
    backend.add_patient(patient.clone()).unwrap();
    patient
}

/// An admin, a doctor working Mondays 09:00-17:00 and one patient.
pub struct Seed {
    pub admin: User,
    pub doctor: Doctor,
    pub patient: Patient,
    pub schedule: Schedule,
}

pub fn seed<B: ClinicBackend>(backend: &B) -> Seed {
    let admin = user("Lisa", "Cuddy", Role::Admin);
    backend.add_user(admin.clone()).unwrap();

    let doctor_user = user("Gregory", "House", Role::Doctor);
    let doctor = Doctor {
        id: Uuid::new_v4(),
        user_id: doctor_user.id,
        first_name: "Gregory".into(),
        last_name: "House".into(),
        email: doctor_user.email.clone(),
        phone_number: "+1 555 0100".into(),
        specialization: "Diagnostic Medicine".into(),
        license_number: "MD10001".into(),
    };
    backend.add_user(doctor_user).unwrap();
    backend.add_doctor(doctor.clone()).unwrap();

    let schedule = Schedule {
        id: Uuid::new_v4(),
        doctor_id: doctor.id,
        day_of_week: DayOfWeek::Monday,
        start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        end_time: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
        max_appointments: 16,
    };
    backend.add_schedule(schedule.clone()).unwrap();

    let patient = add_patient(backend, "Jane", "Doe");

    Seed {
        admin,
        doctor,
        patient,
        schedule,
    }
}

/// Seeded in-memory clinic with every service wired up.
pub struct Clinic {
    pub store: LocalStore,
    pub notifier: Notifier<LocalStore>,
    pub scheduler: AppointmentScheduler<LocalStore>,
    pub prescriptions: PrescriptionManager<LocalStore>,
    pub directory: Directory<LocalStore>,
    pub reports: Reports<LocalStore>,
    pub admin: User,
    pub doctor: Doctor,
    pub patient: Patient,
    pub schedule: Schedule,
}

impl Clinic {
    pub fn new() -> Self {
        let store = LocalStore::default();
        let Seed {
            admin,
            doctor,
            patient,
            schedule,
        } = seed(&store);

        let notifier = Notifier::new(
            store.clone(),
            Arc::new(BroadcastBus::default()),
            DEFAULT_CHANNEL,
        );
        Self {
            scheduler: AppointmentScheduler::new(
                store.clone(),
                notifier.clone(),
                SchedulingPolicy::default(),
            ),
            prescriptions: PrescriptionManager::new(store.clone(), notifier.clone()),
            directory: Directory::new(store.clone()),
            reports: Reports::new(store.clone()),
            notifier,
            store,
            admin,
            doctor,
            patient,
            schedule,
        }
    }

    pub fn admin_identity(&self) -> Identity {
        Identity::new(self.admin.id, Role::Admin)
    }

    pub fn doctor_identity(&self) -> Identity {
        Identity::new(self.doctor.user_id, Role::Doctor)
    }

    pub fn patient_identity(&self) -> Identity {
        Identity::new(self.patient.user_id, Role::Patient)
    }

    pub fn add_patient(&self, first_name: &str, last_name: &str) -> Patient {
        add_patient(&self.store, first_name, last_name)
    }

    /// Books the seeded doctor for the seeded patient.
    pub fn book(&self, start: DateTime<Utc>) -> ClinicResult<Appointment> {
        self.scheduler.book_appointment(
            &self.patient_identity(),
            self.doctor.id,
            self.patient.id,
            start,
            Some("Checkup".into()),
        )
    }
}

#[derive(Clone, Default)]
pub struct TestConfiguration;

impl Configuration for TestConfiguration {
    fn port(&self) -> String {
        "0".into()
    }

    fn database_url(&self) -> Option<String> {
        None
    }

    fn scheduling_policy(&self) -> SchedulingPolicy {
        SchedulingPolicy::default()
    }

    fn notification_channel(&self) -> String {
        DEFAULT_CHANNEL.into()
    }
}

pub struct TestApp {
    pub address: String,
    pub store: LocalStore,
    pub seed: Seed,
}

/// Serves a freshly seeded in-memory clinic on an ephemeral port.
pub async fn spawn_app() -> TestApp {
    let store = LocalStore::default();
    let seed = seed(&store);
    let app = create_app(store.clone(), TestConfiguration);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address,
        store,
        seed,
    }
}

pub struct MockClinicBackendInner {
    pub store: LocalStore,
    pub failing_user: Mutex<Option<Uuid>>,
    pub calls_to_add_notification: AtomicU64,
}

/// Local store whose `add_notification` fails for one chosen user.
#[derive(Clone)]
pub struct MockClinicBackend(pub Arc<MockClinicBackendInner>);

impl MockClinicBackend {
    pub fn new(store: LocalStore) -> Self {
        Self(Arc::new(MockClinicBackendInner {
            store,
            failing_user: Mutex::default(),
            calls_to_add_notification: AtomicU64::default(),
        }))
    }

    pub fn fail_notifications_for(&self, user_id: Uuid) {
        *self.0.failing_user.lock().unwrap() = Some(user_id);
    }

    pub fn calls_to_add_notification(&self) -> u64 {
        self.0.calls_to_add_notification.load(Ordering::SeqCst)
    }
}

impl ClinicBackend for MockClinicBackend {
    fn users(&self) -> ClinicResult<Vec<User>> {
        self.0.store.users()
    }

    fn user(&self, id: Uuid) -> ClinicResult<User> {
        self.0.store.user(id)
    }

    fn add_user(&self, user: User) -> ClinicResult<()> {
        self.0.store.add_user(user)
    }

    fn update_user(&self, user: &User) -> ClinicResult<()> {
        self.0.store.update_user(user)
    }

    fn patients(&self) -> ClinicResult<Vec<Patient>> {
        self.0.store.patients()
    }

    fn patient(&self, id: Uuid) -> ClinicResult<Patient> {
        self.0.store.patient(id)
    }

    fn patient_by_user(&self, user_id: Uuid) -> ClinicResult<Patient> {
        self.0.store.patient_by_user(user_id)
    }

    fn add_patient(&self, patient: Patient) -> ClinicResult<()> {
        self.0.store.add_patient(patient)
    }

    fn update_patient(&self, patient: &Patient) -> ClinicResult<()> {
        self.0.store.update_patient(patient)
    }

    fn doctors(&self) -> ClinicResult<Vec<Doctor>> {
        self.0.store.doctors()
    }

    fn doctor(&self, id: Uuid) -> ClinicResult<Doctor> {
        self.0.store.doctor(id)
    }

    fn doctor_by_user(&self, user_id: Uuid) -> ClinicResult<Doctor> {
        self.0.store.doctor_by_user(user_id)
    }

    fn add_doctor(&self, doctor: Doctor) -> ClinicResult<()> {
        self.0.store.add_doctor(doctor)
    }

    fn schedules(&self, doctor_id: Uuid) -> ClinicResult<Vec<Schedule>> {
        self.0.store.schedules(doctor_id)
    }

    fn schedule(&self, id: Uuid) -> ClinicResult<Schedule> {
        self.0.store.schedule(id)
    }

    fn add_schedule(&self, schedule: Schedule) -> ClinicResult<()> {
        self.0.store.add_schedule(schedule)
    }

    fn update_schedule(&self, schedule: &Schedule) -> ClinicResult<()> {
        self.0.store.update_schedule(schedule)
    }

    fn remove_schedule(&self, id: Uuid) -> ClinicResult<()> {
        self.0.store.remove_schedule(id)
    }

    fn appointments(&self) -> ClinicResult<Vec<Appointment>> {
        self.0.store.appointments()
    }

    fn appointment(&self, id: Uuid) -> ClinicResult<Appointment> {
        self.0.store.appointment(id)
    }

    fn doctor_appointments(&self, doctor_id: Uuid) -> ClinicResult<Vec<Appointment>> {
        self.0.store.doctor_appointments(doctor_id)
    }

    fn patient_appointments(&self, patient_id: Uuid) -> ClinicResult<Vec<Appointment>> {
        self.0.store.patient_appointments(patient_id)
    }

    fn reserve_appointment(
        &self,
        appointment: &Appointment,
        previous: Option<AppointmentStatus>,
    ) -> ClinicResult<()> {
        self.0.store.reserve_appointment(appointment, previous)
    }

    fn update_appointment(
        &self,
        appointment: &Appointment,
        previous: AppointmentStatus,
    ) -> ClinicResult<()> {
        self.0.store.update_appointment(appointment, previous)
    }

    fn prescriptions(&self) -> ClinicResult<Vec<Prescription>> {
        self.0.store.prescriptions()
    }

    fn prescription(&self, id: Uuid) -> ClinicResult<Prescription> {
        self.0.store.prescription(id)
    }

    fn patient_prescriptions(&self, patient_id: Uuid) -> ClinicResult<Vec<Prescription>> {
        self.0.store.patient_prescriptions(patient_id)
    }

    fn doctor_prescriptions(&self, doctor_id: Uuid) -> ClinicResult<Vec<Prescription>> {
        self.0.store.doctor_prescriptions(doctor_id)
    }

    fn add_prescription(&self, prescription: Prescription) -> ClinicResult<()> {
        self.0.store.add_prescription(prescription)
    }

    fn update_prescription(&self, prescription: &Prescription) -> ClinicResult<()> {
        self.0.store.update_prescription(prescription)
    }

    fn remove_prescription(&self, id: Uuid) -> ClinicResult<()> {
        self.0.store.remove_prescription(id)
    }

    fn notifications(&self) -> ClinicResult<Vec<Notification>> {
        self.0.store.notifications()
    }

    fn notification(&self, id: Uuid) -> ClinicResult<Notification> {
        self.0.store.notification(id)
    }

    fn unread_notifications(&self, user_id: Uuid) -> ClinicResult<Vec<Notification>> {
        self.0.store.unread_notifications(user_id)
    }

    fn add_notification(&self, notification: Notification) -> ClinicResult<()> {
        self.0
            .calls_to_add_notification
            .fetch_add(1, Ordering::SeqCst);
        if *self.0.failing_user.lock().unwrap() == Some(notification.user_id) {
            return Err(ClinicError::Storage("Supposed to fail".into()));
        }
        self.0.store.add_notification(notification)
    }

    fn mark_notification_read(&self, id: Uuid) -> ClinicResult<()> {
        self.0.store.mark_notification_read(id)
    }
}
