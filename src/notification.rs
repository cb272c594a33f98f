use crate::{
    backend::ClinicBackend,
    error::{ClinicError, ClinicResult},
    event_bus::{BusError, EventBus, NotificationEvent},
    identity::Identity,
    types::{Appointment, Doctor, Notification, NotificationKind, Patient, Prescription, Role},
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

pub const DEFAULT_CHANNEL: &str = "notifications";

fn format_time(time: DateTime<Utc>) -> String {
    time.format("%A, %d %B %Y %H:%M UTC").to_string()
}

#[derive(Clone)]
pub struct Notifier<B: ClinicBackend> {
    backend: B,
    bus: Arc<dyn EventBus>,
    channel: String,
}

impl<B: ClinicBackend> Notifier<B> {
    pub fn new(backend: B, bus: Arc<dyn EventBus>, channel: impl Into<String>) -> Self {
        Self {
            backend,
            bus,
            channel: channel.into(),
        }
    }

    /// Stores an unread notification, then publishes it on the bus.
    pub fn notify(
        &self,
        user_id: Uuid,
        message: String,
        kind: NotificationKind,
        related_entity_id: Option<Uuid>,
    ) -> ClinicResult<Notification> {
        let notification = Notification {
            id: Uuid::new_v4(),
            user_id,
            message,
            kind,
            related_entity_id,
            is_read: false,
            created_at: Utc::now(),
        };
        self.backend.add_notification(notification.clone())?;
        self.publish(&notification);
        Ok(notification)
    }

    fn publish(&self, notification: &Notification) {
        let result = serde_json::to_string(&NotificationEvent::from(notification))
            .map_err(BusError::from)
            .and_then(|payload| self.bus.publish(&self.channel, &payload));

        if let Err(err) = result {
            warn!(
                ?err,
                notification_id = %notification.id,
                "Failed to publish notification"
            );
        }
    }

    /// Like `notify`, for events whose own write already committed. Failures are only logged.
    fn dispatch(
        &self,
        user_id: Uuid,
        message: String,
        kind: NotificationKind,
        related_entity_id: Option<Uuid>,
    ) {
        if let Err(err) = self.notify(user_id, message, kind, related_entity_id) {
            error!(?err, %kind, %user_id, "Failed to store notification");
        }
    }

    fn participants(&self, patient_id: Uuid, doctor_id: Uuid) -> ClinicResult<(Patient, Doctor)> {
        let patient = self.backend.patient(patient_id)?;
        Ok((patient, self.backend.doctor(doctor_id)?))
    }

    /// Informs the patient of an appointment about `kind`.
    pub fn appointment_event(&self, appointment: &Appointment, kind: NotificationKind) {
        let lookup = self.participants(appointment.patient_id, appointment.doctor_id);
        let (patient, doctor) = match lookup {
            Ok(found) => found,
            Err(err) => {
                error!(
                    ?err,
                    appointment_id = %appointment.id,
                    "Can't resolve appointment participants"
                );
                return;
            }
        };

        let doctor = doctor.full_name();
        let time = format_time(appointment.start);
        let message = match kind {
            NotificationKind::AppointmentConfirmation => format!(
                "Your appointment with Dr. {doctor} on {time} has been booked \
                 and is awaiting approval."
            ),
            NotificationKind::Reminder => {
                format!("Reminder: You have an appointment with Dr. {doctor} on {time}.")
            }
            NotificationKind::Cancellation => {
                format!("Your appointment with Dr. {doctor} on {time} has been cancelled.")
            }
            NotificationKind::Approval => {
                format!("Your appointment with Dr. {doctor} on {time} has been approved.")
            }
            NotificationKind::Rejection => format!(
                "Your appointment with Dr. {doctor} on {time} has been rejected. Reason: {}",
                appointment
                    .cancellation_reason
                    .as_deref()
                    .unwrap_or("none given")
            ),
            NotificationKind::Reschedule => {
                format!("Your appointment with Dr. {doctor} has been rescheduled to {time}.")
            }
            NotificationKind::Completion => format!(
                "Your appointment with Dr. {doctor} on {time} has been marked as completed."
            ),
            other => {
                error!(%other, "Not an appointment notification");
                return;
            }
        };

        self.dispatch(patient.user_id, message, kind, Some(appointment.id));
    }

    pub fn prescription_issued(&self, prescription: &Prescription) {
        let lookup = self.participants(prescription.patient_id, prescription.doctor_id);
        match lookup {
            Ok((patient, doctor)) => self.dispatch(
                patient.user_id,
                format!(
                    "You have a new prescription from Dr. {} for {}.",
                    doctor.full_name(),
                    prescription.medication
                ),
                NotificationKind::Prescription,
                Some(prescription.id),
            ),
            Err(err) => error!(
                ?err,
                prescription_id = %prescription.id,
                "Can't resolve prescription participants"
            ),
        }
    }

    pub fn renewal_requested(&self, prescription: &Prescription) {
        let lookup = self.participants(prescription.patient_id, prescription.doctor_id);
        match lookup {
            Ok((patient, doctor)) => self.dispatch(
                doctor.user_id,
                format!(
                    "Patient {} has requested a renewal for prescription {}.",
                    patient.full_name(),
                    prescription.medication
                ),
                NotificationKind::PrescriptionRenewal,
                Some(prescription.id),
            ),
            Err(err) => error!(
                ?err,
                prescription_id = %prescription.id,
                "Can't resolve prescription participants"
            ),
        }
    }

    pub fn renewal_answered(&self, prescription: &Prescription, approved: bool) {
        let patient = match self.backend.patient(prescription.patient_id) {
            Ok(patient) => patient,
            Err(err) => {
                error!(
                    ?err,
                    prescription_id = %prescription.id,
                    "Can't resolve prescription patient"
                );
                return;
            }
        };
        let (verdict, kind) = if approved {
            ("approved", NotificationKind::RenewalApproved)
        } else {
            ("rejected", NotificationKind::RenewalRejected)
        };
        let mut message = format!(
            "Your renewal request for {} has been {verdict}.",
            prescription.medication
        );
        if let Some(note) = &prescription.renewal_note {
            message.push_str(&format!(" Note: {note}"));
        }
        self.dispatch(patient.user_id, message, kind, Some(prescription.id));
    }

    pub fn unread_for(&self, identity: &Identity) -> ClinicResult<Vec<Notification>> {
        self.backend.unread_notifications(identity.user_id)
    }

    pub fn all(&self, identity: &Identity) -> ClinicResult<Vec<Notification>> {
        identity.require_admin()?;
        self.backend.notifications()
    }

    pub fn mark_read(&self, identity: &Identity, id: Uuid) -> ClinicResult<()> {
        let notification = self.backend.notification(id)?;
        if notification.user_id != identity.user_id && !identity.is_admin() {
            return Err(ClinicError::Forbidden(
                "Notification belongs to another user".into(),
            ));
        }
        self.backend.mark_notification_read(id)
    }

    pub fn send(
        &self,
        identity: &Identity,
        user_id: Uuid,
        message: String,
    ) -> ClinicResult<Notification> {
        identity.require_admin()?;
        self.backend.user(user_id)?;
        self.notify(user_id, message, NotificationKind::SystemNotification, None)
    }

    /// Sends `message` to every active user, or only to those with `target_role`. A recipient
    /// whose notification can't be stored is logged and skipped; the count covers stored ones.
    pub fn broadcast(
        &self,
        identity: &Identity,
        message: &str,
        target_role: Option<Role>,
    ) -> ClinicResult<usize> {
        identity.require_admin()?;
        let recipients: Vec<Uuid> = self
            .backend
            .users()?
            .into_iter()
            .filter(|user| user.active && target_role.map_or(true, |role| user.role == role))
            .map(|user| user.id)
            .collect();

        let mut sent = 0;
        for user_id in recipients {
            let kind = NotificationKind::SystemNotification;
            match self.notify(user_id, message.to_string(), kind, None) {
                Ok(_) => sent += 1,
                Err(err) => error!(?err, %user_id, "Failed to store broadcast notification"),
            }
        }
        info!(recipients = sent, ?target_role, "Broadcast system notification");
        Ok(sent)
    }
}
