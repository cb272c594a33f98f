use crate::{
    backend::ClinicBackend,
    error::{ClinicError, ClinicResult},
    identity::Identity,
    notification::Notifier,
    types::{Prescription, PrescriptionDraft, RenewalStatus, Role},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

/// Result of answering a renewal request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenewalOutcome {
    pub original: Prescription,
    pub renewed: Option<Prescription>,
}

#[derive(Clone)]
pub struct PrescriptionManager<B: ClinicBackend> {
    backend: B,
    notifier: Notifier<B>,
}

impl<B: ClinicBackend> PrescriptionManager<B> {
    pub fn new(backend: B, notifier: Notifier<B>) -> Self {
        Self { backend, notifier }
    }

    fn authorize_prescriber(
        &self,
        identity: &Identity,
        prescription: &Prescription,
    ) -> ClinicResult<()> {
        match identity.role {
            Role::Admin => Ok(()),
            Role::Doctor
                if identity.doctor_profile(&self.backend)?.id == prescription.doctor_id =>
            {
                Ok(())
            }
            _ => Err(ClinicError::Forbidden(
                "Only the prescribing doctor can manage this prescription".into(),
            )),
        }
    }

    fn authorize_reader(
        &self,
        identity: &Identity,
        prescription: &Prescription,
    ) -> ClinicResult<()> {
        match identity.role {
            Role::Patient
                if identity.patient_profile(&self.backend)?.id == prescription.patient_id =>
            {
                Ok(())
            }
            Role::Patient => Err(ClinicError::Forbidden(
                "Prescription belongs to another patient".into(),
            )),
            _ => self.authorize_prescriber(identity, prescription),
        }
    }

    pub fn issue_prescription(
        &self,
        identity: &Identity,
        draft: PrescriptionDraft,
    ) -> ClinicResult<Prescription> {
        identity.require_any(&[Role::Admin, Role::Doctor])?;
        draft.validate()?;

        let appointment = self
            .backend
            .appointment(draft.appointment_id)
            .map_err(|err| match err {
                ClinicError::NotFound(_) => {
                    ClinicError::Validation("Appointment does not exist".into())
                }
                other => other,
            })?;
        if identity.role == Role::Doctor
            && identity.doctor_profile(&self.backend)?.id != appointment.doctor_id
        {
            return Err(ClinicError::Forbidden(
                "Only the appointment's doctor can prescribe for it".into(),
            ));
        }

        let prescription =
            draft.into_prescription(appointment.doctor_id, appointment.patient_id, Utc::now());
        self.backend.add_prescription(prescription.clone())?;
        info!(
            prescription_id = %prescription.id,
            medication = %prescription.medication,
            "Issued prescription"
        );

        self.notifier.prescription_issued(&prescription);
        Ok(prescription)
    }

    pub fn prescriptions_for(&self, identity: &Identity) -> ClinicResult<Vec<Prescription>> {
        match identity.role {
            Role::Admin => self.backend.prescriptions(),
            Role::Doctor => self
                .backend
                .doctor_prescriptions(identity.doctor_profile(&self.backend)?.id),
            Role::Patient => self
                .backend
                .patient_prescriptions(identity.patient_profile(&self.backend)?.id),
        }
    }

    pub fn prescription_for(&self, identity: &Identity, id: Uuid) -> ClinicResult<Prescription> {
        let prescription = self.backend.prescription(id)?;
        self.authorize_reader(identity, &prescription)?;
        Ok(prescription)
    }

    pub fn remove_prescription(&self, identity: &Identity, id: Uuid) -> ClinicResult<()> {
        let prescription = self.backend.prescription(id)?;
        self.authorize_prescriber(identity, &prescription)?;
        self.backend.remove_prescription(id)
    }

    /// Asks the prescribing doctor for a renewal on behalf of the owning patient.
    pub fn request_renewal(&self, identity: &Identity, id: Uuid) -> ClinicResult<Prescription> {
        identity.require_any(&[Role::Patient])?;
        let mut prescription = self.backend.prescription(id)?;
        if identity.patient_profile(&self.backend)?.id != prescription.patient_id {
            return Err(ClinicError::Forbidden(
                "Prescription belongs to another patient".into(),
            ));
        }

        if prescription.renewal_status != RenewalStatus::None {
            return Err(ClinicError::InvalidState(format!(
                "Renewal is already {}",
                prescription.renewal_status
            )));
        }
        if prescription.is_expired(Utc::now()) {
            return Err(ClinicError::PolicyViolation(
                "Prescription has expired".into(),
            ));
        }
        if !prescription.can_refill() {
            return Err(ClinicError::PolicyViolation(
                "Prescription has no refills left".into(),
            ));
        }

        prescription.renewal_status = RenewalStatus::Requested;
        self.backend.update_prescription(&prescription)?;
        info!(prescription_id = %id, "Requested prescription renewal");

        self.notifier.renewal_requested(&prescription);
        Ok(prescription)
    }

    pub fn respond_to_renewal(
        &self,
        identity: &Identity,
        id: Uuid,
        approve: bool,
        note: Option<String>,
    ) -> ClinicResult<RenewalOutcome> {
        let mut original = self.backend.prescription(id)?;
        self.authorize_prescriber(identity, &original)?;
        if original.renewal_status != RenewalStatus::Requested {
            return Err(ClinicError::InvalidState("No renewal was requested".into()));
        }

        let renewed = if approve {
            Some(self.supersede(&mut original)?)
        } else {
            original.renewal_status = RenewalStatus::Rejected;
            None
        };
        original.renewal_note = note;
        self.backend.update_prescription(&original)?;
        info!(prescription_id = %id, approve, "Answered prescription renewal");

        self.notifier.renewal_answered(&original, approve);
        Ok(RenewalOutcome { original, renewed })
    }

    /// Issues the next period of a prescription directly.
    pub fn renew(&self, identity: &Identity, id: Uuid) -> ClinicResult<Prescription> {
        let mut original = self.backend.prescription(id)?;
        self.authorize_prescriber(identity, &original)?;
        if original.renewal_status != RenewalStatus::None {
            return Err(ClinicError::InvalidState(format!(
                "Prescription renewal is already {}",
                original.renewal_status
            )));
        }

        let renewed = self.supersede(&mut original)?;
        self.backend.update_prescription(&original)?;
        info!(prescription_id = %id, renewed_id = %renewed.id, "Renewed prescription");

        self.notifier.prescription_issued(&renewed);
        Ok(renewed)
    }

    /// Stores the follow-up copy and marks `original` as renewed. The refill count moves on
    /// to the copy.
    fn supersede(&self, original: &mut Prescription) -> ClinicResult<Prescription> {
        if !original.can_refill() {
            return Err(ClinicError::PolicyViolation(
                "Prescription does not allow further refills".into(),
            ));
        }
        let renewed = original.renewed(Utc::now());
        self.backend.add_prescription(renewed.clone())?;
        original.renewal_status = RenewalStatus::Approved;
        Ok(renewed)
    }

    /// Whether the patient already has a prescription for `medication`, ignoring case.
    pub fn check_for_interactions(
        &self,
        identity: &Identity,
        patient_id: Uuid,
        medication: &str,
    ) -> ClinicResult<bool> {
        identity.require_any(&[Role::Admin, Role::Doctor])?;
        self.backend.patient(patient_id)?;
        Ok(self
            .backend
            .patient_prescriptions(patient_id)?
            .iter()
            .any(|p| p.medication.eq_ignore_ascii_case(medication.trim())))
    }
}
