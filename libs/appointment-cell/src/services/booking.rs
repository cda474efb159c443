// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use shared_database::{AppState, ClinicStore, LockKey, Relation, StoreTransaction};
use shared_models::{DoctorAppointmentLink, Patient};

use crate::models::{BookingError, BookingOutcome, BookingReceipt, BookingRequest};
use crate::services::lifecycle::decide_transition;

/// Patient as resolved at the start of a booking attempt.
enum ResolvedPatient {
    Existing(Patient),
    /// Not stored yet; written at the end of the attempt whatever the outcome.
    Pending(Patient),
}

pub struct BookingEngine {
    store: Arc<dyn ClinicStore>,
}

impl BookingEngine {
    pub fn new(state: &AppState) -> Self {
        Self::with_store(Arc::clone(&state.store))
    }

    pub fn with_store(store: Arc<dyn ClinicStore>) -> Self {
        Self { store }
    }

    /// Locks held for the whole read-decide-write sequence.
    fn lock_scope(request: &BookingRequest) -> Vec<LockKey> {
        let patient_key = match request.patient_id {
            Some(patient_id) => LockKey::Patient(patient_id),
            None => LockKey::Relation(Relation::Patient),
        };
        vec![LockKey::Appointment(request.appointment_id), patient_key]
    }

    /// Book `request.appointment_id` through `request.doctor_id` for the patient.
    ///
    /// Every read and write of the attempt runs in one store transaction. On
    /// any error the transaction is rolled back and nothing is persisted.
    /// New patient details are only validated when they are actually used.
    #[instrument(
        skip(self, request),
        fields(
            doctor_id = request.doctor_id,
            appointment_id = request.appointment_id,
            patient_id = ?request.patient_id
        )
    )]
    pub async fn book(&self, request: BookingRequest) -> Result<BookingReceipt, BookingError> {
        let booking_id = Uuid::new_v4();
        let mut tx = self.store.begin(&Self::lock_scope(&request)).await?;

        match Self::apply(tx.as_mut(), booking_id, &request).await {
            Ok(receipt) => {
                tx.commit().await?;
                info!(
                    "Booking {} finished as {:?}: appointment {} {} -> {}",
                    booking_id,
                    receipt.outcome,
                    receipt.appointment_id,
                    receipt.previous_status,
                    receipt.resulting_status
                );
                Ok(receipt)
            }
            Err(e) => {
                if let Err(rollback_error) = tx.rollback().await {
                    warn!("Rollback of booking {} failed: {}", booking_id, rollback_error);
                }
                Err(e)
            }
        }
    }

    async fn apply(
        tx: &mut dyn StoreTransaction,
        booking_id: Uuid,
        request: &BookingRequest,
    ) -> Result<BookingReceipt, BookingError> {
        let doctor = tx
            .find_doctor(request.doctor_id)
            .await?
            .ok_or(BookingError::DoctorNotFound(request.doctor_id))?;

        let appointment = tx
            .find_appointment(request.appointment_id)
            .await?
            .ok_or(BookingError::AppointmentNotFound(request.appointment_id))?;

        let patient = Self::resolve_patient(tx, request).await?;

        let transition = decide_transition(&appointment.status);
        debug!(
            "Booking {}: appointment {} is {}, outcome {:?}",
            booking_id, appointment.id, appointment.status, transition.outcome
        );

        if let Some(next_status) = &transition.next_status {
            tx.update_appointment_status(appointment.id, next_status)
                .await?;
        }

        let link_created = if transition.links_doctor {
            tx.insert_link(DoctorAppointmentLink {
                appointment_id: appointment.id,
                doctor_id: doctor.id,
            })
            .await?
        } else {
            false
        };

        let success = transition.is_success();
        let (patient_id, patient_appointment_count, patient_created) = match patient {
            ResolvedPatient::Existing(existing) => {
                if success {
                    tx.increment_patient_count(existing.id).await?;
                    (existing.id, existing.appointment_count + 1, false)
                } else {
                    (existing.id, existing.appointment_count, false)
                }
            }
            ResolvedPatient::Pending(mut created) => {
                created.appointment_count = if success { 1 } else { 0 };
                tx.insert_patient(&created).await?;
                info!(
                    "Registered patient {} with {} appointment(s)",
                    created.id, created.appointment_count
                );
                (created.id, created.appointment_count, true)
            }
        };

        match &transition.outcome {
            BookingOutcome::InvalidStatus(raw) => {
                warn!(
                    "Appointment {} carries unrecognized status '{}', nothing booked",
                    appointment.id, raw
                );
            }
            outcome if !outcome.is_success() => {
                warn!(
                    "Booking {} rejected: appointment {} is {}",
                    booking_id,
                    appointment.id,
                    appointment.status.label()
                );
            }
            _ => {}
        }

        let resulting_status = transition
            .next_status
            .clone()
            .unwrap_or_else(|| appointment.status.clone());

        Ok(BookingReceipt {
            booking_id,
            message: transition.outcome.status_line(),
            outcome: transition.outcome,
            appointment_id: appointment.id,
            doctor_id: doctor.id,
            patient_id,
            patient_created,
            link_created,
            previous_status: appointment.status,
            resulting_status,
            patient_appointment_count,
        })
    }

    async fn resolve_patient(
        tx: &mut dyn StoreTransaction,
        request: &BookingRequest,
    ) -> Result<ResolvedPatient, BookingError> {
        match request.patient_id {
            Some(patient_id) => {
                if let Some(existing) = tx.find_patient(patient_id).await? {
                    debug!("Patient {} exists", patient_id);
                    return Ok(ResolvedPatient::Existing(existing));
                }
                let details = request
                    .new_patient
                    .as_ref()
                    .ok_or(BookingError::PatientNotFound(patient_id))?;
                details.validate().map_err(BookingError::ValidationError)?;
                debug!("Patient {} does not exist, registering with booking", patient_id);
                Ok(ResolvedPatient::Pending(details.into_patient(patient_id, 0)))
            }
            None => {
                let details = request
                    .new_patient
                    .as_ref()
                    .ok_or(BookingError::MissingPatientDetails)?;
                details.validate().map_err(BookingError::ValidationError)?;
                let patient_id = tx.next_id(Relation::Patient).await?;
                debug!("Allocated patient id {} for new patient", patient_id);
                Ok(ResolvedPatient::Pending(details.into_patient(patient_id, 0)))
            }
        }
    }
}
