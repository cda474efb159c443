// libs/shared/database/src/store.rs
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use shared_models::{
    Appointment, AppointmentStatus, Doctor, DoctorAppointmentLink, DoctorPatientCount,
    DoctorStatusCount, NewAppointment, NewDoctor, NewPatient, Patient,
};

/// Relations that own an identifier sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    Doctor,
    Patient,
    Appointment,
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Relation::Doctor => write!(f, "doctor"),
            Relation::Patient => write!(f, "patient"),
            Relation::Appointment => write!(f, "appointment"),
        }
    }
}

/// What a transaction serializes on for its whole lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LockKey {
    Relation(Relation),
    Doctor(i64),
    Patient(i64),
    Appointment(i64),
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockKey::Relation(relation) => write!(f, "relation:{}", relation),
            LockKey::Doctor(id) => write!(f, "doctor:{}", id),
            LockKey::Patient(id) => write!(f, "patient:{}", id),
            LockKey::Appointment(id) => write!(f, "appointment:{}", id),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Store API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to decode store response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Write conflict: {0}")]
    Conflict(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// One atomic unit of work against the store.
///
/// Writes become visible to other callers only after `commit`. Dropping a
/// transaction without committing discards everything it staged.
#[async_trait]
pub trait StoreTransaction: Send {
    async fn find_doctor(&mut self, id: i64) -> StoreResult<Option<Doctor>>;

    /// Reads the appointment row. The row stays locked until the transaction ends.
    async fn find_appointment(&mut self, id: i64) -> StoreResult<Option<Appointment>>;

    async fn find_patient(&mut self, id: i64) -> StoreResult<Option<Patient>>;

    async fn find_matching_doctor(&mut self, fields: &NewDoctor) -> StoreResult<Option<Doctor>>;

    async fn find_matching_patient(&mut self, fields: &NewPatient) -> StoreResult<Option<Patient>>;

    async fn find_matching_appointment(
        &mut self,
        fields: &NewAppointment,
    ) -> StoreResult<Option<Appointment>>;

    async fn next_id(&mut self, relation: Relation) -> StoreResult<i64>;

    async fn update_appointment_status(
        &mut self,
        appointment_id: i64,
        status: &AppointmentStatus,
    ) -> StoreResult<()>;

    /// Returns `false` when the identical link already exists.
    async fn insert_link(&mut self, link: DoctorAppointmentLink) -> StoreResult<bool>;

    async fn increment_patient_count(&mut self, patient_id: i64) -> StoreResult<()>;

    async fn insert_patient(&mut self, patient: &Patient) -> StoreResult<()>;

    async fn insert_doctor(&mut self, doctor: &Doctor) -> StoreResult<()>;

    async fn insert_appointment(&mut self, appointment: &Appointment) -> StoreResult<()>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        Ok(())
    }
}

/// The hospital data store: transactional writes plus committed-state reads.
#[async_trait]
pub trait ClinicStore: Send + Sync {
    async fn begin(&self, scope: &[LockKey]) -> StoreResult<Box<dyn StoreTransaction>>;

    async fn doctor(&self, id: i64) -> StoreResult<Option<Doctor>>;

    async fn patient(&self, id: i64) -> StoreResult<Option<Patient>>;

    async fn appointment(&self, id: i64) -> StoreResult<Option<Appointment>>;

    async fn links_for_appointment(
        &self,
        appointment_id: i64,
    ) -> StoreResult<Vec<DoctorAppointmentLink>>;

    /// Active or Available appointments linked to the doctor, dated within `[from, to]`.
    async fn doctor_appointments(
        &self,
        doctor_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StoreResult<Vec<Appointment>>;

    /// Available appointments on `date` offered by the named department.
    async fn department_available(
        &self,
        department_name: &str,
        date: NaiveDate,
    ) -> StoreResult<Vec<Appointment>>;

    async fn status_counts_per_doctor(&self) -> StoreResult<Vec<DoctorStatusCount>>;

    async fn patients_per_doctor_with_status(
        &self,
        status: &AppointmentStatus,
    ) -> StoreResult<Vec<DoctorPatientCount>>;
}

/// Sorts rows the way the status-count report lists them: doctor name
/// ascending, then count descending.
pub fn order_status_counts(rows: &mut [DoctorStatusCount]) {
    rows.sort_by(|a, b| {
        a.doctor_name
            .cmp(&b.doctor_name)
            .then(b.appointment_count.cmp(&a.appointment_count))
            .then_with(|| a.status.code().cmp(b.status.code()))
    });
}
