// libs/appointment-cell/src/models.rs
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_database::StoreError;
use shared_models::{AppointmentStatus, NewPatient, Patient};

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRequest {
    /// Existing patient, or the id to register a new patient under.
    /// When absent the patient id is allocated from the patient sequence.
    pub patient_id: Option<i64>,
    pub doctor_id: i64,
    pub appointment_id: i64,
    pub new_patient: Option<NewPatientDetails>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPatientDetails {
    pub name: String,
    pub gender: String,
    pub age: i32,
    pub address: String,
}

impl NewPatientDetails {
    pub fn validate(&self) -> Result<(), String> {
        self.as_new_patient(0).validate()
    }

    fn as_new_patient(&self, appointment_count: i32) -> NewPatient {
        NewPatient {
            name: self.name.clone(),
            gender: self.gender.clone(),
            age: self.age,
            address: self.address.clone(),
            appointment_count,
        }
    }

    pub fn into_patient(&self, id: i64, appointment_count: i32) -> Patient {
        self.as_new_patient(appointment_count).into_patient(id)
    }
}

// ==============================================================================
// BOOKING RESULTS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingOutcome {
    Claimed,
    Waitlisted,
    RejectedPast,
    RejectedAlreadyWaitlisted,
    InvalidStatus(String),
}

impl BookingOutcome {
    /// Claimed and Waitlisted count as a booking for the patient.
    pub fn is_success(&self) -> bool {
        matches!(self, BookingOutcome::Claimed | BookingOutcome::Waitlisted)
    }

    pub fn status_line(&self) -> String {
        match self {
            BookingOutcome::Claimed => "Appointment is Available. Booked!".to_string(),
            BookingOutcome::Waitlisted => "Appointment is Active. Added to waitlist!".to_string(),
            BookingOutcome::RejectedPast => "Appointment is Past. Unable to book!".to_string(),
            BookingOutcome::RejectedAlreadyWaitlisted => {
                "Appointment is Waitlisted. Unable to book!".to_string()
            }
            BookingOutcome::InvalidStatus(value) => format!("Status: {} is incorrect", value),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingReceipt {
    pub booking_id: Uuid,
    pub outcome: BookingOutcome,
    pub message: String,
    pub appointment_id: i64,
    pub doctor_id: i64,
    pub patient_id: i64,
    pub patient_created: bool,
    pub link_created: bool,
    pub previous_status: AppointmentStatus,
    pub resulting_status: AppointmentStatus,
    pub patient_appointment_count: i32,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Doctor {0} not found")]
    DoctorNotFound(i64),

    #[error("Appointment {0} not found")]
    AppointmentNotFound(i64),

    #[error("Patient {0} not found and no new patient details were supplied")]
    PatientNotFound(i64),

    #[error("New patient details are required when no patient id is given")]
    MissingPatientDetails,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Store failure: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment {0} not found")]
    NotFound(i64),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Store failure: {0}")]
    Store(#[from] StoreError),
}
