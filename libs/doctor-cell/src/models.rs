use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use shared_database::StoreError;
use shared_models::{Appointment, AppointmentStatus};

// ==============================================================================
// QUERY PARAMETERS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct DateRangeQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusQuery {
    pub status: AppointmentStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DateQuery {
    pub date: NaiveDate,
}

// ==============================================================================
// REPORT RESPONSES
// ==============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct DoctorSchedule {
    pub doctor_id: i64,
    pub doctor_name: String,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub appointments: Vec<Appointment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DepartmentAvailability {
    pub department_name: String,
    pub date: NaiveDate,
    pub appointments: Vec<Appointment>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum DoctorError {
    #[error("Doctor {0} not found")]
    NotFound(i64),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Store failure: {0}")]
    Store(#[from] StoreError),
}
