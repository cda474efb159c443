// libs/shared/models/src/clinic.rs
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

// ==============================================================================
// RECORDS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Doctor {
    pub id: i64,
    pub name: String,
    pub specialty: String,
    pub department_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patient {
    pub id: i64,
    pub name: String,
    pub gender: String,
    pub age: i32,
    pub address: String,
    pub appointment_count: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: i64,
    pub date: NaiveDate,
    pub time_slot: String,
    pub status: AppointmentStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
    pub id: i64,
    pub name: String,
}

/// Which doctor an appointment was booked through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DoctorAppointmentLink {
    pub appointment_id: i64,
    pub doctor_id: i64,
}

/// Which department offers an appointment slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DepartmentSlot {
    pub appointment_id: i64,
    pub department_id: i64,
}

// ==============================================================================
// NATURAL KEYS (field values used for dedup-by-content inserts)
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDoctor {
    pub name: String,
    pub specialty: String,
    pub department_id: i64,
}

impl NewDoctor {
    pub fn into_doctor(self, id: i64) -> Doctor {
        Doctor {
            id,
            name: self.name,
            specialty: self.specialty,
            department_id: self.department_id,
        }
    }

    pub fn matches(&self, doctor: &Doctor) -> bool {
        doctor.name == self.name
            && doctor.specialty == self.specialty
            && doctor.department_id == self.department_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPatient {
    pub name: String,
    pub gender: String,
    pub age: i32,
    pub address: String,
    #[serde(default)]
    pub appointment_count: i32,
}

impl NewPatient {
    pub fn into_patient(self, id: i64) -> Patient {
        Patient {
            id,
            name: self.name,
            gender: self.gender,
            age: self.age,
            address: self.address,
            appointment_count: self.appointment_count,
        }
    }

    pub fn matches(&self, patient: &Patient) -> bool {
        patient.name == self.name
            && patient.gender == self.gender
            && patient.age == self.age
            && patient.address == self.address
            && patient.appointment_count == self.appointment_count
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAppointment {
    pub date: NaiveDate,
    pub time_slot: String,
    pub status: AppointmentStatus,
}

impl NewAppointment {
    pub fn into_appointment(self, id: i64) -> Appointment {
        Appointment {
            id,
            date: self.date,
            time_slot: self.time_slot,
            status: self.status,
        }
    }

    pub fn matches(&self, appointment: &Appointment) -> bool {
        appointment.date == self.date
            && appointment.time_slot == self.time_slot
            && appointment.status == self.status
    }
}

// ==============================================================================
// VALIDATION
// ==============================================================================

fn require_text(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{} must not be empty", field));
    }
    Ok(())
}

impl NewDoctor {
    pub fn validate(&self) -> Result<(), String> {
        require_text("name", &self.name)?;
        require_text("specialty", &self.specialty)?;
        if self.department_id < 0 {
            return Err("department_id must not be negative".to_string());
        }
        Ok(())
    }
}

impl NewPatient {
    pub fn validate(&self) -> Result<(), String> {
        require_text("name", &self.name)?;
        require_text("gender", &self.gender)?;
        require_text("address", &self.address)?;
        if !(0..=150).contains(&self.age) {
            return Err(format!("age {} is outside 0..=150", self.age));
        }
        if self.appointment_count < 0 {
            return Err("appointment_count must not be negative".to_string());
        }
        Ok(())
    }
}

impl NewAppointment {
    pub fn validate(&self) -> Result<(), String> {
        require_text("time_slot", &self.time_slot)?;
        if !self.status.is_known() {
            return Err(format!("status '{}' is not one of AV, AC, WL, PA", self.status));
        }
        Ok(())
    }
}

/// Result of a dedup-by-content insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "record", rename_all = "snake_case")]
pub enum RecordCreation<T> {
    Created(T),
    AlreadyExists(T),
}

impl<T> RecordCreation<T> {
    pub fn was_created(&self) -> bool {
        matches!(self, RecordCreation::Created(_))
    }

    pub fn record(&self) -> &T {
        match self {
            RecordCreation::Created(record) | RecordCreation::AlreadyExists(record) => record,
        }
    }

    pub fn into_record(self) -> T {
        match self {
            RecordCreation::Created(record) | RecordCreation::AlreadyExists(record) => record,
        }
    }
}

// ==============================================================================
// APPOINTMENT STATUS
// ==============================================================================

/// Stored as the two letter codes `AV`, `AC`, `WL` and `PA`.
///
/// Rows written by other tools may carry anything in the status column, so
/// values outside the known set are kept verbatim in `Unrecognized` instead of
/// failing to decode.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AppointmentStatus {
    Available,
    Active,
    Waitlisted,
    Past,
    Unrecognized(String),
}

impl AppointmentStatus {
    pub fn code(&self) -> &str {
        match self {
            AppointmentStatus::Available => "AV",
            AppointmentStatus::Active => "AC",
            AppointmentStatus::Waitlisted => "WL",
            AppointmentStatus::Past => "PA",
            AppointmentStatus::Unrecognized(raw) => raw,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            AppointmentStatus::Available => "Available",
            AppointmentStatus::Active => "Active",
            AppointmentStatus::Waitlisted => "Waitlisted",
            AppointmentStatus::Past => "Past",
            AppointmentStatus::Unrecognized(raw) => raw,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, AppointmentStatus::Unrecognized(_))
    }
}

impl From<&str> for AppointmentStatus {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "AV" | "AVAILABLE" => AppointmentStatus::Available,
            "AC" | "ACTIVE" => AppointmentStatus::Active,
            "WL" | "WAITLISTED" | "WAITLIST" => AppointmentStatus::Waitlisted,
            "PA" | "PAST" => AppointmentStatus::Past,
            _ => AppointmentStatus::Unrecognized(value.to_string()),
        }
    }
}

impl From<String> for AppointmentStatus {
    fn from(value: String) -> Self {
        AppointmentStatus::from(value.as_str())
    }
}

impl From<AppointmentStatus> for String {
    fn from(status: AppointmentStatus) -> Self {
        match status {
            AppointmentStatus::Unrecognized(raw) => raw,
            known => known.code().to_string(),
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ==============================================================================
// REPORT ROWS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoctorStatusCount {
    pub doctor_name: String,
    pub status: AppointmentStatus,
    pub appointment_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoctorPatientCount {
    pub doctor_name: String,
    pub patient_count: i64,
}
