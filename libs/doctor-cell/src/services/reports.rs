use std::sync::Arc;
use chrono::NaiveDate;
use tracing::debug;

use shared_database::{AppState, ClinicStore};
use shared_models::{AppointmentStatus, DoctorPatientCount, DoctorStatusCount};

use crate::models::{DepartmentAvailability, DoctorError, DoctorSchedule};

/// Read-only views over committed data.
pub struct ReportService {
    store: Arc<dyn ClinicStore>,
}

impl ReportService {
    pub fn new(state: &AppState) -> Self {
        Self::with_store(Arc::clone(&state.store))
    }

    pub fn with_store(store: Arc<dyn ClinicStore>) -> Self {
        Self { store }
    }

    /// Active or Available appointments linked to the doctor within
    /// `[from, to]`, ordered by date then id.
    pub async fn doctor_appointments(
        &self,
        doctor_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<DoctorSchedule, DoctorError> {
        if from > to {
            return Err(DoctorError::ValidationError(format!(
                "range start {} is after range end {}",
                from, to
            )));
        }

        let doctor = self
            .store
            .doctor(doctor_id)
            .await?
            .ok_or(DoctorError::NotFound(doctor_id))?;

        let appointments = self.store.doctor_appointments(doctor_id, from, to).await?;
        debug!(
            "Doctor {} has {} appointments between {} and {}",
            doctor_id,
            appointments.len(),
            from,
            to
        );

        Ok(DoctorSchedule {
            doctor_id,
            doctor_name: doctor.name,
            from,
            to,
            appointments,
        })
    }

    /// An unknown department offers nothing.
    pub async fn available_in_department(
        &self,
        department_name: &str,
        date: NaiveDate,
    ) -> Result<DepartmentAvailability, DoctorError> {
        let appointments = self.store.department_available(department_name, date).await?;
        debug!(
            "Department {} has {} available appointments on {}",
            department_name,
            appointments.len(),
            date
        );

        Ok(DepartmentAvailability {
            department_name: department_name.to_string(),
            date,
            appointments,
        })
    }

    pub async fn status_counts_per_doctor(&self) -> Result<Vec<DoctorStatusCount>, DoctorError> {
        Ok(self.store.status_counts_per_doctor().await?)
    }

    pub async fn patients_per_doctor_with_status(
        &self,
        status: &AppointmentStatus,
    ) -> Result<Vec<DoctorPatientCount>, DoctorError> {
        Ok(self.store.patients_per_doctor_with_status(status).await?)
    }
}
