use std::sync::Arc;
use tracing::{debug, info};

use shared_database::{AppState, ClinicStore, LockKey, Relation};
use shared_models::{Doctor, NewDoctor, RecordCreation};

use crate::models::DoctorError;

pub struct DoctorService {
    store: Arc<dyn ClinicStore>,
}

impl DoctorService {
    pub fn new(state: &AppState) -> Self {
        Self::with_store(Arc::clone(&state.store))
    }

    pub fn with_store(store: Arc<dyn ClinicStore>) -> Self {
        Self { store }
    }

    /// Insert the doctor unless one with the same name, specialty and
    /// department is already on file.
    pub async fn add_doctor(&self, request: NewDoctor) -> Result<RecordCreation<Doctor>, DoctorError> {
        request.validate().map_err(DoctorError::ValidationError)?;
        debug!("Adding doctor: {} ({})", request.name, request.specialty);

        let mut tx = self
            .store
            .begin(&[LockKey::Relation(Relation::Doctor)])
            .await?;

        if let Some(existing) = tx.find_matching_doctor(&request).await? {
            info!("Doctor already exists with id {}", existing.id);
            return Ok(RecordCreation::AlreadyExists(existing));
        }

        let id = tx.next_id(Relation::Doctor).await?;
        let doctor = request.into_doctor(id);
        tx.insert_doctor(&doctor).await?;
        tx.commit().await?;

        info!("Added doctor {}: {}", doctor.id, doctor.name);
        Ok(RecordCreation::Created(doctor))
    }

    pub async fn get_doctor(&self, doctor_id: i64) -> Result<Doctor, DoctorError> {
        debug!("Fetching doctor: {}", doctor_id);

        self.store
            .doctor(doctor_id)
            .await?
            .ok_or(DoctorError::NotFound(doctor_id))
    }
}
