use std::sync::Arc;
use tracing::{debug, info};

use shared_database::{AppState, ClinicStore, LockKey, Relation};
use shared_models::{NewPatient, Patient, RecordCreation};

use crate::models::PatientError;

pub struct PatientService {
    store: Arc<dyn ClinicStore>,
}

impl PatientService {
    pub fn new(state: &AppState) -> Self {
        Self::with_store(Arc::clone(&state.store))
    }

    pub fn with_store(store: Arc<dyn ClinicStore>) -> Self {
        Self { store }
    }

    /// Register a patient. An identical record already on file is returned
    /// as-is and nothing is written.
    pub async fn add_patient(&self, request: NewPatient) -> Result<RecordCreation<Patient>, PatientError> {
        request.validate().map_err(PatientError::ValidationError)?;
        debug!("Adding patient: {}", request.name);

        let mut tx = self
            .store
            .begin(&[LockKey::Relation(Relation::Patient)])
            .await?;

        if let Some(existing) = tx.find_matching_patient(&request).await? {
            info!("Patient already exists with id {}", existing.id);
            return Ok(RecordCreation::AlreadyExists(existing));
        }

        let id = tx.next_id(Relation::Patient).await?;
        let patient = request.into_patient(id);
        tx.insert_patient(&patient).await?;
        tx.commit().await?;

        info!(
            "Added patient {} with {} appointment(s)",
            patient.id, patient.appointment_count
        );
        Ok(RecordCreation::Created(patient))
    }

    pub async fn get_patient(&self, patient_id: i64) -> Result<Patient, PatientError> {
        debug!("Fetching patient: {}", patient_id);

        self.store
            .patient(patient_id)
            .await?
            .ok_or(PatientError::NotFound(patient_id))
    }
}
