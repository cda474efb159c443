use std::sync::Arc;
use tracing::{debug, info};

use shared_database::{AppState, ClinicStore, LockKey, Relation};
use shared_models::{Appointment, DoctorAppointmentLink, NewAppointment, RecordCreation};

use crate::models::AppointmentError;

pub struct AppointmentService {
    store: Arc<dyn ClinicStore>,
}

impl AppointmentService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: Arc::clone(&state.store),
        }
    }

    /// Insert the slot unless one with the same date, time slot and status exists.
    pub async fn add_appointment(
        &self,
        request: NewAppointment,
    ) -> Result<RecordCreation<Appointment>, AppointmentError> {
        request.validate().map_err(AppointmentError::ValidationError)?;
        debug!("Adding appointment on {} at {}", request.date, request.time_slot);

        let mut tx = self
            .store
            .begin(&[LockKey::Relation(Relation::Appointment)])
            .await?;

        if let Some(existing) = tx.find_matching_appointment(&request).await? {
            info!("Appointment already exists with id {}", existing.id);
            return Ok(RecordCreation::AlreadyExists(existing));
        }

        let id = tx.next_id(Relation::Appointment).await?;
        let appointment = request.into_appointment(id);
        tx.insert_appointment(&appointment).await?;
        tx.commit().await?;

        info!("Added appointment {} ({})", appointment.id, appointment.status);
        Ok(RecordCreation::Created(appointment))
    }

    pub async fn get_appointment(&self, appointment_id: i64) -> Result<Appointment, AppointmentError> {
        debug!("Fetching appointment: {}", appointment_id);

        self.store
            .appointment(appointment_id)
            .await?
            .ok_or(AppointmentError::NotFound(appointment_id))
    }

    pub async fn get_links(
        &self,
        appointment_id: i64,
    ) -> Result<Vec<DoctorAppointmentLink>, AppointmentError> {
        Ok(self.store.links_for_appointment(appointment_id).await?)
    }
}
