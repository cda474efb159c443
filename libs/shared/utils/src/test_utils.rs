use std::sync::Arc;
use chrono::NaiveDate;
use serde_json::json;

use shared_config::{AppConfig, StoreBackend};
use shared_database::{AppState, ClinicStore, InMemoryStore};
use shared_models::{
    Appointment, AppointmentStatus, Department, DepartmentSlot, Doctor, DoctorAppointmentLink,
    Patient,
};

pub struct TestConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
        }
    }
}

impl TestConfig {
    pub fn with_url(url: &str) -> Self {
        Self {
            supabase_url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            store_backend: StoreBackend::Supabase,
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            bind_address: "127.0.0.1:0".to_string(),
        }
    }
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid calendar date")
}

/// In-memory hospital seeded row by row with explicit ids.
#[derive(Clone, Default)]
pub struct ClinicFixture {
    pub store: InMemoryStore,
}

impl ClinicFixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared_store(&self) -> Arc<dyn ClinicStore> {
        Arc::new(self.store.clone())
    }

    pub fn state(&self) -> Arc<AppState> {
        Arc::new(AppState::new(AppConfig::in_memory(), self.shared_store()))
    }

    pub async fn doctor(&self, id: i64, name: &str, specialty: &str, department_id: i64) -> Doctor {
        let doctor = Doctor {
            id,
            name: name.to_string(),
            specialty: specialty.to_string(),
            department_id,
        };
        let mut tx = self.store.begin(&[]).await.expect("begin fixture transaction");
        tx.insert_doctor(&doctor).await.expect("insert fixture doctor");
        tx.commit().await.expect("commit fixture doctor");
        doctor
    }

    pub async fn patient(&self, id: i64, name: &str, appointment_count: i32) -> Patient {
        let patient = Patient {
            id,
            name: name.to_string(),
            gender: "F".to_string(),
            age: 40,
            address: "12 Elm Street".to_string(),
            appointment_count,
        };
        let mut tx = self.store.begin(&[]).await.expect("begin fixture transaction");
        tx.insert_patient(&patient).await.expect("insert fixture patient");
        tx.commit().await.expect("commit fixture patient");
        patient
    }

    pub async fn appointment(&self, id: i64, on: NaiveDate, status: AppointmentStatus) -> Appointment {
        let appointment = Appointment {
            id,
            date: on,
            time_slot: "8:00-9:00".to_string(),
            status,
        };
        let mut tx = self.store.begin(&[]).await.expect("begin fixture transaction");
        tx.insert_appointment(&appointment)
            .await
            .expect("insert fixture appointment");
        tx.commit().await.expect("commit fixture appointment");
        appointment
    }

    pub async fn link(&self, appointment_id: i64, doctor_id: i64) {
        let mut tx = self.store.begin(&[]).await.expect("begin fixture transaction");
        tx.insert_link(DoctorAppointmentLink {
            appointment_id,
            doctor_id,
        })
        .await
        .expect("insert fixture link");
        tx.commit().await.expect("commit fixture link");
    }

    pub async fn department(&self, name: &str) -> Department {
        self.store.add_department(name).await
    }

    pub async fn offer(&self, appointment_id: i64, department_id: i64) {
        self.store
            .offer_in_department(DepartmentSlot {
                appointment_id,
                department_id,
            })
            .await;
    }
}

/// PostgREST rows as the hospital schema returns them.
pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn doctor_row(id: i64, name: &str, specialty: &str, department_id: i64) -> serde_json::Value {
        json!({
            "id": id,
            "name": name,
            "specialty": specialty,
            "department_id": department_id
        })
    }

    pub fn patient_row(id: i64, name: &str, appointment_count: i32) -> serde_json::Value {
        json!({
            "id": id,
            "name": name,
            "gender": "M",
            "age": 52,
            "address": "4 Harbour Road",
            "appointment_count": appointment_count
        })
    }

    pub fn appointment_row(id: i64, on: &str, status: &str) -> serde_json::Value {
        json!({
            "id": id,
            "date": on,
            "time_slot": "10:00-11:00",
            "status": status
        })
    }

    pub fn link_row(appointment_id: i64, doctor_id: i64) -> serde_json::Value {
        json!({
            "appointment_id": appointment_id,
            "doctor_id": doctor_id
        })
    }

    pub fn error_response(message: &str, code: &str) -> serde_json::Value {
        json!({
            "message": message,
            "code": code
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_creation() {
        let config = TestConfig::default().to_app_config();

        assert_eq!(config.supabase_url, "http://localhost:54321");
        assert_eq!(config.supabase_anon_key, "test-anon-key");
        assert!(config.is_configured());
    }

    #[tokio::test]
    async fn fixture_rows_are_committed() {
        let fixture = ClinicFixture::new();
        fixture.doctor(1, "Dr. Rivera", "Cardiology", 0).await;
        fixture
            .appointment(4, date(2024, 5, 2), AppointmentStatus::Available)
            .await;
        fixture.link(4, 1).await;

        let store = fixture.shared_store();
        assert!(store.doctor(1).await.unwrap().is_some());
        assert_eq!(store.links_for_appointment(4).await.unwrap().len(), 1);
    }
}
