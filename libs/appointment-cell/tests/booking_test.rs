use std::sync::Arc;
use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::NaiveDate;

use appointment_cell::models::{BookingError, BookingOutcome, BookingRequest, NewPatientDetails};
use appointment_cell::services::BookingEngine;
use shared_database::{
    ClinicStore, LockKey, Relation, StoreError, StoreResult, StoreTransaction,
};
use shared_models::{
    Appointment, AppointmentStatus, Doctor, DoctorAppointmentLink, DoctorPatientCount,
    DoctorStatusCount, NewAppointment, NewDoctor, NewPatient, Patient,
};
use shared_utils::test_utils::{date, ClinicFixture};

fn request(patient_id: Option<i64>, doctor_id: i64, appointment_id: i64) -> BookingRequest {
    BookingRequest {
        patient_id,
        doctor_id,
        appointment_id,
        new_patient: None,
    }
}

fn details(name: &str) -> NewPatientDetails {
    NewPatientDetails {
        name: name.to_string(),
        gender: "M".to_string(),
        age: 33,
        address: "9 Birch Road".to_string(),
    }
}

/// D1, D2, P1 (count 2) and A1 in the given status.
async fn hospital(a1_status: AppointmentStatus) -> ClinicFixture {
    let fixture = ClinicFixture::new();
    fixture.doctor(1, "Dr. Okafor", "Cardiology", 0).await;
    fixture.doctor(2, "Dr. Lindqvist", "Neurology", 1).await;
    fixture.patient(1, "Priya Nair", 2).await;
    fixture.appointment(1, date(2024, 6, 3), a1_status).await;
    fixture
}

#[tokio::test]
async fn test_available_appointment_is_claimed() {
    let fixture = hospital(AppointmentStatus::Available).await;
    let store = fixture.shared_store();
    let engine = BookingEngine::with_store(Arc::clone(&store));

    let receipt = engine.book(request(Some(1), 1, 1)).await.unwrap();

    assert_eq!(receipt.outcome, BookingOutcome::Claimed);
    assert_eq!(receipt.previous_status, AppointmentStatus::Available);
    assert_eq!(receipt.resulting_status, AppointmentStatus::Active);
    assert!(receipt.link_created);
    assert!(!receipt.patient_created);
    assert_eq!(receipt.patient_appointment_count, 3);

    let appointment = store.appointment(1).await.unwrap().unwrap();
    assert_eq!(appointment.status, AppointmentStatus::Active);
    assert_eq!(
        store.links_for_appointment(1).await.unwrap(),
        vec![DoctorAppointmentLink { appointment_id: 1, doctor_id: 1 }]
    );
    assert_eq!(store.patient(1).await.unwrap().unwrap().appointment_count, 3);
}

#[tokio::test]
async fn test_second_booking_on_active_appointment_is_waitlisted() {
    let fixture = hospital(AppointmentStatus::Available).await;
    let store = fixture.shared_store();
    let engine = BookingEngine::with_store(Arc::clone(&store));

    engine.book(request(Some(1), 1, 1)).await.unwrap();
    let receipt = engine.book(request(Some(1), 2, 1)).await.unwrap();

    assert_eq!(receipt.outcome, BookingOutcome::Waitlisted);
    assert_eq!(receipt.message, "Appointment is Active. Added to waitlist!");
    assert_eq!(
        store.appointment(1).await.unwrap().unwrap().status,
        AppointmentStatus::Waitlisted
    );

    let links = store.links_for_appointment(1).await.unwrap();
    assert_eq!(links.len(), 2);
    assert!(links.contains(&DoctorAppointmentLink { appointment_id: 1, doctor_id: 1 }));
    assert!(links.contains(&DoctorAppointmentLink { appointment_id: 1, doctor_id: 2 }));
    assert_eq!(store.patient(1).await.unwrap().unwrap().appointment_count, 4);
}

#[tokio::test]
async fn test_waitlisting_does_not_duplicate_existing_link() {
    let fixture = hospital(AppointmentStatus::Active).await;
    fixture.link(1, 1).await;
    let store = fixture.shared_store();
    let engine = BookingEngine::with_store(Arc::clone(&store));

    let receipt = engine.book(request(Some(1), 1, 1)).await.unwrap();

    assert_eq!(receipt.outcome, BookingOutcome::Waitlisted);
    assert!(!receipt.link_created);
    assert_eq!(store.links_for_appointment(1).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_new_patient_on_past_appointment_is_saved_with_zero_count() {
    let fixture = hospital(AppointmentStatus::Past).await;
    let store = fixture.shared_store();
    let engine = BookingEngine::with_store(Arc::clone(&store));

    let mut booking = request(Some(42), 1, 1);
    booking.new_patient = Some(details("Tomás Ortega"));
    let receipt = engine.book(booking).await.unwrap();

    assert_eq!(receipt.outcome, BookingOutcome::RejectedPast);
    assert!(receipt.patient_created);

    let patient = store.patient(42).await.unwrap().unwrap();
    assert_eq!(patient.name, "Tomás Ortega");
    assert_eq!(patient.appointment_count, 0);

    assert_eq!(
        store.appointment(1).await.unwrap().unwrap().status,
        AppointmentStatus::Past
    );
    assert!(store.links_for_appointment(1).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_new_patient_on_available_appointment_is_saved_with_one_booking() {
    let fixture = hospital(AppointmentStatus::Available).await;
    let store = fixture.shared_store();
    let engine = BookingEngine::with_store(Arc::clone(&store));

    let mut booking = request(Some(7), 1, 1);
    booking.new_patient = Some(details("Grace Mensah"));
    let receipt = engine.book(booking).await.unwrap();

    assert_eq!(receipt.outcome, BookingOutcome::Claimed);
    assert_eq!(receipt.patient_appointment_count, 1);
    assert_eq!(store.patient(7).await.unwrap().unwrap().appointment_count, 1);
}

#[tokio::test]
async fn test_patient_id_is_allocated_when_not_supplied() {
    let fixture = hospital(AppointmentStatus::Available).await;
    let store = fixture.shared_store();
    let engine = BookingEngine::with_store(Arc::clone(&store));

    let mut booking = request(None, 1, 1);
    booking.new_patient = Some(details("Hana Sato"));
    let receipt = engine.book(booking).await.unwrap();

    // Patient 1 came from the fixture, so the sequence continues past it.
    assert_eq!(receipt.patient_id, 2);
    assert!(receipt.patient_created);
    assert_eq!(store.patient(2).await.unwrap().unwrap().name, "Hana Sato");
}

#[tokio::test]
async fn test_rejected_bookings_write_nothing() {
    for status in [AppointmentStatus::Past, AppointmentStatus::Waitlisted] {
        let fixture = hospital(status.clone()).await;
        let store = fixture.shared_store();
        let engine = BookingEngine::with_store(Arc::clone(&store));

        let receipt = engine.book(request(Some(1), 1, 1)).await.unwrap();

        assert!(!receipt.outcome.is_success());
        assert_eq!(receipt.resulting_status, status);
        assert_eq!(store.appointment(1).await.unwrap().unwrap().status, status);
        assert!(store.links_for_appointment(1).await.unwrap().is_empty());
        assert_eq!(store.patient(1).await.unwrap().unwrap().appointment_count, 2);
    }
}

#[tokio::test]
async fn test_already_waitlisted_outcome() {
    let fixture = hospital(AppointmentStatus::Waitlisted).await;
    let engine = BookingEngine::with_store(fixture.shared_store());

    let receipt = engine.book(request(Some(1), 2, 1)).await.unwrap();

    assert_eq!(receipt.outcome, BookingOutcome::RejectedAlreadyWaitlisted);
    assert_eq!(receipt.message, "Appointment is Waitlisted. Unable to book!");
}

#[tokio::test]
async fn test_unrecognized_status_is_reported_without_writes() {
    let fixture = hospital(AppointmentStatus::from("XX")).await;
    let store = fixture.shared_store();
    let engine = BookingEngine::with_store(Arc::clone(&store));

    let receipt = engine.book(request(Some(1), 1, 1)).await.unwrap();

    assert_eq!(receipt.outcome, BookingOutcome::InvalidStatus("XX".to_string()));
    assert_eq!(receipt.message, "Status: XX is incorrect");
    assert!(store.links_for_appointment(1).await.unwrap().is_empty());
    assert_eq!(store.patient(1).await.unwrap().unwrap().appointment_count, 2);
}

#[tokio::test]
async fn test_count_grows_once_per_successful_booking() {
    let fixture = hospital(AppointmentStatus::Available).await;
    fixture.appointment(2, date(2024, 6, 4), AppointmentStatus::Available).await;
    fixture.appointment(3, date(2024, 6, 5), AppointmentStatus::Active).await;
    fixture.appointment(4, date(2024, 6, 6), AppointmentStatus::Past).await;
    let store = fixture.shared_store();
    let engine = BookingEngine::with_store(Arc::clone(&store));

    let mut successes = 0;
    for appointment_id in 1..=4 {
        let receipt = engine.book(request(Some(1), 1, appointment_id)).await.unwrap();
        if receipt.outcome.is_success() {
            successes += 1;
        }
    }

    assert_eq!(successes, 3);
    assert_eq!(
        store.patient(1).await.unwrap().unwrap().appointment_count,
        2 + successes
    );
}

#[tokio::test]
async fn test_unknown_doctor_or_appointment_writes_nothing() {
    let fixture = hospital(AppointmentStatus::Available).await;
    let store = fixture.shared_store();
    let engine = BookingEngine::with_store(Arc::clone(&store));

    let mut unknown_doctor = request(Some(50), 99, 1);
    unknown_doctor.new_patient = Some(details("Ivan Petrov"));
    assert_matches!(
        engine.book(unknown_doctor).await,
        Err(BookingError::DoctorNotFound(99))
    );

    let mut unknown_appointment = request(Some(50), 1, 99);
    unknown_appointment.new_patient = Some(details("Ivan Petrov"));
    assert_matches!(
        engine.book(unknown_appointment).await,
        Err(BookingError::AppointmentNotFound(99))
    );

    assert!(store.patient(50).await.unwrap().is_none());
    assert_eq!(
        store.appointment(1).await.unwrap().unwrap().status,
        AppointmentStatus::Available
    );
}

#[tokio::test]
async fn test_missing_patient_requires_details() {
    let fixture = hospital(AppointmentStatus::Available).await;
    let engine = BookingEngine::with_store(fixture.shared_store());

    assert_matches!(
        engine.book(request(Some(77), 1, 1)).await,
        Err(BookingError::PatientNotFound(77))
    );
    assert_matches!(
        engine.book(request(None, 1, 1)).await,
        Err(BookingError::MissingPatientDetails)
    );

    let mut invalid = request(None, 1, 1);
    invalid.new_patient = Some(NewPatientDetails {
        age: -4,
        ..details("Noor Haddad")
    });
    assert_matches!(engine.book(invalid).await, Err(BookingError::ValidationError(_)));
}

#[tokio::test]
async fn test_unused_details_for_existing_patient_are_ignored() {
    let fixture = hospital(AppointmentStatus::Available).await;
    let store = fixture.shared_store();
    let engine = BookingEngine::with_store(Arc::clone(&store));

    let mut booking = request(Some(1), 1, 1);
    booking.new_patient = Some(NewPatientDetails {
        name: "".to_string(),
        age: 900,
        ..details("Stray Details")
    });
    let receipt = engine.book(booking).await.unwrap();

    assert_eq!(receipt.outcome, BookingOutcome::Claimed);
    assert!(!receipt.patient_created);
    assert_eq!(store.patient(1).await.unwrap().unwrap().name, "Priya Nair");
}

#[tokio::test]
async fn test_invalid_details_for_unknown_patient_write_nothing() {
    let fixture = hospital(AppointmentStatus::Available).await;
    let store = fixture.shared_store();
    let engine = BookingEngine::with_store(Arc::clone(&store));

    let mut booking = request(Some(60), 1, 1);
    booking.new_patient = Some(NewPatientDetails {
        age: 900,
        ..details("Noor Haddad")
    });
    assert_matches!(engine.book(booking).await, Err(BookingError::ValidationError(_)));

    assert!(store.patient(60).await.unwrap().is_none());
    assert_eq!(
        store.appointment(1).await.unwrap().unwrap().status,
        AppointmentStatus::Available
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_claims_yield_one_claim_and_one_waitlist() {
    let fixture = hospital(AppointmentStatus::Available).await;
    let store = fixture.shared_store();
    let engine = Arc::new(BookingEngine::with_store(Arc::clone(&store)));

    let first = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.book(request(Some(1), 1, 1)).await })
    };
    let second = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.book(request(Some(1), 2, 1)).await })
    };

    let outcomes = vec![
        first.await.unwrap().unwrap().outcome,
        second.await.unwrap().unwrap().outcome,
    ];

    assert_eq!(outcomes.iter().filter(|o| **o == BookingOutcome::Claimed).count(), 1);
    assert_eq!(outcomes.iter().filter(|o| **o == BookingOutcome::Waitlisted).count(), 1);
    assert_eq!(store.patient(1).await.unwrap().unwrap().appointment_count, 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_concurrent_bookings_follow_the_state_machine() {
    let fixture = hospital(AppointmentStatus::Available).await;
    let store = fixture.shared_store();
    let engine = Arc::new(BookingEngine::with_store(Arc::clone(&store)));

    let attempts = (0..10).map(|i| {
        let engine = Arc::clone(&engine);
        let doctor_id = if i % 2 == 0 { 1 } else { 2 };
        async move { engine.book(request(Some(1), doctor_id, 1)).await }
    });
    let receipts: Vec<_> = futures::future::join_all(attempts)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    let count = |outcome: BookingOutcome| receipts.iter().filter(|r| r.outcome == outcome).count();
    assert_eq!(count(BookingOutcome::Claimed), 1);
    assert_eq!(count(BookingOutcome::Waitlisted), 1);
    assert_eq!(count(BookingOutcome::RejectedAlreadyWaitlisted), 8);

    assert_eq!(store.patient(1).await.unwrap().unwrap().appointment_count, 4);

    // Lock waiters are served in arrival order, so the waitlist goes to the
    // doctor after the claiming one. Each of them is linked exactly once.
    let doctor_of = |outcome: BookingOutcome| {
        receipts
            .iter()
            .find(|r| r.outcome == outcome)
            .map(|r| r.doctor_id)
            .unwrap()
    };
    let claimed_by = doctor_of(BookingOutcome::Claimed);
    let waitlisted_by = doctor_of(BookingOutcome::Waitlisted);
    assert_ne!(claimed_by, waitlisted_by);

    let links = store.links_for_appointment(1).await.unwrap();
    assert_eq!(links.len(), 2);
    assert!(links.contains(&DoctorAppointmentLink { appointment_id: 1, doctor_id: claimed_by }));
    assert!(links.contains(&DoctorAppointmentLink { appointment_id: 1, doctor_id: waitlisted_by }));
}

// ==============================================================================
// STORE FAILURE
// ==============================================================================

/// Delegates to an in-memory store but fails every patient count increment.
struct FailingStore {
    inner: Arc<dyn ClinicStore>,
}

struct FailingTransaction {
    inner: Box<dyn StoreTransaction>,
}

#[async_trait]
impl StoreTransaction for FailingTransaction {
    async fn find_doctor(&mut self, id: i64) -> StoreResult<Option<Doctor>> {
        self.inner.find_doctor(id).await
    }

    async fn find_appointment(&mut self, id: i64) -> StoreResult<Option<Appointment>> {
        self.inner.find_appointment(id).await
    }

    async fn find_patient(&mut self, id: i64) -> StoreResult<Option<Patient>> {
        self.inner.find_patient(id).await
    }

    async fn find_matching_doctor(&mut self, fields: &NewDoctor) -> StoreResult<Option<Doctor>> {
        self.inner.find_matching_doctor(fields).await
    }

    async fn find_matching_patient(&mut self, fields: &NewPatient) -> StoreResult<Option<Patient>> {
        self.inner.find_matching_patient(fields).await
    }

    async fn find_matching_appointment(
        &mut self,
        fields: &NewAppointment,
    ) -> StoreResult<Option<Appointment>> {
        self.inner.find_matching_appointment(fields).await
    }

    async fn next_id(&mut self, relation: Relation) -> StoreResult<i64> {
        self.inner.next_id(relation).await
    }

    async fn update_appointment_status(
        &mut self,
        appointment_id: i64,
        status: &AppointmentStatus,
    ) -> StoreResult<()> {
        self.inner.update_appointment_status(appointment_id, status).await
    }

    async fn insert_link(&mut self, link: DoctorAppointmentLink) -> StoreResult<bool> {
        self.inner.insert_link(link).await
    }

    async fn increment_patient_count(&mut self, _patient_id: i64) -> StoreResult<()> {
        Err(StoreError::Unavailable("connection reset".to_string()))
    }

    async fn insert_patient(&mut self, patient: &Patient) -> StoreResult<()> {
        self.inner.insert_patient(patient).await
    }

    async fn insert_doctor(&mut self, doctor: &Doctor) -> StoreResult<()> {
        self.inner.insert_doctor(doctor).await
    }

    async fn insert_appointment(&mut self, appointment: &Appointment) -> StoreResult<()> {
        self.inner.insert_appointment(appointment).await
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.inner.commit().await
    }
}

#[async_trait]
impl ClinicStore for FailingStore {
    async fn begin(&self, scope: &[LockKey]) -> StoreResult<Box<dyn StoreTransaction>> {
        Ok(Box::new(FailingTransaction {
            inner: self.inner.begin(scope).await?,
        }))
    }

    async fn doctor(&self, id: i64) -> StoreResult<Option<Doctor>> {
        self.inner.doctor(id).await
    }

    async fn patient(&self, id: i64) -> StoreResult<Option<Patient>> {
        self.inner.patient(id).await
    }

    async fn appointment(&self, id: i64) -> StoreResult<Option<Appointment>> {
        self.inner.appointment(id).await
    }

    async fn links_for_appointment(
        &self,
        appointment_id: i64,
    ) -> StoreResult<Vec<DoctorAppointmentLink>> {
        self.inner.links_for_appointment(appointment_id).await
    }

    async fn doctor_appointments(
        &self,
        doctor_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StoreResult<Vec<Appointment>> {
        self.inner.doctor_appointments(doctor_id, from, to).await
    }

    async fn department_available(
        &self,
        department_name: &str,
        on: NaiveDate,
    ) -> StoreResult<Vec<Appointment>> {
        self.inner.department_available(department_name, on).await
    }

    async fn status_counts_per_doctor(&self) -> StoreResult<Vec<DoctorStatusCount>> {
        self.inner.status_counts_per_doctor().await
    }

    async fn patients_per_doctor_with_status(
        &self,
        status: &AppointmentStatus,
    ) -> StoreResult<Vec<DoctorPatientCount>> {
        self.inner.patients_per_doctor_with_status(status).await
    }
}

#[tokio::test]
async fn test_store_failure_rolls_back_the_whole_attempt() {
    let fixture = hospital(AppointmentStatus::Available).await;
    let store: Arc<dyn ClinicStore> = Arc::new(FailingStore {
        inner: fixture.shared_store(),
    });
    let engine = BookingEngine::with_store(Arc::clone(&store));

    let result = engine.book(request(Some(1), 1, 1)).await;
    assert_matches!(result, Err(BookingError::Store(StoreError::Unavailable(_))));

    assert_eq!(
        store.appointment(1).await.unwrap().unwrap().status,
        AppointmentStatus::Available
    );
    assert!(store.links_for_appointment(1).await.unwrap().is_empty());
    assert_eq!(store.patient(1).await.unwrap().unwrap().appointment_count, 2);

    // The lock was released by the rollback, so the next attempt proceeds.
    let healthy = BookingEngine::with_store(fixture.shared_store());
    let receipt = healthy.book(request(Some(1), 1, 1)).await.unwrap();
    assert_eq!(receipt.outcome, BookingOutcome::Claimed);
}
