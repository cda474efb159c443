// libs/shared/database/src/memory.rs
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::debug;

use shared_models::{
    Appointment, AppointmentStatus, Department, DepartmentSlot, Doctor, DoctorAppointmentLink,
    DoctorPatientCount, DoctorStatusCount, NewAppointment, NewDoctor, NewPatient, Patient,
};

use crate::projection;
use crate::store::{ClinicStore, LockKey, Relation, StoreError, StoreResult, StoreTransaction};

#[derive(Debug, Clone, Default)]
struct Sequences {
    doctor: i64,
    patient: i64,
    appointment: i64,
}

impl Sequences {
    fn slot(&mut self, relation: Relation) -> &mut i64 {
        match relation {
            Relation::Doctor => &mut self.doctor,
            Relation::Patient => &mut self.patient,
            Relation::Appointment => &mut self.appointment,
        }
    }

    fn allocate(&mut self, relation: Relation) -> i64 {
        let slot = self.slot(relation);
        let id = *slot;
        *slot += 1;
        id
    }

    /// Keeps later allocations clear of an explicitly supplied id.
    fn observe(&mut self, relation: Relation, id: i64) {
        let slot = self.slot(relation);
        if id >= *slot {
            *slot = id + 1;
        }
    }
}

#[derive(Debug, Clone, Default)]
struct ClinicTables {
    doctors: BTreeMap<i64, Doctor>,
    patients: BTreeMap<i64, Patient>,
    appointments: BTreeMap<i64, Appointment>,
    departments: BTreeMap<i64, Department>,
    links: BTreeSet<DoctorAppointmentLink>,
    department_slots: BTreeSet<(i64, i64)>,
    sequences: Sequences,
    next_department_id: i64,
}

/// Process-local store.
///
/// Writers are serialized by a single mutex; readers see the last committed
/// snapshot and never wait on an open transaction.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    writer: Arc<Mutex<()>>,
    committed: Arc<RwLock<Arc<ClinicTables>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn snapshot(&self) -> Arc<ClinicTables> {
        Arc::clone(&*self.committed.read().await)
    }

    pub async fn add_department(&self, name: &str) -> Department {
        let _writer = self.writer.lock().await;
        let mut tables = (*self.snapshot().await).clone();

        let department = Department {
            id: tables.next_department_id,
            name: name.to_string(),
        };
        tables.next_department_id += 1;
        tables.departments.insert(department.id, department.clone());

        *self.committed.write().await = Arc::new(tables);
        department
    }

    pub async fn offer_in_department(&self, slot: DepartmentSlot) {
        let _writer = self.writer.lock().await;
        let mut tables = (*self.snapshot().await).clone();
        tables
            .department_slots
            .insert((slot.department_id, slot.appointment_id));
        *self.committed.write().await = Arc::new(tables);
    }

    pub async fn links(&self) -> Vec<DoctorAppointmentLink> {
        self.snapshot().await.links.iter().copied().collect()
    }

    pub async fn doctors(&self) -> Vec<Doctor> {
        self.snapshot().await.doctors.values().cloned().collect()
    }

    pub async fn patients(&self) -> Vec<Patient> {
        self.snapshot().await.patients.values().cloned().collect()
    }
}

pub struct InMemoryTransaction {
    _writer: OwnedMutexGuard<()>,
    committed: Arc<RwLock<Arc<ClinicTables>>>,
    staged: ClinicTables,
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn find_doctor(&mut self, id: i64) -> StoreResult<Option<Doctor>> {
        Ok(self.staged.doctors.get(&id).cloned())
    }

    async fn find_appointment(&mut self, id: i64) -> StoreResult<Option<Appointment>> {
        Ok(self.staged.appointments.get(&id).cloned())
    }

    async fn find_patient(&mut self, id: i64) -> StoreResult<Option<Patient>> {
        Ok(self.staged.patients.get(&id).cloned())
    }

    async fn find_matching_doctor(&mut self, fields: &NewDoctor) -> StoreResult<Option<Doctor>> {
        Ok(self.staged.doctors.values().find(|d| fields.matches(d)).cloned())
    }

    async fn find_matching_patient(&mut self, fields: &NewPatient) -> StoreResult<Option<Patient>> {
        Ok(self.staged.patients.values().find(|p| fields.matches(p)).cloned())
    }

    async fn find_matching_appointment(
        &mut self,
        fields: &NewAppointment,
    ) -> StoreResult<Option<Appointment>> {
        Ok(self
            .staged
            .appointments
            .values()
            .find(|a| fields.matches(a))
            .cloned())
    }

    async fn next_id(&mut self, relation: Relation) -> StoreResult<i64> {
        Ok(self.staged.sequences.allocate(relation))
    }

    async fn update_appointment_status(
        &mut self,
        appointment_id: i64,
        status: &AppointmentStatus,
    ) -> StoreResult<()> {
        let appointment = self
            .staged
            .appointments
            .get_mut(&appointment_id)
            .ok_or_else(|| missing_row(Relation::Appointment, appointment_id))?;
        appointment.status = status.clone();
        Ok(())
    }

    async fn insert_link(&mut self, link: DoctorAppointmentLink) -> StoreResult<bool> {
        Ok(self.staged.links.insert(link))
    }

    async fn increment_patient_count(&mut self, patient_id: i64) -> StoreResult<()> {
        let patient = self
            .staged
            .patients
            .get_mut(&patient_id)
            .ok_or_else(|| missing_row(Relation::Patient, patient_id))?;
        patient.appointment_count += 1;
        Ok(())
    }

    async fn insert_patient(&mut self, patient: &Patient) -> StoreResult<()> {
        if self.staged.patients.contains_key(&patient.id) {
            return Err(duplicate_key(Relation::Patient, patient.id));
        }
        self.staged.sequences.observe(Relation::Patient, patient.id);
        self.staged.patients.insert(patient.id, patient.clone());
        Ok(())
    }

    async fn insert_doctor(&mut self, doctor: &Doctor) -> StoreResult<()> {
        if self.staged.doctors.contains_key(&doctor.id) {
            return Err(duplicate_key(Relation::Doctor, doctor.id));
        }
        self.staged.sequences.observe(Relation::Doctor, doctor.id);
        self.staged.doctors.insert(doctor.id, doctor.clone());
        Ok(())
    }

    async fn insert_appointment(&mut self, appointment: &Appointment) -> StoreResult<()> {
        if self.staged.appointments.contains_key(&appointment.id) {
            return Err(duplicate_key(Relation::Appointment, appointment.id));
        }
        self.staged
            .sequences
            .observe(Relation::Appointment, appointment.id);
        self.staged
            .appointments
            .insert(appointment.id, appointment.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let InMemoryTransaction {
            _writer,
            committed,
            staged,
        } = *self;
        *committed.write().await = Arc::new(staged);
        debug!("In-memory transaction committed");
        Ok(())
    }
}

fn missing_row(relation: Relation, id: i64) -> StoreError {
    StoreError::Conflict(format!("{} {} does not exist", relation, id))
}

fn duplicate_key(relation: Relation, id: i64) -> StoreError {
    StoreError::Conflict(format!("{} {} already exists", relation, id))
}

#[async_trait]
impl ClinicStore for InMemoryStore {
    async fn begin(&self, scope: &[LockKey]) -> StoreResult<Box<dyn StoreTransaction>> {
        // One writer at a time covers every key in `scope`.
        let writer = Arc::clone(&self.writer).lock_owned().await;
        debug!("In-memory transaction opened for {} lock key(s)", scope.len());

        let staged = (*self.snapshot().await).clone();
        Ok(Box::new(InMemoryTransaction {
            _writer: writer,
            committed: Arc::clone(&self.committed),
            staged,
        }))
    }

    async fn doctor(&self, id: i64) -> StoreResult<Option<Doctor>> {
        Ok(self.snapshot().await.doctors.get(&id).cloned())
    }

    async fn patient(&self, id: i64) -> StoreResult<Option<Patient>> {
        Ok(self.snapshot().await.patients.get(&id).cloned())
    }

    async fn appointment(&self, id: i64) -> StoreResult<Option<Appointment>> {
        Ok(self.snapshot().await.appointments.get(&id).cloned())
    }

    async fn links_for_appointment(
        &self,
        appointment_id: i64,
    ) -> StoreResult<Vec<DoctorAppointmentLink>> {
        Ok(self
            .snapshot()
            .await
            .links
            .iter()
            .filter(|link| link.appointment_id == appointment_id)
            .copied()
            .collect())
    }

    async fn doctor_appointments(
        &self,
        doctor_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StoreResult<Vec<Appointment>> {
        let tables = self.snapshot().await;
        Ok(projection::doctor_appointments(
            &tables.links,
            &tables.appointments,
            doctor_id,
            from,
            to,
        ))
    }

    async fn department_available(
        &self,
        department_name: &str,
        date: NaiveDate,
    ) -> StoreResult<Vec<Appointment>> {
        let tables = self.snapshot().await;
        let departments: BTreeSet<i64> = tables
            .departments
            .values()
            .filter(|d| d.name == department_name)
            .map(|d| d.id)
            .collect();

        let offered: Vec<i64> = tables
            .department_slots
            .iter()
            .filter(|(department_id, _)| departments.contains(department_id))
            .map(|(_, appointment_id)| *appointment_id)
            .collect();

        Ok(projection::available_on(&offered, &tables.appointments, date))
    }

    async fn status_counts_per_doctor(&self) -> StoreResult<Vec<DoctorStatusCount>> {
        let tables = self.snapshot().await;
        Ok(projection::status_counts_per_doctor(
            &tables.links,
            &tables.doctors,
            &tables.appointments,
        ))
    }

    async fn patients_per_doctor_with_status(
        &self,
        status: &AppointmentStatus,
    ) -> StoreResult<Vec<DoctorPatientCount>> {
        let tables = self.snapshot().await;
        Ok(projection::patients_per_doctor_with_status(
            &tables.links,
            &tables.doctors,
            &tables.appointments,
            status,
        ))
    }
}
