use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Method,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, error, info};

use shared_config::AppConfig;
use shared_models::{
    Appointment, AppointmentStatus, Department, DepartmentSlot, Doctor, DoctorAppointmentLink,
    DoctorPatientCount, DoctorStatusCount, NewAppointment, NewDoctor, NewPatient, Patient,
};

use crate::locks::{LockRegistry, ScopeGuard};
use crate::projection;
use crate::store::{ClinicStore, LockKey, Relation, StoreError, StoreResult, StoreTransaction};

const DOCTORS: &str = "/rest/v1/doctors";
const PATIENTS: &str = "/rest/v1/patients";
const APPOINTMENTS: &str = "/rest/v1/appointments";
const DEPARTMENTS: &str = "/rest/v1/departments";
const LINKS: &str = "/rest/v1/doctor_appointments";
const DEPARTMENT_SLOTS: &str = "/rest/v1/department_slots";
const APPLY_CHANGESET: &str = "/rest/v1/rpc/apply_clinic_changeset";
const NEXT_ID: &str = "/rest/v1/rpc/next_clinic_id";

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            anon_key: config.supabase_anon_key.clone(),
        }
    }

    fn get_headers(&self) -> StoreResult<HeaderMap> {
        let mut headers = HeaderMap::new();

        let api_key = HeaderValue::from_str(&self.anon_key)
            .map_err(|e| StoreError::Unavailable(format!("invalid api key header: {}", e)))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.anon_key))
            .map_err(|e| StoreError::Unavailable(format!("invalid authorization header: {}", e)))?;

        headers.insert("apikey", api_key);
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        Ok(headers)
    }

    pub async fn request<T>(&self, method: Method, path: &str, body: Option<Value>) -> StoreResult<T>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making request to {}", url);

        let mut req = self.client.request(method, &url).headers(self.get_headers()?);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("API error ({}): {}", status, error_text);

            return Err(match status.as_u16() {
                409 => StoreError::Conflict(error_text),
                code => StoreError::Api {
                    status: code,
                    message: error_text,
                },
            });
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub async fn select<T>(&self, path: &str) -> StoreResult<Vec<T>>
    where
        T: DeserializeOwned,
    {
        self.request(Method::GET, path, None).await
    }

    pub async fn select_one<T>(&self, path: &str) -> StoreResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        let mut rows: Vec<T> = self.select(path).await?;
        Ok(if rows.is_empty() { None } else { Some(rows.swap_remove(0)) })
    }
}

fn encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

fn id_list(ids: &BTreeSet<i64>) -> String {
    ids.iter().map(i64::to_string).collect::<Vec<_>>().join(",")
}

// ==============================================================================
// CHANGESET (staged writes committed through one RPC call)
// ==============================================================================

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ChangeOp {
    UpdateAppointmentStatus {
        appointment_id: i64,
        status: AppointmentStatus,
    },
    InsertLink {
        appointment_id: i64,
        doctor_id: i64,
    },
    IncrementPatientCount {
        patient_id: i64,
    },
    InsertPatient {
        patient: Patient,
    },
    InsertDoctor {
        doctor: Doctor,
    },
    InsertAppointment {
        appointment: Appointment,
    },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StatusGuard {
    pub appointment_id: i64,
    pub expected_status: AppointmentStatus,
}

/// Applied by the database in a single SQL transaction. Every guard must still
/// hold when the operations run, otherwise nothing is written.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Changeset {
    pub guards: Vec<StatusGuard>,
    pub operations: Vec<ChangeOp>,
}

#[derive(Debug, Deserialize)]
struct ChangesetResult {
    applied: bool,
    #[serde(default)]
    reason: Option<String>,
}

// ==============================================================================
// STORE
// ==============================================================================

#[derive(Clone)]
pub struct SupabaseStore {
    client: Arc<SupabaseClient>,
    locks: LockRegistry,
}

impl SupabaseStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Arc::new(SupabaseClient::new(config)),
            locks: LockRegistry::new(),
        }
    }

    async fn links(&self, filter: &str) -> StoreResult<Vec<DoctorAppointmentLink>> {
        self.client.select(&format!("{}?{}", LINKS, filter)).await
    }

    async fn appointments_by_id(&self, ids: &BTreeSet<i64>, filter: &str) -> StoreResult<BTreeMap<i64, Appointment>> {
        if ids.is_empty() {
            return Ok(BTreeMap::new());
        }
        let mut path = format!("{}?id=in.({})", APPOINTMENTS, id_list(ids));
        if !filter.is_empty() {
            path.push('&');
            path.push_str(filter);
        }
        let rows: Vec<Appointment> = self.client.select(&path).await?;
        Ok(rows.into_iter().map(|a| (a.id, a)).collect())
    }

    async fn doctors_by_id(&self, ids: &BTreeSet<i64>) -> StoreResult<BTreeMap<i64, Doctor>> {
        if ids.is_empty() {
            return Ok(BTreeMap::new());
        }
        let path = format!("{}?id=in.({})", DOCTORS, id_list(ids));
        let rows: Vec<Doctor> = self.client.select(&path).await?;
        Ok(rows.into_iter().map(|d| (d.id, d)).collect())
    }

    /// Every link together with the doctors and appointments it references.
    async fn linked_rows(
        &self,
        appointment_filter: &str,
    ) -> StoreResult<(Vec<DoctorAppointmentLink>, BTreeMap<i64, Doctor>, BTreeMap<i64, Appointment>)> {
        let links: Vec<DoctorAppointmentLink> = self.client.select(LINKS).await?;
        let doctor_ids: BTreeSet<i64> = links.iter().map(|l| l.doctor_id).collect();
        let appointment_ids: BTreeSet<i64> = links.iter().map(|l| l.appointment_id).collect();

        let doctors = self.doctors_by_id(&doctor_ids).await?;
        let appointments = self
            .appointments_by_id(&appointment_ids, appointment_filter)
            .await?;
        Ok((links, doctors, appointments))
    }
}

pub struct SupabaseTransaction {
    client: Arc<SupabaseClient>,
    scope: ScopeGuard,
    observed_status: HashMap<i64, AppointmentStatus>,
    staged_links: BTreeSet<DoctorAppointmentLink>,
    changeset: Changeset,
}

impl SupabaseTransaction {
    fn push_guard(&mut self, appointment_id: i64) {
        let already_guarded = self
            .changeset
            .guards
            .iter()
            .any(|g| g.appointment_id == appointment_id);
        if already_guarded {
            return;
        }
        if let Some(expected_status) = self.observed_status.get(&appointment_id) {
            self.changeset.guards.push(StatusGuard {
                appointment_id,
                expected_status: expected_status.clone(),
            });
        }
    }

    pub fn changeset(&self) -> &Changeset {
        &self.changeset
    }
}

#[async_trait]
impl StoreTransaction for SupabaseTransaction {
    async fn find_doctor(&mut self, id: i64) -> StoreResult<Option<Doctor>> {
        self.client.select_one(&format!("{}?id=eq.{}", DOCTORS, id)).await
    }

    async fn find_appointment(&mut self, id: i64) -> StoreResult<Option<Appointment>> {
        let appointment: Option<Appointment> = self
            .client
            .select_one(&format!("{}?id=eq.{}", APPOINTMENTS, id))
            .await?;
        if let Some(found) = &appointment {
            self.observed_status.insert(found.id, found.status.clone());
        }
        Ok(appointment)
    }

    async fn find_patient(&mut self, id: i64) -> StoreResult<Option<Patient>> {
        self.client.select_one(&format!("{}?id=eq.{}", PATIENTS, id)).await
    }

    async fn find_matching_doctor(&mut self, fields: &NewDoctor) -> StoreResult<Option<Doctor>> {
        let path = format!(
            "{}?name=eq.{}&specialty=eq.{}&department_id=eq.{}&limit=1",
            DOCTORS,
            encode(&fields.name),
            encode(&fields.specialty),
            fields.department_id
        );
        self.client.select_one(&path).await
    }

    async fn find_matching_patient(&mut self, fields: &NewPatient) -> StoreResult<Option<Patient>> {
        let path = format!(
            "{}?name=eq.{}&gender=eq.{}&age=eq.{}&address=eq.{}&appointment_count=eq.{}&limit=1",
            PATIENTS,
            encode(&fields.name),
            encode(&fields.gender),
            fields.age,
            encode(&fields.address),
            fields.appointment_count
        );
        self.client.select_one(&path).await
    }

    async fn find_matching_appointment(
        &mut self,
        fields: &NewAppointment,
    ) -> StoreResult<Option<Appointment>> {
        let path = format!(
            "{}?date=eq.{}&time_slot=eq.{}&status=eq.{}&limit=1",
            APPOINTMENTS,
            fields.date,
            encode(&fields.time_slot),
            encode(fields.status.code())
        );
        self.client.select_one(&path).await
    }

    async fn next_id(&mut self, relation: Relation) -> StoreResult<i64> {
        self.client
            .request(Method::POST, NEXT_ID, Some(json!({ "relation": relation })))
            .await
    }

    async fn update_appointment_status(
        &mut self,
        appointment_id: i64,
        status: &AppointmentStatus,
    ) -> StoreResult<()> {
        self.push_guard(appointment_id);
        self.changeset.operations.push(ChangeOp::UpdateAppointmentStatus {
            appointment_id,
            status: status.clone(),
        });
        Ok(())
    }

    async fn insert_link(&mut self, link: DoctorAppointmentLink) -> StoreResult<bool> {
        if self.staged_links.contains(&link) {
            return Ok(false);
        }
        let path = format!(
            "{}?appointment_id=eq.{}&doctor_id=eq.{}&limit=1",
            LINKS, link.appointment_id, link.doctor_id
        );
        let existing: Option<DoctorAppointmentLink> = self.client.select_one(&path).await?;
        if existing.is_some() {
            return Ok(false);
        }

        self.staged_links.insert(link);
        self.changeset.operations.push(ChangeOp::InsertLink {
            appointment_id: link.appointment_id,
            doctor_id: link.doctor_id,
        });
        Ok(true)
    }

    async fn increment_patient_count(&mut self, patient_id: i64) -> StoreResult<()> {
        self.changeset
            .operations
            .push(ChangeOp::IncrementPatientCount { patient_id });
        Ok(())
    }

    async fn insert_patient(&mut self, patient: &Patient) -> StoreResult<()> {
        self.changeset.operations.push(ChangeOp::InsertPatient {
            patient: patient.clone(),
        });
        Ok(())
    }

    async fn insert_doctor(&mut self, doctor: &Doctor) -> StoreResult<()> {
        self.changeset.operations.push(ChangeOp::InsertDoctor {
            doctor: doctor.clone(),
        });
        Ok(())
    }

    async fn insert_appointment(&mut self, appointment: &Appointment) -> StoreResult<()> {
        self.changeset.operations.push(ChangeOp::InsertAppointment {
            appointment: appointment.clone(),
        });
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        if self.changeset.operations.is_empty() {
            debug!("Nothing staged under {:?}, skipping changeset", self.scope.keys());
            return Ok(());
        }

        let body = json!({ "changeset": self.changeset });
        let result: ChangesetResult = self
            .client
            .request(Method::POST, APPLY_CHANGESET, Some(body))
            .await?;

        if !result.applied {
            return Err(StoreError::Conflict(
                result
                    .reason
                    .unwrap_or_else(|| "changeset guard no longer holds".to_string()),
            ));
        }

        info!(
            "Committed {} operation(s) under {:?}",
            self.changeset.operations.len(),
            self.scope.keys()
        );
        Ok(())
    }
}

#[async_trait]
impl ClinicStore for SupabaseStore {
    async fn begin(&self, scope: &[LockKey]) -> StoreResult<Box<dyn StoreTransaction>> {
        let scope = self.locks.acquire(scope).await?;
        Ok(Box::new(SupabaseTransaction {
            client: Arc::clone(&self.client),
            scope,
            observed_status: HashMap::new(),
            staged_links: BTreeSet::new(),
            changeset: Changeset::default(),
        }))
    }

    async fn doctor(&self, id: i64) -> StoreResult<Option<Doctor>> {
        self.client.select_one(&format!("{}?id=eq.{}", DOCTORS, id)).await
    }

    async fn patient(&self, id: i64) -> StoreResult<Option<Patient>> {
        self.client.select_one(&format!("{}?id=eq.{}", PATIENTS, id)).await
    }

    async fn appointment(&self, id: i64) -> StoreResult<Option<Appointment>> {
        self.client
            .select_one(&format!("{}?id=eq.{}", APPOINTMENTS, id))
            .await
    }

    async fn links_for_appointment(
        &self,
        appointment_id: i64,
    ) -> StoreResult<Vec<DoctorAppointmentLink>> {
        self.links(&format!("appointment_id=eq.{}", appointment_id)).await
    }

    async fn doctor_appointments(
        &self,
        doctor_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StoreResult<Vec<Appointment>> {
        let links = self.links(&format!("doctor_id=eq.{}", doctor_id)).await?;
        let ids: BTreeSet<i64> = links.iter().map(|l| l.appointment_id).collect();
        let filter = format!("date=gte.{}&date=lte.{}&status=in.(AC,AV)", from, to);
        let appointments = self.appointments_by_id(&ids, &filter).await?;

        Ok(projection::doctor_appointments(
            &links,
            &appointments,
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
        let departments: Vec<Department> = self
            .client
            .select(&format!("{}?name=eq.{}", DEPARTMENTS, encode(department_name)))
            .await?;
        if departments.is_empty() {
            return Ok(Vec::new());
        }

        let department_ids: BTreeSet<i64> = departments.iter().map(|d| d.id).collect();
        let slots: Vec<DepartmentSlot> = self
            .client
            .select(&format!(
                "{}?department_id=in.({})",
                DEPARTMENT_SLOTS,
                id_list(&department_ids)
            ))
            .await?;

        let offered: BTreeSet<i64> = slots.iter().map(|s| s.appointment_id).collect();
        let filter = format!("date=eq.{}&status=eq.AV", date);
        let appointments = self.appointments_by_id(&offered, &filter).await?;

        Ok(projection::available_on(&offered, &appointments, date))
    }

    async fn status_counts_per_doctor(&self) -> StoreResult<Vec<DoctorStatusCount>> {
        let (links, doctors, appointments) = self.linked_rows("").await?;
        Ok(projection::status_counts_per_doctor(
            &links,
            &doctors,
            &appointments,
        ))
    }

    async fn patients_per_doctor_with_status(
        &self,
        status: &AppointmentStatus,
    ) -> StoreResult<Vec<DoctorPatientCount>> {
        let filter = format!("status=eq.{}", encode(status.code()));
        let (links, doctors, appointments) = self.linked_rows(&filter).await?;
        Ok(projection::patients_per_doctor_with_status(
            &links,
            &doctors,
            &appointments,
            status,
        ))
    }
}
