// libs/shared/database/src/projection.rs
//
// Read-only report projections shared by every store backend.

use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

use shared_models::{
    Appointment, AppointmentStatus, Doctor, DoctorAppointmentLink, DoctorPatientCount,
    DoctorStatusCount,
};

use crate::store::order_status_counts;

pub fn doctor_appointments<'a>(
    links: impl IntoIterator<Item = &'a DoctorAppointmentLink>,
    appointments: &BTreeMap<i64, Appointment>,
    doctor_id: i64,
    from: NaiveDate,
    to: NaiveDate,
) -> Vec<Appointment> {
    let linked: BTreeSet<i64> = links
        .into_iter()
        .filter(|link| link.doctor_id == doctor_id)
        .map(|link| link.appointment_id)
        .collect();

    let mut rows: Vec<Appointment> = linked
        .iter()
        .filter_map(|id| appointments.get(id))
        .filter(|a| a.date >= from && a.date <= to)
        .filter(|a| matches!(a.status, AppointmentStatus::Active | AppointmentStatus::Available))
        .cloned()
        .collect();

    rows.sort_by(|a, b| a.date.cmp(&b.date).then(a.id.cmp(&b.id)));
    rows
}

pub fn available_on<'a>(
    offered: impl IntoIterator<Item = &'a i64>,
    appointments: &BTreeMap<i64, Appointment>,
    date: NaiveDate,
) -> Vec<Appointment> {
    let ids: BTreeSet<i64> = offered.into_iter().copied().collect();
    ids.iter()
        .filter_map(|id| appointments.get(id))
        .filter(|a| a.date == date && a.status == AppointmentStatus::Available)
        .cloned()
        .collect()
}

pub fn status_counts_per_doctor<'a>(
    links: impl IntoIterator<Item = &'a DoctorAppointmentLink>,
    doctors: &BTreeMap<i64, Doctor>,
    appointments: &BTreeMap<i64, Appointment>,
) -> Vec<DoctorStatusCount> {
    let mut counts: BTreeMap<(String, AppointmentStatus), i64> = BTreeMap::new();

    for link in links {
        let (Some(doctor), Some(appointment)) =
            (doctors.get(&link.doctor_id), appointments.get(&link.appointment_id))
        else {
            continue;
        };
        *counts
            .entry((doctor.name.clone(), appointment.status.clone()))
            .or_insert(0) += 1;
    }

    let mut rows: Vec<DoctorStatusCount> = counts
        .into_iter()
        .map(|((doctor_name, status), appointment_count)| DoctorStatusCount {
            doctor_name,
            status,
            appointment_count,
        })
        .collect();
    order_status_counts(&mut rows);
    rows
}

pub fn patients_per_doctor_with_status<'a>(
    links: impl IntoIterator<Item = &'a DoctorAppointmentLink>,
    doctors: &BTreeMap<i64, Doctor>,
    appointments: &BTreeMap<i64, Appointment>,
    status: &AppointmentStatus,
) -> Vec<DoctorPatientCount> {
    let mut counts: BTreeMap<String, i64> = BTreeMap::new();

    for link in links {
        let matches_status = appointments
            .get(&link.appointment_id)
            .is_some_and(|a| &a.status == status);
        if !matches_status {
            continue;
        }
        if let Some(doctor) = doctors.get(&link.doctor_id) {
            *counts.entry(doctor.name.clone()).or_insert(0) += 1;
        }
    }

    counts
        .into_iter()
        .map(|(doctor_name, patient_count)| DoctorPatientCount {
            doctor_name,
            patient_count,
        })
        .collect()
}
