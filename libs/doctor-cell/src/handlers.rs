use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use shared_database::{AppState, StoreError};
use shared_models::{AppError, NewDoctor};

use crate::models::{DateQuery, DateRangeQuery, DoctorError, StatusQuery};
use crate::services::{DoctorService, ReportService};

fn doctor_error(e: DoctorError) -> AppError {
    match e {
        DoctorError::NotFound(_) => AppError::NotFound(e.to_string()),
        DoctorError::ValidationError(msg) => AppError::ValidationError(msg),
        DoctorError::Store(StoreError::Conflict(msg)) => AppError::Conflict(msg),
        DoctorError::Store(store_error) => AppError::Database(store_error.to_string()),
    }
}

#[axum::debug_handler]
pub async fn add_doctor(
    State(state): State<Arc<AppState>>,
    Json(request): Json<NewDoctor>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let service = DoctorService::new(&state);

    let creation = service.add_doctor(request).await.map_err(doctor_error)?;

    let (status, message) = if creation.was_created() {
        (StatusCode::CREATED, "Doctor added")
    } else {
        (StatusCode::OK, "Doctor already exists")
    };

    Ok((
        status,
        Json(json!({
            "created": creation.was_created(),
            "doctor": creation.record(),
            "message": message
        })),
    ))
}

#[axum::debug_handler]
pub async fn get_doctor(
    State(state): State<Arc<AppState>>,
    Path(doctor_id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    let service = DoctorService::new(&state);

    let doctor = service.get_doctor(doctor_id).await.map_err(doctor_error)?;

    Ok(Json(json!(doctor)))
}

#[axum::debug_handler]
pub async fn get_doctor_appointments(
    State(state): State<Arc<AppState>>,
    Path(doctor_id): Path<i64>,
    Query(range): Query<DateRangeQuery>,
) -> Result<Json<Value>, AppError> {
    let reports = ReportService::new(&state);

    let schedule = reports
        .doctor_appointments(doctor_id, range.from, range.to)
        .await
        .map_err(doctor_error)?;

    Ok(Json(json!({
        "total": schedule.appointments.len(),
        "schedule": schedule
    })))
}

#[axum::debug_handler]
pub async fn get_status_counts(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, AppError> {
    let reports = ReportService::new(&state);

    let rows = reports.status_counts_per_doctor().await.map_err(doctor_error)?;

    Ok(Json(json!({ "rows": rows })))
}

#[axum::debug_handler]
pub async fn get_patients_with_status(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<Value>, AppError> {
    let reports = ReportService::new(&state);

    let rows = reports
        .patients_per_doctor_with_status(&query.status)
        .await
        .map_err(doctor_error)?;

    Ok(Json(json!({
        "status": query.status,
        "rows": rows
    })))
}

#[axum::debug_handler]
pub async fn get_department_availability(
    State(state): State<Arc<AppState>>,
    Path(department_name): Path<String>,
    Query(query): Query<DateQuery>,
) -> Result<Json<Value>, AppError> {
    let reports = ReportService::new(&state);

    let availability = reports
        .available_in_department(&department_name, query.date)
        .await
        .map_err(doctor_error)?;

    Ok(Json(json!(availability)))
}
