use std::sync::Arc;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use shared_database::{AppState, StoreError};
use shared_models::{AppError, NewPatient};

use crate::models::PatientError;
use crate::services::PatientService;

fn patient_error(e: PatientError) -> AppError {
    match e {
        PatientError::NotFound(_) => AppError::NotFound(e.to_string()),
        PatientError::ValidationError(msg) => AppError::ValidationError(msg),
        PatientError::Store(StoreError::Conflict(msg)) => AppError::Conflict(msg),
        PatientError::Store(store_error) => AppError::Database(store_error.to_string()),
    }
}

#[axum::debug_handler]
pub async fn add_patient(
    State(state): State<Arc<AppState>>,
    Json(request): Json<NewPatient>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let service = PatientService::new(&state);

    let creation = service.add_patient(request).await.map_err(patient_error)?;

    let status = if creation.was_created() {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((
        status,
        Json(json!({
            "created": creation.was_created(),
            "patient": creation.record()
        })),
    ))
}

#[axum::debug_handler]
pub async fn get_patient(
    State(state): State<Arc<AppState>>,
    Path(patient_id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    let service = PatientService::new(&state);

    let patient = service.get_patient(patient_id).await.map_err(patient_error)?;

    Ok(Json(json!(patient)))
}
