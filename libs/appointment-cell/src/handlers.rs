// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use shared_database::{AppState, StoreError};
use shared_models::{AppError, NewAppointment};

use crate::models::{AppointmentError, BookingError, BookingRequest};
use crate::services::{AppointmentService, BookingEngine};

fn booking_error(e: BookingError) -> AppError {
    match e {
        BookingError::DoctorNotFound(_)
        | BookingError::AppointmentNotFound(_)
        | BookingError::PatientNotFound(_) => AppError::NotFound(e.to_string()),
        BookingError::MissingPatientDetails => AppError::BadRequest(e.to_string()),
        BookingError::ValidationError(msg) => AppError::ValidationError(msg),
        BookingError::Store(StoreError::Conflict(msg)) => AppError::Conflict(msg),
        BookingError::Store(store_error) => AppError::Database(store_error.to_string()),
    }
}

fn appointment_error(e: AppointmentError) -> AppError {
    match e {
        AppointmentError::NotFound(_) => AppError::NotFound(e.to_string()),
        AppointmentError::ValidationError(msg) => AppError::ValidationError(msg),
        AppointmentError::Store(StoreError::Conflict(msg)) => AppError::Conflict(msg),
        AppointmentError::Store(store_error) => AppError::Database(store_error.to_string()),
    }
}

/// Run the booking workflow for one patient, doctor and appointment.
///
/// Rejections are regular outcomes and answer 200 with `success: false`.
#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BookingRequest>,
) -> Result<Json<Value>, AppError> {
    let engine = BookingEngine::new(&state);

    let receipt = engine.book(request).await.map_err(booking_error)?;

    Ok(Json(json!({
        "success": receipt.outcome.is_success(),
        "outcome": receipt.outcome,
        "message": receipt.message,
        "receipt": receipt
    })))
}

#[axum::debug_handler]
pub async fn add_appointment(
    State(state): State<Arc<AppState>>,
    Json(request): Json<NewAppointment>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let service = AppointmentService::new(&state);

    let creation = service
        .add_appointment(request)
        .await
        .map_err(appointment_error)?;

    let (status, message) = if creation.was_created() {
        (StatusCode::CREATED, "Appointment added")
    } else {
        (StatusCode::OK, "Appointment already exists")
    };

    Ok((
        status,
        Json(json!({
            "created": creation.was_created(),
            "appointment": creation.record(),
            "message": message
        })),
    ))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentService::new(&state);

    let appointment = service
        .get_appointment(appointment_id)
        .await
        .map_err(appointment_error)?;
    let links = service
        .get_links(appointment_id)
        .await
        .map_err(appointment_error)?;

    Ok(Json(json!({
        "appointment": appointment,
        "links": links
    })))
}
