use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use shared_database::AppState;

use crate::handlers;

pub fn doctor_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", post(handlers::add_doctor))
        .route("/reports/status-counts", get(handlers::get_status_counts))
        .route("/reports/patients", get(handlers::get_patients_with_status))
        .route("/{doctor_id}", get(handlers::get_doctor))
        .route("/{doctor_id}/appointments", get(handlers::get_doctor_appointments))
        .with_state(state)
}

pub fn department_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/{department_name}/available", get(handlers::get_department_availability))
        .with_state(state)
}
