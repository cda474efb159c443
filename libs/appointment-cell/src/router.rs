// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use shared_database::AppState;

use crate::handlers;

pub fn appointment_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", post(handlers::add_appointment))
        .route("/book", post(handlers::book_appointment))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .with_state(state)
}
