pub mod handlers;
pub mod router;
pub mod models;
pub mod services;

pub use models::*;
pub use router::{department_routes, doctor_routes};
pub use services::{DoctorService, ReportService};
