pub mod doctor;
pub mod reports;

pub use doctor::DoctorService;
pub use reports::ReportService;
