pub mod appointment;
pub mod booking;
pub mod lifecycle;

pub use appointment::AppointmentService;
pub use booking::BookingEngine;
