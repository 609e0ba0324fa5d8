pub mod appointments;
pub mod auth;
pub mod health;
pub mod patients;
pub mod prescriptions;
pub mod staff;
