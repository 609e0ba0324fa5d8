//! # CuraMind Core
//!
//! Core business logic for the CuraMind hospital records service.
//!
//! This crate owns the record store and every operation on it:
//! - Staff credentials (admins, doctors, receptionists) with salted password hashes
//! - Patient registry with optional doctor assignment and medical history
//! - Appointment ledger enforcing one live appointment per patient per day
//! - Prescription records authored by doctors
//!
//! **No API concerns**: tokens, role gating and HTTP belong in `api-shared` and `api-rest`.

pub mod appointments;
pub mod config;
pub mod constants;
pub mod error;
pub mod password;
pub mod patients;
pub mod prescriptions;
pub mod role;
pub mod store;
pub mod users;
pub mod validation;

#[cfg(test)]
mod test_support;

pub use config::CoreConfig;
pub use curamind_uuid::RecordId;
pub use error::{CoreError, CoreResult};
pub use role::Role;
pub use store::Store;
