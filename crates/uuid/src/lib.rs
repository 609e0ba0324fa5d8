//! Record identifier utilities.
//!
//! Every stored record (users, patients, appointments, prescriptions) is keyed by a UUID in
//! a *canonical* representation: **32 lowercase hexadecimal characters** (no hyphens).
//!
//! Identifiers arrive from outside the process in URL paths and JSON bodies, so they are
//! parsed strictly with [`RecordId::parse`]. Anything that is not canonical is rejected
//! before it reaches a query.
//!
//! ## Canonical UUID form
//! - Length: 32
//! - Characters: `0-9` and `a-f` only
//! - Example: `550e8400e29b41d4a716446655440000`

mod service;

pub use service::RecordId;

/// Error type for identifier operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum UuidError {
    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for identifier operations.
pub type UuidResult<T> = Result<T, UuidError>;
