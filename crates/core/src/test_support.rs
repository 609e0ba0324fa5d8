//! Shared fixtures for the unit tests in this crate.

use crate::config::CoreConfig;
use crate::constants::IN_MEMORY_DATABASE;
use crate::patients::{AddressInput, NewPatient, Patient, PatientService};
use crate::role::Role;
use crate::store::Store;
use crate::users::{NewUser, User, UserService};
use curamind_uuid::RecordId;
use std::sync::Arc;

/// In-memory store with cheap password hashing.
pub(crate) fn memory_store() -> Store {
    let cfg = CoreConfig::in_memory(1_000).expect("config should build");
    Store::open(Arc::new(cfg)).expect("in-memory store should open")
}

/// Like [`memory_store`] but with the appointment lifecycle enforced.
pub(crate) fn strict_memory_store() -> Store {
    let cfg = CoreConfig::new(IN_MEMORY_DATABASE.into(), 1_000, true)
        .expect("config should build");
    Store::open(Arc::new(cfg)).expect("in-memory store should open")
}

pub(crate) fn new_doctor(email: &str) -> NewUser {
    NewUser {
        name: Some("Dr. Grey".into()),
        email: Some(email.into()),
        password: Some("doctor-pass".into()),
        specialization: Some("Cardiology".into()),
        phone: Some("555-0100".into()),
    }
}

pub(crate) fn new_patient(email: &str, assigned_doctor: Option<RecordId>) -> NewPatient {
    NewPatient {
        name: Some("John Doe".into()),
        age: Some(42),
        gender: Some("male".into()),
        email: Some(email.into()),
        phone: Some("555-0199".into()),
        address: Some(AddressInput {
            street: Some("1 Main St".into()),
            city: Some("Springfield".into()),
            state: Some("IL".into()),
            postal_code: Some("62701".into()),
        }),
        assigned_doctor: assigned_doctor.map(|id| id.to_string()),
        medical_history: vec![],
    }
}

pub(crate) fn create_doctor(store: &Store, email: &str) -> User {
    UserService::new(store.clone())
        .create(Role::Doctor, new_doctor(email))
        .expect("doctor should be created")
}

pub(crate) fn create_patient(
    store: &Store,
    email: &str,
    assigned_doctor: Option<RecordId>,
) -> Patient {
    PatientService::new(store.clone())
        .create(new_patient(email, assigned_doctor))
        .expect("patient should be created")
}
