//! Per-route role allow-lists.

use curamind_core::Role;

/// Any authenticated staff member.
pub const STAFF: &[Role] = &[Role::Admin, Role::Doctor, Role::Receptionist];

pub const PATIENT_READ: &[Role] = &[Role::Admin, Role::Receptionist, Role::Doctor];
pub const PATIENT_WRITE: &[Role] = &[Role::Admin, Role::Receptionist];

pub const APPOINTMENT_READ: &[Role] = &[Role::Admin, Role::Receptionist, Role::Doctor];
pub const APPOINTMENT_WRITE: &[Role] = &[Role::Admin, Role::Receptionist];
pub const APPOINTMENT_STATUS: &[Role] = &[Role::Admin, Role::Receptionist, Role::Doctor];

pub const DOCTOR_READ: &[Role] = &[Role::Admin, Role::Receptionist, Role::Doctor];
pub const RECEPTIONIST_READ: &[Role] = &[Role::Admin];
/// Creating, updating and deleting doctors and receptionists.
pub const STAFF_WRITE: &[Role] = &[Role::Admin];

pub const PRESCRIPTIONS: &[Role] = &[Role::Doctor];
