//! Patient registry endpoints.

use crate::error::{ApiError, ErrorBody};
use crate::extract::{ApiJson, ApiQuery, AuthUser};
use crate::response::{Envelope, MessageEnvelope, PageEnvelope};
use crate::{blocking, AppState};
use api_shared::policy;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use curamind_core::patients::{
    HistoryEntry, NewPatient, Patient, PatientPage, PatientPatch, PatientQuery, PatientService,
};
use curamind_core::validation::parse_id;

#[utoipa::path(
    get,
    path = "/patients",
    params(PatientQuery),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "One page of patients", body = PatientPage),
        (status = 400, description = "Invalid filter", body = ErrorBody),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 403, description = "Role not permitted", body = ErrorBody)
    ),
    tag = "patients"
)]
/// List patients
///
/// Filters by name or email substring, assigned doctor and city.
#[axum::debug_handler]
pub async fn list_patients(
    State(state): State<AppState>,
    user: AuthUser,
    ApiQuery(query): ApiQuery<PatientQuery>,
) -> Result<Json<PageEnvelope<Patient>>, ApiError> {
    user.require(policy::PATIENT_READ)?;
    let page = blocking(move || PatientService::new(state.store).list(query)).await?;

    Ok(Json(PageEnvelope {
        success: true,
        data: page.patients,
        total: page.total,
        page: page.page,
        limit: page.limit,
        pages: page.pages,
    }))
}

#[utoipa::path(
    post,
    path = "/patients",
    request_body = NewPatient,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Patient registered", body = Patient),
        (status = 400, description = "Missing or malformed field", body = ErrorBody),
        (status = 404, description = "Assigned doctor not found", body = ErrorBody),
        (status = 409, description = "Email already registered", body = ErrorBody)
    ),
    tag = "patients"
)]
/// Register a new patient
#[axum::debug_handler]
pub async fn create_patient(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(input): ApiJson<NewPatient>,
) -> Result<(StatusCode, Json<Envelope<Patient>>), ApiError> {
    user.require(policy::PATIENT_WRITE)?;
    let patient = blocking(move || PatientService::new(state.store).create(input)).await?;
    Ok((StatusCode::CREATED, Json(Envelope::new(patient))))
}

#[utoipa::path(
    get,
    path = "/patients/{id}",
    params(("id" = String, Path, description = "Patient id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "The patient", body = Patient),
        (status = 404, description = "Patient not found", body = ErrorBody)
    ),
    tag = "patients"
)]
#[axum::debug_handler]
pub async fn get_patient(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Envelope<Patient>>, ApiError> {
    user.require(policy::PATIENT_READ)?;
    let id = parse_id("patient id", &id)?;
    let patient = blocking(move || PatientService::new(state.store).get(id)).await?;
    Ok(Json(Envelope::new(patient)))
}

#[utoipa::path(
    put,
    path = "/patients/{id}",
    params(("id" = String, Path, description = "Patient id")),
    request_body = PatientPatch,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Updated patient", body = Patient),
        (status = 400, description = "Invalid field", body = ErrorBody),
        (status = 404, description = "Patient or doctor not found", body = ErrorBody),
        (status = 409, description = "Email already registered", body = ErrorBody)
    ),
    tag = "patients"
)]
/// Update a patient
///
/// `assignedDoctor: null` unassigns the patient; omitting it keeps the current doctor.
#[axum::debug_handler]
pub async fn update_patient(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<PatientPatch>,
) -> Result<Json<Envelope<Patient>>, ApiError> {
    user.require(policy::PATIENT_WRITE)?;
    let id = parse_id("patient id", &id)?;
    let patient = blocking(move || PatientService::new(state.store).update(id, patch)).await?;
    Ok(Json(Envelope::new(patient)))
}

#[utoipa::path(
    delete,
    path = "/patients/{id}",
    params(("id" = String, Path, description = "Patient id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Patient and their appointments deleted"),
        (status = 404, description = "Patient not found", body = ErrorBody)
    ),
    tag = "patients"
)]
/// Delete a patient together with their appointments
#[axum::debug_handler]
pub async fn delete_patient(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<MessageEnvelope>, ApiError> {
    user.require(policy::PATIENT_WRITE)?;
    let id = parse_id("patient id", &id)?;
    let removed = blocking(move || PatientService::new(state.store).delete(id)).await?;
    Ok(Json(MessageEnvelope::new(format!(
        "Patient deleted along with {removed} appointment(s)"
    ))))
}

#[utoipa::path(
    post,
    path = "/patients/{id}/history",
    params(("id" = String, Path, description = "Patient id")),
    request_body = HistoryEntry,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Entry appended", body = Patient),
        (status = 400, description = "Invalid entry", body = ErrorBody),
        (status = 404, description = "Patient not found", body = ErrorBody)
    ),
    tag = "patients"
)]
/// Append a medical history entry
#[axum::debug_handler]
pub async fn add_history_entry(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    ApiJson(entry): ApiJson<HistoryEntry>,
) -> Result<(StatusCode, Json<Envelope<Patient>>), ApiError> {
    user.require(policy::PATIENT_WRITE)?;
    let id = parse_id("patient id", &id)?;
    let patient =
        blocking(move || PatientService::new(state.store).add_history_entry(id, entry)).await?;
    Ok((StatusCode::CREATED, Json(Envelope::new(patient))))
}
