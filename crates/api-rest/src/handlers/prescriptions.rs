//! Prescription endpoints. Doctors only.

use crate::error::{ApiError, ErrorBody};
use crate::extract::{ApiJson, AuthUser};
use crate::response::{Envelope, ListEnvelope};
use crate::{blocking, AppState};
use api_shared::policy;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use curamind_core::prescriptions::{
    NewPrescription, Prescription, PrescriptionPatch, PrescriptionService,
};
use curamind_core::validation::parse_id;

#[utoipa::path(
    post,
    path = "/prescriptions/manual",
    request_body = NewPrescription,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Prescription stored", body = Prescription),
        (status = 400, description = "Missing field", body = ErrorBody),
        (status = 404, description = "Patient not found", body = ErrorBody)
    ),
    tag = "prescriptions"
)]
/// Store a prescription written by the calling doctor
#[axum::debug_handler]
pub async fn create_manual(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(input): ApiJson<NewPrescription>,
) -> Result<(StatusCode, Json<Envelope<Prescription>>), ApiError> {
    let doctor = user.require(policy::PRESCRIPTIONS)?;
    let prescription = blocking(move || {
        PrescriptionService::new(state.store).create_manual(doctor.id(), input)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(Envelope::new(prescription))))
}

#[utoipa::path(
    put,
    path = "/prescriptions/{id}",
    params(("id" = String, Path, description = "Prescription id")),
    request_body = PrescriptionPatch,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Updated prescription", body = Prescription),
        (status = 403, description = "Caller is not the author", body = ErrorBody),
        (status = 404, description = "Prescription not found", body = ErrorBody)
    ),
    tag = "prescriptions"
)]
/// Replace the content of a prescription the caller wrote
#[axum::debug_handler]
pub async fn update_prescription(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<PrescriptionPatch>,
) -> Result<Json<Envelope<Prescription>>, ApiError> {
    let doctor = user.require(policy::PRESCRIPTIONS)?;
    let id = parse_id("prescription id", &id)?;
    let prescription = blocking(move || {
        PrescriptionService::new(state.store).update(id, doctor.id(), patch)
    })
    .await?;
    Ok(Json(Envelope::new(prescription)))
}

#[utoipa::path(
    get,
    path = "/prescriptions/patient/{id}",
    params(("id" = String, Path, description = "Patient id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Prescriptions, newest first", body = [Prescription]),
        (status = 404, description = "Patient not found", body = ErrorBody)
    ),
    tag = "prescriptions"
)]
#[axum::debug_handler]
pub async fn list_for_patient(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ListEnvelope<Prescription>>, ApiError> {
    user.require(policy::PRESCRIPTIONS)?;
    let id = parse_id("patient id", &id)?;
    let prescriptions =
        blocking(move || PrescriptionService::new(state.store).list_for_patient(id)).await?;
    Ok(Json(ListEnvelope::new(prescriptions)))
}
