//! Appointment ledger endpoints.

use crate::error::{ApiError, ErrorBody};
use crate::extract::{ApiJson, ApiQuery, AuthUser};
use crate::response::{Envelope, ListEnvelope, MessageEnvelope};
use crate::{blocking, AppState};
use api_shared::policy;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use curamind_core::appointments::{
    Appointment, AppointmentPatch, AppointmentQuery, AppointmentService, NewAppointment,
    StatusUpdate,
};
use curamind_core::validation::parse_id;

#[utoipa::path(
    get,
    path = "/appointments",
    params(AppointmentQuery),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Appointments ordered by date then time", body = [Appointment]),
        (status = 400, description = "Invalid filter", body = ErrorBody),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 403, description = "Role not permitted", body = ErrorBody)
    ),
    tag = "appointments"
)]
/// List appointments
///
/// Filters by inclusive date range, status, doctor and patient.
#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<AppState>,
    user: AuthUser,
    ApiQuery(query): ApiQuery<AppointmentQuery>,
) -> Result<Json<ListEnvelope<Appointment>>, ApiError> {
    user.require(policy::APPOINTMENT_READ)?;
    let appointments = blocking(move || AppointmentService::new(state.store).list(query)).await?;
    Ok(Json(ListEnvelope::new(appointments)))
}

#[utoipa::path(
    post,
    path = "/appointments",
    request_body = NewAppointment,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Appointment booked with status pending", body = Appointment),
        (status = 400, description = "Missing or malformed field", body = ErrorBody),
        (status = 404, description = "Patient or doctor not found", body = ErrorBody),
        (status = 409, description = "Patient already booked that day", body = ErrorBody)
    ),
    tag = "appointments"
)]
/// Book an appointment
#[axum::debug_handler]
pub async fn create_appointment(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(input): ApiJson<NewAppointment>,
) -> Result<(StatusCode, Json<Envelope<Appointment>>), ApiError> {
    user.require(policy::APPOINTMENT_WRITE)?;
    let appointment =
        blocking(move || AppointmentService::new(state.store).create(input)).await?;
    Ok((StatusCode::CREATED, Json(Envelope::new(appointment))))
}

#[utoipa::path(
    get,
    path = "/appointments/{id}",
    params(("id" = String, Path, description = "Appointment id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "The appointment", body = Appointment),
        (status = 404, description = "Appointment not found", body = ErrorBody)
    ),
    tag = "appointments"
)]
#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Envelope<Appointment>>, ApiError> {
    user.require(policy::APPOINTMENT_READ)?;
    let id = parse_id("appointment id", &id)?;
    let appointment = blocking(move || AppointmentService::new(state.store).get(id)).await?;
    Ok(Json(Envelope::new(appointment)))
}

#[utoipa::path(
    put,
    path = "/appointments/{id}",
    params(("id" = String, Path, description = "Appointment id")),
    request_body = AppointmentPatch,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Updated appointment", body = Appointment),
        (status = 400, description = "Invalid field", body = ErrorBody),
        (status = 404, description = "Appointment or doctor not found", body = ErrorBody),
        (status = 409, description = "Patient already booked that day", body = ErrorBody)
    ),
    tag = "appointments"
)]
/// Change the doctor, date, time, reason or notes of an appointment
#[axum::debug_handler]
pub async fn update_appointment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<AppointmentPatch>,
) -> Result<Json<Envelope<Appointment>>, ApiError> {
    user.require(policy::APPOINTMENT_WRITE)?;
    let id = parse_id("appointment id", &id)?;
    let appointment =
        blocking(move || AppointmentService::new(state.store).update(id, patch)).await?;
    Ok(Json(Envelope::new(appointment)))
}

#[utoipa::path(
    patch,
    path = "/appointments/{id}/status",
    params(("id" = String, Path, description = "Appointment id")),
    request_body = StatusUpdate,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Updated appointment", body = Appointment),
        (status = 400, description = "Unknown status", body = ErrorBody),
        (status = 404, description = "Appointment not found", body = ErrorBody),
        (status = 409, description = "Transition refused or day already booked", body = ErrorBody)
    ),
    tag = "appointments"
)]
/// Set the status of an appointment
#[axum::debug_handler]
pub async fn update_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    ApiJson(update): ApiJson<StatusUpdate>,
) -> Result<Json<Envelope<Appointment>>, ApiError> {
    let identity = user.require(policy::APPOINTMENT_STATUS)?;
    let id = parse_id("appointment id", &id)?;
    let status = update.parse()?;
    tracing::debug!(appointment_id = %id, %status, by = %identity.id(), "status change requested");

    let appointment =
        blocking(move || AppointmentService::new(state.store).update_status(id, status)).await?;
    Ok(Json(Envelope::new(appointment)))
}

#[utoipa::path(
    delete,
    path = "/appointments/{id}",
    params(("id" = String, Path, description = "Appointment id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Appointment deleted"),
        (status = 404, description = "Appointment not found", body = ErrorBody)
    ),
    tag = "appointments"
)]
#[axum::debug_handler]
pub async fn delete_appointment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<MessageEnvelope>, ApiError> {
    user.require(policy::APPOINTMENT_WRITE)?;
    let id = parse_id("appointment id", &id)?;
    blocking(move || AppointmentService::new(state.store).delete(id)).await?;
    Ok(Json(MessageEnvelope::new("Appointment deleted")))
}
