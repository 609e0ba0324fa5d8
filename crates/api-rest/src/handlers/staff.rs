//! Doctor and receptionist directories. Mutations are admin only.

use crate::error::{ApiError, ErrorBody};
use crate::extract::{ApiJson, ApiQuery, AuthUser};
use crate::response::{Envelope, ListEnvelope, MessageEnvelope};
use crate::{blocking, AppState};
use api_shared::policy;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use curamind_core::appointments::{Appointment, AppointmentQuery, AppointmentService};
use curamind_core::users::{DoctorProfile, NewUser, User, UserPatch, UserService};
use curamind_core::validation::parse_id;
use curamind_core::{RecordId, Role};

async fn list(state: AppState, role: Role) -> Result<Json<ListEnvelope<User>>, ApiError> {
    let users = blocking(move || UserService::new(state.store).list(role)).await?;
    Ok(Json(ListEnvelope::new(users)))
}

async fn create(
    state: AppState,
    role: Role,
    input: NewUser,
) -> Result<(StatusCode, Json<Envelope<User>>), ApiError> {
    let user = blocking(move || UserService::new(state.store).create(role, input)).await?;
    Ok((StatusCode::CREATED, Json(Envelope::new(user))))
}

async fn update(
    state: AppState,
    role: Role,
    id: RecordId,
    patch: UserPatch,
) -> Result<Json<Envelope<User>>, ApiError> {
    let user = blocking(move || UserService::new(state.store).update(id, role, patch)).await?;
    Ok(Json(Envelope::new(user)))
}

async fn delete(state: AppState, role: Role, id: RecordId) -> Result<Json<MessageEnvelope>, ApiError> {
    blocking(move || UserService::new(state.store).delete(id, role)).await?;
    Ok(Json(MessageEnvelope::new(format!("{} deleted", role.label()))))
}

#[utoipa::path(
    get,
    path = "/doctors",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All doctors", body = [User]),
        (status = 403, description = "Role not permitted", body = ErrorBody)
    ),
    tag = "doctors"
)]
#[axum::debug_handler]
pub async fn list_doctors(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ListEnvelope<User>>, ApiError> {
    user.require(policy::DOCTOR_READ)?;
    list(state, Role::Doctor).await
}

#[utoipa::path(
    post,
    path = "/doctors",
    request_body = NewUser,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Doctor created", body = User),
        (status = 400, description = "Missing or invalid field", body = ErrorBody),
        (status = 403, description = "Admins only", body = ErrorBody),
        (status = 409, description = "Email already used by a doctor", body = ErrorBody)
    ),
    tag = "doctors"
)]
#[axum::debug_handler]
pub async fn create_doctor(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(input): ApiJson<NewUser>,
) -> Result<(StatusCode, Json<Envelope<User>>), ApiError> {
    user.require(policy::STAFF_WRITE)?;
    create(state, Role::Doctor, input).await
}

#[utoipa::path(
    get,
    path = "/doctors/{id}",
    params(("id" = String, Path, description = "Doctor id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Doctor with patient and appointment ids", body = DoctorProfile),
        (status = 404, description = "Doctor not found", body = ErrorBody)
    ),
    tag = "doctors"
)]
/// Read a doctor with their assigned patients and appointments
#[axum::debug_handler]
pub async fn get_doctor(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Envelope<DoctorProfile>>, ApiError> {
    user.require(policy::DOCTOR_READ)?;
    let id = parse_id("doctor id", &id)?;
    let profile = blocking(move || UserService::new(state.store).doctor_profile(id)).await?;
    Ok(Json(Envelope::new(profile)))
}

#[utoipa::path(
    put,
    path = "/doctors/{id}",
    params(("id" = String, Path, description = "Doctor id")),
    request_body = UserPatch,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Updated doctor", body = User),
        (status = 404, description = "Doctor not found", body = ErrorBody),
        (status = 409, description = "Email already used by a doctor", body = ErrorBody)
    ),
    tag = "doctors"
)]
#[axum::debug_handler]
pub async fn update_doctor(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<UserPatch>,
) -> Result<Json<Envelope<User>>, ApiError> {
    user.require(policy::STAFF_WRITE)?;
    let id = parse_id("doctor id", &id)?;
    update(state, Role::Doctor, id, patch).await
}

#[utoipa::path(
    delete,
    path = "/doctors/{id}",
    params(("id" = String, Path, description = "Doctor id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Doctor deleted; patients unassigned and appointments removed"),
        (status = 404, description = "Doctor not found", body = ErrorBody)
    ),
    tag = "doctors"
)]
#[axum::debug_handler]
pub async fn delete_doctor(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<MessageEnvelope>, ApiError> {
    user.require(policy::STAFF_WRITE)?;
    let id = parse_id("doctor id", &id)?;
    delete(state, Role::Doctor, id).await
}

#[utoipa::path(
    get,
    path = "/doctors/{id}/appointments",
    params(
        ("id" = String, Path, description = "Doctor id"),
        AppointmentQuery
    ),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "The doctor's appointments by date then time", body = [Appointment]),
        (status = 404, description = "Doctor not found", body = ErrorBody)
    ),
    tag = "doctors"
)]
#[axum::debug_handler]
pub async fn doctor_appointments(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    ApiQuery(query): ApiQuery<AppointmentQuery>,
) -> Result<Json<ListEnvelope<Appointment>>, ApiError> {
    user.require(policy::APPOINTMENT_READ)?;
    let id = parse_id("doctor id", &id)?;
    let appointments =
        blocking(move || AppointmentService::new(state.store).list_for_doctor(id, query)).await?;
    Ok(Json(ListEnvelope::new(appointments)))
}

#[utoipa::path(
    get,
    path = "/receptionists",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All receptionists", body = [User]),
        (status = 403, description = "Admins only", body = ErrorBody)
    ),
    tag = "receptionists"
)]
#[axum::debug_handler]
pub async fn list_receptionists(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ListEnvelope<User>>, ApiError> {
    user.require(policy::RECEPTIONIST_READ)?;
    list(state, Role::Receptionist).await
}

#[utoipa::path(
    post,
    path = "/receptionists",
    request_body = NewUser,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Receptionist created", body = User),
        (status = 400, description = "Missing or invalid field", body = ErrorBody),
        (status = 409, description = "Email already used by a receptionist", body = ErrorBody)
    ),
    tag = "receptionists"
)]
#[axum::debug_handler]
pub async fn create_receptionist(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(input): ApiJson<NewUser>,
) -> Result<(StatusCode, Json<Envelope<User>>), ApiError> {
    user.require(policy::STAFF_WRITE)?;
    create(state, Role::Receptionist, input).await
}

#[utoipa::path(
    get,
    path = "/receptionists/{id}",
    params(("id" = String, Path, description = "Receptionist id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "The receptionist", body = User),
        (status = 404, description = "Receptionist not found", body = ErrorBody)
    ),
    tag = "receptionists"
)]
#[axum::debug_handler]
pub async fn get_receptionist(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Envelope<User>>, ApiError> {
    user.require(policy::RECEPTIONIST_READ)?;
    let id = parse_id("receptionist id", &id)?;
    let receptionist =
        blocking(move || UserService::new(state.store).get(id, Role::Receptionist)).await?;
    Ok(Json(Envelope::new(receptionist)))
}

#[utoipa::path(
    put,
    path = "/receptionists/{id}",
    params(("id" = String, Path, description = "Receptionist id")),
    request_body = UserPatch,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Updated receptionist", body = User),
        (status = 404, description = "Receptionist not found", body = ErrorBody)
    ),
    tag = "receptionists"
)]
#[axum::debug_handler]
pub async fn update_receptionist(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<UserPatch>,
) -> Result<Json<Envelope<User>>, ApiError> {
    user.require(policy::STAFF_WRITE)?;
    let id = parse_id("receptionist id", &id)?;
    update(state, Role::Receptionist, id, patch).await
}

#[utoipa::path(
    delete,
    path = "/receptionists/{id}",
    params(("id" = String, Path, description = "Receptionist id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Receptionist deleted"),
        (status = 404, description = "Receptionist not found", body = ErrorBody)
    ),
    tag = "receptionists"
)]
#[axum::debug_handler]
pub async fn delete_receptionist(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<MessageEnvelope>, ApiError> {
    user.require(policy::STAFF_WRITE)?;
    let id = parse_id("receptionist id", &id)?;
    delete(state, Role::Receptionist, id).await
}
