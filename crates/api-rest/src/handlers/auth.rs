//! Login and the caller's own profile.

use crate::error::{ApiError, ErrorBody};
use crate::extract::{ApiJson, AuthUser};
use crate::response::{Envelope, LoginEnvelope};
use crate::{blocking, AppState};
use api_shared::auth::{login as check_login, LoginRequest};
use api_shared::policy;
use axum::extract::State;
use axum::Json;
use curamind_core::users::{User, UserPatch, UserService};
use serde::Deserialize;
use utoipa::ToSchema;

/// Fields a staff member may change on their own account.
#[derive(Clone, Debug, Default, Deserialize, ToSchema)]
pub struct ProfilePatch {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub password: Option<String>,
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token and account, as {success, token, data}", body = User),
        (status = 400, description = "Missing fields or unknown user type", body = ErrorBody),
        (status = 401, description = "Invalid credentials", body = ErrorBody)
    ),
    tag = "auth"
)]
/// Log in as an admin, doctor or receptionist.
#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<Json<LoginEnvelope>, ApiError> {
    let outcome = blocking(move || {
        let users = UserService::new(state.store.clone());
        check_login(&users, &state.issuer, request)
    })
    .await?;

    Ok(Json(LoginEnvelope {
        success: true,
        token: outcome.token,
        data: outcome.user,
    }))
}

#[utoipa::path(
    get,
    path = "/auth/me",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "The caller's account", body = User),
        (status = 401, description = "Missing or invalid token", body = ErrorBody)
    ),
    tag = "auth"
)]
#[axum::debug_handler]
pub async fn me(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Envelope<User>>, ApiError> {
    let identity = user.require(policy::STAFF)?;
    let account = blocking(move || {
        UserService::new(state.store).get(identity.id(), identity.role())
    })
    .await?;
    Ok(Json(Envelope::new(account)))
}

#[utoipa::path(
    put,
    path = "/auth/me",
    request_body = ProfilePatch,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Updated account", body = User),
        (status = 400, description = "Invalid field", body = ErrorBody),
        (status = 401, description = "Missing or invalid token", body = ErrorBody)
    ),
    tag = "auth"
)]
/// Update the caller's own name, phone or password.
#[axum::debug_handler]
pub async fn update_me(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(patch): ApiJson<ProfilePatch>,
) -> Result<Json<Envelope<User>>, ApiError> {
    let identity = user.require(policy::STAFF)?;
    let account = blocking(move || {
        UserService::new(state.store).update(
            identity.id(),
            identity.role(),
            UserPatch {
                name: patch.name,
                phone: patch.phone,
                password: patch.password,
                ..Default::default()
            },
        )
    })
    .await?;
    Ok(Json(Envelope::new(account)))
}
