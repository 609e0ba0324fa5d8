//! Request extractors.
//!
//! Every rejection is turned into an [`ApiError`], so malformed bodies and missing tokens
//! get the same JSON error shape as failures raised by handlers.

use crate::error::ApiError;
use crate::AppState;
use api_shared::auth::{authorize, bearer_token};
use api_shared::Identity;
use axum::extract::{FromRequest, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use curamind_core::Role;

/// Caller whose bearer token verified. Use [`AuthUser::require`] to apply a role gate.
#[derive(Debug, Clone)]
pub struct AuthUser(Identity);

impl AuthUser {
    /// Passes the identity through only if its role is in `allowed`.
    pub fn require(self, allowed: &[Role]) -> Result<Identity, ApiError> {
        authorize(&self.0, allowed)?;
        Ok(self.0)
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());
        let token = bearer_token(header)?;
        let identity = state.issuer.verify(token)?;
        Ok(AuthUser(identity))
    }
}

/// JSON body extractor with API-shaped rejections.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Query string extractor with API-shaped rejections.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);
