//! Token issuing, verification and role gating.
//!
//! Tokens are HS256-signed JWTs carrying the subject id, role and email. An [`Identity`] can
//! only be obtained from [`TokenIssuer::verify`], and [`authorize`] takes one by reference,
//! so the role gate cannot run on an unverified caller.

use crate::config::AuthConfig;
use chrono::{DateTime, Duration, Utc};
use curamind_core::users::{User, UserService};
use curamind_core::{CoreError, RecordId, Role};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

const BEARER_PREFIX: &str = "Bearer ";

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Not authorized, no token")]
    MissingToken,
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    Expired,
    #[error("Forbidden: insufficient role")]
    Forbidden,
    #[error("Server configuration error")]
    Misconfigured,
    #[error("Invalid user type")]
    InvalidUserType,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("failed to sign token: {0}")]
    Signing(jsonwebtoken::errors::Error),
    #[error(transparent)]
    Core(CoreError),
}

impl From<CoreError> for AuthError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidCredentials => AuthError::InvalidCredentials,
            other => AuthError::Core(other),
        }
    }
}

/// JWT claim set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

/// A caller whose token has been verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    id: RecordId,
    role: Role,
    email: String,
}

impl Identity {
    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn email(&self) -> &str {
        &self.email
    }
}

struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

/// Issues and verifies session tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    keys: Option<std::sync::Arc<SigningKeys>>,
    ttl: Duration,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("configured", &self.is_configured())
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl TokenIssuer {
    pub fn new(cfg: &AuthConfig) -> Self {
        let keys = cfg.jwt_secret().map(|secret| {
            std::sync::Arc::new(SigningKeys {
                encoding: EncodingKey::from_secret(secret.as_bytes()),
                decoding: DecodingKey::from_secret(secret.as_bytes()),
            })
        });
        Self {
            keys,
            ttl: Duration::hours(i64::from(cfg.token_ttl_hours())),
        }
    }

    /// Whether a signing secret was supplied.
    pub fn is_configured(&self) -> bool {
        self.keys.is_some()
    }

    pub fn issue(&self, id: RecordId, role: Role, email: &str) -> Result<String, AuthError> {
        self.issue_at(id, role, email, Utc::now())
    }

    /// Issues a token as if the current time were `now`.
    pub fn issue_at(
        &self,
        id: RecordId,
        role: Role,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let keys = self.keys.as_ref().ok_or(AuthError::Misconfigured)?;
        let claims = Claims {
            sub: id.to_string(),
            role,
            email: email.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding).map_err(AuthError::Signing)
    }

    /// Checks signature and expiry, returning the caller's identity.
    pub fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        let keys = self.keys.as_ref().ok_or(AuthError::Misconfigured)?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let data = decode::<Claims>(token, &keys.decoding, &validation).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::Expired,
            _ => {
                tracing::debug!("rejected token: {e}");
                AuthError::InvalidToken
            }
        })?;

        let id = RecordId::parse(&data.claims.sub).map_err(|_| AuthError::InvalidToken)?;
        Ok(Identity {
            id,
            role: data.claims.role,
            email: data.claims.email,
        })
    }
}

/// Extracts the token from an `Authorization` header value.
///
/// An absent header, another scheme or an empty token all count as no token.
pub fn bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
    header
        .and_then(|h| h.strip_prefix(BEARER_PREFIX))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::MissingToken)
}

/// Role gate: passes only when the verified role is in `allowed`.
pub fn authorize(identity: &Identity, allowed: &[Role]) -> Result<(), AuthError> {
    if allowed.contains(&identity.role) {
        Ok(())
    } else {
        tracing::debug!(user_id = %identity.id, role = %identity.role, "role gate refused request");
        Err(AuthError::Forbidden)
    }
}

/// Body of `POST /auth/login`.
#[derive(Clone, Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    /// One of `admin`, `doctor`, `receptionist`.
    pub user_type: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub token: String,
    pub user: User,
}

/// Checks credentials for the claimed role and issues a token.
///
/// # Errors
///
/// - [`AuthError::InvalidUserType`] when `userType` is not a known role
/// - [`AuthError::InvalidCredentials`] for an unknown account or a wrong password alike
/// - [`AuthError::Misconfigured`] when no signing secret is configured
pub fn login(
    users: &UserService,
    issuer: &TokenIssuer,
    request: LoginRequest,
) -> Result<LoginOutcome, AuthError> {
    let role: Role = request
        .user_type
        .as_deref()
        .unwrap_or_default()
        .parse()
        .map_err(|_| AuthError::InvalidUserType)?;

    let email = request.email.filter(|e| !e.trim().is_empty());
    let password = request.password.filter(|p| !p.is_empty());
    let (Some(email), Some(password)) = (email, password) else {
        return Err(CoreError::Validation("email and password are required".into()).into());
    };

    if !issuer.is_configured() {
        tracing::error!("login attempted but JWT_SECRET is not configured");
        return Err(AuthError::Misconfigured);
    }

    let user = users.authenticate(&email, &password, role)?;
    let token = issuer.issue(user.id, user.role, &user.email)?;
    tracing::info!(user_id = %user.id, role = %user.role, "login succeeded");

    Ok(LoginOutcome { token, user })
}
