use api_shared::{HealthRes, HealthService};
use axum::Json;

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    ),
    tag = "health"
)]
/// Health check endpoint for the REST API
///
/// Open to unauthenticated callers; used for monitoring and load balancer checks.
#[axum::debug_handler]
pub async fn health() -> Json<HealthRes> {
    Json(HealthService::check_health())
}
