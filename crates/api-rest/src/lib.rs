//! # API REST
//!
//! REST API implementation for CuraMind.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - Bearer token extraction and per-route role gates
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON envelopes, error shape, CORS, request tracing)
//!
//! Uses `api-shared` for tokens and allow-lists and `curamind-core` for every operation.

#![warn(rust_2018_idioms)]

pub mod error;
pub mod extract;
pub mod handlers;
pub mod response;

use api_shared::TokenIssuer;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, patch, post, put};
use axum::Router;
use curamind_core::Store;
use error::ApiError;
use handlers::{appointments, auth, health, patients, prescriptions, staff};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

/// Application state shared by every handler.
#[derive(Clone, Debug)]
pub struct AppState {
    pub store: Store,
    pub issuer: TokenIssuer,
}

impl AppState {
    pub fn new(store: Store, issuer: TokenIssuer) -> Self {
        Self { store, issuer }
    }
}

/// Runs a synchronous store operation off the async workers.
pub(crate) async fn blocking<T, E, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Into<ApiError> + Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result.map_err(Into::into),
        Err(e) => Err(ApiError::Internal(format!("worker task failed: {e}"))),
    }
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        auth::login,
        auth::me,
        auth::update_me,
        patients::list_patients,
        patients::create_patient,
        patients::get_patient,
        patients::update_patient,
        patients::delete_patient,
        patients::add_history_entry,
        appointments::list_appointments,
        appointments::create_appointment,
        appointments::get_appointment,
        appointments::update_appointment,
        appointments::update_status,
        appointments::delete_appointment,
        staff::list_doctors,
        staff::create_doctor,
        staff::get_doctor,
        staff::update_doctor,
        staff::delete_doctor,
        staff::doctor_appointments,
        staff::list_receptionists,
        staff::create_receptionist,
        staff::get_receptionist,
        staff::update_receptionist,
        staff::delete_receptionist,
        prescriptions::create_manual,
        prescriptions::update_prescription,
        prescriptions::list_for_patient,
    ),
    components(schemas(
        api_shared::HealthRes,
        api_shared::auth::LoginRequest,
        auth::ProfilePatch,
        error::ErrorBody,
        curamind_core::Role,
        curamind_core::users::User,
        curamind_core::users::DoctorProfile,
        curamind_core::users::NewUser,
        curamind_core::users::UserPatch,
        curamind_core::patients::Patient,
        curamind_core::patients::Gender,
        curamind_core::patients::Address,
        curamind_core::patients::AddressInput,
        curamind_core::patients::Medication,
        curamind_core::patients::HistoryEntry,
        curamind_core::patients::NewPatient,
        curamind_core::patients::PatientPatch,
        curamind_core::patients::PatientPage,
        curamind_core::appointments::Appointment,
        curamind_core::appointments::AppointmentStatus,
        curamind_core::appointments::NewAppointment,
        curamind_core::appointments::AppointmentPatch,
        curamind_core::appointments::StatusUpdate,
        curamind_core::prescriptions::Prescription,
        curamind_core::prescriptions::PrescriptionSource,
        curamind_core::prescriptions::NewPrescription,
        curamind_core::prescriptions::PrescriptionPatch,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Login and own profile"),
        (name = "patients", description = "Patient registry"),
        (name = "appointments", description = "Appointment ledger"),
        (name = "doctors", description = "Doctor directory"),
        (name = "receptionists", description = "Receptionist directory"),
        (name = "prescriptions", description = "Doctor-authored prescriptions"),
    )
)]
pub struct ApiDoc;

/// Builds the application router with OpenAPI docs and request tracing.
///
/// CORS is left to the caller, see [`cors_layer`].
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me).put(auth::update_me))
        .route(
            "/patients",
            get(patients::list_patients).post(patients::create_patient),
        )
        .route(
            "/patients/:id",
            get(patients::get_patient)
                .put(patients::update_patient)
                .delete(patients::delete_patient),
        )
        .route("/patients/:id/history", post(patients::add_history_entry))
        .route(
            "/appointments",
            get(appointments::list_appointments).post(appointments::create_appointment),
        )
        .route(
            "/appointments/:id",
            get(appointments::get_appointment)
                .put(appointments::update_appointment)
                .delete(appointments::delete_appointment),
        )
        .route("/appointments/:id/status", patch(appointments::update_status))
        .route(
            "/doctors",
            get(staff::list_doctors).post(staff::create_doctor),
        )
        .route(
            "/doctors/:id",
            get(staff::get_doctor)
                .put(staff::update_doctor)
                .delete(staff::delete_doctor),
        )
        .route("/doctors/:id/appointments", get(staff::doctor_appointments))
        .route(
            "/receptionists",
            get(staff::list_receptionists).post(staff::create_receptionist),
        )
        .route(
            "/receptionists/:id",
            get(staff::get_receptionist)
                .put(staff::update_receptionist)
                .delete(staff::delete_receptionist),
        )
        .route("/prescriptions/manual", post(prescriptions::create_manual))
        .route("/prescriptions/:id", put(prescriptions::update_prescription))
        .route(
            "/prescriptions/patient/:id",
            get(prescriptions::list_for_patient),
        )
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS policy: only `frontend_origin` when configured, otherwise permissive.
pub fn cors_layer(frontend_origin: Option<&str>) -> CorsLayer {
    let Some(origin) = frontend_origin.map(str::trim).filter(|o| !o.is_empty()) else {
        tracing::warn!("FRONTEND_ORIGIN not set, allowing any origin");
        return CorsLayer::permissive();
    };

    match HeaderValue::from_str(origin) {
        Ok(value) => CorsLayer::new()
            .allow_origin(AllowOrigin::exact(value))
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true),
        Err(_) => {
            tracing::warn!("FRONTEND_ORIGIN '{origin}' is not a valid header value, allowing any origin");
            CorsLayer::permissive()
        }
    }
}
