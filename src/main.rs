use anyhow::Context;
use api_rest::{cors_layer, router, AppState};
use api_shared::config::token_ttl_from_env_value;
use api_shared::{AuthConfig, TokenIssuer};
use curamind_core::config::{
    database_path_from_env_value, flag_from_env_value, password_iterations_from_env_value,
};
use curamind_core::{CoreConfig, Store};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the CuraMind server
///
/// # Environment Variables
/// - `CURAMIND_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `CURAMIND_DATABASE_PATH`: SQLite database file (default: "curamind.db")
/// - `CURAMIND_PASSWORD_ITERATIONS`: PBKDF2 rounds for new password hashes
/// - `CURAMIND_STRICT_STATUS_TRANSITIONS`: reject off-lifecycle appointment status changes
/// - `JWT_SECRET`: token signing secret; without it every token operation fails
/// - `CURAMIND_TOKEN_TTL_HOURS`: token lifetime (default: 24)
/// - `FRONTEND_ORIGIN`: the only origin CORS allows; unset means any origin
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("curamind_server=info".parse()?)
                .add_directive("curamind_core=info".parse()?)
                .add_directive("api_rest=info".parse()?)
                .add_directive("tower_http=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let core_cfg = CoreConfig::new(
        database_path_from_env_value(std::env::var("CURAMIND_DATABASE_PATH").ok()),
        password_iterations_from_env_value(std::env::var("CURAMIND_PASSWORD_ITERATIONS").ok())?,
        flag_from_env_value(std::env::var("CURAMIND_STRICT_STATUS_TRANSITIONS").ok())?,
    )?;
    tracing::info!(
        path = %core_cfg.database_path().display(),
        strict_status_transitions = core_cfg.strict_status_transitions(),
        "opening record store"
    );
    let store = Store::open(Arc::new(core_cfg)).context("failed to open the record store")?;

    let auth_cfg = AuthConfig::new(
        std::env::var("JWT_SECRET").ok(),
        token_ttl_from_env_value(std::env::var("CURAMIND_TOKEN_TTL_HOURS").ok())?,
    )?;
    let issuer = TokenIssuer::new(&auth_cfg);
    if !issuer.is_configured() {
        tracing::error!("JWT_SECRET is not set; login and every protected route will fail");
    }

    let rest_addr = std::env::var("CURAMIND_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let frontend_origin = std::env::var("FRONTEND_ORIGIN").ok();

    let app = router(AppState::new(store, issuer)).layer(cors_layer(frontend_origin.as_deref()));

    tracing::info!("++ Starting CuraMind REST on {}", rest_addr);
    let listener = tokio::net::TcpListener::bind(&rest_addr)
        .await
        .with_context(|| format!("failed to bind {rest_addr}"))?;
    axum::serve(listener, app).await?;

    Ok(())
}
