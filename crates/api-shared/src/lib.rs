//! # API Shared
//!
//! Shared utilities and definitions for CuraMind APIs.
//!
//! Contains:
//! - Token issuing and verification, and the role gate (`auth` module)
//! - Per-route role allow-lists (`policy` module)
//! - Shared services like `HealthService`
//!
//! Used by `api-rest` and the CLI for common functionality.

pub mod auth;
pub mod config;
pub mod health;
pub mod policy;

pub use auth::{AuthError, Identity, TokenIssuer};
pub use config::AuthConfig;
pub use health::{HealthRes, HealthService};
