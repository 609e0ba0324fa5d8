//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into the store and
//! services. Request handling never reads process-wide environment variables, which keeps
//! behaviour consistent in multi-threaded runtimes and test harnesses.

use crate::constants::{DEFAULT_DATABASE_PATH, DEFAULT_PASSWORD_ITERATIONS, IN_MEMORY_DATABASE};
use crate::{CoreError, CoreResult};
use std::path::{Path, PathBuf};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    database_path: PathBuf,
    password_iterations: u32,
    strict_status_transitions: bool,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] if the database path is empty or
    /// `password_iterations` is zero.
    pub fn new(
        database_path: PathBuf,
        password_iterations: u32,
        strict_status_transitions: bool,
    ) -> CoreResult<Self> {
        if database_path.as_os_str().is_empty() {
            return Err(CoreError::InvalidConfig(
                "database path cannot be empty".into(),
            ));
        }
        if password_iterations == 0 {
            return Err(CoreError::InvalidConfig(
                "password iterations must be greater than zero".into(),
            ));
        }

        Ok(Self {
            database_path,
            password_iterations,
            strict_status_transitions,
        })
    }

    /// Configuration for an in-memory database, mostly useful in tests and tooling.
    pub fn in_memory(password_iterations: u32) -> CoreResult<Self> {
        Self::new(PathBuf::from(IN_MEMORY_DATABASE), password_iterations, false)
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn is_in_memory(&self) -> bool {
        self.database_path.as_os_str() == IN_MEMORY_DATABASE
    }

    pub fn password_iterations(&self) -> u32 {
        self.password_iterations
    }

    /// Whether appointment status changes must follow the nominal lifecycle.
    pub fn strict_status_transitions(&self) -> bool {
        self.strict_status_transitions
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Resolve the database path from an optional environment value.
pub fn database_path_from_env_value(value: Option<String>) -> PathBuf {
    PathBuf::from(non_blank(value).unwrap_or_else(|| DEFAULT_DATABASE_PATH.into()))
}

/// Parse the PBKDF2 iteration count from an optional string value.
///
/// If `value` is `None` or blank, returns the default iteration count.
pub fn password_iterations_from_env_value(value: Option<String>) -> CoreResult<u32> {
    match non_blank(value) {
        None => Ok(DEFAULT_PASSWORD_ITERATIONS),
        Some(v) => v.parse::<u32>().map_err(|_| {
            CoreError::InvalidConfig(format!("password iterations must be a number, got '{v}'"))
        }),
    }
}

/// Parse a boolean flag such as `CURAMIND_STRICT_STATUS_TRANSITIONS`.
///
/// Accepts `true/false`, `1/0`, `yes/no` (case-insensitive). Missing or blank means `false`.
pub fn flag_from_env_value(value: Option<String>) -> CoreResult<bool> {
    match non_blank(value).map(|v| v.to_ascii_lowercase()) {
        None => Ok(false),
        Some(v) => match v.as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err(CoreError::InvalidConfig(format!(
                "expected a boolean flag, got '{v}'"
            ))),
        },
    }
}
