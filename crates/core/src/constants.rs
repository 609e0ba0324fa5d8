//! Constants used throughout the CuraMind core crate.

/// Default SQLite database path when no explicit path is configured.
pub const DEFAULT_DATABASE_PATH: &str = "curamind.db";

/// Special database path that selects a private in-memory database.
pub const IN_MEMORY_DATABASE: &str = ":memory:";

/// PBKDF2-SHA256 rounds used for new password hashes unless overridden.
pub const DEFAULT_PASSWORD_ITERATIONS: u32 = 600_000;

/// Minimum accepted password length for staff accounts.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Page size used by patient listings when the caller does not ask for one.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Upper bound on the page size of patient listings.
pub const MAX_PAGE_SIZE: u32 = 100;
