//! Salted password hashing.
//!
//! Hashes are stored as `pbkdf2-sha256$<iterations>$<salt>$<hash>` with base64 (no padding)
//! salt and hash. The iteration count travels with the hash so the configured cost can be
//! raised without invalidating existing accounts.

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

const SCHEME: &str = "pbkdf2-sha256";
const SALT_LENGTH: usize = 16;
const HASH_LENGTH: usize = 32;

#[derive(Clone, Copy, Debug)]
pub struct PasswordHasher {
    iterations: u32,
}

impl PasswordHasher {
    pub fn new(iterations: u32) -> Self {
        Self { iterations }
    }

    /// Hashes `password` with a fresh random salt.
    pub fn hash(&self, password: &str) -> String {
        let mut salt = [0u8; SALT_LENGTH];
        rand::thread_rng().fill_bytes(&mut salt);
        let hash = derive(password, &salt, self.iterations);

        format!(
            "{SCHEME}${}${}${}",
            self.iterations,
            STANDARD_NO_PAD.encode(salt),
            STANDARD_NO_PAD.encode(hash)
        )
    }

    /// Checks `password` against an encoded hash using a constant-time comparison.
    ///
    /// Malformed encodings never verify.
    pub fn verify(&self, password: &str, encoded: &str) -> bool {
        let Some((iterations, salt, expected)) = decode(encoded) else {
            tracing::warn!("stored password hash is malformed");
            return false;
        };
        let actual = derive(password, &salt, iterations);
        actual.as_slice().ct_eq(expected.as_slice()).into()
    }

    /// Burns the same work as a real verification, for lookups that found no account.
    pub fn verify_dummy(&self, password: &str) {
        let _ = derive(password, &[0u8; SALT_LENGTH], self.iterations);
    }
}

fn derive(password: &str, salt: &[u8], iterations: u32) -> [u8; HASH_LENGTH] {
    let mut out = [0u8; HASH_LENGTH];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut out);
    out
}

fn decode(encoded: &str) -> Option<(u32, Vec<u8>, Vec<u8>)> {
    let mut parts = encoded.split('$');
    if parts.next()? != SCHEME {
        return None;
    }
    let iterations = parts.next()?.parse::<u32>().ok().filter(|i| *i > 0)?;
    let salt = STANDARD_NO_PAD.decode(parts.next()?).ok()?;
    let hash = STANDARD_NO_PAD.decode(parts.next()?).ok()?;
    if parts.next().is_some() || hash.len() != HASH_LENGTH {
        return None;
    }
    Some((iterations, salt, hash))
}
