//! Admin credential checks for the record listing endpoints.
//!
//! Credentials are held as SHA-256 digests and compared in constant time.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use secrecy::ExposeSecret;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::config::{AdminConfig, AdminPassword};
use crate::error::ConfigError;

type Digest32 = [u8; 32];

fn sha256(input: &[u8]) -> Digest32 {
    Sha256::digest(input).into()
}

/// Verifies admin usernames and passwords.
#[derive(Clone)]
pub struct AdminAuth {
    username: Digest32,
    password: Digest32,
}

impl std::fmt::Debug for AdminAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminAuth").finish_non_exhaustive()
    }
}

impl AdminAuth {
    pub fn new(config: &AdminConfig) -> Result<Self, ConfigError> {
        let password = match &config.password {
            AdminPassword::Plain(secret) => sha256(secret.expose_secret().as_bytes()),
            AdminPassword::Sha256Hex(hex_digest) => {
                let bytes = hex::decode(hex_digest).map_err(|e| ConfigError::InvalidValue {
                    key: "ADMIN_PASSWORD_SHA256".to_string(),
                    message: format!("not valid hex: {e}"),
                })?;
                Digest32::try_from(bytes.as_slice()).map_err(|_| ConfigError::InvalidValue {
                    key: "ADMIN_PASSWORD_SHA256".to_string(),
                    message: format!("expected 32 bytes, got {}", bytes.len()),
                })?
            }
        };

        Ok(Self {
            username: sha256(config.username.as_bytes()),
            password,
        })
    }

    /// Check a username/password pair. Both halves are always compared.
    pub fn verify(&self, username: &str, password: &str) -> bool {
        let user_ok = self.username[..].ct_eq(&sha256(username.as_bytes())[..]);
        let pass_ok = self.password[..].ct_eq(&sha256(password.as_bytes())[..]);
        (user_ok & pass_ok).into()
    }

    /// Check an `Authorization: Basic ...` header value.
    pub fn verify_basic(&self, header: &str) -> bool {
        let Some(encoded) = header
            .strip_prefix("Basic ")
            .or_else(|| header.strip_prefix("basic "))
        else {
            return false;
        };
        let Ok(decoded) = STANDARD.decode(encoded.trim()) else {
            return false;
        };
        let Ok(pair) = String::from_utf8(decoded) else {
            return false;
        };
        match pair.split_once(':') {
            Some((username, password)) => self.verify(username, password),
            None => false,
        }
    }
}
