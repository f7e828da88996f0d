//! One-way password hashing. Only PHC-format hashes are ever stored.

use crate::error::AppError;
use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};

pub trait PasswordScheme: Send + Sync {
    fn hash(&self, plaintext: &str) -> Result<String, AppError>;

    /// False for a wrong password and for a hash this scheme cannot read.
    fn verify(&self, plaintext: &str, hash: &str) -> bool;
}

/// Argon2id with a random per-password salt.
#[derive(Clone)]
pub struct Argon2Scheme {
    params: Params,
}

impl Default for Argon2Scheme {
    fn default() -> Self {
        Argon2Scheme {
            params: Params::default(),
        }
    }
}

impl Argon2Scheme {
    /// Custom cost: memory in KiB, iterations, lanes.
    pub fn with_params(memory_cost: u32, time_cost: u32, parallelism: u32) -> Result<Self, AppError> {
        let params = Params::new(memory_cost, time_cost, parallelism, None)
            .map_err(|e| AppError::Validation(format!("invalid argon2 parameters: {}", e)))?;
        Ok(Argon2Scheme { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl PasswordScheme for Argon2Scheme {
    fn hash(&self, plaintext: &str) -> Result<String, AppError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2()
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| AppError::Store(format!("password hashing failed: {}", e)))
    }

    fn verify(&self, plaintext: &str, hash: &str) -> bool {
        match PasswordHash::new(hash) {
            // Parameters are read from the hash itself.
            Ok(parsed) => self.argon2().verify_password(plaintext.as_bytes(), &parsed).is_ok(),
            Err(_) => false,
        }
    }
}
