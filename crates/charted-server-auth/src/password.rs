// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Password hashing and verification.
//!
//! Argon2 is deliberately slow, so [`Argon2PasswordVerifier`] runs every
//! comparison on tokio's blocking pool rather than on a request task.

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, SaltString};
use argon2::PasswordVerifier as _;
use async_trait::async_trait;
use charted_common_secret::SecretString;
use tracing::{instrument, warn};

use crate::argon2_config::argon2_instance;
use crate::error::AuthError;

/// Checks a plaintext password against a stored hash.
#[async_trait]
pub trait PasswordVerifier: Send + Sync {
	async fn verify(&self, plaintext: &SecretString, stored_hash: &str) -> Result<bool, AuthError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Argon2PasswordVerifier;

#[async_trait]
impl PasswordVerifier for Argon2PasswordVerifier {
	#[instrument(level = "debug", skip_all)]
	async fn verify(&self, plaintext: &SecretString, stored_hash: &str) -> Result<bool, AuthError> {
		let plaintext = plaintext.clone();
		let stored_hash = stored_hash.to_string();

		tokio::task::spawn_blocking(move || verify_password_hash(&plaintext, &stored_hash))
			.await
			.map_err(|e| AuthError::Internal(format!("password verification task failed: {e}")))
	}
}

/// Hashes `plaintext` into an Argon2id PHC string with a fresh salt.
pub fn hash_password(plaintext: &SecretString) -> Result<String, AuthError> {
	let salt = SaltString::generate(&mut OsRng);
	argon2_instance()
		.hash_password(plaintext.expose().as_bytes(), &salt)
		.map(|hash| hash.to_string())
		.map_err(|e| AuthError::Internal(format!("failed to hash password: {e}")))
}

/// Blocking comparison. A stored hash that does not parse never matches.
pub fn verify_password_hash(plaintext: &SecretString, stored_hash: &str) -> bool {
	let parsed = match PasswordHash::new(stored_hash) {
		Ok(parsed) => parsed,
		Err(e) => {
			warn!(error = %e, "stored password hash is not a valid PHC string");
			return false;
		}
	};

	argon2_instance()
		.verify_password(plaintext.expose().as_bytes(), &parsed)
		.is_ok()
}
