// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Request authentication for charted.
//!
//! This crate provides:
//! - A fixed registry of API key scopes packed into a 64-bit [`ScopeBitfield`]
//! - `Authorization` header parsing for the `Bearer`, `ApiKey` and `Basic` schemes
//! - Session issue, lookup, refresh and revocation via [`SessionStore`]
//! - API key resolution by hashed token
//! - Argon2 password verification off the async runtime
//! - The per-request [`Authorizer`] and the [`PreconditionChain`] that runs
//!   after it
//!
//! Storage is abstracted behind [`UserLookup`], [`ApiKeyLookup`] and
//! [`SessionBackend`]; `charted-server-db` provides SQLite implementations.
//!
//! # Security Considerations
//!
//! - Session tokens and API keys are stored as SHA-256 hashes, never plaintext
//! - Presented tokens and passwords are held in [`SecretString`] so they never
//!   reach the logs
//! - Infrastructure failures surface as 500s and are never reported as
//!   authentication failures

pub mod api_key;
mod argon2_config;
pub mod clock;
pub mod context;
pub mod credential;
pub mod error;
pub mod identity;
pub mod password;
pub mod pipeline;
pub mod precondition;
pub mod response;
pub mod scopes;
pub mod session;
pub mod types;
pub mod user;

#[cfg(test)]
mod testing;

pub use charted_common_secret::SecretString;

pub use api_key::{generate_api_key, ApiKeyLookup, ApiKeyRecord, ApiKeyResolver, API_KEY_PREFIX};
pub use clock::{Clock, ManualClock, SystemClock};
pub use context::{Principal, RequestContext};
pub use credential::{AuthScheme, BasicCredentials, Credential, CredentialError};
pub use error::{codes, AuthError, StoreError};
pub use identity::{IdentitySink, TracingIdentitySink};
pub use password::{hash_password, verify_password_hash, Argon2PasswordVerifier, PasswordVerifier};
pub use pipeline::{Authorizer, RouteConfig};
pub use precondition::{
	access_token_expired, precondition_fn, require_admin, require_principal, require_session,
	Precondition, PreconditionChain, PreconditionResult,
};
pub use response::{ApiError, ErrorBody, Rejection};
pub use scopes::{
	api_key_scopes, ApiKeyScope, ScopeBitfield, ScopeError, ScopeRegistry, ScopeRegistryBuilder,
	MAX_SCOPES, WILDCARD,
};
pub use session::{
	run_session_sweeper, spawn_session_sweeper, InMemorySessionBackend, IssuedSession,
	LoginIdentifier, LoginRequest, Session, SessionBackend, SessionError, SessionManager,
	SessionSettings, SessionStore, TokenKind,
};
pub use types::{ApiKeyId, SessionId, UserId};
pub use user::{UserLookup, UserRecord};

/// SHA-256 of `token`, hex encoded.
///
/// Tokens are hashed before every lookup and store, so the raw value never
/// reaches a database.
pub fn hash_token(token: &str) -> String {
	use sha2::{Digest, Sha256};
	let mut hasher = Sha256::new();
	hasher.update(token.as_bytes());
	hex::encode(hasher.finalize())
}
