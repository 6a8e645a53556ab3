// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error taxonomy for request authentication.
//!
//! [`AuthError`] is what the pipeline produces. Every variant carries a
//! stable, client-visible code and an HTTP status. Variants for which
//! [`AuthError::is_internal`] is true are infrastructure failures and surface
//! as 5xx; they must never be reported as authentication failures.

use http::StatusCode;

use crate::credential::CredentialError;
use crate::scopes::ScopeError;
use crate::session::SessionError;

/// Stable error codes. Clients match on these strings.
pub mod codes {
	pub const MISSING_AUTHORIZATION_HEADER: &str = "MISSING_AUTHORIZATION_HEADER";
	pub const INVALID_AUTHORIZATION_HEADER: &str = "INVALID_AUTHORIZATION_HEADER";
	pub const INVALID_AUTHORIZATION_HEADER_PREFIX: &str = "INVALID_AUTHORIZATION_HEADER_PREFIX";
	pub const UNKNOWN_SESSION: &str = "UNKNOWN_SESSION";
	pub const REQUIRED_REFRESH_TOKEN: &str = "REQUIRED_REFRESH_TOKEN";
	pub const JWT_DECODE_EXCEPTION: &str = "JWT_DECODE_EXCEPTION";
	pub const EXPIRED_TOKEN: &str = "EXPIRED_TOKEN";
	pub const INVALID_BASIC_AUTH_CREDENTIALS: &str = "INVALID_BASIC_AUTH_CREDENTIALS";
	pub const UNKNOWN_USER: &str = "UNKNOWN_USER";
	pub const INVALID_PASSWORD: &str = "INVALID_PASSWORD";
	pub const UNKNOWN_API_KEY: &str = "UNKNOWN_API_KEY";
	pub const SESSION_ONLY_ROUTE: &str = "SESSION_ONLY_ROUTE";
	pub const MISSING_API_KEY_SCOPE: &str = "MISSING_API_KEY_SCOPE";
	pub const ACCESS_TOKEN_TOO_NEW: &str = "ACCESS_TOKEN_TOO_NEW";
	pub const MISSING_SESSION: &str = "MISSING_SESSION";
	pub const INVALID_PERMISSIONS: &str = "INVALID_PERMISSIONS";
	pub const INTERNAL_SERVER_ERROR: &str = "INTERNAL_SERVER_ERROR";
}

/// Failure reported by an external store (user, API key or session backend).
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
	#[error("store unavailable: {0}")]
	Unavailable(String),

	#[error("corrupt record: {0}")]
	Corrupt(String),
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
	#[error("request is missing the Authorization header")]
	MissingAuthorizationHeader,

	#[error("Authorization header must be in the form '<scheme> <token>'")]
	InvalidAuthorizationHeader,

	#[error("authorization scheme '{0}' is not supported; expected Bearer, ApiKey or Basic")]
	InvalidAuthorizationHeaderPrefix(String),

	#[error("session does not exist")]
	UnknownSession,

	#[error("this route requires a refresh token")]
	RequiredRefreshToken,

	#[error("unable to decode session token: {0}")]
	JwtDecode(String),

	#[error("session token has expired")]
	ExpiredToken,

	#[error("Basic credentials must be base64 encoded 'username:password'")]
	InvalidBasicAuthCredentials,

	#[error("user '{0}' does not exist")]
	UnknownUser(String),

	#[error("invalid password")]
	InvalidPassword,

	#[error("API key does not exist")]
	UnknownApiKey,

	#[error("this route only accepts session tokens")]
	SessionOnlyRoute,

	#[error("API key {key_name} doesn't have scope {scope} enabled")]
	MissingApiKeyScope { key_name: String, scope: String },

	#[error("access token has not expired yet")]
	AccessTokenTooNew,

	#[error("this route requires an authenticated session")]
	MissingSession,

	#[error(transparent)]
	Store(#[from] StoreError),

	#[error("invalid scope configuration: {0}")]
	Scope(#[from] ScopeError),

	#[error("internal error: {0}")]
	Internal(String),
}

impl AuthError {
	pub fn code(&self) -> &'static str {
		match self {
			AuthError::MissingAuthorizationHeader => codes::MISSING_AUTHORIZATION_HEADER,
			AuthError::InvalidAuthorizationHeader => codes::INVALID_AUTHORIZATION_HEADER,
			AuthError::InvalidAuthorizationHeaderPrefix(_) => {
				codes::INVALID_AUTHORIZATION_HEADER_PREFIX
			}
			AuthError::UnknownSession => codes::UNKNOWN_SESSION,
			AuthError::RequiredRefreshToken => codes::REQUIRED_REFRESH_TOKEN,
			AuthError::JwtDecode(_) => codes::JWT_DECODE_EXCEPTION,
			AuthError::ExpiredToken => codes::EXPIRED_TOKEN,
			AuthError::InvalidBasicAuthCredentials => codes::INVALID_BASIC_AUTH_CREDENTIALS,
			AuthError::UnknownUser(_) => codes::UNKNOWN_USER,
			AuthError::InvalidPassword => codes::INVALID_PASSWORD,
			AuthError::UnknownApiKey => codes::UNKNOWN_API_KEY,
			AuthError::SessionOnlyRoute => codes::SESSION_ONLY_ROUTE,
			AuthError::MissingApiKeyScope { .. } => codes::MISSING_API_KEY_SCOPE,
			AuthError::AccessTokenTooNew => codes::ACCESS_TOKEN_TOO_NEW,
			AuthError::MissingSession => codes::MISSING_SESSION,
			AuthError::Store(_) | AuthError::Scope(_) | AuthError::Internal(_) => {
				codes::INTERNAL_SERVER_ERROR
			}
		}
	}

	pub fn status_code(&self) -> StatusCode {
		match self {
			AuthError::MissingAuthorizationHeader
			| AuthError::SessionOnlyRoute
			| AuthError::MissingApiKeyScope { .. } => StatusCode::FORBIDDEN,
			AuthError::InvalidAuthorizationHeader
			| AuthError::InvalidAuthorizationHeaderPrefix(_)
			| AuthError::JwtDecode(_)
			| AuthError::InvalidBasicAuthCredentials
			| AuthError::AccessTokenTooNew => StatusCode::NOT_ACCEPTABLE,
			AuthError::UnknownSession | AuthError::UnknownUser(_) | AuthError::UnknownApiKey => {
				StatusCode::NOT_FOUND
			}
			AuthError::RequiredRefreshToken => StatusCode::BAD_REQUEST,
			AuthError::ExpiredToken | AuthError::InvalidPassword | AuthError::MissingSession => {
				StatusCode::UNAUTHORIZED
			}
			AuthError::Store(_) | AuthError::Scope(_) | AuthError::Internal(_) => {
				StatusCode::INTERNAL_SERVER_ERROR
			}
		}
	}

	pub fn is_internal(&self) -> bool {
		self.status_code().is_server_error()
	}

	/// Client-facing message. Internal details stay in the logs.
	pub fn public_message(&self) -> String {
		if self.is_internal() {
			"internal server error".to_string()
		} else {
			self.to_string()
		}
	}
}

impl From<CredentialError> for AuthError {
	fn from(e: CredentialError) -> Self {
		match e {
			CredentialError::Missing => AuthError::MissingAuthorizationHeader,
			CredentialError::MalformedHeader => AuthError::InvalidAuthorizationHeader,
			CredentialError::UnsupportedScheme(scheme) => {
				AuthError::InvalidAuthorizationHeaderPrefix(scheme)
			}
		}
	}
}

impl From<SessionError> for AuthError {
	fn from(e: SessionError) -> Self {
		match e {
			SessionError::Decode(msg) => AuthError::JwtDecode(msg),
			SessionError::Expired => AuthError::ExpiredToken,
			SessionError::NotFound => AuthError::UnknownSession,
			SessionError::RefreshTooSoon => AuthError::AccessTokenTooNew,
			SessionError::Store(e) => AuthError::Store(e),
			SessionError::Signing(msg) => AuthError::Internal(format!("session signing failed: {msg}")),
		}
	}
}
