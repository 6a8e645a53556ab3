// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use charted_common_secret::SecretString;
use serde::Deserialize;
use tracing::{info, instrument, Span};

use super::{IssuedSession, Session, SessionStore};
use crate::error::AuthError;
use crate::password::PasswordVerifier;
use crate::types::UserId;
use crate::user::{UserLookup, UserRecord};

/// How a login request names its account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginIdentifier {
	Username(String),
	Email(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "RawLoginRequest")]
pub struct LoginRequest {
	pub identifier: LoginIdentifier,
	pub password: SecretString,
}

#[derive(Deserialize)]
struct RawLoginRequest {
	username: Option<String>,
	email: Option<String>,
	password: SecretString,
}

impl TryFrom<RawLoginRequest> for LoginRequest {
	type Error = &'static str;

	fn try_from(raw: RawLoginRequest) -> Result<Self, Self::Error> {
		let identifier = match (raw.username, raw.email) {
			(Some(username), None) => LoginIdentifier::Username(username),
			(None, Some(email)) => LoginIdentifier::Email(email),
			(Some(_), Some(_)) => return Err("`username` and `email` are mutually exclusive"),
			(None, None) => return Err("one of `username` or `email` is required"),
		};

		Ok(Self {
			identifier,
			password: raw.password,
		})
	}
}

/// Password login and logout on top of a [`SessionStore`].
#[derive(Clone)]
pub struct SessionManager {
	sessions: Arc<SessionStore>,
	users: Arc<dyn UserLookup>,
	passwords: Arc<dyn PasswordVerifier>,
}

impl SessionManager {
	pub fn new(
		sessions: Arc<SessionStore>,
		users: Arc<dyn UserLookup>,
		passwords: Arc<dyn PasswordVerifier>,
	) -> Self {
		Self {
			sessions,
			users,
			passwords,
		}
	}

	pub fn sessions(&self) -> &Arc<SessionStore> {
		&self.sessions
	}

	/// Looks the account up by username or email, checks the password and
	/// opens a new session.
	#[instrument(skip_all, fields(user_id))]
	pub async fn login(&self, request: &LoginRequest) -> Result<IssuedSession, AuthError> {
		let user = self.find_user(&request.identifier).await?;
		Span::current().record("user_id", tracing::field::display(user.id));

		self.authenticate(&user, &request.password).await?;
		let issued = self.sessions.create(user.id).await?;
		info!(session_id = %issued.session.id, "user logged in");
		Ok(issued)
	}

	/// Verifies `password` for `user`. Accounts without a password hash never
	/// authenticate this way.
	pub async fn authenticate(
		&self,
		user: &UserRecord,
		password: &SecretString,
	) -> Result<(), AuthError> {
		let Some(hash) = user.password_hash.as_deref() else {
			return Err(AuthError::InvalidPassword);
		};

		if self.passwords.verify(password, hash).await? {
			Ok(())
		} else {
			Err(AuthError::InvalidPassword)
		}
	}

	pub async fn logout(&self, session: &Session) -> Result<(), AuthError> {
		Ok(self.sessions.revoke(session).await?)
	}

	/// Revokes every session of `user_id`, e.g. on account deletion.
	pub async fn logout_everywhere(&self, user_id: &UserId) -> Result<u64, AuthError> {
		Ok(self.sessions.revoke_all(user_id).await?)
	}

	async fn find_user(&self, identifier: &LoginIdentifier) -> Result<UserRecord, AuthError> {
		let (found, name) = match identifier {
			LoginIdentifier::Username(username) => {
				(self.users.find_user_by_username(username).await?, username)
			}
			LoginIdentifier::Email(email) => (self.users.find_user_by_email(email).await?, email),
		};

		found.ok_or_else(|| AuthError::UnknownUser(name.clone()))
	}
}
