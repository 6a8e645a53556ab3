// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use chrono::{DateTime, Duration, SubsecRound, Utc};
use charted_common_secret::SecretString;
use rand::RngCore;
use tracing::{debug, info, instrument};

use super::token::{SessionClaims, TokenCodec, TokenKind};
use super::{IssuedSession, Session, SessionBackend, SessionError};
use crate::clock::{Clock, SystemClock};
use crate::hash_token;
use crate::types::{SessionId, UserId};

pub const DEFAULT_ISSUER: &str = "Noelware/charted-server";

/// Token lifetimes and signing material.
#[derive(Debug, Clone)]
pub struct SessionSettings {
	pub issuer: String,
	pub signing_key: SecretString,
	pub access_ttl: Duration,
	pub refresh_ttl: Duration,
}

impl SessionSettings {
	/// 12 hour access tokens, 7 day refresh tokens.
	pub fn new(signing_key: SecretString) -> Self {
		Self {
			issuer: DEFAULT_ISSUER.to_string(),
			signing_key,
			access_ttl: Duration::hours(12),
			refresh_ttl: Duration::days(7),
		}
	}

	pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
		self.issuer = issuer.into();
		self
	}

	pub fn with_access_ttl(mut self, ttl: Duration) -> Self {
		self.access_ttl = ttl;
		self
	}

	pub fn with_refresh_ttl(mut self, ttl: Duration) -> Self {
		self.refresh_ttl = ttl;
		self
	}
}

/// Owns every session record. Callers only ever hold tokens or snapshots.
pub struct SessionStore {
	backend: Arc<dyn SessionBackend>,
	codec: TokenCodec,
	access_ttl: Duration,
	refresh_ttl: Duration,
	clock: Arc<dyn Clock>,
}

impl SessionStore {
	pub fn new(backend: Arc<dyn SessionBackend>, settings: SessionSettings) -> Self {
		Self {
			backend,
			codec: TokenCodec::new(&settings.issuer, &settings.signing_key),
			access_ttl: settings.access_ttl,
			refresh_ttl: settings.refresh_ttl,
			clock: Arc::new(SystemClock),
		}
	}

	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;
		self
	}

	pub fn now(&self) -> DateTime<Utc> {
		self.clock.now()
	}

	/// Issues a new token pair for `user_id` and persists the session.
	#[instrument(skip(self), fields(session_id))]
	pub async fn create(&self, user_id: UserId) -> Result<IssuedSession, SessionError> {
		let issued = self.issue(SessionId::generate(), user_id, self.now())?;
		tracing::Span::current().record("session_id", tracing::field::display(issued.session.id));

		self.backend.put(&issued.session).await?;
		info!(session_id = %issued.session.id, user_id = %user_id, "session created");
		Ok(issued)
	}

	/// Resolves either token of a live session.
	///
	/// Returns `Ok(None)` when the session is gone or the token was rotated
	/// away, `Err(Expired)` when the presented token itself has expired and
	/// `Err(Decode)` when it is not a token this store signed.
	#[instrument(level = "debug", skip_all)]
	pub async fn fetch(&self, token: &SecretString) -> Result<Option<Session>, SessionError> {
		let claims = self.codec.decode(token.expose())?;
		let now = self.now();
		if claims.is_expired_at(now) {
			debug!(session_id = %claims.sid, kind = ?claims.kind, "token expired");
			return Err(SessionError::Expired);
		}

		let Some(session) = self.live(&claims.sid, now).await? else {
			return Ok(None);
		};

		let matches = match claims.kind {
			TokenKind::Access => session.is_access_token(token),
			TokenKind::Refresh => session.is_refresh_token(token),
		};
		if !matches || session.user_id != claims.sub {
			debug!(session_id = %session.id, "token does not belong to the current session");
			return Ok(None);
		}

		Ok(Some(session))
	}

	/// Rotates both tokens. Refused while the access token is still valid,
	/// and only one refresh of a given token pair can ever succeed.
	#[instrument(skip_all, fields(session_id = %session.id, user_id = %session.user_id))]
	pub async fn refresh(&self, session: &Session) -> Result<IssuedSession, SessionError> {
		let now = self.now();
		let current = self
			.live(&session.id, now)
			.await?
			.ok_or(SessionError::NotFound)?;

		if !current.is_access_expired_at(now) {
			debug!("refresh refused, access token still valid");
			return Err(SessionError::RefreshTooSoon);
		}
		if current.refresh_token_hash != session.refresh_token_hash {
			return Err(SessionError::NotFound);
		}

		let issued = self.issue(current.id, current.user_id, now)?;
		if !self.backend.replace(&current, &issued.session).await? {
			debug!("lost refresh race");
			return Err(SessionError::NotFound);
		}

		info!("session refreshed");
		Ok(issued)
	}

	/// Deletes the session. Revoking a missing session is not an error.
	#[instrument(skip_all, fields(session_id = %session.id))]
	pub async fn revoke(&self, session: &Session) -> Result<(), SessionError> {
		if self.backend.delete(&session.id).await? {
			info!(user_id = %session.user_id, "session revoked");
		}
		Ok(())
	}

	/// Deletes every session owned by `user_id`, returning how many went.
	#[instrument(skip(self))]
	pub async fn revoke_all(&self, user_id: &UserId) -> Result<u64, SessionError> {
		let removed = self.backend.delete_for_user(user_id).await?;
		info!(removed, "revoked all sessions for user");
		Ok(removed)
	}

	/// Live sessions of `user_id`, oldest first.
	pub async fn list(&self, user_id: &UserId) -> Result<Vec<Session>, SessionError> {
		let now = self.now();
		let mut sessions = self.backend.list_for_user(user_id).await?;
		sessions.retain(|s| !s.is_refresh_expired_at(now));
		Ok(sessions)
	}

	/// Whether `token` is expired according to its own `exp` claim. Blank
	/// and undecodable tokens count as expired.
	pub fn is_token_expired(&self, token: &SecretString) -> bool {
		if token.is_blank() {
			return true;
		}

		match self.codec.decode(token.expose()) {
			Ok(claims) => claims.is_expired_at(self.now()),
			Err(_) => true,
		}
	}

	pub async fn purge_expired(&self) -> Result<u64, SessionError> {
		Ok(self.backend.purge_expired(self.now()).await?)
	}

	async fn live(
		&self,
		id: &SessionId,
		now: DateTime<Utc>,
	) -> Result<Option<Session>, SessionError> {
		Ok(self
			.backend
			.get(id)
			.await?
			.filter(|s| !s.is_refresh_expired_at(now)))
	}

	fn issue(
		&self,
		id: SessionId,
		user_id: UserId,
		now: DateTime<Utc>,
	) -> Result<IssuedSession, SessionError> {
		let issued_at = now.trunc_subsecs(0);
		let access_expires_at = issued_at + self.access_ttl;
		let refresh_expires_at = issued_at + self.refresh_ttl;

		let access_token = self.sign(id, user_id, TokenKind::Access, issued_at, access_expires_at)?;
		let refresh_token =
			self.sign(id, user_id, TokenKind::Refresh, issued_at, refresh_expires_at)?;

		Ok(IssuedSession {
			session: Session {
				id,
				user_id,
				access_token_hash: hash_token(access_token.expose()),
				refresh_token_hash: hash_token(refresh_token.expose()),
				issued_at,
				access_expires_at,
				refresh_expires_at,
			},
			access_token,
			refresh_token,
		})
	}

	fn sign(
		&self,
		id: SessionId,
		user_id: UserId,
		kind: TokenKind,
		issued_at: DateTime<Utc>,
		expires_at: DateTime<Utc>,
	) -> Result<SecretString, SessionError> {
		let mut jti = [0u8; 16];
		rand::thread_rng().fill_bytes(&mut jti);

		self.codec.sign(&SessionClaims {
			iss: self.codec.issuer().to_string(),
			sub: user_id,
			sid: id,
			kind,
			iat: issued_at.timestamp(),
			exp: expires_at.timestamp(),
			jti: hex::encode(jti),
		})
	}
}
