// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Session lifecycle: issue, look up, rotate and revoke access/refresh token
//! pairs.
//!
//! # Overview
//!
//! A [`Session`] is created on login and owns two signed tokens. The access
//! token authenticates ordinary requests until it expires; the refresh token
//! lives longer and may only be exchanged for a new pair once the access
//! token has expired. Only SHA-256 hashes of the tokens are persisted, so the
//! plaintext pair exists solely in the [`IssuedSession`] returned by
//! [`SessionStore::create`] and [`SessionStore::refresh`].
//!
//! Persistence goes through [`SessionBackend`]; [`InMemorySessionBackend`]
//! ships here and an SQLite implementation lives in `charted-server-db`.

mod backend;
mod manager;
mod store;
mod sweeper;
mod token;

pub use backend::{InMemorySessionBackend, SessionBackend};
pub use manager::{LoginIdentifier, LoginRequest, SessionManager};
pub use store::{SessionSettings, SessionStore};
pub use sweeper::{run_session_sweeper, spawn_session_sweeper};
pub use token::TokenKind;

use chrono::{DateTime, Utc};
use charted_common_secret::SecretString;
use serde::Serialize;

use crate::error::StoreError;
use crate::hash_token;
use crate::types::{SessionId, UserId};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
	#[error("unable to decode session token: {0}")]
	Decode(String),

	#[error("session token has expired")]
	Expired,

	#[error("session not found")]
	NotFound,

	#[error("access token has not expired yet")]
	RefreshTooSoon,

	#[error("failed to sign session token: {0}")]
	Signing(String),

	#[error(transparent)]
	Store(#[from] StoreError),
}

/// A stored session. Token columns hold hashes, never plaintext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
	pub id: SessionId,
	pub user_id: UserId,
	#[serde(skip_serializing)]
	pub access_token_hash: String,
	#[serde(skip_serializing)]
	pub refresh_token_hash: String,
	pub issued_at: DateTime<Utc>,
	pub access_expires_at: DateTime<Utc>,
	pub refresh_expires_at: DateTime<Utc>,
}

impl Session {
	pub fn is_access_expired_at(&self, now: DateTime<Utc>) -> bool {
		self.access_expires_at <= now
	}

	pub fn is_refresh_expired_at(&self, now: DateTime<Utc>) -> bool {
		self.refresh_expires_at <= now
	}

	pub fn is_access_token(&self, token: &SecretString) -> bool {
		hash_token(token.expose()) == self.access_token_hash
	}

	pub fn is_refresh_token(&self, token: &SecretString) -> bool {
		hash_token(token.expose()) == self.refresh_token_hash
	}
}

/// A session together with its plaintext tokens. Hand it to the client once.
#[derive(Debug, Clone)]
pub struct IssuedSession {
	pub session: Session,
	pub access_token: SecretString,
	pub refresh_token: SecretString,
}
