// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Storage for session records.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::Session;
use crate::error::StoreError;
use crate::types::{SessionId, UserId};

/// Key/value persistence for sessions. Each call is a single atomic
/// operation; records are keyed by session id and expire at
/// `refresh_expires_at`.
#[async_trait]
pub trait SessionBackend: Send + Sync {
	async fn put(&self, session: &Session) -> Result<(), StoreError>;

	async fn get(&self, id: &SessionId) -> Result<Option<Session>, StoreError>;

	/// Swap `current` for `next` if the stored record still carries
	/// `current`'s refresh token hash. Returns false when it does not.
	async fn replace(&self, current: &Session, next: &Session) -> Result<bool, StoreError>;

	/// Returns whether a record was removed.
	async fn delete(&self, id: &SessionId) -> Result<bool, StoreError>;

	async fn delete_for_user(&self, user_id: &UserId) -> Result<u64, StoreError>;

	async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Session>, StoreError>;

	/// Drops records whose refresh token expired at or before `now`.
	async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;
}

/// Process-local backend. Sessions do not survive a restart.
#[derive(Debug, Default)]
pub struct InMemorySessionBackend {
	sessions: RwLock<HashMap<SessionId, Session>>,
}

impl InMemorySessionBackend {
	pub fn new() -> Self {
		Self::default()
	}

	pub async fn len(&self) -> usize {
		self.sessions.read().await.len()
	}

	pub async fn is_empty(&self) -> bool {
		self.sessions.read().await.is_empty()
	}
}

#[async_trait]
impl SessionBackend for InMemorySessionBackend {
	async fn put(&self, session: &Session) -> Result<(), StoreError> {
		self.sessions
			.write()
			.await
			.insert(session.id, session.clone());
		Ok(())
	}

	async fn get(&self, id: &SessionId) -> Result<Option<Session>, StoreError> {
		Ok(self.sessions.read().await.get(id).cloned())
	}

	async fn replace(&self, current: &Session, next: &Session) -> Result<bool, StoreError> {
		let mut sessions = self.sessions.write().await;
		match sessions.get(&current.id) {
			Some(stored) if stored.refresh_token_hash == current.refresh_token_hash => {
				sessions.insert(next.id, next.clone());
				Ok(true)
			}
			_ => Ok(false),
		}
	}

	async fn delete(&self, id: &SessionId) -> Result<bool, StoreError> {
		Ok(self.sessions.write().await.remove(id).is_some())
	}

	async fn delete_for_user(&self, user_id: &UserId) -> Result<u64, StoreError> {
		let mut sessions = self.sessions.write().await;
		let before = sessions.len();
		sessions.retain(|_, s| s.user_id != *user_id);
		Ok((before - sessions.len()) as u64)
	}

	async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Session>, StoreError> {
		let mut found: Vec<Session> = self
			.sessions
			.read()
			.await
			.values()
			.filter(|s| s.user_id == *user_id)
			.cloned()
			.collect();
		found.sort_by_key(|s| s.issued_at);
		Ok(found)
	}

	async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
		let mut sessions = self.sessions.write().await;
		let before = sessions.len();
		sessions.retain(|_, s| !s.is_refresh_expired_at(now));
		Ok((before - sessions.len()) as u64)
	}
}
