// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-memory stores and fixtures shared by the unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use charted_common_secret::SecretString;

use crate::api_key::{ApiKeyLookup, ApiKeyRecord};
use crate::error::StoreError;
use crate::password::hash_password;
use crate::session::{Session, SessionBackend, SessionSettings};
use crate::types::{SessionId, UserId};
use crate::user::{UserLookup, UserRecord};

pub(crate) const TEST_SIGNING_KEY: &str = "test-signing-key-that-is-at-least-32-bytes";

pub(crate) fn test_settings() -> SessionSettings {
	SessionSettings::new(SecretString::new(TEST_SIGNING_KEY.to_string()))
}

pub(crate) fn user_with_password(username: &str, password: &str) -> UserRecord {
	UserRecord {
		id: UserId::generate(),
		username: username.to_string(),
		email: format!("{username}@example.com"),
		password_hash: Some(hash_password(&SecretString::from(password)).unwrap()),
		admin: false,
		created_at: Utc::now(),
	}
}

#[derive(Default)]
pub(crate) struct InMemoryApiKeys {
	keys: Mutex<HashMap<String, ApiKeyRecord>>,
	lookups: Mutex<Vec<String>>,
	failure: Mutex<Option<String>>,
}

impl InMemoryApiKeys {
	pub(crate) fn insert(&self, record: ApiKeyRecord) {
		self.keys
			.lock()
			.unwrap()
			.insert(record.token_hash.clone(), record);
	}

	/// Every hash the resolver asked for, in order.
	pub(crate) fn lookups(&self) -> Vec<String> {
		self.lookups.lock().unwrap().clone()
	}

	pub(crate) fn len(&self) -> usize {
		self.keys.lock().unwrap().len()
	}

	pub(crate) fn fail_with(&self, message: &str) {
		*self.failure.lock().unwrap() = Some(message.to_string());
	}
}

#[async_trait]
impl ApiKeyLookup for InMemoryApiKeys {
	async fn find_by_hashed_token(
		&self,
		token_hash: &str,
	) -> Result<Option<ApiKeyRecord>, StoreError> {
		if let Some(message) = self.failure.lock().unwrap().clone() {
			return Err(StoreError::Unavailable(message));
		}
		self.lookups.lock().unwrap().push(token_hash.to_string());
		Ok(self.keys.lock().unwrap().get(token_hash).cloned())
	}
}

#[derive(Default)]
pub(crate) struct InMemoryUsers {
	users: Mutex<Vec<UserRecord>>,
	failure: Mutex<Option<String>>,
}

impl InMemoryUsers {
	pub(crate) fn insert(&self, user: UserRecord) {
		self.users.lock().unwrap().push(user);
	}

	pub(crate) fn remove(&self, id: &UserId) {
		self.users.lock().unwrap().retain(|u| u.id != *id);
	}

	pub(crate) fn fail_with(&self, message: &str) {
		*self.failure.lock().unwrap() = Some(message.to_string());
	}

	fn find(&self, pred: impl Fn(&UserRecord) -> bool) -> Result<Option<UserRecord>, StoreError> {
		if let Some(message) = self.failure.lock().unwrap().clone() {
			return Err(StoreError::Unavailable(message));
		}
		Ok(self.users.lock().unwrap().iter().find(|u| pred(u)).cloned())
	}
}

#[async_trait]
impl UserLookup for InMemoryUsers {
	async fn find_user_by_id(&self, id: &UserId) -> Result<Option<UserRecord>, StoreError> {
		self.find(|u| u.id == *id)
	}

	async fn find_user_by_username(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
		self.find(|u| u.username == username)
	}

	async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
		self.find(|u| u.email == email)
	}
}

pub(crate) struct FailingSessionBackend;

pub(crate) fn failing_session_backend() -> FailingSessionBackend {
	FailingSessionBackend
}

fn unavailable<T>() -> Result<T, StoreError> {
	Err(StoreError::Unavailable("session store is down".to_string()))
}

#[async_trait]
impl SessionBackend for FailingSessionBackend {
	async fn put(&self, _session: &Session) -> Result<(), StoreError> {
		unavailable()
	}

	async fn get(&self, _id: &SessionId) -> Result<Option<Session>, StoreError> {
		unavailable()
	}

	async fn replace(&self, _current: &Session, _next: &Session) -> Result<bool, StoreError> {
		unavailable()
	}

	async fn delete(&self, _id: &SessionId) -> Result<bool, StoreError> {
		unavailable()
	}

	async fn delete_for_user(&self, _user_id: &UserId) -> Result<u64, StoreError> {
		unavailable()
	}

	async fn list_for_user(&self, _user_id: &UserId) -> Result<Vec<Session>, StoreError> {
		unavailable()
	}

	async fn purge_expired(&self, _now: DateTime<Utc>) -> Result<u64, StoreError> {
		unavailable()
	}
}
