// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! API key records and token resolution.
//!
//! API keys are long-lived, scope-restricted credentials. Only the SHA-256
//! hash of a key is ever handed to the store; the plaintext is shown to its
//! owner once, at creation.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use charted_common_secret::SecretString;
use rand::RngCore;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::error::StoreError;
use crate::hash_token;
use crate::scopes::ScopeBitfield;
use crate::types::{ApiKeyId, UserId};

pub const API_KEY_PREFIX: &str = "charted_";

#[derive(Debug, Clone, Serialize)]
pub struct ApiKeyRecord {
	pub id: ApiKeyId,
	pub owner_id: UserId,
	pub name: String,
	#[serde(skip_serializing)]
	pub token_hash: String,
	pub scopes: ScopeBitfield,
	pub expires_at: Option<DateTime<Utc>>,
	pub created_at: DateTime<Utc>,
}

impl ApiKeyRecord {
	pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
		self.expires_at.is_some_and(|at| at <= now)
	}
}

/// Read-only hashed-token lookup. Absence is `Ok(None)`.
#[async_trait]
pub trait ApiKeyLookup: Send + Sync {
	async fn find_by_hashed_token(&self, token_hash: &str)
		-> Result<Option<ApiKeyRecord>, StoreError>;
}

/// Hashes presented tokens and hides expired keys.
#[derive(Clone)]
pub struct ApiKeyResolver {
	store: Arc<dyn ApiKeyLookup>,
}

impl ApiKeyResolver {
	pub fn new(store: Arc<dyn ApiKeyLookup>) -> Self {
		Self { store }
	}

	pub async fn resolve(&self, token: &SecretString) -> Result<Option<ApiKeyRecord>, StoreError> {
		self.resolve_at(token, Utc::now()).await
	}

	/// Expired rows resolve to `None` but are left in place.
	#[instrument(level = "debug", skip_all)]
	pub async fn resolve_at(
		&self,
		token: &SecretString,
		now: DateTime<Utc>,
	) -> Result<Option<ApiKeyRecord>, StoreError> {
		let token_hash = hash_token(token.expose());
		let Some(record) = self.store.find_by_hashed_token(&token_hash).await? else {
			return Ok(None);
		};

		if record.is_expired_at(now) {
			debug!(api_key_id = %record.id, "api key expired");
			return Ok(None);
		}

		Ok(Some(record))
	}
}

/// A fresh key: `charted_` followed by 32 random bytes in hex.
pub fn generate_api_key() -> SecretString {
	let mut bytes = [0u8; 32];
	rand::thread_rng().fill_bytes(&mut bytes);
	SecretString::new(format!("{API_KEY_PREFIX}{}", hex::encode(bytes)))
}
