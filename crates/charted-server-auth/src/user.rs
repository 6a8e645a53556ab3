// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Read-only view of user accounts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::StoreError;
use crate::types::UserId;

/// The account fields authentication needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRecord {
	pub id: UserId,
	pub username: String,
	pub email: String,
	/// Argon2 PHC string. Accounts without one cannot use password login.
	#[serde(skip_serializing)]
	pub password_hash: Option<String>,
	pub admin: bool,
	pub created_at: DateTime<Utc>,
}

/// Lookups against the persistent user store. Absence is `Ok(None)`.
#[async_trait]
pub trait UserLookup: Send + Sync {
	async fn find_user_by_id(&self, id: &UserId) -> Result<Option<UserRecord>, StoreError>;

	async fn find_user_by_username(&self, username: &str) -> Result<Option<UserRecord>, StoreError>;

	async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError>;
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn password_hash_is_never_serialized() {
		let user = UserRecord {
			id: UserId::generate(),
			username: "noel".to_string(),
			email: "noel@example.com".to_string(),
			password_hash: Some("$argon2id$v=19$secret".to_string()),
			admin: false,
			created_at: Utc::now(),
		};
		let json = serde_json::to_string(&user).unwrap();
		assert!(!json.contains("argon2id"));
		assert!(json.contains("\"username\":\"noel\""));
	}
}
