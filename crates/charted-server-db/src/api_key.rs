// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! API key repository.
//!
//! Keys are user-owned. Only the SHA-256 hash of a key is stored, and scopes
//! are stored as the integer form of their bitfield.

use async_trait::async_trait;
use charted_server_auth::{
	api_key_scopes, ApiKeyId, ApiKeyLookup, ApiKeyRecord, ScopeBitfield, StoreError, UserId,
};
use sqlx::{sqlite::SqlitePool, Row};

use crate::error::DbError;
use crate::rows::{parse_id, parse_rfc3339};

#[async_trait]
impl ApiKeyLookup for ApiKeyRepository {
	async fn find_by_hashed_token(
		&self,
		token_hash: &str,
	) -> Result<Option<ApiKeyRecord>, StoreError> {
		Ok(self.get_api_key_by_hash(token_hash).await?)
	}
}

/// Repository for API key database operations.
///
/// All tokens are stored as hashes, never in plaintext.
#[derive(Clone)]
pub struct ApiKeyRepository {
	pool: SqlitePool,
}

impl ApiKeyRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Insert an API key.
	///
	/// # Database Constraints
	/// - `token_hash` must be unique
	/// - `name` must be unique per owner
	/// - `owner_id` must reference an existing user
	#[tracing::instrument(skip(self, record), fields(api_key_id = %record.id, owner_id = %record.owner_id))]
	pub async fn create_api_key(&self, record: &ApiKeyRecord) -> Result<(), DbError> {
		sqlx::query(
			r#"
			INSERT INTO api_keys (id, owner_id, name, token_hash, scopes, expires_at, created_at)
			VALUES (?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(record.id.to_string())
		.bind(record.owner_id.to_string())
		.bind(&record.name)
		.bind(&record.token_hash)
		.bind(record.scopes.bits() as i64)
		.bind(record.expires_at.map(|at| at.to_rfc3339()))
		.bind(record.created_at.to_rfc3339())
		.execute(&self.pool)
		.await
		.map_err(|e| DbError::from_insert(e, "API key"))?;

		tracing::debug!(api_key_id = %record.id, "API key created");
		Ok(())
	}

	/// Get an API key by its token hash, expired or not.
	#[tracing::instrument(skip(self, token_hash))]
	pub async fn get_api_key_by_hash(&self, token_hash: &str) -> Result<Option<ApiKeyRecord>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, owner_id, name, token_hash, scopes, expires_at, created_at
			FROM api_keys
			WHERE token_hash = ?
			"#,
		)
		.bind(token_hash)
		.fetch_optional(&self.pool)
		.await?;

		match row {
			Some(row) => {
				let key = parse_api_key_row(&row)?;
				tracing::debug!(api_key_id = %key.id, owner_id = %key.owner_id, "API key found by hash");
				Ok(Some(key))
			}
			None => Ok(None),
		}
	}

	/// Keys owned by `owner_id`, newest first.
	#[tracing::instrument(skip(self), fields(owner_id = %owner_id))]
	pub async fn list_api_keys_for_user(&self, owner_id: &UserId) -> Result<Vec<ApiKeyRecord>, DbError> {
		let rows = sqlx::query(
			r#"
			SELECT id, owner_id, name, token_hash, scopes, expires_at, created_at
			FROM api_keys
			WHERE owner_id = ?
			ORDER BY created_at DESC
			"#,
		)
		.bind(owner_id.to_string())
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(parse_api_key_row).collect()
	}

	/// Returns `true` if a key was deleted.
	#[tracing::instrument(skip(self), fields(api_key_id = %id))]
	pub async fn delete_api_key(&self, id: &ApiKeyId) -> Result<bool, DbError> {
		let result = sqlx::query("DELETE FROM api_keys WHERE id = ?")
			.bind(id.to_string())
			.execute(&self.pool)
			.await?;

		let deleted = result.rows_affected() > 0;
		if deleted {
			tracing::info!(api_key_id = %id, "API key deleted");
		}
		Ok(deleted)
	}
}

fn parse_api_key_row(row: &sqlx::sqlite::SqliteRow) -> Result<ApiKeyRecord, DbError> {
	let id: String = row.get("id");
	let owner_id: String = row.get("owner_id");
	let scopes: i64 = row.get("scopes");
	let expires_at: Option<String> = row.get("expires_at");
	let created_at: String = row.get("created_at");

	let scopes = ScopeBitfield::from_bits(api_key_scopes().clone(), scopes as u64)
		.map_err(|e| DbError::Internal(format!("Invalid scopes for API key {id}: {e}")))?;

	Ok(ApiKeyRecord {
		id: parse_id(&id, "api key id")?,
		owner_id: parse_id(&owner_id, "owner_id")?,
		name: row.get("name"),
		token_hash: row.get("token_hash"),
		scopes,
		expires_at: expires_at
			.map(|s| parse_rfc3339(&s, "expires_at"))
			.transpose()?,
		created_at: parse_rfc3339(&created_at, "created_at")?,
	})
}
