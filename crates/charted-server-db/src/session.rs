// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SQLite-backed [`SessionBackend`].
//!
//! Timestamps are stored as unix seconds; sessions are issued on whole
//! seconds, so nothing is lost and expiry comparisons stay in SQL.

use async_trait::async_trait;
use charted_server_auth::{Session, SessionBackend, SessionId, StoreError, UserId};
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePool, Row};

use crate::error::DbError;
use crate::rows::{from_unix, parse_id};

const SESSION_COLUMNS: &str =
	"id, user_id, access_token_hash, refresh_token_hash, issued_at, access_expires_at, refresh_expires_at";

#[derive(Clone)]
pub struct SqliteSessionBackend {
	pool: SqlitePool,
}

impl SqliteSessionBackend {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	#[tracing::instrument(skip(self, session), fields(session_id = %session.id, user_id = %session.user_id))]
	pub async fn create_session(&self, session: &Session) -> Result<(), DbError> {
		sqlx::query(
			r#"
			INSERT INTO sessions (
				id, user_id, access_token_hash, refresh_token_hash,
				issued_at, access_expires_at, refresh_expires_at
			) VALUES (?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(session.id.to_string())
		.bind(session.user_id.to_string())
		.bind(&session.access_token_hash)
		.bind(&session.refresh_token_hash)
		.bind(session.issued_at.timestamp())
		.bind(session.access_expires_at.timestamp())
		.bind(session.refresh_expires_at.timestamp())
		.execute(&self.pool)
		.await
		.map_err(|e| DbError::from_insert(e, "session"))?;

		Ok(())
	}

	#[tracing::instrument(skip(self), fields(session_id = %id))]
	pub async fn get_session(&self, id: &SessionId) -> Result<Option<Session>, DbError> {
		let row = sqlx::query(&format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?"))
			.bind(id.to_string())
			.fetch_optional(&self.pool)
			.await?;

		row.as_ref().map(parse_session_row).transpose()
	}

	/// Rotates the token columns only if the stored refresh hash still
	/// matches `current`.
	#[tracing::instrument(skip(self, current, next), fields(session_id = %current.id))]
	pub async fn rotate_session(&self, current: &Session, next: &Session) -> Result<bool, DbError> {
		let result = sqlx::query(
			r#"
			UPDATE sessions
			SET id = ?, user_id = ?, access_token_hash = ?, refresh_token_hash = ?,
			    issued_at = ?, access_expires_at = ?, refresh_expires_at = ?
			WHERE id = ? AND refresh_token_hash = ?
			"#,
		)
		.bind(next.id.to_string())
		.bind(next.user_id.to_string())
		.bind(&next.access_token_hash)
		.bind(&next.refresh_token_hash)
		.bind(next.issued_at.timestamp())
		.bind(next.access_expires_at.timestamp())
		.bind(next.refresh_expires_at.timestamp())
		.bind(current.id.to_string())
		.bind(&current.refresh_token_hash)
		.execute(&self.pool)
		.await?;

		Ok(result.rows_affected() == 1)
	}

	#[tracing::instrument(skip(self), fields(session_id = %id))]
	pub async fn delete_session(&self, id: &SessionId) -> Result<bool, DbError> {
		let result = sqlx::query("DELETE FROM sessions WHERE id = ?")
			.bind(id.to_string())
			.execute(&self.pool)
			.await?;

		Ok(result.rows_affected() > 0)
	}

	#[tracing::instrument(skip(self), fields(user_id = %user_id))]
	pub async fn delete_all_sessions_for_user(&self, user_id: &UserId) -> Result<u64, DbError> {
		let result = sqlx::query("DELETE FROM sessions WHERE user_id = ?")
			.bind(user_id.to_string())
			.execute(&self.pool)
			.await?;

		Ok(result.rows_affected())
	}

	#[tracing::instrument(skip(self), fields(user_id = %user_id))]
	pub async fn get_sessions_for_user(&self, user_id: &UserId) -> Result<Vec<Session>, DbError> {
		let rows = sqlx::query(&format!(
			"SELECT {SESSION_COLUMNS} FROM sessions WHERE user_id = ? ORDER BY issued_at ASC"
		))
		.bind(user_id.to_string())
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(parse_session_row).collect()
	}

	#[tracing::instrument(skip(self))]
	pub async fn cleanup_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, DbError> {
		let result = sqlx::query("DELETE FROM sessions WHERE refresh_expires_at <= ?")
			.bind(now.timestamp())
			.execute(&self.pool)
			.await?;

		let removed = result.rows_affected();
		if removed > 0 {
			tracing::debug!(removed, "expired sessions deleted");
		}
		Ok(removed)
	}
}

#[async_trait]
impl SessionBackend for SqliteSessionBackend {
	async fn put(&self, session: &Session) -> Result<(), StoreError> {
		Ok(self.create_session(session).await?)
	}

	async fn get(&self, id: &SessionId) -> Result<Option<Session>, StoreError> {
		Ok(self.get_session(id).await?)
	}

	async fn replace(&self, current: &Session, next: &Session) -> Result<bool, StoreError> {
		Ok(self.rotate_session(current, next).await?)
	}

	async fn delete(&self, id: &SessionId) -> Result<bool, StoreError> {
		Ok(self.delete_session(id).await?)
	}

	async fn delete_for_user(&self, user_id: &UserId) -> Result<u64, StoreError> {
		Ok(self.delete_all_sessions_for_user(user_id).await?)
	}

	async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Session>, StoreError> {
		Ok(self.get_sessions_for_user(user_id).await?)
	}

	async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
		Ok(self.cleanup_expired_sessions(now).await?)
	}
}

fn parse_session_row(row: &sqlx::sqlite::SqliteRow) -> Result<Session, DbError> {
	let id: String = row.get("id");
	let user_id: String = row.get("user_id");

	Ok(Session {
		id: parse_id(&id, "session id")?,
		user_id: parse_id(&user_id, "user_id")?,
		access_token_hash: row.get("access_token_hash"),
		refresh_token_hash: row.get("refresh_token_hash"),
		issued_at: from_unix(row.get("issued_at"), "issued_at")?,
		access_expires_at: from_unix(row.get("access_expires_at"), "access_expires_at")?,
		refresh_expires_at: from_unix(row.get("refresh_expires_at"), "refresh_expires_at")?,
	})
}
