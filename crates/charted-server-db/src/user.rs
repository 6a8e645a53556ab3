// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! User repository.
//!
//! Only the columns authentication needs: identity, login names, the Argon2
//! password hash and the admin flag.

use async_trait::async_trait;
use charted_server_auth::{StoreError, UserId, UserLookup, UserRecord};
use sqlx::{sqlite::SqlitePool, Row};

use crate::error::DbError;
use crate::rows::{parse_id, parse_rfc3339};

#[async_trait]
impl UserLookup for UserRepository {
	async fn find_user_by_id(&self, id: &UserId) -> Result<Option<UserRecord>, StoreError> {
		Ok(self.get_user_by_id(id).await?)
	}

	async fn find_user_by_username(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
		Ok(self.get_user_by_username(username).await?)
	}

	async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
		Ok(self.get_user_by_email(email).await?)
	}
}

const USER_COLUMNS: &str = "id, username, email, password_hash, admin, created_at";

#[derive(Clone)]
pub struct UserRepository {
	pool: SqlitePool,
}

impl UserRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Insert a user.
	///
	/// # Errors
	/// `DbError::Conflict` when the username or email is taken.
	#[tracing::instrument(skip(self, user), fields(user_id = %user.id))]
	pub async fn create_user(&self, user: &UserRecord) -> Result<(), DbError> {
		sqlx::query(
			r#"
			INSERT INTO users (id, username, email, password_hash, admin, created_at)
			VALUES (?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(user.id.to_string())
		.bind(&user.username)
		.bind(&user.email)
		.bind(user.password_hash.as_deref())
		.bind(user.admin)
		.bind(user.created_at.to_rfc3339())
		.execute(&self.pool)
		.await
		.map_err(|e| DbError::from_insert(e, "user"))?;

		tracing::debug!(user_id = %user.id, "user created");
		Ok(())
	}

	#[tracing::instrument(skip(self), fields(user_id = %id))]
	pub async fn get_user_by_id(&self, id: &UserId) -> Result<Option<UserRecord>, DbError> {
		let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
			.bind(id.to_string())
			.fetch_optional(&self.pool)
			.await?;

		row.as_ref().map(parse_user_row).transpose()
	}

	#[tracing::instrument(skip(self))]
	pub async fn get_user_by_username(&self, username: &str) -> Result<Option<UserRecord>, DbError> {
		let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?"))
			.bind(username)
			.fetch_optional(&self.pool)
			.await?;

		row.as_ref().map(parse_user_row).transpose()
	}

	#[tracing::instrument(skip(self, email))]
	pub async fn get_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, DbError> {
		let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?"))
			.bind(email)
			.fetch_optional(&self.pool)
			.await?;

		row.as_ref().map(parse_user_row).transpose()
	}

	/// Replace the stored password hash. `None` disables password login.
	///
	/// # Errors
	/// `DbError::NotFound` when no such user exists.
	#[tracing::instrument(skip(self, hash), fields(user_id = %id))]
	pub async fn update_password_hash(&self, id: &UserId, hash: Option<&str>) -> Result<(), DbError> {
		let result = sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
			.bind(hash)
			.bind(id.to_string())
			.execute(&self.pool)
			.await?;

		if result.rows_affected() == 0 {
			return Err(DbError::NotFound(format!("user {id}")));
		}
		Ok(())
	}
}

fn parse_user_row(row: &sqlx::sqlite::SqliteRow) -> Result<UserRecord, DbError> {
	let id: String = row.get("id");
	let created_at: String = row.get("created_at");

	Ok(UserRecord {
		id: parse_id(&id, "user id")?,
		username: row.get("username"),
		email: row.get("email"),
		password_hash: row.get("password_hash"),
		admin: row.get("admin"),
		created_at: parse_rfc3339(&created_at, "created_at")?,
	})
}
