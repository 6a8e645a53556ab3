// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use charted_server_auth::{UserId, UserRecord};
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use crate::pool::run_migrations;
use crate::user::UserRepository;

/// A single-connection in-memory database with the schema applied. One
/// connection, because every `:memory:` connection is its own database.
pub async fn create_test_pool() -> SqlitePool {
	let options = SqliteConnectOptions::from_str(":memory:")
		.unwrap()
		.foreign_keys(true);

	let pool = SqlitePoolOptions::new()
		.max_connections(1)
		.idle_timeout(None)
		.max_lifetime(None)
		.connect_with(options)
		.await
		.expect("Failed to create test pool");

	run_migrations(&pool).await.unwrap();
	pool
}

pub fn make_user(username: &str) -> UserRecord {
	UserRecord {
		id: UserId::generate(),
		username: username.to_string(),
		email: format!("{username}@example.com"),
		password_hash: None,
		admin: false,
		created_at: Utc::now(),
	}
}

pub async fn insert_user(pool: &SqlitePool, username: &str) -> UserRecord {
	let user = make_user(username);
	UserRepository::new(pool.clone())
		.create_user(&user)
		.await
		.unwrap();
	user
}
