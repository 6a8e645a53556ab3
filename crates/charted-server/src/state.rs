// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Wiring of the authentication core onto SQLite.

use std::sync::Arc;

use charted_server_auth::{
	spawn_session_sweeper, Argon2PasswordVerifier, Authorizer, InMemorySessionBackend,
	SessionBackend, SessionManager, SessionSettings, SessionStore,
};
use charted_server_config::{ServerConfig, SessionBackendKind, SessionsConfig};
use charted_server_db::{
	create_pool, run_migrations, ApiKeyRepository, SqliteSessionBackend, UserRepository,
};
use sqlx::sqlite::SqlitePool;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::ServerError;

/// Everything a request handler needs to authenticate and log users in.
#[derive(Clone)]
pub struct AuthState {
	pub pool: SqlitePool,
	pub users: Arc<UserRepository>,
	pub api_keys: Arc<ApiKeyRepository>,
	pub sessions: Arc<SessionStore>,
	pub authorizer: Arc<Authorizer>,
	pub session_manager: Arc<SessionManager>,
}

/// Opens the database, applies migrations and builds the auth services.
#[tracing::instrument(skip_all, fields(database = %config.database.url))]
pub async fn create_auth_state(config: &ServerConfig) -> Result<AuthState, ServerError> {
	let pool = create_pool(&config.database.url, config.database.max_connections).await?;
	run_migrations(&pool).await?;
	build_auth_state(pool, &config.sessions)
}

/// Builds the auth services on an already migrated pool.
pub fn build_auth_state(
	pool: SqlitePool,
	config: &SessionsConfig,
) -> Result<AuthState, ServerError> {
	let backend: Arc<dyn SessionBackend> = match config.backend {
		SessionBackendKind::Database => Arc::new(SqliteSessionBackend::new(pool.clone())),
		SessionBackendKind::Memory => Arc::new(InMemorySessionBackend::new()),
	};
	info!(backend = %config.backend, "session backend selected");

	let sessions = Arc::new(SessionStore::new(backend, session_settings(config)?));
	let users = Arc::new(UserRepository::new(pool.clone()));
	let api_keys = Arc::new(ApiKeyRepository::new(pool.clone()));
	let passwords = Arc::new(Argon2PasswordVerifier);

	let authorizer = Authorizer::new(
		sessions.clone(),
		api_keys.clone(),
		users.clone(),
		passwords.clone(),
	)
	.with_basic_auth(config.enable_basic_auth);
	let session_manager = SessionManager::new(sessions.clone(), users.clone(), passwords);

	Ok(AuthState {
		pool,
		users,
		api_keys,
		sessions,
		authorizer: Arc::new(authorizer),
		session_manager: Arc::new(session_manager),
	})
}

pub fn session_settings(config: &SessionsConfig) -> Result<SessionSettings, ServerError> {
	let access_ttl = chrono::Duration::from_std(config.access_token_ttl)
		.map_err(|e| ServerError::Internal(format!("access token TTL out of range: {e}")))?;
	let refresh_ttl = chrono::Duration::from_std(config.refresh_token_ttl)
		.map_err(|e| ServerError::Internal(format!("refresh token TTL out of range: {e}")))?;

	Ok(SessionSettings::new(config.jwt_secret.clone())
		.with_issuer(config.issuer.clone())
		.with_access_ttl(access_ttl)
		.with_refresh_ttl(refresh_ttl))
}

/// Starts the expired-session sweeper. It stops when `cancel` fires.
pub fn spawn_background_tasks(
	state: &AuthState,
	config: &SessionsConfig,
	cancel: CancellationToken,
) -> JoinHandle<()> {
	spawn_session_sweeper(state.sessions.clone(), config.sweep_interval, cancel)
}
