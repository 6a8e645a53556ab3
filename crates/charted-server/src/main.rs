// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! charted server binary.

use charted_server::{create_auth_state, init_tracing, spawn_background_tasks};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let config = charted_server_config::load_config()?;
	init_tracing(&config.logging)?;

	tracing::info!(
		database = %config.database.url,
		session_backend = %config.sessions.backend,
		"starting charted-server"
	);

	let state = create_auth_state(&config).await?;
	let cancel = CancellationToken::new();
	let sweeper = spawn_background_tasks(&state, &config.sessions, cancel.clone());

	tokio::signal::ctrl_c().await?;
	tracing::info!("Received shutdown signal");

	cancel.cancel();
	if let Err(e) = sweeper.await {
		tracing::error!(error = %e, "session sweeper task failed");
	}
	state.pool.close().await;

	tracing::info!("Server shutdown complete");
	Ok(())
}
