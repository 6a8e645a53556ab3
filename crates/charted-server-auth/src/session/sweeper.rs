// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::SessionStore;

/// Purges expired sessions every `interval` until `cancel` fires.
pub async fn run_session_sweeper(
	store: Arc<SessionStore>,
	interval: Duration,
	cancel: CancellationToken,
) {
	info!(interval_secs = interval.as_secs(), "session sweeper started");
	loop {
		tokio::select! {
			_ = cancel.cancelled() => {
				info!("session sweeper stopping");
				break;
			}
			_ = tokio::time::sleep(interval) => {
				match store.purge_expired().await {
					Ok(0) => debug!("no expired sessions"),
					Ok(purged) => info!(purged, "purged expired sessions"),
					Err(e) => error!(error = %e, "failed to purge expired sessions"),
				}
			}
		}
	}
}

pub fn spawn_session_sweeper(
	store: Arc<SessionStore>,
	interval: Duration,
	cancel: CancellationToken,
) -> JoinHandle<()> {
	tokio::spawn(run_session_sweeper(store, interval, cancel))
}
