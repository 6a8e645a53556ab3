// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use charted_server_config::ConfigError;
use charted_server_db::DbError;

/// Startup failures of the charted server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
	/// Configuration could not be loaded or failed validation.
	#[error("Configuration error: {0}")]
	Config(#[from] ConfigError),

	/// Database pool or migrations failed.
	#[error("Database error: {0}")]
	Db(#[from] DbError),

	/// A global tracing subscriber could not be installed.
	#[error("Logging error: {0}")]
	Logging(String),

	#[error("Internal error: {0}")]
	Internal(String),
}
