// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use charted_server_config::LoggingConfig;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::ServerError;

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level; an unparseable level falls
/// back to `info`. Fails if a subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), ServerError> {
	let registry = tracing_subscriber::registry().with(env_filter(&config.level));

	let result = if config.json {
		registry.with(fmt::layer().json()).try_init()
	} else {
		registry.with(fmt::layer()).try_init()
	};

	result.map_err(|e| ServerError::Logging(e.to_string()))
}

fn env_filter(level: &str) -> EnvFilter {
	EnvFilter::try_from_default_env()
		.or_else(|_| EnvFilter::try_new(level))
		.unwrap_or_else(|_| EnvFilter::new("info"))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn second_init_is_an_error_not_a_panic() {
		let config = LoggingConfig {
			level: "debug".to_string(),
			json: false,
		};
		let _ = init_tracing(&config);
		assert!(matches!(init_tracing(&config), Err(ServerError::Logging(_))));
	}
}
