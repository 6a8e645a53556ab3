// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: environment variables and TOML files.

use std::path::{Path, PathBuf};

use charted_common_secret::SecretString;
use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::ServerConfigLayer;
use crate::sections::{
	DatabaseConfigLayer, LoggingConfigLayer, SessionBackendKind, SessionsConfigLayer,
};

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<ServerConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(ServerConfigLayer::default())
	}
}

/// TOML file configuration source. A missing file yields an empty layer.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new("/etc/charted/server.toml")
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(ServerConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: ServerConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: CHARTED_SERVER_<SECTION>_<FIELD>
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(ServerConfigLayer {
			database: Some(load_database_from_env()?),
			sessions: Some(load_sessions_from_env()?),
			logging: Some(load_logging_from_env()?),
		})
	}
}

fn env_var(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_bool(name: &str) -> Option<bool> {
	env_var(name).map(|v| v.eq_ignore_ascii_case("true") || v == "1")
}

fn env_parse<T: std::str::FromStr>(name: &str, kind: &str) -> Result<Option<T>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid {kind} value '{v}'"),
		}),
		None => Ok(None),
	}
}

/// Reads `NAME_FILE` (trimmed file contents) in preference to `NAME`.
fn env_secret(name: &str) -> Result<Option<SecretString>, ConfigError> {
	let file_var = format!("{name}_FILE");
	if let Some(path) = env_var(&file_var) {
		return read_secret_file(Path::new(&path))
			.map(Some)
			.map_err(|e| ConfigError::Secret(format!("{file_var}: {e}")));
	}

	Ok(env_var(name).map(SecretString::new))
}

fn read_secret_file(path: &Path) -> std::io::Result<SecretString> {
	let raw = SecretString::new(std::fs::read_to_string(path)?);
	Ok(SecretString::new(raw.expose().trim().to_string()))
}

fn load_database_from_env() -> Result<DatabaseConfigLayer, ConfigError> {
	Ok(DatabaseConfigLayer {
		url: env_var("CHARTED_SERVER_DATABASE_URL"),
		max_connections: env_parse("CHARTED_SERVER_DATABASE_MAX_CONNECTIONS", "u32")?,
	})
}

fn load_sessions_from_env() -> Result<SessionsConfigLayer, ConfigError> {
	Ok(SessionsConfigLayer {
		jwt_secret: env_secret("CHARTED_SERVER_SESSIONS_JWT_SECRET")?,
		issuer: env_var("CHARTED_SERVER_SESSIONS_ISSUER"),
		access_token_ttl_secs: env_parse("CHARTED_SERVER_SESSIONS_ACCESS_TOKEN_TTL_SECS", "u64")?,
		refresh_token_ttl_secs: env_parse("CHARTED_SERVER_SESSIONS_REFRESH_TOKEN_TTL_SECS", "u64")?,
		enable_basic_auth: env_bool("CHARTED_SERVER_SESSIONS_ENABLE_BASIC_AUTH"),
		backend: env_var("CHARTED_SERVER_SESSIONS_BACKEND")
			.map(|v| v.parse::<SessionBackendKind>())
			.transpose()?,
		sweep_interval_secs: env_parse("CHARTED_SERVER_SESSIONS_SWEEP_INTERVAL_SECS", "u64")?,
	})
}

fn load_logging_from_env() -> Result<LoggingConfigLayer, ConfigError> {
	Ok(LoggingConfigLayer {
		level: env_var("CHARTED_SERVER_LOG_LEVEL"),
		json: env_bool("CHARTED_SERVER_LOG_JSON"),
	})
}
