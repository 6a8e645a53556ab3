// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Session issuance and request authentication settings.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use charted_common_secret::SecretString;
use serde::Deserialize;

use crate::error::ConfigError;

const DEFAULT_ISSUER: &str = "Noelware/charted-server";
const DEFAULT_ACCESS_TOKEN_TTL_SECS: u64 = 12 * 60 * 60;
const DEFAULT_REFRESH_TOKEN_TTL_SECS: u64 = 7 * 24 * 60 * 60;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;

/// HS512 keys shorter than this are refused.
pub const MIN_JWT_SECRET_LEN: usize = 32;

/// Where session records live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackendKind {
	/// Process-local map. Sessions are lost on restart.
	Memory,
	#[default]
	Database,
}

impl fmt::Display for SessionBackendKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Memory => f.write_str("memory"),
			Self::Database => f.write_str("database"),
		}
	}
}

impl FromStr for SessionBackendKind {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"memory" => Ok(Self::Memory),
			"database" | "sqlite" => Ok(Self::Database),
			other => Err(ConfigError::InvalidValue {
				key: "sessions.backend".to_string(),
				message: format!("unknown session backend '{other}'"),
			}),
		}
	}
}

/// Resolved session settings.
#[derive(Debug, Clone)]
pub struct SessionsConfig {
	pub jwt_secret: SecretString,
	pub issuer: String,
	pub access_token_ttl: Duration,
	pub refresh_token_ttl: Duration,
	pub enable_basic_auth: bool,
	pub backend: SessionBackendKind,
	pub sweep_interval: Duration,
}

/// Partial session settings, for merging.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionsConfigLayer {
	#[serde(default)]
	pub jwt_secret: Option<SecretString>,
	#[serde(default)]
	pub issuer: Option<String>,
	#[serde(default)]
	pub access_token_ttl_secs: Option<u64>,
	#[serde(default)]
	pub refresh_token_ttl_secs: Option<u64>,
	#[serde(default)]
	pub enable_basic_auth: Option<bool>,
	#[serde(default)]
	pub backend: Option<SessionBackendKind>,
	#[serde(default)]
	pub sweep_interval_secs: Option<u64>,
}

impl SessionsConfigLayer {
	pub fn merge(&mut self, other: SessionsConfigLayer) {
		if other.jwt_secret.is_some() {
			self.jwt_secret = other.jwt_secret;
		}
		if other.issuer.is_some() {
			self.issuer = other.issuer;
		}
		if other.access_token_ttl_secs.is_some() {
			self.access_token_ttl_secs = other.access_token_ttl_secs;
		}
		if other.refresh_token_ttl_secs.is_some() {
			self.refresh_token_ttl_secs = other.refresh_token_ttl_secs;
		}
		if other.enable_basic_auth.is_some() {
			self.enable_basic_auth = other.enable_basic_auth;
		}
		if other.backend.is_some() {
			self.backend = other.backend;
		}
		if other.sweep_interval_secs.is_some() {
			self.sweep_interval_secs = other.sweep_interval_secs;
		}
	}

	pub fn finalize(self) -> Result<SessionsConfig, ConfigError> {
		let jwt_secret = self.jwt_secret.ok_or_else(|| {
			ConfigError::Validation(
				"sessions.jwt_secret is required (CHARTED_SERVER_SESSIONS_JWT_SECRET)".to_string(),
			)
		})?;
		if jwt_secret.expose().len() < MIN_JWT_SECRET_LEN {
			return Err(ConfigError::Validation(format!(
				"sessions.jwt_secret must be at least {MIN_JWT_SECRET_LEN} bytes"
			)));
		}

		let access = self
			.access_token_ttl_secs
			.unwrap_or(DEFAULT_ACCESS_TOKEN_TTL_SECS);
		let refresh = self
			.refresh_token_ttl_secs
			.unwrap_or(DEFAULT_REFRESH_TOKEN_TTL_SECS);
		let sweep = self
			.sweep_interval_secs
			.unwrap_or(DEFAULT_SWEEP_INTERVAL_SECS);

		if access == 0 || sweep == 0 {
			return Err(ConfigError::Validation(
				"session access token TTL and sweep interval must be non-zero".to_string(),
			));
		}
		if refresh <= access {
			return Err(ConfigError::Validation(format!(
				"sessions.refresh_token_ttl_secs ({refresh}) must exceed access_token_ttl_secs ({access})"
			)));
		}

		let issuer = self.issuer.unwrap_or_else(|| DEFAULT_ISSUER.to_string());
		if issuer.trim().is_empty() {
			return Err(ConfigError::InvalidValue {
				key: "sessions.issuer".to_string(),
				message: "must not be empty".to_string(),
			});
		}

		Ok(SessionsConfig {
			jwt_secret,
			issuer,
			access_token_ttl: Duration::from_secs(access),
			refresh_token_ttl: Duration::from_secs(refresh),
			enable_basic_auth: self.enable_basic_auth.unwrap_or(true),
			backend: self.backend.unwrap_or_default(),
			sweep_interval: Duration::from_secs(sweep),
		})
	}
}
