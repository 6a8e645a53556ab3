// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! `Authorization` header parsing.

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use charted_common_secret::SecretString;

/// Authentication schemes accepted in the `Authorization` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthScheme {
	Bearer,
	ApiKey,
	Basic,
}

impl AuthScheme {
	pub fn as_str(&self) -> &'static str {
		match self {
			AuthScheme::Bearer => "Bearer",
			AuthScheme::ApiKey => "ApiKey",
			AuthScheme::Basic => "Basic",
		}
	}
}

impl fmt::Display for AuthScheme {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for AuthScheme {
	type Err = CredentialError;

	/// Case-sensitive.
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"Bearer" => Ok(AuthScheme::Bearer),
			"ApiKey" => Ok(AuthScheme::ApiKey),
			"Basic" => Ok(AuthScheme::Basic),
			other => Err(CredentialError::UnsupportedScheme(other.to_string())),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialError {
	#[error("missing Authorization header")]
	Missing,

	#[error("malformed Authorization header")]
	MalformedHeader,

	#[error("unsupported authorization scheme '{0}'")]
	UnsupportedScheme(String),
}

/// A credential presented with a request. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
	Bearer(SecretString),
	ApiKey(SecretString),
	Basic(SecretString),
}

impl Credential {
	/// Splits a raw header value into scheme and token.
	///
	/// The split happens at the first space only, so the token keeps any
	/// further spaces. An empty token counts as malformed.
	pub fn parse(header: Option<&str>) -> Result<Self, CredentialError> {
		let header = header.ok_or(CredentialError::Missing)?;
		let (scheme, token) = header
			.split_once(' ')
			.ok_or(CredentialError::MalformedHeader)?;
		if token.is_empty() {
			return Err(CredentialError::MalformedHeader);
		}

		let token = SecretString::new(token.to_string());
		Ok(match scheme.parse::<AuthScheme>()? {
			AuthScheme::Bearer => Credential::Bearer(token),
			AuthScheme::ApiKey => Credential::ApiKey(token),
			AuthScheme::Basic => Credential::Basic(token),
		})
	}

	pub fn scheme(&self) -> AuthScheme {
		match self {
			Credential::Bearer(_) => AuthScheme::Bearer,
			Credential::ApiKey(_) => AuthScheme::ApiKey,
			Credential::Basic(_) => AuthScheme::Basic,
		}
	}

	pub fn token(&self) -> &SecretString {
		match self {
			Credential::Bearer(t) | Credential::ApiKey(t) | Credential::Basic(t) => t,
		}
	}
}

/// Username and password carried by a `Basic` credential.
#[derive(Debug, Clone)]
pub struct BasicCredentials {
	pub username: String,
	pub password: SecretString,
}

impl BasicCredentials {
	/// Decodes `base64(username:password)`. The split happens at the first
	/// colon, so passwords may contain colons. Returns `None` for invalid
	/// base64, non UTF-8 payloads and payloads without a colon.
	pub fn decode(token: &SecretString) -> Option<Self> {
		let bytes = STANDARD.decode(token.expose().trim()).ok()?;
		let decoded = SecretString::new(String::from_utf8(bytes).ok()?);
		let (username, password) = decoded.expose().split_once(':')?;

		Some(Self {
			username: username.to_string(),
			password: SecretString::new(password.to_string()),
		})
	}
}
