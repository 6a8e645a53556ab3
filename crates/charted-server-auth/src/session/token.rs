// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! HS512 session token encoding.
//!
//! Expiry is checked by the store against its [`Clock`](crate::clock::Clock),
//! not by the JWT library, so signature and issuer are validated here while
//! `exp` is only required to be present.

use chrono::{DateTime, Utc};
use charted_common_secret::SecretString;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::SessionError;
use crate::types::{SessionId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
	Access,
	Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct SessionClaims {
	pub iss: String,
	pub sub: UserId,
	pub sid: SessionId,
	pub kind: TokenKind,
	pub iat: i64,
	pub exp: i64,
	pub jti: String,
}

impl SessionClaims {
	pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
		self.exp <= now.timestamp()
	}
}

pub(crate) struct TokenCodec {
	issuer: String,
	encoding: EncodingKey,
	decoding: DecodingKey,
	validation: Validation,
}

impl TokenCodec {
	pub fn new(issuer: &str, signing_key: &SecretString) -> Self {
		let mut validation = Validation::new(Algorithm::HS512);
		validation.set_issuer(&[issuer]);
		validation.set_required_spec_claims(&["exp", "iss", "sub"]);
		validation.validate_exp = false;
		validation.leeway = 0;

		Self {
			issuer: issuer.to_string(),
			encoding: EncodingKey::from_secret(signing_key.expose().as_bytes()),
			decoding: DecodingKey::from_secret(signing_key.expose().as_bytes()),
			validation,
		}
	}

	pub fn issuer(&self) -> &str {
		&self.issuer
	}

	pub fn sign(&self, claims: &SessionClaims) -> Result<SecretString, SessionError> {
		encode(&Header::new(Algorithm::HS512), claims, &self.encoding)
			.map(SecretString::new)
			.map_err(|e| SessionError::Signing(e.to_string()))
	}

	pub fn decode(&self, token: &str) -> Result<SessionClaims, SessionError> {
		decode::<SessionClaims>(token, &self.decoding, &self.validation)
			.map(|data| data.claims)
			.map_err(|e| SessionError::Decode(e.to_string()))
	}
}
