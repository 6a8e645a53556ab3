// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Per-request state threaded through authentication and preconditions.

use http::{Extensions, HeaderMap, Method};
use serde::Serialize;
use tracing::debug;

use crate::credential::AuthScheme;
use crate::response::Rejection;
use crate::scopes::ScopeBitfield;
use crate::types::{ApiKeyId, SessionId, UserId};
use crate::user::UserRecord;

/// The identity a request was authenticated as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Principal {
	Session {
		user_id: UserId,
		session_id: SessionId,
	},
	ApiKey {
		user_id: UserId,
		api_key_id: ApiKeyId,
		scopes: ScopeBitfield,
	},
	Basic {
		user_id: UserId,
	},
}

impl Principal {
	pub fn user_id(&self) -> UserId {
		match self {
			Principal::Session { user_id, .. }
			| Principal::ApiKey { user_id, .. }
			| Principal::Basic { user_id } => *user_id,
		}
	}

	pub fn scheme(&self) -> AuthScheme {
		match self {
			Principal::Session { .. } => AuthScheme::Bearer,
			Principal::ApiKey { .. } => AuthScheme::ApiKey,
			Principal::Basic { .. } => AuthScheme::Basic,
		}
	}

	pub fn is_session(&self) -> bool {
		matches!(self, Principal::Session { .. })
	}
}

/// Request-scoped context. Created by the HTTP layer, filled in by the
/// authorizer, read by preconditions and handlers.
///
/// Typed attributes go in [`RequestContext::extensions`]; the authorizer
/// stores the [`Session`](crate::session::Session) or
/// [`ApiKeyRecord`](crate::api_key::ApiKeyRecord) it authenticated with there.
#[derive(Debug)]
pub struct RequestContext {
	method: Method,
	path: String,
	headers: HeaderMap,
	principal: Option<Principal>,
	user: Option<UserRecord>,
	extensions: Extensions,
	response: Option<Rejection>,
}

impl RequestContext {
	pub fn new(method: Method, path: impl Into<String>, headers: HeaderMap) -> Self {
		Self {
			method,
			path: path.into(),
			headers,
			principal: None,
			user: None,
			extensions: Extensions::new(),
			response: None,
		}
	}

	pub fn method(&self) -> &Method {
		&self.method
	}

	pub fn path(&self) -> &str {
		&self.path
	}

	pub fn headers(&self) -> &HeaderMap {
		&self.headers
	}

	/// The `Authorization` header, when present and valid UTF-8.
	pub fn authorization(&self) -> Option<&str> {
		self.headers
			.get(http::header::AUTHORIZATION)
			.and_then(|v| v.to_str().ok())
	}

	pub fn principal(&self) -> Option<&Principal> {
		self.principal.as_ref()
	}

	pub fn user(&self) -> Option<&UserRecord> {
		self.user.as_ref()
	}

	pub(crate) fn authenticate(&mut self, principal: Principal, user: UserRecord) {
		self.principal = Some(principal);
		self.user = Some(user);
	}

	pub fn extensions(&self) -> &Extensions {
		&self.extensions
	}

	pub fn extensions_mut(&mut self) -> &mut Extensions {
		&mut self.extensions
	}

	/// Writes a response. Only the first write sticks.
	pub fn respond(&mut self, rejection: Rejection) -> bool {
		if self.response.is_some() {
			debug!(status = %rejection.status, "response already written, dropping");
			return false;
		}
		self.response = Some(rejection);
		true
	}

	pub fn is_handled(&self) -> bool {
		self.response.is_some()
	}

	pub fn response(&self) -> Option<&Rejection> {
		self.response.as_ref()
	}

	pub(crate) fn take_response(&mut self) -> Option<Rejection> {
		self.response.take()
	}
}
