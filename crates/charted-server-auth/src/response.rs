// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Structured rejection bodies handed to the HTTP layer.

use http::{Method, StatusCode};
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::AuthError;

/// One entry of an error body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiError {
	pub code: String,
	pub message: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub detail: Option<Value>,
}

impl ApiError {
	pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
		Self {
			code: code.into(),
			message: message.into(),
			detail: None,
		}
	}

	pub fn with_detail(mut self, detail: Value) -> Self {
		self.detail = Some(detail);
		self
	}
}

/// `{ "success": false, "errors": [...] }`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBody {
	success: bool,
	pub errors: Vec<ApiError>,
}

impl ErrorBody {
	pub fn new(errors: Vec<ApiError>) -> Self {
		Self {
			success: false,
			errors,
		}
	}
}

/// A terminal response: status plus body. Produced at most once per request.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
	pub status: StatusCode,
	pub body: ErrorBody,
}

impl Rejection {
	pub fn new(status: StatusCode, errors: Vec<ApiError>) -> Self {
		Self {
			status,
			body: ErrorBody::new(errors),
		}
	}

	/// Builds the rejection for `error`, tagging it with the request line.
	pub fn from_auth_error(error: &AuthError, method: &Method, path: &str) -> Self {
		let api_error = ApiError::new(error.code(), error.public_message())
			.with_detail(json!({ "method": method.as_str(), "uri": path }));
		Self::new(error.status_code(), vec![api_error])
	}

	/// The first error code, if any.
	pub fn code(&self) -> Option<&str> {
		self.body.errors.first().map(|e| e.code.as_str())
	}
}
