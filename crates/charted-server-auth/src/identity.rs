// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Hook for reporting who a request authenticated as.

use tracing::info;

use crate::context::Principal;
use crate::user::UserRecord;

/// Called once per successfully authenticated request.
pub trait IdentitySink: Send + Sync {
	fn identify(&self, user: &UserRecord, principal: &Principal);
}

/// Emits an `info` event tagged with the user's id, username and email.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingIdentitySink;

impl IdentitySink for TracingIdentitySink {
	fn identify(&self, user: &UserRecord, principal: &Principal) {
		info!(
			user.id = %user.id,
			user.username = %user.username,
			user.email = %user.email,
			auth_method = principal.scheme().as_str(),
			"request authenticated"
		);
	}
}
