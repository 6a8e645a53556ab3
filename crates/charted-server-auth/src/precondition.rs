// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Ordered async checks that run after authentication.
//!
//! Each [`Precondition`] sees the [`RequestContext`] after the principal has
//! been attached and may add typed attributes for the ones after it. The
//! [`PreconditionChain`] runs them one at a time, in registration order, and
//! stops at the first failure.
//!
//! A precondition may write its own response with
//! [`RequestContext::respond`] before returning
//! [`PreconditionResult::Failed`]; the chain then emits that response instead
//! of the generic one. Returning `Err` is reserved for errors the
//! precondition did not anticipate; those become a 500.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use http::StatusCode;
use tracing::{debug, error};

use crate::context::RequestContext;
use crate::error::{codes, AuthError};
use crate::response::{ApiError, Rejection};
use crate::session::{Session, SessionStore};

#[derive(Debug, Clone, PartialEq)]
pub enum PreconditionResult {
	Success,
	Failed {
		status: StatusCode,
		errors: Vec<ApiError>,
	},
}

impl PreconditionResult {
	pub fn failed(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
		Self::Failed {
			status,
			errors: vec![ApiError::new(code, message)],
		}
	}

	/// A failure carrying `error`'s status, code and message.
	pub fn from_error(error: &AuthError) -> Self {
		Self::failed(error.status_code(), error.code(), error.public_message())
	}

	pub fn is_success(&self) -> bool {
		matches!(self, Self::Success)
	}
}

#[async_trait]
pub trait Precondition: Send + Sync {
	fn name(&self) -> &str;

	async fn check(&self, ctx: &mut RequestContext) -> Result<PreconditionResult, AuthError>;
}

/// Adapts an async closure into a [`Precondition`]. See [`precondition_fn`].
pub struct FnPrecondition<F> {
	name: String,
	f: F,
}

/// Wraps `f` as a named precondition.
///
/// ```ignore
/// let owner_only = precondition_fn("owner-only", |ctx| {
///     Box::pin(async move {
///         match ctx.user() {
///             Some(user) if user.admin => Ok(PreconditionResult::Success),
///             _ => Ok(PreconditionResult::failed(StatusCode::FORBIDDEN, "NOT_ADMIN", "admins only")),
///         }
///     })
/// });
/// ```
pub fn precondition_fn<F>(name: impl Into<String>, f: F) -> FnPrecondition<F>
where
	F: for<'a> Fn(&'a mut RequestContext) -> BoxFuture<'a, Result<PreconditionResult, AuthError>>
		+ Send
		+ Sync,
{
	FnPrecondition {
		name: name.into(),
		f,
	}
}

#[async_trait]
impl<F> Precondition for FnPrecondition<F>
where
	F: for<'a> Fn(&'a mut RequestContext) -> BoxFuture<'a, Result<PreconditionResult, AuthError>>
		+ Send
		+ Sync,
{
	fn name(&self) -> &str {
		&self.name
	}

	async fn check(&self, ctx: &mut RequestContext) -> Result<PreconditionResult, AuthError> {
		(self.f)(ctx).await
	}
}

#[derive(Clone, Default)]
pub struct PreconditionChain {
	steps: Vec<Arc<dyn Precondition>>,
}

impl PreconditionChain {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn push<P: Precondition + 'static>(&mut self, precondition: P) {
		self.steps.push(Arc::new(precondition));
	}

	pub fn push_arc(&mut self, precondition: Arc<dyn Precondition>) {
		self.steps.push(precondition);
	}

	pub fn len(&self) -> usize {
		self.steps.len()
	}

	pub fn is_empty(&self) -> bool {
		self.steps.is_empty()
	}

	pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
		self.steps.iter().map(|p| p.name())
	}

	/// Runs every precondition in order. The first failure ends the run and
	/// becomes the request's only response.
	pub async fn run(&self, ctx: &mut RequestContext) -> Result<(), Rejection> {
		for step in &self.steps {
			let result = match step.check(ctx).await {
				Ok(result) => result,
				Err(e) => {
					if e.is_internal() {
						error!(precondition = step.name(), error = %e, "precondition errored");
					} else {
						debug!(precondition = step.name(), code = e.code(), "precondition rejected request");
					}
					let fallback = Rejection::from_auth_error(&e, ctx.method(), ctx.path());
					// Internal errors always surface as 500, whatever was written.
					return Err(match ctx.take_response() {
						Some(written) if !e.is_internal() => written,
						_ => fallback,
					});
				}
			};

			if let PreconditionResult::Failed { status, errors } = result {
				debug!(precondition = step.name(), %status, "precondition failed");
				return Err(ctx
					.take_response()
					.unwrap_or_else(|| Rejection::new(status, errors)));
			}
		}

		Ok(())
	}
}

impl fmt::Debug for PreconditionChain {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_list().entries(self.names()).finish()
	}
}

pub fn require_principal() -> RequirePrincipal {
	RequirePrincipal
}

pub fn require_session() -> RequireSession {
	RequireSession
}

pub fn require_admin() -> RequireAdmin {
	RequireAdmin
}

pub fn access_token_expired(sessions: Arc<SessionStore>) -> AccessTokenExpired {
	AccessTokenExpired::new(sessions)
}

/// Fails with 401 `MISSING_SESSION` when no principal is attached.
pub struct RequirePrincipal;

#[async_trait]
impl Precondition for RequirePrincipal {
	fn name(&self) -> &str {
		"require-principal"
	}

	async fn check(&self, ctx: &mut RequestContext) -> Result<PreconditionResult, AuthError> {
		Ok(match ctx.principal() {
			Some(_) => PreconditionResult::Success,
			None => PreconditionResult::from_error(&AuthError::MissingSession),
		})
	}
}

/// Fails with 401 `MISSING_SESSION` unless the request used a session token.
pub struct RequireSession;

#[async_trait]
impl Precondition for RequireSession {
	fn name(&self) -> &str {
		"require-session"
	}

	async fn check(&self, ctx: &mut RequestContext) -> Result<PreconditionResult, AuthError> {
		Ok(match ctx.principal() {
			Some(principal) if principal.is_session() => PreconditionResult::Success,
			_ => PreconditionResult::from_error(&AuthError::MissingSession),
		})
	}
}

/// Fails with 403 `INVALID_PERMISSIONS` unless the current user is an
/// administrator, or 401 `MISSING_SESSION` when nobody is authenticated.
pub struct RequireAdmin;

#[async_trait]
impl Precondition for RequireAdmin {
	fn name(&self) -> &str {
		"require-admin"
	}

	async fn check(&self, ctx: &mut RequestContext) -> Result<PreconditionResult, AuthError> {
		Ok(match ctx.user() {
			Some(user) if user.admin => PreconditionResult::Success,
			Some(_) => PreconditionResult::failed(
				StatusCode::FORBIDDEN,
				codes::INVALID_PERMISSIONS,
				"this route is restricted to administrators",
			),
			None => PreconditionResult::from_error(&AuthError::MissingSession),
		})
	}
}

/// Guards the refresh route: passes only once the session's access token has
/// expired, otherwise 406 `ACCESS_TOKEN_TOO_NEW`.
pub struct AccessTokenExpired {
	sessions: Arc<SessionStore>,
}

impl AccessTokenExpired {
	pub fn new(sessions: Arc<SessionStore>) -> Self {
		Self { sessions }
	}
}

#[async_trait]
impl Precondition for AccessTokenExpired {
	fn name(&self) -> &str {
		"access-token-expired"
	}

	async fn check(&self, ctx: &mut RequestContext) -> Result<PreconditionResult, AuthError> {
		let Some(session) = ctx.extensions().get::<Session>() else {
			return Ok(PreconditionResult::from_error(&AuthError::MissingSession));
		};

		if session.is_access_expired_at(self.sessions.now()) {
			Ok(PreconditionResult::Success)
		} else {
			Ok(PreconditionResult::from_error(&AuthError::AccessTokenTooNew))
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use http::{HeaderMap, Method};
	use std::sync::atomic::{AtomicUsize, Ordering};

	fn ctx() -> RequestContext {
		RequestContext::new(Method::PATCH, "/organizations/1", HeaderMap::new())
	}

	struct Counting {
		name: &'static str,
		calls: Arc<AtomicUsize>,
		result: PreconditionResult,
	}

	#[async_trait]
	impl Precondition for Counting {
		fn name(&self) -> &str {
			self.name
		}

		async fn check(&self, _ctx: &mut RequestContext) -> Result<PreconditionResult, AuthError> {
			self.calls.fetch_add(1, Ordering::SeqCst);
			Ok(self.result.clone())
		}
	}

	fn counting(
		name: &'static str,
		result: PreconditionResult,
	) -> (Counting, Arc<AtomicUsize>) {
		let calls = Arc::new(AtomicUsize::new(0));
		(
			Counting {
				name,
				calls: calls.clone(),
				result,
			},
			calls,
		)
	}

	#[tokio::test]
	async fn empty_chain_succeeds() {
		assert!(PreconditionChain::new().run(&mut ctx()).await.is_ok());
	}

	#[tokio::test]
	async fn first_failure_short_circuits() {
		let failure = PreconditionResult::failed(StatusCode::FORBIDDEN, "NOPE", "cannot edit");
		let (p1, c1) = counting("p1", PreconditionResult::Success);
		let (p2, c2) = counting("p2", failure);
		let (p3, c3) = counting("p3", PreconditionResult::Success);

		let mut chain = PreconditionChain::new();
		chain.push(p1);
		chain.push(p2);
		chain.push(p3);

		let rejection = chain.run(&mut ctx()).await.unwrap_err();
		assert_eq!(rejection.status, StatusCode::FORBIDDEN);
		assert_eq!(rejection.body.errors, vec![ApiError::new("NOPE", "cannot edit")]);
		assert_eq!(c1.load(Ordering::SeqCst), 1);
		assert_eq!(c2.load(Ordering::SeqCst), 1);
		assert_eq!(c3.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn custom_response_is_not_overwritten() {
		let mut chain = PreconditionChain::new();
		chain.push(precondition_fn("custom", |ctx| {
			Box::pin(async move {
				ctx.respond(Rejection::new(
					StatusCode::CONFLICT,
					vec![ApiError::new("CUSTOM", "custom body")],
				));
				Ok(PreconditionResult::failed(
					StatusCode::FORBIDDEN,
					"GENERIC",
					"generic body",
				))
			})
		}));

		let mut ctx = ctx();
		let rejection = chain.run(&mut ctx).await.unwrap_err();
		assert_eq!(rejection.status, StatusCode::CONFLICT);
		assert_eq!(rejection.code(), Some("CUSTOM"));
		assert!(!ctx.is_handled());
	}

	#[tokio::test]
	async fn later_steps_see_earlier_attributes() {
		#[derive(Clone)]
		struct OrgOwner(bool);

		let mut chain = PreconditionChain::new();
		chain.push(precondition_fn("load-org", |ctx| {
			Box::pin(async move {
				ctx.extensions_mut().insert(OrgOwner(true));
				Ok(PreconditionResult::Success)
			})
		}));
		chain.push(precondition_fn("can-edit-metadata", |ctx| {
			Box::pin(async move {
				match ctx.extensions().get::<OrgOwner>() {
					Some(OrgOwner(true)) => Ok(PreconditionResult::Success),
					_ => Ok(PreconditionResult::failed(
						StatusCode::FORBIDDEN,
						"INVALID_PERMISSIONS",
						"cannot edit metadata",
					)),
				}
			})
		}));

		assert!(chain.run(&mut ctx()).await.is_ok());
	}

	#[tokio::test]
	async fn unexpected_error_becomes_500() {
		let mut chain = PreconditionChain::new();
		chain.push(precondition_fn("db", |_ctx| {
			Box::pin(async move { Err(AuthError::Internal("database is locked".into())) })
		}));

		let rejection = chain.run(&mut ctx()).await.unwrap_err();
		assert_eq!(rejection.status, StatusCode::INTERNAL_SERVER_ERROR);
		assert_eq!(rejection.code(), Some("INTERNAL_SERVER_ERROR"));
	}

	#[tokio::test]
	async fn internal_error_overrides_written_response() {
		let mut chain = PreconditionChain::new();
		chain.push(precondition_fn("half-done", |ctx| {
			Box::pin(async move {
				ctx.respond(Rejection::new(
					StatusCode::CONFLICT,
					vec![ApiError::new("CUSTOM", "custom body")],
				));
				Err(AuthError::Internal("connection reset".into()))
			})
		}));

		let rejection = chain.run(&mut ctx()).await.unwrap_err();
		assert_eq!(rejection.status, StatusCode::INTERNAL_SERVER_ERROR);
		assert_eq!(rejection.code(), Some("INTERNAL_SERVER_ERROR"));
	}

	#[tokio::test]
	async fn client_error_keeps_written_response() {
		let mut chain = PreconditionChain::new();
		chain.push(precondition_fn("custom-401", |ctx| {
			Box::pin(async move {
				ctx.respond(Rejection::new(
					StatusCode::CONFLICT,
					vec![ApiError::new("CUSTOM", "custom body")],
				));
				Err(AuthError::MissingSession)
			})
		}));

		let rejection = chain.run(&mut ctx()).await.unwrap_err();
		assert_eq!(rejection.code(), Some("CUSTOM"));
	}

	#[tokio::test]
	async fn require_principal_fails_gracefully_without_one() {
		let mut chain = PreconditionChain::new();
		chain.push(require_principal());
		let rejection = chain.run(&mut ctx()).await.unwrap_err();
		assert_eq!(rejection.status, StatusCode::UNAUTHORIZED);
		assert_eq!(rejection.code(), Some("MISSING_SESSION"));
	}

	#[test]
	fn debug_lists_names_in_order() {
		let mut chain = PreconditionChain::new();
		chain.push(require_principal());
		chain.push(require_session());
		assert_eq!(
			format!("{chain:?}"),
			r#"["require-principal", "require-session"]"#
		);
	}
}
