// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Per-request authorization.
//!
//! [`Authorizer::authorize`] takes a request from unauthenticated to either
//! authorized or rejected:
//!
//! 1. Read the `Authorization` header. Without one the request is rejected
//!    unless the route allows anonymous access.
//! 2. Parse it into a [`Credential`].
//! 3. Resolve the credential into a [`Principal`] with the scheme's
//!    collaborator: the [`SessionStore`] for `Bearer`, the API key lookup for
//!    `ApiKey` (including the route's required scopes), the user lookup and
//!    [`PasswordVerifier`] for `Basic`.
//! 4. Attach the principal and its user to the [`RequestContext`].
//! 5. Run the route's [`PreconditionChain`].
//!
//! Every step either succeeds or produces the request's one [`Rejection`].

use std::sync::Arc;

use http::header::AUTHORIZATION;
use tracing::{debug, error, instrument, warn, Span};

use charted_common_secret::SecretString;

use crate::api_key::{ApiKeyLookup, ApiKeyRecord, ApiKeyResolver};
use crate::context::{Principal, RequestContext};
use crate::credential::{AuthScheme, BasicCredentials, Credential};
use crate::error::AuthError;
use crate::identity::{IdentitySink, TracingIdentitySink};
use crate::password::PasswordVerifier;
use crate::precondition::{access_token_expired, Precondition, PreconditionChain};
use crate::response::Rejection;
use crate::scopes::{api_key_scopes, ApiKeyScope, ScopeBitfield, ScopeError};
use crate::session::{Session, SessionStore};
use crate::types::UserId;
use crate::user::{UserLookup, UserRecord};

/// Authentication requirements attached to a route when it is registered.
#[derive(Debug, Clone)]
pub struct RouteConfig {
	/// Bearer requests must present the session's refresh token.
	pub require_refresh_token: bool,
	/// `ApiKey` credentials are refused. Basic is not affected.
	pub assert_session_only: bool,
	/// Requests without an `Authorization` header skip straight to the
	/// preconditions.
	pub allow_non_authorized_requests: bool,
	/// Scopes an API key must hold. Ignored for other schemes.
	pub required_scopes: ScopeBitfield,
	pub preconditions: PreconditionChain,
}

impl Default for RouteConfig {
	fn default() -> Self {
		Self {
			require_refresh_token: false,
			assert_session_only: false,
			allow_non_authorized_requests: false,
			required_scopes: ScopeBitfield::empty(api_key_scopes().clone()),
			preconditions: PreconditionChain::new(),
		}
	}
}

impl RouteConfig {
	pub fn new() -> Self {
		Self::default()
	}

	/// Session-only, refresh token required, and refused while the access
	/// token is still valid. Basic credentials carry no session and fail the
	/// expiry check with `MISSING_SESSION`.
	pub fn refresh_route(sessions: Arc<SessionStore>) -> Self {
		Self::new()
			.session_only()
			.require_refresh_token()
			.condition(access_token_expired(sessions))
	}

	pub fn require_refresh_token(mut self) -> Self {
		self.require_refresh_token = true;
		self
	}

	pub fn session_only(mut self) -> Self {
		self.assert_session_only = true;
		self
	}

	pub fn allow_unauthorized(mut self) -> Self {
		self.allow_non_authorized_requests = true;
		self
	}

	pub fn scope(mut self, scope: ApiKeyScope) -> Self {
		self.required_scopes.insert_bits(scope.bit());
		self
	}

	pub fn scope_key(mut self, key: &str) -> Result<Self, ScopeError> {
		self.required_scopes.add(key)?;
		Ok(self)
	}

	pub fn condition<P: Precondition + 'static>(mut self, precondition: P) -> Self {
		self.preconditions.push(precondition);
		self
	}
}

/// Runs the authorization pipeline. Holds no per-request state; share one
/// instance across all requests.
#[derive(Clone)]
pub struct Authorizer {
	sessions: Arc<SessionStore>,
	api_keys: ApiKeyResolver,
	users: Arc<dyn UserLookup>,
	passwords: Arc<dyn PasswordVerifier>,
	identity: Arc<dyn IdentitySink>,
	basic_auth: bool,
}

impl Authorizer {
	pub fn new(
		sessions: Arc<SessionStore>,
		api_keys: Arc<dyn ApiKeyLookup>,
		users: Arc<dyn UserLookup>,
		passwords: Arc<dyn PasswordVerifier>,
	) -> Self {
		Self {
			sessions,
			api_keys: ApiKeyResolver::new(api_keys),
			users,
			passwords,
			identity: Arc::new(TracingIdentitySink),
			basic_auth: true,
		}
	}

	pub fn with_identity_sink(mut self, sink: Arc<dyn IdentitySink>) -> Self {
		self.identity = sink;
		self
	}

	/// When disabled, `Basic` is treated as an unsupported scheme.
	pub fn with_basic_auth(mut self, enabled: bool) -> Self {
		self.basic_auth = enabled;
		self
	}

	pub fn sessions(&self) -> &Arc<SessionStore> {
		&self.sessions
	}

	/// Authenticates the request and runs the route's preconditions.
	///
	/// On success the context carries the principal and user (unless the
	/// route allowed an anonymous request). On failure the returned
	/// [`Rejection`] is the only response the request gets.
	#[instrument(
		skip_all,
		fields(method = %ctx.method(), path = ctx.path(), auth_method, user_id)
	)]
	pub async fn authorize(
		&self,
		route: &RouteConfig,
		ctx: &mut RequestContext,
	) -> Result<(), Rejection> {
		if let Err(e) = self.authenticate(route, ctx).await {
			if e.is_internal() {
				error!(error = %e, "authorization failed with an internal error");
			} else {
				debug!(code = e.code(), "request rejected");
			}
			return Err(Rejection::from_auth_error(&e, ctx.method(), ctx.path()));
		}

		route.preconditions.run(ctx).await
	}

	async fn authenticate(
		&self,
		route: &RouteConfig,
		ctx: &mut RequestContext,
	) -> Result<(), AuthError> {
		let credential = match ctx.headers().get(AUTHORIZATION) {
			None if route.allow_non_authorized_requests => {
				debug!("no Authorization header, continuing anonymously");
				return Ok(());
			}
			None => return Err(AuthError::MissingAuthorizationHeader),
			Some(value) => {
				let value = value
					.to_str()
					.map_err(|_| AuthError::InvalidAuthorizationHeader)?;
				Credential::parse(Some(value))?
			}
		};

		let scheme = credential.scheme();
		Span::current().record("auth_method", scheme.as_str());

		let (principal, user) = match credential {
			Credential::Bearer(token) => {
				let session = self.bearer(route, &token).await?;
				let user = self.owner(session.user_id).await?;
				let principal = Principal::Session {
					user_id: session.user_id,
					session_id: session.id,
				};
				ctx.extensions_mut().insert(session);
				(principal, user)
			}
			Credential::ApiKey(token) => {
				let key = self.api_key(route, &token).await?;
				let user = self.owner(key.owner_id).await?;
				let principal = Principal::ApiKey {
					user_id: key.owner_id,
					api_key_id: key.id,
					scopes: key.scopes.clone(),
				};
				ctx.extensions_mut().insert(key);
				(principal, user)
			}
			Credential::Basic(token) => {
				let user = self.basic(&token).await?;
				(Principal::Basic { user_id: user.id }, user)
			}
		};

		Span::current().record("user_id", tracing::field::display(user.id));
		self.identity.identify(&user, &principal);
		ctx.authenticate(principal, user);
		Ok(())
	}

	async fn bearer(&self, route: &RouteConfig, token: &SecretString) -> Result<Session, AuthError> {
		let session = self
			.sessions
			.fetch(token)
			.await?
			.ok_or(AuthError::UnknownSession)?;

		if route.require_refresh_token && !session.is_refresh_token(token) {
			return Err(AuthError::RequiredRefreshToken);
		}

		Ok(session)
	}

	async fn api_key(
		&self,
		route: &RouteConfig,
		token: &SecretString,
	) -> Result<ApiKeyRecord, AuthError> {
		if route.assert_session_only {
			debug!("api key on session-only route");
			return Err(AuthError::SessionOnlyRoute);
		}

		let key = self
			.api_keys
			.resolve_at(token, self.sessions.now())
			.await?
			.ok_or(AuthError::UnknownApiKey)?;

		if let Some(scope) = key.scopes.first_missing(&route.required_scopes) {
			warn!(api_key_id = %key.id, scope, "api key is missing a required scope");
			return Err(AuthError::MissingApiKeyScope {
				key_name: key.name.clone(),
				scope: scope.to_string(),
			});
		}

		Ok(key)
	}

	async fn basic(&self, token: &SecretString) -> Result<UserRecord, AuthError> {
		if !self.basic_auth {
			return Err(AuthError::InvalidAuthorizationHeaderPrefix(
				AuthScheme::Basic.to_string(),
			));
		}
		let credentials =
			BasicCredentials::decode(token).ok_or(AuthError::InvalidBasicAuthCredentials)?;

		// Username only; email lookup is a login-form feature.
		let user = self
			.users
			.find_user_by_username(&credentials.username)
			.await?
			.ok_or_else(|| AuthError::UnknownUser(credentials.username.clone()))?;

		let Some(hash) = user.password_hash.as_deref() else {
			return Err(AuthError::InvalidPassword);
		};
		if !self.passwords.verify(&credentials.password, hash).await? {
			warn!(user_id = %user.id, "basic auth with wrong password");
			return Err(AuthError::InvalidPassword);
		}

		Ok(user)
	}

	async fn owner(&self, user_id: UserId) -> Result<UserRecord, AuthError> {
		self.users
			.find_user_by_id(&user_id)
			.await?
			.ok_or_else(|| AuthError::UnknownUser(user_id.to_string()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::api_key::generate_api_key;
	use crate::clock::ManualClock;
	use crate::hash_token;
	use crate::password::Argon2PasswordVerifier;
	use crate::precondition::{precondition_fn, require_principal, PreconditionResult};
	use crate::response::ApiError;
	use crate::session::InMemorySessionBackend;
	use crate::testing::{
		failing_session_backend, test_settings, user_with_password, InMemoryApiKeys, InMemoryUsers,
	};
	use crate::types::ApiKeyId;
	use async_trait::async_trait;
	use base64::engine::general_purpose::STANDARD;
	use base64::Engine;
	use chrono::{Duration, Utc};
	use http::{HeaderMap, HeaderValue, Method, StatusCode};
	use serde_json::json;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::sync::Mutex;

	#[derive(Default)]
	struct CountingVerifier {
		calls: AtomicUsize,
	}

	#[async_trait]
	impl PasswordVerifier for CountingVerifier {
		async fn verify(&self, plaintext: &SecretString, stored_hash: &str) -> Result<bool, AuthError> {
			self.calls.fetch_add(1, Ordering::SeqCst);
			Argon2PasswordVerifier.verify(plaintext, stored_hash).await
		}
	}

	#[derive(Default)]
	struct RecordingSink {
		seen: Mutex<Vec<(UserId, AuthScheme)>>,
	}

	impl IdentitySink for RecordingSink {
		fn identify(&self, user: &UserRecord, principal: &Principal) {
			self.seen
				.lock()
				.unwrap()
				.push((user.id, principal.scheme()));
		}
	}

	struct Harness {
		authorizer: Authorizer,
		sessions: Arc<SessionStore>,
		clock: Arc<ManualClock>,
		users: Arc<InMemoryUsers>,
		api_keys: Arc<InMemoryApiKeys>,
		verifier: Arc<CountingVerifier>,
		sink: Arc<RecordingSink>,
		noel: UserRecord,
	}

	impl Harness {
		fn new() -> Self {
			let clock = Arc::new(ManualClock::new(Utc::now()));
			let sessions = Arc::new(
				SessionStore::new(Arc::new(InMemorySessionBackend::new()), test_settings())
					.with_clock(clock.clone()),
			);
			let users = Arc::new(InMemoryUsers::default());
			let noel = user_with_password("noel", "hunter2");
			users.insert(noel.clone());
			let api_keys = Arc::new(InMemoryApiKeys::default());
			let verifier = Arc::new(CountingVerifier::default());
			let sink = Arc::new(RecordingSink::default());

			let authorizer = Authorizer::new(
				sessions.clone(),
				api_keys.clone(),
				users.clone(),
				verifier.clone(),
			)
			.with_identity_sink(sink.clone());

			Self {
				authorizer,
				sessions,
				clock,
				users,
				api_keys,
				verifier,
				sink,
				noel,
			}
		}

		fn api_key(&self, scopes: &[ApiKeyScope]) -> SecretString {
			let token = generate_api_key();
			self.api_keys.insert(ApiKeyRecord {
				id: ApiKeyId::generate(),
				owner_id: self.noel.id,
				name: "ci".to_string(),
				token_hash: hash_token(token.expose()),
				scopes: ScopeBitfield::api_key(scopes.iter().copied()),
				expires_at: None,
				created_at: Utc::now(),
			});
			token
		}

		async fn run(&self, route: &RouteConfig, header: Option<&str>) -> (Result<(), Rejection>, RequestContext) {
			let mut headers = HeaderMap::new();
			if let Some(value) = header {
				headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
			}
			let mut ctx = RequestContext::new(Method::GET, "/repositories/1", headers);
			let result = self.authorizer.authorize(route, &mut ctx).await;
			(result, ctx)
		}
	}

	fn basic(username: &str, password: &str) -> String {
		format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
	}

	fn rejected(result: Result<(), Rejection>) -> Rejection {
		result.expect_err("request should have been rejected")
	}

	mod header {
		use super::*;

		#[tokio::test]
		async fn missing_header_is_forbidden() {
			let h = Harness::new();
			let (result, ctx) = h.run(&RouteConfig::new(), None).await;
			let rejection = rejected(result);
			assert_eq!(rejection.status, StatusCode::FORBIDDEN);
			assert_eq!(rejection.code(), Some("MISSING_AUTHORIZATION_HEADER"));
			assert_eq!(
				rejection.body.errors[0].detail,
				Some(json!({ "method": "GET", "uri": "/repositories/1" }))
			);
			assert!(ctx.principal().is_none());
		}

		#[tokio::test]
		async fn anonymous_route_skips_to_preconditions() {
			let h = Harness::new();
			let calls = Arc::new(AtomicUsize::new(0));
			let seen = calls.clone();
			let route = RouteConfig::new().allow_unauthorized().condition(precondition_fn(
				"count",
				move |_ctx| {
					let seen = seen.clone();
					Box::pin(async move {
						seen.fetch_add(1, Ordering::SeqCst);
						Ok(PreconditionResult::Success)
					})
				},
			));

			let (result, ctx) = h.run(&route, None).await;
			assert!(result.is_ok());
			assert!(ctx.principal().is_none());
			assert_eq!(calls.load(Ordering::SeqCst), 1);
		}

		#[tokio::test]
		async fn anonymous_route_with_principal_check_fails_gracefully() {
			let h = Harness::new();
			let route = RouteConfig::new()
				.allow_unauthorized()
				.condition(require_principal());
			let rejection = rejected(h.run(&route, None).await.0);
			assert_eq!(rejection.status, StatusCode::UNAUTHORIZED);
			assert_eq!(rejection.code(), Some("MISSING_SESSION"));
		}

		#[tokio::test]
		async fn anonymous_route_still_validates_present_header() {
			let h = Harness::new();
			let route = RouteConfig::new().allow_unauthorized();
			let rejection = rejected(h.run(&route, Some("Bearer not-a-jwt")).await.0);
			assert_eq!(rejection.code(), Some("JWT_DECODE_EXCEPTION"));
		}

		#[tokio::test]
		async fn malformed_header() {
			let h = Harness::new();
			let rejection = rejected(h.run(&RouteConfig::new(), Some("Bearer")).await.0);
			assert_eq!(rejection.status, StatusCode::NOT_ACCEPTABLE);
			assert_eq!(rejection.code(), Some("INVALID_AUTHORIZATION_HEADER"));
		}

		#[tokio::test]
		async fn unsupported_scheme() {
			let h = Harness::new();
			let rejection = rejected(h.run(&RouteConfig::new(), Some("Foo abc")).await.0);
			assert_eq!(rejection.status, StatusCode::NOT_ACCEPTABLE);
			assert_eq!(rejection.code(), Some("INVALID_AUTHORIZATION_HEADER_PREFIX"));
		}
	}

	mod bearer {
		use super::*;

		#[tokio::test]
		async fn access_token_authorizes() {
			let h = Harness::new();
			let issued = h.sessions.create(h.noel.id).await.unwrap();
			let header = format!("Bearer {}", issued.access_token.expose());

			let (result, ctx) = h.run(&RouteConfig::new(), Some(&header)).await;
			assert!(result.is_ok());
			assert_eq!(
				ctx.principal(),
				Some(&Principal::Session {
					user_id: h.noel.id,
					session_id: issued.session.id,
				})
			);
			assert_eq!(ctx.user().map(|u| u.id), Some(h.noel.id));
			assert_eq!(
				ctx.extensions().get::<Session>().map(|s| s.id),
				Some(issued.session.id)
			);
			assert_eq!(
				*h.sink.seen.lock().unwrap(),
				vec![(h.noel.id, AuthScheme::Bearer)]
			);
		}

		#[tokio::test]
		async fn revoked_session_is_unknown() {
			let h = Harness::new();
			let issued = h.sessions.create(h.noel.id).await.unwrap();
			h.sessions.revoke(&issued.session).await.unwrap();

			let header = format!("Bearer {}", issued.access_token.expose());
			let rejection = rejected(h.run(&RouteConfig::new(), Some(&header)).await.0);
			assert_eq!(rejection.status, StatusCode::NOT_FOUND);
			assert_eq!(rejection.code(), Some("UNKNOWN_SESSION"));
		}

		#[tokio::test]
		async fn garbage_token_fails_to_decode() {
			let h = Harness::new();
			let rejection = rejected(h.run(&RouteConfig::new(), Some("Bearer abc.def.ghi")).await.0);
			assert_eq!(rejection.status, StatusCode::NOT_ACCEPTABLE);
			assert_eq!(rejection.code(), Some("JWT_DECODE_EXCEPTION"));
		}

		#[tokio::test]
		async fn expired_access_token() {
			let h = Harness::new();
			let issued = h.sessions.create(h.noel.id).await.unwrap();
			h.clock.advance(Duration::hours(13));

			let header = format!("Bearer {}", issued.access_token.expose());
			let rejection = rejected(h.run(&RouteConfig::new(), Some(&header)).await.0);
			assert_eq!(rejection.status, StatusCode::UNAUTHORIZED);
			assert_eq!(rejection.code(), Some("EXPIRED_TOKEN"));
		}

		#[tokio::test]
		async fn refresh_route_requires_refresh_token() {
			let h = Harness::new();
			let issued = h.sessions.create(h.noel.id).await.unwrap();
			let route = RouteConfig::new().require_refresh_token();

			let header = format!("Bearer {}", issued.access_token.expose());
			let rejection = rejected(h.run(&route, Some(&header)).await.0);
			assert_eq!(rejection.status, StatusCode::BAD_REQUEST);
			assert_eq!(rejection.code(), Some("REQUIRED_REFRESH_TOKEN"));

			let header = format!("Bearer {}", issued.refresh_token.expose());
			assert!(h.run(&route, Some(&header)).await.0.is_ok());
		}

		#[tokio::test]
		async fn refresh_route_waits_for_access_expiry() {
			let h = Harness::new();
			let issued = h.sessions.create(h.noel.id).await.unwrap();
			let route = RouteConfig::refresh_route(h.sessions.clone());
			let header = format!("Bearer {}", issued.refresh_token.expose());

			let rejection = rejected(h.run(&route, Some(&header)).await.0);
			assert_eq!(rejection.status, StatusCode::NOT_ACCEPTABLE);
			assert_eq!(rejection.code(), Some("ACCESS_TOKEN_TOO_NEW"));

			h.clock.advance(Duration::hours(12));
			let (result, ctx) = h.run(&route, Some(&header)).await;
			assert!(result.is_ok());

			let session = ctx.extensions().get::<Session>().unwrap();
			let rotated = h.sessions.refresh(session).await.unwrap();
			assert_ne!(rotated.refresh_token, issued.refresh_token);
		}

		#[tokio::test]
		async fn session_store_outage_is_internal() {
			let h = Harness::new();
			let issued = h.sessions.create(h.noel.id).await.unwrap();

			let broken = Arc::new(SessionStore::new(
				Arc::new(failing_session_backend()),
				test_settings(),
			));
			let authorizer = Authorizer::new(
				broken,
				h.api_keys.clone(),
				h.users.clone(),
				h.verifier.clone(),
			);

			let mut headers = HeaderMap::new();
			let value = format!("Bearer {}", issued.access_token.expose());
			headers.insert(AUTHORIZATION, HeaderValue::from_str(&value).unwrap());
			let mut ctx = RequestContext::new(Method::GET, "/repositories/1", headers);

			let rejection = rejected(authorizer.authorize(&RouteConfig::new(), &mut ctx).await);
			assert_eq!(rejection.status, StatusCode::INTERNAL_SERVER_ERROR);
			assert_eq!(rejection.code(), Some("INTERNAL_SERVER_ERROR"));
			assert!(ctx.principal().is_none());
		}

		#[tokio::test]
		async fn owner_lookup_outage_is_internal() {
			let h = Harness::new();
			let issued = h.sessions.create(h.noel.id).await.unwrap();
			h.users.fail_with("connection refused");

			let header = format!("Bearer {}", issued.access_token.expose());
			let rejection = rejected(h.run(&RouteConfig::new(), Some(&header)).await.0);
			assert_eq!(rejection.status, StatusCode::INTERNAL_SERVER_ERROR);
			assert_eq!(rejection.code(), Some("INTERNAL_SERVER_ERROR"));
			assert!(h.sink.seen.lock().unwrap().is_empty());
		}

		#[tokio::test]
		async fn deleted_owner_is_unknown_user() {
			let h = Harness::new();
			let issued = h.sessions.create(h.noel.id).await.unwrap();
			h.users.remove(&h.noel.id);

			let header = format!("Bearer {}", issued.access_token.expose());
			let rejection = rejected(h.run(&RouteConfig::new(), Some(&header)).await.0);
			assert_eq!(rejection.status, StatusCode::NOT_FOUND);
			assert_eq!(rejection.code(), Some("UNKNOWN_USER"));
		}
	}

	mod api_key {
		use super::*;

		#[tokio::test]
		async fn key_with_required_scopes_authorizes() {
			let h = Harness::new();
			let token = h.api_key(&[ApiKeyScope::RepoCreate, ApiKeyScope::RepoDelete]);
			let route = RouteConfig::new()
				.scope(ApiKeyScope::RepoCreate)
				.scope(ApiKeyScope::RepoDelete);

			let header = format!("ApiKey {}", token.expose());
			let (result, ctx) = h.run(&route, Some(&header)).await;
			assert!(result.is_ok());

			let Some(Principal::ApiKey { user_id, scopes, .. }) = ctx.principal() else {
				panic!("expected an api key principal");
			};
			assert_eq!(*user_id, h.noel.id);
			assert!(scopes.has("repo:delete"));
			assert_eq!(ctx.extensions().get::<ApiKeyRecord>().map(|k| k.name.as_str()), Some("ci"));
		}

		#[tokio::test]
		async fn missing_scope_names_key_and_scope() {
			let h = Harness::new();
			let token = h.api_key(&[ApiKeyScope::RepoCreate]);
			let route = RouteConfig::new()
				.scope(ApiKeyScope::RepoCreate)
				.scope(ApiKeyScope::RepoDelete);

			let header = format!("ApiKey {}", token.expose());
			let rejection = rejected(h.run(&route, Some(&header)).await.0);
			assert_eq!(rejection.status, StatusCode::FORBIDDEN);
			assert_eq!(rejection.code(), Some("MISSING_API_KEY_SCOPE"));
			assert_eq!(
				rejection.body.errors[0].message,
				"API key ci doesn't have scope repo:delete enabled"
			);
		}

		#[tokio::test]
		async fn session_only_route_rejects_before_lookup() {
			let h = Harness::new();
			let token = h.api_key(&[ApiKeyScope::RepoAccess]);
			let route = RouteConfig::new().session_only();

			let header = format!("ApiKey {}", token.expose());
			let rejection = rejected(h.run(&route, Some(&header)).await.0);
			assert_eq!(rejection.status, StatusCode::FORBIDDEN);
			assert_eq!(rejection.code(), Some("SESSION_ONLY_ROUTE"));
			assert!(h.api_keys.lookups().is_empty());
		}

		#[tokio::test]
		async fn refresh_token_requirement_only_binds_bearer() {
			let h = Harness::new();
			let token = h.api_key(&[]);
			let route = RouteConfig::new().require_refresh_token();

			let header = format!("ApiKey {}", token.expose());
			let (result, ctx) = h.run(&route, Some(&header)).await;
			assert!(result.is_ok());
			assert_eq!(ctx.principal().map(Principal::user_id), Some(h.noel.id));
			assert_eq!(h.api_keys.lookups().len(), 1);
		}

		#[tokio::test]
		async fn unknown_key() {
			let h = Harness::new();
			let header = format!("ApiKey {}", generate_api_key().expose());
			let rejection = rejected(h.run(&RouteConfig::new(), Some(&header)).await.0);
			assert_eq!(rejection.status, StatusCode::NOT_FOUND);
			assert_eq!(rejection.code(), Some("UNKNOWN_API_KEY"));
		}

		#[tokio::test]
		async fn store_outage_is_internal() {
			let h = Harness::new();
			h.api_keys.fail_with("connection refused");
			let header = format!("ApiKey {}", generate_api_key().expose());
			let rejection = rejected(h.run(&RouteConfig::new(), Some(&header)).await.0);
			assert_eq!(rejection.status, StatusCode::INTERNAL_SERVER_ERROR);
			assert_eq!(rejection.code(), Some("INTERNAL_SERVER_ERROR"));
		}
	}

	mod basic {
		use super::*;

		#[tokio::test]
		async fn correct_password_attaches_basic_principal() {
			let h = Harness::new();
			let header = basic("noel", "hunter2");
			let (result, ctx) = h.run(&RouteConfig::new(), Some(&header)).await;
			assert!(result.is_ok());
			assert_eq!(ctx.principal(), Some(&Principal::Basic { user_id: h.noel.id }));
		}

		#[tokio::test]
		async fn wrong_password() {
			let h = Harness::new();
			let rejection = rejected(h.run(&RouteConfig::new(), Some(&basic("noel", "nope"))).await.0);
			assert_eq!(rejection.status, StatusCode::UNAUTHORIZED);
			assert_eq!(rejection.code(), Some("INVALID_PASSWORD"));
		}

		#[tokio::test]
		async fn unknown_user_is_checked_before_password() {
			let h = Harness::new();
			let rejection =
				rejected(h.run(&RouteConfig::new(), Some(&basic("ghost", "hunter2"))).await.0);
			assert_eq!(rejection.status, StatusCode::NOT_FOUND);
			assert_eq!(rejection.code(), Some("UNKNOWN_USER"));
			assert_eq!(h.verifier.calls.load(Ordering::SeqCst), 0);
		}

		#[tokio::test]
		async fn payload_without_colon() {
			let h = Harness::new();
			let header = format!("Basic {}", STANDARD.encode("noel"));
			let rejection = rejected(h.run(&RouteConfig::new(), Some(&header)).await.0);
			assert_eq!(rejection.status, StatusCode::NOT_ACCEPTABLE);
			assert_eq!(rejection.code(), Some("INVALID_BASIC_AUTH_CREDENTIALS"));
		}

		#[tokio::test]
		async fn email_is_not_a_basic_username() {
			let h = Harness::new();
			let rejection = rejected(
				h.run(&RouteConfig::new(), Some(&basic("noel@example.com", "hunter2")))
					.await
					.0,
			);
			assert_eq!(rejection.code(), Some("UNKNOWN_USER"));
		}

		#[tokio::test]
		async fn disabled_basic_auth_is_an_unsupported_scheme() {
			let mut h = Harness::new();
			h.authorizer = h.authorizer.clone().with_basic_auth(false);
			let rejection = rejected(h.run(&RouteConfig::new(), Some(&basic("noel", "hunter2"))).await.0);
			assert_eq!(rejection.status, StatusCode::NOT_ACCEPTABLE);
			assert_eq!(rejection.code(), Some("INVALID_AUTHORIZATION_HEADER_PREFIX"));
		}

		#[tokio::test]
		async fn route_flags_do_not_restrict_basic() {
			let h = Harness::new();
			let header = basic("noel", "hunter2");
			for route in [
				RouteConfig::new().session_only(),
				RouteConfig::new().require_refresh_token(),
			] {
				let (result, ctx) = h.run(&route, Some(&header)).await;
				assert!(result.is_ok());
				assert_eq!(ctx.principal(), Some(&Principal::Basic { user_id: h.noel.id }));
			}
			assert_eq!(h.verifier.calls.load(Ordering::SeqCst), 2);
		}

		#[tokio::test]
		async fn refresh_route_needs_a_session() {
			let h = Harness::new();
			let route = RouteConfig::refresh_route(h.sessions.clone());
			let rejection = rejected(h.run(&route, Some(&basic("noel", "hunter2"))).await.0);
			assert_eq!(rejection.status, StatusCode::UNAUTHORIZED);
			assert_eq!(rejection.code(), Some("MISSING_SESSION"));
		}

		#[tokio::test]
		async fn user_store_outage_is_internal() {
			let h = Harness::new();
			h.users.fail_with("connection refused");
			let rejection = rejected(h.run(&RouteConfig::new(), Some(&basic("noel", "hunter2"))).await.0);
			assert_eq!(rejection.status, StatusCode::INTERNAL_SERVER_ERROR);
			assert_eq!(rejection.code(), Some("INTERNAL_SERVER_ERROR"));
			assert_eq!(h.verifier.calls.load(Ordering::SeqCst), 0);
		}
	}

	mod preconditions {
		use super::*;

		#[tokio::test]
		async fn run_after_authentication_with_user_attached() {
			let h = Harness::new();
			let route = RouteConfig::new().condition(precondition_fn("is-noel", |ctx| {
				Box::pin(async move {
					match ctx.user() {
						Some(user) if user.username == "noel" => Ok(PreconditionResult::Success),
						_ => Ok(PreconditionResult::failed(
							StatusCode::FORBIDDEN,
							"INVALID_PERMISSIONS",
							"not noel",
						)),
					}
				})
			}));

			assert!(h.run(&route, Some(&basic("noel", "hunter2"))).await.0.is_ok());
		}

		#[tokio::test]
		async fn not_run_when_authentication_fails() {
			let h = Harness::new();
			let calls = Arc::new(AtomicUsize::new(0));
			let seen = calls.clone();
			let route = RouteConfig::new().condition(precondition_fn("count", move |_ctx| {
				let seen = seen.clone();
				Box::pin(async move {
					seen.fetch_add(1, Ordering::SeqCst);
					Ok(PreconditionResult::Success)
				})
			}));

			assert!(h.run(&route, Some(&basic("noel", "wrong"))).await.0.is_err());
			assert_eq!(calls.load(Ordering::SeqCst), 0);
			assert!(h.sink.seen.lock().unwrap().is_empty());
		}

		#[tokio::test]
		async fn failure_is_emitted_verbatim() {
			let h = Harness::new();
			let route = RouteConfig::new().condition(precondition_fn("deny", |_ctx| {
				Box::pin(async move {
					Ok(PreconditionResult::failed(
						StatusCode::FORBIDDEN,
						"INVALID_PERMISSIONS",
						"cannot edit metadata",
					))
				})
			}));

			let rejection = rejected(h.run(&route, Some(&basic("noel", "hunter2"))).await.0);
			assert_eq!(rejection.status, StatusCode::FORBIDDEN);
			assert_eq!(
				rejection.body.errors,
				vec![ApiError::new("INVALID_PERMISSIONS", "cannot edit metadata")]
			);
		}
	}

	#[test]
	fn scope_key_rejects_unknown_scopes() {
		assert!(RouteConfig::new().scope_key("repo:create").is_ok());
		assert!(matches!(
			RouteConfig::new().scope_key("repo:explode"),
			Err(ScopeError::UnknownScope(_))
		));
	}
}
