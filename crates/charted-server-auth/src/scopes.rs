// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Scope registry and 64-bit scope bitfields.
//!
//! A [`ScopeRegistry`] maps human-readable scope keys such as `repo:create`
//! to bit positions. It is built once, then shared read-only behind an
//! [`Arc`]. A [`ScopeBitfield`] packs enabled scopes into a `u64` and keeps
//! a handle to the registry it was built against, so every operation on an
//! unknown key is a checked [`ScopeError`] instead of a silent no-op.
//!
//! The API key scopes live in the process-wide registry returned by
//! [`api_key_scopes`], populated from [`ApiKeyScope::ALL`].

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use serde::{Serialize, Serializer};

/// Upper bound on registered scopes; one per bit of a `u64`.
pub const MAX_SCOPES: usize = 64;

/// Requesting exactly this key enables every registered scope.
pub const WILDCARD: &str = "*";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScopeError {
	#[error("scope registry already holds {MAX_SCOPES} scopes")]
	RegistryFull,

	#[error("scope '{0}' is already registered")]
	DuplicateKey(String),

	#[error("unknown scope '{0}'")]
	UnknownScope(String),

	#[error("bits {0:#x} do not map to any registered scope")]
	UnknownBits(u64),
}

/// Collects scope keys before freezing them into a [`ScopeRegistry`].
#[derive(Debug, Default)]
pub struct ScopeRegistryBuilder {
	keys: Vec<String>,
	positions: HashMap<String, u8>,
}

impl ScopeRegistryBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	/// Assigns the next free bit to `key` and returns its position.
	pub fn register(&mut self, key: impl Into<String>) -> Result<u8, ScopeError> {
		let key = key.into();
		if self.positions.contains_key(&key) {
			return Err(ScopeError::DuplicateKey(key));
		}
		if self.keys.len() >= MAX_SCOPES {
			return Err(ScopeError::RegistryFull);
		}

		let position = self.keys.len() as u8;
		self.positions.insert(key.clone(), position);
		self.keys.push(key);
		Ok(position)
	}

	pub fn build(self) -> ScopeRegistry {
		let mask = match self.keys.len() {
			MAX_SCOPES => u64::MAX,
			n => (1u64 << n) - 1,
		};

		ScopeRegistry {
			keys: self.keys,
			positions: self.positions,
			mask,
		}
	}
}

/// Immutable key to bit-position mapping.
#[derive(Debug)]
pub struct ScopeRegistry {
	keys: Vec<String>,
	positions: HashMap<String, u8>,
	mask: u64,
}

impl ScopeRegistry {
	pub fn builder() -> ScopeRegistryBuilder {
		ScopeRegistryBuilder::new()
	}

	/// Registers every key in order.
	pub fn from_keys<I, S>(keys: I) -> Result<Self, ScopeError>
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let mut builder = Self::builder();
		for key in keys {
			builder.register(key)?;
		}
		Ok(builder.build())
	}

	pub fn position(&self, key: &str) -> Option<u8> {
		self.positions.get(key).copied()
	}

	/// The single-bit mask for `key`.
	pub fn bit(&self, key: &str) -> Option<u64> {
		self.position(key).map(|p| 1u64 << p)
	}

	pub fn key_at(&self, position: u8) -> Option<&str> {
		self.keys.get(position as usize).map(String::as_str)
	}

	/// Keys in registration order.
	pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
		self.keys.iter().map(String::as_str)
	}

	/// Every registered bit set.
	pub fn mask(&self) -> u64 {
		self.mask
	}

	pub fn len(&self) -> usize {
		self.keys.len()
	}

	pub fn is_empty(&self) -> bool {
		self.keys.is_empty()
	}
}

/// A set of enabled scopes packed into a `u64`.
#[derive(Clone)]
pub struct ScopeBitfield {
	bits: u64,
	registry: Arc<ScopeRegistry>,
}

impl ScopeBitfield {
	pub fn empty(registry: Arc<ScopeRegistry>) -> Self {
		Self { bits: 0, registry }
	}

	/// Rebuilds a bitfield from its stored integer form.
	pub fn from_bits(registry: Arc<ScopeRegistry>, bits: u64) -> Result<Self, ScopeError> {
		let unknown = bits & !registry.mask();
		if unknown != 0 {
			return Err(ScopeError::UnknownBits(unknown));
		}
		Ok(Self { bits, registry })
	}

	/// Bitfield over the API key registry holding exactly `scopes`.
	pub fn api_key<I>(scopes: I) -> Self
	where
		I: IntoIterator<Item = ApiKeyScope>,
	{
		let bits = scopes.into_iter().fold(0u64, |acc, s| acc | s.bit());
		Self {
			bits,
			registry: api_key_scopes().clone(),
		}
	}

	pub fn bits(&self) -> u64 {
		self.bits
	}

	pub fn registry(&self) -> &Arc<ScopeRegistry> {
		&self.registry
	}

	pub fn add(&mut self, key: &str) -> Result<&mut Self, ScopeError> {
		let bit = self.lookup(key)?;
		self.bits |= bit;
		Ok(self)
	}

	/// Sets `bits`, dropping any the registry does not know.
	pub fn insert_bits(&mut self, bits: u64) -> &mut Self {
		self.bits |= bits & self.registry.mask();
		self
	}

	pub fn add_all(&mut self) -> &mut Self {
		self.bits = self.registry.mask();
		self
	}

	pub fn remove(&mut self, key: &str) -> Result<&mut Self, ScopeError> {
		let bit = self.lookup(key)?;
		self.bits &= !bit;
		Ok(self)
	}

	/// Adds a user-supplied scope list. A list consisting solely of `"*"`
	/// enables every registered scope.
	pub fn add_requested<S: AsRef<str>>(&mut self, requested: &[S]) -> Result<&mut Self, ScopeError> {
		if let [only] = requested {
			if only.as_ref() == WILDCARD {
				return Ok(self.add_all());
			}
		}

		for key in requested {
			self.add(key.as_ref())?;
		}
		Ok(self)
	}

	/// Unknown keys are never enabled.
	pub fn has(&self, key: &str) -> bool {
		self.registry
			.bit(key)
			.is_some_and(|bit| self.bits & bit != 0)
	}

	/// True when every bit of `bit` is set. A zero mask is never held.
	pub fn has_bit(&self, bit: u64) -> bool {
		bit != 0 && self.bits & bit == bit
	}

	pub fn is_empty(&self) -> bool {
		self.bits == 0
	}

	/// Enabled keys in registration order, computed lazily.
	pub fn enabled_keys(&self) -> impl Iterator<Item = &str> + '_ {
		let bits = self.bits;
		self.registry
			.keys()
			.enumerate()
			.filter(move |(position, _)| bits & (1u64 << position) != 0)
			.map(|(_, key)| key)
	}

	/// The first key of `required` (registration order) that `self` lacks.
	pub fn first_missing<'a>(&self, required: &'a ScopeBitfield) -> Option<&'a str> {
		required.enabled_keys().find(|key| !self.has(key))
	}

	fn lookup(&self, key: &str) -> Result<u64, ScopeError> {
		self.registry
			.bit(key)
			.ok_or_else(|| ScopeError::UnknownScope(key.to_string()))
	}
}

impl PartialEq for ScopeBitfield {
	fn eq(&self, other: &Self) -> bool {
		self.bits == other.bits && Arc::ptr_eq(&self.registry, &other.registry)
	}
}

impl Eq for ScopeBitfield {}

impl fmt::Debug for ScopeBitfield {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ScopeBitfield")
			.field("bits", &format_args!("{:#x}", self.bits))
			.field("scopes", &self.enabled_keys().collect::<Vec<_>>())
			.finish()
	}
}

impl Serialize for ScopeBitfield {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_u64(self.bits)
	}
}

/// Scopes an API key can be granted. Declaration order is registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ApiKeyScope {
	UserAccess,
	UserUpdate,
	UserDelete,
	UserConnections,
	UserNotifications,
	UserAvatarUpdate,
	UserSessionsList,
	RepoAccess,
	RepoCreate,
	RepoUpdate,
	RepoDelete,
	RepoWrite,
	RepoIconsUpdate,
	RepoReleasesCreate,
	RepoReleasesDelete,
	RepoReleasesUpdate,
	RepoMembersList,
	RepoMembersKick,
	RepoMembersUpdate,
	RepoMembersInvitesAccess,
	RepoMembersInvitesCreate,
	RepoMembersInvitesDelete,
	RepoWebhooksList,
	RepoWebhooksCreate,
	RepoWebhooksUpdate,
	RepoWebhooksDelete,
	RepoWebhooksEventsAccess,
	RepoWebhooksEventsDelete,
	ApiKeysView,
	ApiKeysCreate,
	ApiKeysUpdate,
	ApiKeysDelete,
	OrgAccess,
	OrgCreate,
	OrgUpdate,
	OrgDelete,
	OrgMembersList,
	OrgMembersKick,
	OrgMembersUpdate,
	OrgMembersInvites,
	OrgWebhooksList,
	OrgWebhooksCreate,
	OrgWebhooksUpdate,
	OrgWebhooksDelete,
	OrgWebhooksEventsList,
	OrgWebhooksEventsDelete,
	AdminStats,
}

const _: () = assert!(ApiKeyScope::ALL.len() <= MAX_SCOPES);

impl ApiKeyScope {
	pub const ALL: &'static [ApiKeyScope] = &[
		ApiKeyScope::UserAccess,
		ApiKeyScope::UserUpdate,
		ApiKeyScope::UserDelete,
		ApiKeyScope::UserConnections,
		ApiKeyScope::UserNotifications,
		ApiKeyScope::UserAvatarUpdate,
		ApiKeyScope::UserSessionsList,
		ApiKeyScope::RepoAccess,
		ApiKeyScope::RepoCreate,
		ApiKeyScope::RepoUpdate,
		ApiKeyScope::RepoDelete,
		ApiKeyScope::RepoWrite,
		ApiKeyScope::RepoIconsUpdate,
		ApiKeyScope::RepoReleasesCreate,
		ApiKeyScope::RepoReleasesDelete,
		ApiKeyScope::RepoReleasesUpdate,
		ApiKeyScope::RepoMembersList,
		ApiKeyScope::RepoMembersKick,
		ApiKeyScope::RepoMembersUpdate,
		ApiKeyScope::RepoMembersInvitesAccess,
		ApiKeyScope::RepoMembersInvitesCreate,
		ApiKeyScope::RepoMembersInvitesDelete,
		ApiKeyScope::RepoWebhooksList,
		ApiKeyScope::RepoWebhooksCreate,
		ApiKeyScope::RepoWebhooksUpdate,
		ApiKeyScope::RepoWebhooksDelete,
		ApiKeyScope::RepoWebhooksEventsAccess,
		ApiKeyScope::RepoWebhooksEventsDelete,
		ApiKeyScope::ApiKeysView,
		ApiKeyScope::ApiKeysCreate,
		ApiKeyScope::ApiKeysUpdate,
		ApiKeyScope::ApiKeysDelete,
		ApiKeyScope::OrgAccess,
		ApiKeyScope::OrgCreate,
		ApiKeyScope::OrgUpdate,
		ApiKeyScope::OrgDelete,
		ApiKeyScope::OrgMembersList,
		ApiKeyScope::OrgMembersKick,
		ApiKeyScope::OrgMembersUpdate,
		ApiKeyScope::OrgMembersInvites,
		ApiKeyScope::OrgWebhooksList,
		ApiKeyScope::OrgWebhooksCreate,
		ApiKeyScope::OrgWebhooksUpdate,
		ApiKeyScope::OrgWebhooksDelete,
		ApiKeyScope::OrgWebhooksEventsList,
		ApiKeyScope::OrgWebhooksEventsDelete,
		ApiKeyScope::AdminStats,
	];

	pub fn key(self) -> &'static str {
		match self {
			ApiKeyScope::UserAccess => "user:access",
			ApiKeyScope::UserUpdate => "user:update",
			ApiKeyScope::UserDelete => "user:delete",
			ApiKeyScope::UserConnections => "user:connections",
			ApiKeyScope::UserNotifications => "user:notifications",
			ApiKeyScope::UserAvatarUpdate => "user:avatar:update",
			ApiKeyScope::UserSessionsList => "user:sessions:list",
			ApiKeyScope::RepoAccess => "repo:access",
			ApiKeyScope::RepoCreate => "repo:create",
			ApiKeyScope::RepoUpdate => "repo:update",
			ApiKeyScope::RepoDelete => "repo:delete",
			ApiKeyScope::RepoWrite => "repo:write",
			ApiKeyScope::RepoIconsUpdate => "repo:icons:update",
			ApiKeyScope::RepoReleasesCreate => "repo:releases:create",
			ApiKeyScope::RepoReleasesDelete => "repo:releases:delete",
			ApiKeyScope::RepoReleasesUpdate => "repo:releases:update",
			ApiKeyScope::RepoMembersList => "repo:members:list",
			ApiKeyScope::RepoMembersKick => "repo:members:kick",
			ApiKeyScope::RepoMembersUpdate => "repo:members:update",
			ApiKeyScope::RepoMembersInvitesAccess => "repo:members:invites:access",
			ApiKeyScope::RepoMembersInvitesCreate => "repo:members:invites:create",
			ApiKeyScope::RepoMembersInvitesDelete => "repo:members:invites:delete",
			ApiKeyScope::RepoWebhooksList => "repo:webhooks:list",
			ApiKeyScope::RepoWebhooksCreate => "repo:webhooks:create",
			ApiKeyScope::RepoWebhooksUpdate => "repo:webhooks:update",
			ApiKeyScope::RepoWebhooksDelete => "repo:webhooks:delete",
			ApiKeyScope::RepoWebhooksEventsAccess => "repo:webhooks:events:access",
			ApiKeyScope::RepoWebhooksEventsDelete => "repo:webhooks:events:delete",
			ApiKeyScope::ApiKeysView => "apikeys:view",
			ApiKeyScope::ApiKeysCreate => "apikeys:create",
			ApiKeyScope::ApiKeysUpdate => "apikeys:update",
			ApiKeyScope::ApiKeysDelete => "apikeys:delete",
			ApiKeyScope::OrgAccess => "org:access",
			ApiKeyScope::OrgCreate => "org:create",
			ApiKeyScope::OrgUpdate => "org:update",
			ApiKeyScope::OrgDelete => "org:delete",
			ApiKeyScope::OrgMembersList => "org:members:list",
			ApiKeyScope::OrgMembersKick => "org:members:kick",
			ApiKeyScope::OrgMembersUpdate => "org:members:update",
			ApiKeyScope::OrgMembersInvites => "org:members:invites",
			ApiKeyScope::OrgWebhooksList => "org:webhooks:list",
			ApiKeyScope::OrgWebhooksCreate => "org:webhooks:create",
			ApiKeyScope::OrgWebhooksUpdate => "org:webhooks:update",
			ApiKeyScope::OrgWebhooksDelete => "org:webhooks:delete",
			ApiKeyScope::OrgWebhooksEventsList => "org:webhooks:events:list",
			ApiKeyScope::OrgWebhooksEventsDelete => "org:webhooks:events:delete",
			ApiKeyScope::AdminStats => "admin:stats",
		}
	}

	/// Mask of this scope in [`api_key_scopes`].
	pub fn bit(self) -> u64 {
		1u64 << (self as u8)
	}
}

impl fmt::Display for ApiKeyScope {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.key())
	}
}

impl FromStr for ApiKeyScope {
	type Err = ScopeError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::ALL
			.iter()
			.copied()
			.find(|scope| scope.key() == s)
			.ok_or_else(|| ScopeError::UnknownScope(s.to_string()))
	}
}

/// The process-wide API key scope registry.
pub fn api_key_scopes() -> &'static Arc<ScopeRegistry> {
	static REGISTRY: OnceLock<Arc<ScopeRegistry>> = OnceLock::new();
	REGISTRY.get_or_init(|| {
		let mut builder = ScopeRegistry::builder();
		for scope in ApiKeyScope::ALL {
			if let Err(e) = builder.register(scope.key()) {
				tracing::error!(scope = %scope, error = %e, "failed to register api key scope");
			}
		}
		Arc::new(builder.build())
	})
}
