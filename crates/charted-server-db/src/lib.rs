// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! # charted-server-db
//!
//! SQLite persistence for the authentication core, via sqlx.
//!
//! Each repository holds a `SqlitePool`, exposes `#[tracing::instrument]`ed
//! inherent methods returning [`DbError`], and implements the matching
//! collaborator trait from `charted-server-auth`:
//!
//! | Repository | Implements |
//! |------------|------------|
//! | [`UserRepository`] | `UserLookup` |
//! | [`ApiKeyRepository`] | `ApiKeyLookup` |
//! | [`SqliteSessionBackend`] | `SessionBackend` |
//!
//! [`DbError`] converts into the core's `StoreError`: corrupt rows become
//! `StoreError::Corrupt`, everything else `StoreError::Unavailable`. Either
//! way the request fails with a 500 rather than an authentication error.
//!
//! ## Testing
//!
//! Tests run against a single-connection in-memory database with the
//! migrations applied (`testing::create_test_pool`).

pub mod api_key;
mod error;
pub mod pool;
mod rows;
pub mod session;
pub mod user;

#[cfg(test)]
pub mod testing;

pub use api_key::ApiKeyRepository;
pub use error::{DbError, Result};
pub use pool::{create_pool, run_migrations};
pub use session::SqliteSessionBackend;
pub use user::UserRepository;
