// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Composition root for the charted authentication core: configuration,
//! tracing, SQLite and the background session sweeper.

pub mod error;
pub mod logging;
pub mod state;

pub use error::ServerError;
pub use logging::init_tracing;
pub use state::{
	build_auth_state, create_auth_state, session_settings, spawn_background_tasks, AuthState,
};
