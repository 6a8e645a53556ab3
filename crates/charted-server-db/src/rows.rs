// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Column decoding shared by the repositories.

use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};

use crate::error::DbError;

pub(crate) fn parse_id<T: FromStr>(value: &str, column: &str) -> Result<T, DbError>
where
	T::Err: std::fmt::Display,
{
	value
		.parse()
		.map_err(|e| DbError::Internal(format!("Invalid {column} UUID: {e}")))
}

pub(crate) fn parse_rfc3339(value: &str, column: &str) -> Result<DateTime<Utc>, DbError> {
	DateTime::parse_from_rfc3339(value)
		.map(|dt| dt.with_timezone(&Utc))
		.map_err(|e| DbError::Internal(format!("Invalid {column}: {e}")))
}

pub(crate) fn from_unix(seconds: i64, column: &str) -> Result<DateTime<Utc>, DbError> {
	Utc.timestamp_opt(seconds, 0)
		.single()
		.ok_or_else(|| DbError::Internal(format!("Invalid {column}: {seconds} is out of range")))
}
