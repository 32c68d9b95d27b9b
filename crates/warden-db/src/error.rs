// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

/// Failures from the peer registry.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
	#[error("registry query failed: {0}")]
	Sqlx(#[from] sqlx::Error),

	/// No record for the named peer.
	#[error("peer record not found: {0}")]
	NotFound(String),

	/// A record with the same name or public key already exists.
	#[error("peer record conflict: {0}")]
	Conflict(String),

	#[error("registry error: {0}")]
	Internal(String),

	/// A stored stats snapshot could not be encoded or decoded.
	#[error("stats snapshot is not valid JSON: {0}")]
	Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DbError>;
