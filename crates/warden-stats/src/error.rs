// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum StatsError {
	#[error("failed to access ledger {path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("ledger {path} is not valid JSON: {source}")]
	Corrupt {
		path: PathBuf,
		#[source]
		source: serde_json::Error,
	},

	#[error("Serialization error: {0}")]
	Serialization(#[from] serde_json::Error),

	#[error("invalid value: {0}")]
	InvalidValue(String),
}

pub type Result<T> = std::result::Result<T, StatsError>;
