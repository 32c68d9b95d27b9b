// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::PathBuf;

use ipnet::Ipv4Net;

#[derive(Debug, thiserror::Error)]
pub enum WgConfError {
	#[error("peer not found in config: {0}")]
	PeerNotFound(String),

	#[error("peer already present in config: {0}")]
	PeerExists(String),

	#[error("{0} rule block not found")]
	RuleBlockNotFound(&'static str),

	#[error("no free host address left in {0}")]
	ExhaustedRange(Ipv4Net),

	#[error("inconsistent block for peer {name}: {detail}")]
	InconsistentState { name: String, detail: String },

	#[error("subnet {0} is not usable for peer addresses (prefix must be /24 or shorter)")]
	InvalidSubnet(Ipv4Net),

	#[error("no backup found at {0}")]
	BackupMissing(PathBuf),

	#[error("failed to {action} {path}: {source}")]
	Io {
		action: &'static str,
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("write to {path} failed and restoring the backup also failed: {source}")]
	RestoreFailed {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},
}

pub type Result<T> = std::result::Result<T, WgConfError>;
