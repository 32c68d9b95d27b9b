// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use ipnet::Ipv4Net;
use warden_db::DbError;
use warden_stats::StatsError;
use warden_wgconf::WgConfError;
use warden_wgctl::WgCtlError;

#[derive(Debug, thiserror::Error)]
pub enum PeerError {
	#[error("invalid peer name: {0}")]
	Validation(String),

	#[error("not found: {0}")]
	NotFound(String),

	#[error("peer already exists: {0}")]
	AlreadyExists(String),

	#[error("external tool failed: {0}")]
	ExternalTool(#[from] WgCtlError),

	#[error("no free address left in {0}")]
	ExhaustedRange(Ipv4Net),

	#[error("inconsistent state: {0}")]
	InconsistentState(String),

	#[error("configuration incomplete: {0}")]
	Incomplete(String),

	#[error("config file error: {0}")]
	File(#[source] WgConfError),

	#[error("registry error: {0}")]
	Registry(#[from] DbError),

	#[error("ledger error: {0}")]
	Ledger(#[from] StatsError),
}

impl From<WgConfError> for PeerError {
	fn from(err: WgConfError) -> Self {
		match err {
			WgConfError::PeerNotFound(name) => PeerError::NotFound(format!("peer {name} in config")),
			WgConfError::PeerExists(name) => PeerError::AlreadyExists(name),
			WgConfError::RuleBlockNotFound(block) => PeerError::NotFound(format!("{block} rule block")),
			WgConfError::ExhaustedRange(subnet) => PeerError::ExhaustedRange(subnet),
			WgConfError::InconsistentState { name, detail } => {
				PeerError::InconsistentState(format!("{name}: {detail}"))
			}
			other => PeerError::File(other),
		}
	}
}

pub type Result<T> = std::result::Result<T, PeerError>;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn config_errors_map_onto_taxonomy() {
		assert!(matches!(
			PeerError::from(WgConfError::PeerNotFound("bob".into())),
			PeerError::NotFound(msg) if msg.contains("bob")
		));
		assert!(matches!(
			PeerError::from(WgConfError::RuleBlockNotFound("baseline")),
			PeerError::NotFound(msg) if msg == "baseline rule block"
		));
		assert!(matches!(
			PeerError::from(WgConfError::PeerExists("alice".into())),
			PeerError::AlreadyExists(_)
		));
		assert!(matches!(
			PeerError::from(WgConfError::BackupMissing("/tmp/wg0.conf.bak".into())),
			PeerError::File(_)
		));
	}
}
