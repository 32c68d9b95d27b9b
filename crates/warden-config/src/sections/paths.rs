// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! File locations.

use std::path::PathBuf;

use serde::Deserialize;

const DEFAULT_WG_CONFIG: &str = "/etc/wireguard/wg0.conf";
const DEFAULT_BACKUP_DIR: &str = "/etc/wireguard/wg_confs_backup";
const DEFAULT_LEDGER: &str = "/var/lib/warden/stats.json";
const DEFAULT_DATABASE_URL: &str = "sqlite:/var/lib/warden/warden.db";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathsConfig {
	/// The daemon's configuration file.
	pub wg_config: PathBuf,
	/// Where a copy of the config is kept after every structural change.
	pub backup_dir: PathBuf,
	/// JSON traffic ledger.
	pub ledger: PathBuf,
	pub database_url: String,
}

impl Default for PathsConfig {
	fn default() -> Self {
		PathsConfigLayer::default().finalize()
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfigLayer {
	#[serde(default)]
	pub wg_config: Option<PathBuf>,
	#[serde(default)]
	pub backup_dir: Option<PathBuf>,
	#[serde(default)]
	pub ledger: Option<PathBuf>,
	#[serde(default)]
	pub database_url: Option<String>,
}

impl PathsConfigLayer {
	pub fn merge(&mut self, other: PathsConfigLayer) {
		if other.wg_config.is_some() {
			self.wg_config = other.wg_config;
		}
		if other.backup_dir.is_some() {
			self.backup_dir = other.backup_dir;
		}
		if other.ledger.is_some() {
			self.ledger = other.ledger;
		}
		if other.database_url.is_some() {
			self.database_url = other.database_url;
		}
	}

	pub fn finalize(self) -> PathsConfig {
		PathsConfig {
			wg_config: self
				.wg_config
				.unwrap_or_else(|| PathBuf::from(DEFAULT_WG_CONFIG)),
			backup_dir: self
				.backup_dir
				.unwrap_or_else(|| PathBuf::from(DEFAULT_BACKUP_DIR)),
			ledger: self.ledger.unwrap_or_else(|| PathBuf::from(DEFAULT_LEDGER)),
			database_url: self
				.database_url
				.unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_values() {
		let config = PathsConfig::default();
		assert_eq!(config.wg_config, PathBuf::from("/etc/wireguard/wg0.conf"));
		assert_eq!(config.backup_dir, PathBuf::from("/etc/wireguard/wg_confs_backup"));
		assert_eq!(config.database_url, "sqlite:/var/lib/warden/warden.db");
	}

	#[test]
	fn test_merge_overwrites() {
		let mut base = PathsConfigLayer {
			wg_config: Some(PathBuf::from("/a.conf")),
			..Default::default()
		};
		base.merge(PathsConfigLayer {
			wg_config: Some(PathBuf::from("/b.conf")),
			..Default::default()
		});
		assert_eq!(base.finalize().wg_config, PathBuf::from("/b.conf"));
	}
}
