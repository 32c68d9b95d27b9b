// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! How the tunnel daemon and its tools are invoked.

use std::time::Duration;

use serde::Deserialize;

const DEFAULT_WG_BINARY: &str = "wg";
const DEFAULT_INTERFACE: &str = "wg0";
const DEFAULT_MAX_CONCURRENT: usize = 4;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

fn default_restart_command() -> Vec<String> {
	vec![
		"systemctl".to_string(),
		"restart".to_string(),
		"wg-quick@wg0".to_string(),
	]
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonConfig {
	/// Prepended to every `wg` invocation, e.g. `docker exec wireguard`.
	pub exec_prefix: Vec<String>,
	pub wg_binary: String,
	pub interface: String,
	/// Run on the host as-is, without the exec prefix.
	pub restart_command: Vec<String>,
	pub max_concurrent: usize,
	pub timeout_secs: u64,
}

impl DaemonConfig {
	pub fn timeout(&self) -> Duration {
		Duration::from_secs(self.timeout_secs)
	}
}

impl Default for DaemonConfig {
	fn default() -> Self {
		DaemonConfigLayer::default().finalize()
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DaemonConfigLayer {
	#[serde(default)]
	pub exec_prefix: Option<Vec<String>>,
	#[serde(default)]
	pub wg_binary: Option<String>,
	#[serde(default)]
	pub interface: Option<String>,
	#[serde(default)]
	pub restart_command: Option<Vec<String>>,
	#[serde(default)]
	pub max_concurrent: Option<usize>,
	#[serde(default)]
	pub timeout_secs: Option<u64>,
}

impl DaemonConfigLayer {
	pub fn merge(&mut self, other: DaemonConfigLayer) {
		if other.exec_prefix.is_some() {
			self.exec_prefix = other.exec_prefix;
		}
		if other.wg_binary.is_some() {
			self.wg_binary = other.wg_binary;
		}
		if other.interface.is_some() {
			self.interface = other.interface;
		}
		if other.restart_command.is_some() {
			self.restart_command = other.restart_command;
		}
		if other.max_concurrent.is_some() {
			self.max_concurrent = other.max_concurrent;
		}
		if other.timeout_secs.is_some() {
			self.timeout_secs = other.timeout_secs;
		}
	}

	pub fn finalize(self) -> DaemonConfig {
		DaemonConfig {
			exec_prefix: self.exec_prefix.unwrap_or_default(),
			wg_binary: self
				.wg_binary
				.unwrap_or_else(|| DEFAULT_WG_BINARY.to_string()),
			interface: self
				.interface
				.unwrap_or_else(|| DEFAULT_INTERFACE.to_string()),
			restart_command: self
				.restart_command
				.unwrap_or_else(default_restart_command),
			max_concurrent: self.max_concurrent.unwrap_or(DEFAULT_MAX_CONCURRENT),
			timeout_secs: self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_values() {
		let config = DaemonConfig::default();
		assert!(config.exec_prefix.is_empty());
		assert_eq!(config.wg_binary, "wg");
		assert_eq!(config.interface, "wg0");
		assert_eq!(config.restart_command, ["systemctl", "restart", "wg-quick@wg0"]);
		assert_eq!(config.max_concurrent, 4);
		assert_eq!(config.timeout(), Duration::from_secs(30));
	}

	#[test]
	fn test_merge_overwrites() {
		let mut base = DaemonConfigLayer {
			interface: Some("wg0".to_string()),
			timeout_secs: Some(10),
			..Default::default()
		};
		base.merge(DaemonConfigLayer {
			interface: Some("wg1".to_string()),
			exec_prefix: Some(vec!["docker".into(), "exec".into(), "wireguard".into()]),
			..Default::default()
		});

		let config = base.finalize();
		assert_eq!(config.interface, "wg1");
		assert_eq!(config.timeout_secs, 10);
		assert_eq!(config.exec_prefix, ["docker", "exec", "wireguard"]);
	}
}
