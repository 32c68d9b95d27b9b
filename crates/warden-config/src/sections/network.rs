// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Peer addressing, naming rules and the endpoint handed to clients.

use std::net::Ipv4Addr;

use ipnet::Ipv4Net;
use serde::Deserialize;

pub const DEFAULT_NAME_PATTERN: &str = "a-zA-Z0-9_";
pub const DEFAULT_ENDPOINT_PORT: u16 = 51820;
pub const DEFAULT_RESERVED_NAMES: [&str; 6] = [
	"server",
	"wg_confs",
	"wg_confs_backup",
	"templates",
	"coredns",
	"logs",
];

fn default_subnet() -> Ipv4Net {
	let network = Ipv4Addr::new(10, 0, 0, 0);
	Ipv4Net::new(network, 24).unwrap_or_else(|_| Ipv4Net::from(network))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
	pub subnet: Ipv4Net,
	/// Public host clients connect to. Client configs cannot be rendered
	/// without it.
	pub endpoint_host: Option<String>,
	pub endpoint_port: u16,
	pub dns: Ipv4Addr,
	/// Character class (without brackets) a peer name must be drawn from.
	pub name_pattern: String,
	pub reserved_names: Vec<String>,
}

impl Default for NetworkConfig {
	fn default() -> Self {
		NetworkConfigLayer::default().finalize()
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NetworkConfigLayer {
	#[serde(default)]
	pub subnet: Option<Ipv4Net>,
	#[serde(default)]
	pub endpoint_host: Option<String>,
	#[serde(default)]
	pub endpoint_port: Option<u16>,
	#[serde(default)]
	pub dns: Option<Ipv4Addr>,
	#[serde(default)]
	pub name_pattern: Option<String>,
	#[serde(default)]
	pub reserved_names: Option<Vec<String>>,
}

impl NetworkConfigLayer {
	pub fn merge(&mut self, other: NetworkConfigLayer) {
		if other.subnet.is_some() {
			self.subnet = other.subnet;
		}
		if other.endpoint_host.is_some() {
			self.endpoint_host = other.endpoint_host;
		}
		if other.endpoint_port.is_some() {
			self.endpoint_port = other.endpoint_port;
		}
		if other.dns.is_some() {
			self.dns = other.dns;
		}
		if other.name_pattern.is_some() {
			self.name_pattern = other.name_pattern;
		}
		if other.reserved_names.is_some() {
			self.reserved_names = other.reserved_names;
		}
	}

	pub fn finalize(self) -> NetworkConfig {
		let subnet = self.subnet.unwrap_or_else(default_subnet);
		// The gateway itself sits on the first host of the subnet.
		let gateway = Ipv4Addr::from(u32::from(subnet.network()).saturating_add(1));

		NetworkConfig {
			subnet,
			endpoint_host: self.endpoint_host,
			endpoint_port: self.endpoint_port.unwrap_or(DEFAULT_ENDPOINT_PORT),
			dns: self.dns.unwrap_or(gateway),
			name_pattern: self
				.name_pattern
				.unwrap_or_else(|| DEFAULT_NAME_PATTERN.to_string()),
			reserved_names: self.reserved_names.unwrap_or_else(|| {
				DEFAULT_RESERVED_NAMES
					.iter()
					.map(|s| s.to_string())
					.collect()
			}),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_values() {
		let config = NetworkConfig::default();
		assert_eq!(config.subnet.to_string(), "10.0.0.0/24");
		assert_eq!(config.dns, Ipv4Addr::new(10, 0, 0, 1));
		assert_eq!(config.endpoint_port, 51820);
		assert_eq!(config.endpoint_host, None);
		assert!(config.reserved_names.iter().any(|n| n == "wg_confs_backup"));
	}

	#[test]
	fn test_dns_follows_subnet() {
		let layer = NetworkConfigLayer {
			subnet: Some("172.16.8.0/24".parse().unwrap()),
			..Default::default()
		};
		assert_eq!(layer.finalize().dns, Ipv4Addr::new(172, 16, 8, 1));
	}

	#[test]
	fn test_parses_from_toml() {
		let layer: NetworkConfigLayer = toml::from_str(
			r#"
			subnet = "10.9.0.0/24"
			endpoint_host = "vpn.example.net"
			reserved_names = ["server"]
			"#,
		)
		.unwrap();
		let config = layer.finalize();
		assert_eq!(config.subnet.to_string(), "10.9.0.0/24");
		assert_eq!(config.endpoint_host.as_deref(), Some("vpn.example.net"));
		assert_eq!(config.reserved_names, ["server"]);
	}
}
