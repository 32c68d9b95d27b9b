// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::BTreeSet;
use std::net::Ipv4Addr;

use ipnet::Ipv4Net;
use tracing::debug;

use crate::document::ConfigDocument;
use crate::error::{Result, WgConfError};
use crate::peer_block::split_directive;

pub const FIRST_HOST: u8 = 2;
pub const LAST_HOST: u8 = 254;

/// Picks host addresses from the first /24 of the configured subnet.
///
/// There is no reservation table: an address is taken exactly when some
/// `AllowedIPs` line in the file (active or commented out) names it. Callers
/// must serialize allocation with the insert that consumes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpAllocator {
	subnet: Ipv4Net,
}

impl IpAllocator {
	pub fn new(subnet: Ipv4Net) -> Result<Self> {
		if subnet.prefix_len() > 24 {
			return Err(WgConfError::InvalidSubnet(subnet));
		}
		Ok(Self {
			subnet: subnet.trunc(),
		})
	}

	pub fn subnet(&self) -> Ipv4Net {
		self.subnet
	}

	fn host(&self, octet: u8) -> Ipv4Addr {
		let [a, b, c, _] = self.subnet.network().octets();
		Ipv4Addr::new(a, b, c, octet)
	}

	fn host_octet(&self, addr: Ipv4Addr) -> Option<u8> {
		let [a, b, c, d] = addr.octets();
		(self.host(0) == Ipv4Addr::new(a, b, c, 0)).then_some(d)
	}

	/// Host octets already assigned in `doc`.
	pub fn taken(&self, doc: &ConfigDocument) -> BTreeSet<u8> {
		doc.lines()
			.filter_map(split_directive)
			.filter(|(key, _)| *key == "AllowedIPs")
			.flat_map(|(_, value)| value.split(','))
			.filter_map(|entry| entry.trim().split('/').next()?.parse::<Ipv4Addr>().ok())
			.filter_map(|addr| self.host_octet(addr))
			.collect()
	}

	/// Lowest free host address as a `/32`.
	pub fn next_available(&self, doc: &ConfigDocument) -> Result<Ipv4Net> {
		let taken = self.taken(doc);
		let octet = (FIRST_HOST..=LAST_HOST)
			.find(|octet| !taken.contains(octet))
			.ok_or(WgConfError::ExhaustedRange(self.subnet))?;

		let address = Ipv4Net::from(self.host(octet));
		debug!(%address, taken = taken.len(), "allocated peer address");
		Ok(address)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::peer_block::PeerBlock;
	use proptest::prelude::*;

	fn allocator() -> IpAllocator {
		IpAllocator::new("10.0.0.0/24".parse().unwrap()).unwrap()
	}

	fn doc_with_hosts(hosts: &[u8]) -> ConfigDocument {
		let mut doc = ConfigDocument::parse("[Interface]\nAddress = 10.0.0.1/24\n\n");
		for host in hosts {
			doc.insert_peer(PeerBlock::new(
				&format!("peer{host}"),
				"pk",
				"psk",
				&format!("10.0.0.{host}/32"),
			))
			.unwrap();
		}
		doc
	}

	#[test]
	fn first_address_in_empty_file() {
		let doc = ConfigDocument::parse("[Interface]\nAddress = 10.0.0.1/24\n");
		assert_eq!(
			allocator().next_available(&doc).unwrap(),
			"10.0.0.2/32".parse::<Ipv4Net>().unwrap()
		);
	}

	/// Test: after inserting alice at .5 the next address is still .2.
	///
	/// Why this test is important: allocation fills the lowest gap rather than
	/// continuing after the highest address, so freed addresses get reused.
	#[test]
	fn fills_lowest_gap() {
		let doc = doc_with_hosts(&[5]);
		assert_eq!(doc.summaries()[0].allowed_ips, "10.0.0.5/32");
		assert_eq!(
			allocator().next_available(&doc).unwrap().to_string(),
			"10.0.0.2/32"
		);

		let doc = doc_with_hosts(&[2, 3, 5]);
		assert_eq!(
			allocator().next_available(&doc).unwrap().to_string(),
			"10.0.0.4/32"
		);
	}

	#[test]
	fn suspended_peers_keep_their_address() {
		let text = "#[Peer]\n## bob\n#PublicKey = a\n#PresharedKey = b\n#AllowedIPs = 10.0.0.2/32\n\n";
		let doc = ConfigDocument::parse(text);
		assert_eq!(
			allocator().next_available(&doc).unwrap().to_string(),
			"10.0.0.3/32"
		);
	}

	#[test]
	fn ignores_addresses_outside_the_subnet() {
		let text = "[Peer]\nPublicKey = x\nAllowedIPs = 192.168.1.2/32, 10.0.0.2/32\n";
		let taken = allocator().taken(&ConfigDocument::parse(text));
		assert_eq!(taken.into_iter().collect::<Vec<_>>(), [2]);
	}

	#[test]
	fn exhausted_range() {
		let hosts: Vec<u8> = (FIRST_HOST..=LAST_HOST).collect();
		assert_eq!(hosts.len(), 253);
		let doc = doc_with_hosts(&hosts);

		assert!(matches!(
			allocator().next_available(&doc),
			Err(WgConfError::ExhaustedRange(_))
		));
	}

	#[test]
	fn rejects_narrow_subnets() {
		let narrow: Ipv4Net = "10.0.0.0/28".parse().unwrap();
		assert!(matches!(
			IpAllocator::new(narrow),
			Err(WgConfError::InvalidSubnet(_))
		));
	}

	#[test]
	fn wider_subnets_use_their_first_block() {
		let alloc = IpAllocator::new("10.8.3.7/16".parse().unwrap()).unwrap();
		assert_eq!(alloc.subnet().to_string(), "10.8.0.0/16");
		let doc = ConfigDocument::parse("");
		assert_eq!(alloc.next_available(&doc).unwrap().to_string(), "10.8.0.2/32");
	}

	proptest! {
		/// The allocated address is never one that is already assigned.
		#[test]
		fn prop_never_returns_taken_address(
			hosts in prop::collection::btree_set(FIRST_HOST..=LAST_HOST, 0..253)
		) {
			let hosts: Vec<u8> = hosts.into_iter().collect();
			let doc = doc_with_hosts(&hosts);
			let alloc = allocator();

			match alloc.next_available(&doc) {
				Ok(address) => {
					let octet = address.addr().octets()[3];
					prop_assert!(!hosts.contains(&octet));
					prop_assert!((FIRST_HOST..=LAST_HOST).contains(&octet));
					prop_assert!((FIRST_HOST..octet).all(|o| hosts.contains(&o)));
				}
				Err(WgConfError::ExhaustedRange(_)) => prop_assert_eq!(hosts.len(), 253),
				Err(e) => prop_assert!(false, "unexpected error: {e}"),
			}
		}
	}
}
