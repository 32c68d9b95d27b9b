// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Parsing of `wg show <interface>` output.
//!
//! ```text
//! interface: wg0
//!   public key: ...
//!   listening port: 51820
//!
//! peer: 2Bf...=
//!   preshared key: (hidden)
//!   endpoint: 198.51.100.7:53211
//!   allowed ips: 10.0.0.2/32
//!   latest handshake: 1 minute, 9 seconds ago
//!   transfer: 1.50 MiB received, 500.00 KiB sent
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, instrument};
use warden_stats::{from_human_readable, TrafficSample};

use crate::error::Result;
use crate::runner::CommandRunner;

fn parse_transfer(value: &str, sample: &mut TrafficSample) {
	let (received, rest) = match value.split_once("received,") {
		Some((received, rest)) => (received, rest),
		None => return,
	};
	let sent = rest.split("sent").next().unwrap_or_default();

	sample.received_bytes = from_human_readable(received);
	sample.sent_bytes = from_human_readable(sent);
}

/// Peer samples in output order. Fields missing from a block stay empty.
pub fn parse_status(text: &str) -> Vec<TrafficSample> {
	let mut samples = Vec::new();
	let mut current: Option<TrafficSample> = None;

	for line in text.lines() {
		let Some((key, value)) = line.trim().split_once(':') else {
			continue;
		};
		let value = value.trim();

		if key == "peer" {
			samples.extend(current.take());
			current = Some(TrafficSample {
				public_key: value.to_string(),
				..Default::default()
			});
			continue;
		}

		let Some(sample) = current.as_mut() else {
			continue;
		};
		match key {
			"endpoint" => sample.endpoint = Some(value.to_string()),
			"allowed ips" => sample.allowed_ips = Some(value.to_string()),
			"latest handshake" => sample.latest_handshake = Some(value.to_string()),
			"transfer" => parse_transfer(value, sample),
			_ => {}
		}
	}

	samples.extend(current);
	samples
}

/// Samples the live daemon.
#[derive(Clone)]
pub struct StatsCollector {
	runner: Arc<dyn CommandRunner>,
	wg_binary: String,
	interface: String,
}

impl StatsCollector {
	pub fn new(
		runner: Arc<dyn CommandRunner>,
		wg_binary: impl Into<String>,
		interface: impl Into<String>,
	) -> Self {
		Self {
			runner,
			wg_binary: wg_binary.into(),
			interface: interface.into(),
		}
	}

	/// Every peer block the daemon reports.
	#[instrument(skip(self), fields(interface = %self.interface))]
	pub async fn sample(&self) -> Result<Vec<TrafficSample>> {
		let argv = [
			self.wg_binary.clone(),
			"show".to_string(),
			self.interface.clone(),
		];
		let output = self.runner.run_checked(&argv, None).await?;
		let samples = parse_status(&output);
		debug!(peers = samples.len(), "sampled daemon status");
		Ok(samples)
	}

	/// Samples keyed by peer name. Blocks whose public key is not in
	/// `names_by_key` are dropped.
	pub async fn sample_named(
		&self,
		names_by_key: &HashMap<String, String>,
	) -> Result<Vec<(String, TrafficSample)>> {
		let samples = self.sample().await?;
		let total = samples.len();
		let named: Vec<(String, TrafficSample)> = samples
			.into_iter()
			.filter_map(|sample| {
				let name = names_by_key.get(&sample.public_key)?;
				Some((name.clone(), sample))
			})
			.collect();

		debug!(total, matched = named.len(), "matched samples to peers");
		Ok(named)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::{ok, ScriptedRunner};

	const SHOW: &str = "interface: wg0
  public key: c2VydmVy
  private key: (hidden)
  listening port: 51820

peer: YWxpY2U=
  preshared key: (hidden)
  endpoint: 198.51.100.7:53211
  allowed ips: 10.0.0.2/32
  latest handshake: 1 minute, 9 seconds ago
  transfer: 1.50 MiB received, 500.00 KiB sent

peer: Ym9i
  allowed ips: 10.0.0.3/32
";

	#[test]
	fn parses_peer_blocks() {
		let samples = parse_status(SHOW);
		assert_eq!(samples.len(), 2);

		let alice = &samples[0];
		assert_eq!(alice.public_key, "YWxpY2U=");
		assert_eq!(alice.endpoint.as_deref(), Some("198.51.100.7:53211"));
		assert_eq!(alice.allowed_ips.as_deref(), Some("10.0.0.2/32"));
		assert_eq!(alice.latest_handshake.as_deref(), Some("1 minute, 9 seconds ago"));
		assert_eq!(alice.received_bytes, 1_572_864);
		assert_eq!(alice.sent_bytes, 512_000);

		let bob = &samples[1];
		assert_eq!(bob.endpoint, None);
		assert_eq!(bob.latest_handshake, None);
		assert_eq!(bob.received_bytes, 0);
	}

	#[test]
	fn endpoint_with_port_keeps_colons() {
		let samples = parse_status("peer: k\n  endpoint: [2001:db8::1]:51820\n");
		assert_eq!(samples[0].endpoint.as_deref(), Some("[2001:db8::1]:51820"));
	}

	#[test]
	fn unknown_units_count_as_zero() {
		let samples = parse_status("peer: k\n  transfer: 2.00 TiB received, 92 B sent\n");
		assert_eq!(samples[0].received_bytes, 0);
		assert_eq!(samples[0].sent_bytes, 92);
	}

	#[test]
	fn interface_only_output_has_no_samples() {
		assert!(parse_status("interface: wg0\n  listening port: 51820\n").is_empty());
		assert!(parse_status("").is_empty());
	}

	/// Test: samples for keys absent from the config are dropped.
	///
	/// Why this test is important: the daemon may still hold peers that were
	/// removed from the file but not yet reloaded. Their counters must not be
	/// attributed to any registered peer.
	#[tokio::test]
	async fn sample_named_drops_unknown_keys() {
		let runner = Arc::new(ScriptedRunner::new().respond(&["wg", "show", "wg0"], ok(SHOW)));
		let collector = StatsCollector::new(runner.clone(), "wg", "wg0");

		let names = HashMap::from([("YWxpY2U=".to_string(), "alice".to_string())]);
		let named = collector.sample_named(&names).await.unwrap();

		assert_eq!(named.len(), 1);
		assert_eq!(named[0].0, "alice");
		assert_eq!(named[0].1.sent_bytes, 512_000);
		assert_eq!(runner.call_count(&["wg", "show"]), 1);
	}
}
