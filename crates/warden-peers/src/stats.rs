// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use warden_stats::{
	format_handshake_age, merge_samples, period_usage, sorted, LedgerEntry, LedgerMap, Period,
	SortBy, TrafficStat,
};

use crate::error::Result;
use crate::service::PeerService;

/// One row of the stats view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeerTraffic {
	pub name: String,
	pub allowed_ips: Option<String>,
	pub endpoint: Option<String>,
	pub handshake: String,
	pub received: String,
	pub sent: String,
	pub today: TrafficStat,
	pub this_month: TrafficStat,
}

impl PeerTraffic {
	fn new(name: &str, entry: &LedgerEntry, now: DateTime<Utc>) -> Self {
		Self {
			name: name.to_string(),
			allowed_ips: entry.allowed_ips.clone(),
			endpoint: entry.endpoint.clone(),
			handshake: format_handshake_age(entry, now),
			received: entry.transfer_received(),
			sent: entry.transfer_sent(),
			today: period_usage(entry, Period::Daily, now),
			this_month: period_usage(entry, Period::Monthly, now),
		}
	}
}

impl PeerService {
	/// Sample the daemon and fold the readings into the ledger. Peers the
	/// config file does not name are ignored. The registry copy of each
	/// touched entry is updated best-effort.
	#[instrument(skip(self))]
	pub async fn refresh_stats(&self) -> Result<LedgerMap> {
		let names_by_key: HashMap<String, String> = self
			.editor
			.peers()
			.await?
			.into_iter()
			.map(|peer| (peer.public_key, peer.name))
			.collect();

		let samples = self.collector.sample_named(&names_by_key).await?;

		let _guard = self.ledger.lock().await;

		// Peers removed while the daemon was being sampled must not come back.
		let current: HashSet<String> = self
			.editor
			.peers()
			.await?
			.into_iter()
			.map(|peer| peer.name)
			.collect();
		let (samples, dropped): (Vec<_>, Vec<_>) = samples
			.into_iter()
			.partition(|(name, _)| current.contains(name));
		for (name, _) in &dropped {
			debug!(name = %name, "peer left the config during sampling, sample dropped");
		}
		let touched: Vec<String> = samples.iter().map(|(name, _)| name.clone()).collect();

		let mut ledger = self.ledger.load().await?;
		merge_samples(&mut ledger, samples, self.stats.merge_policy, Utc::now());
		self.ledger.save(&ledger).await?;

		for name in &touched {
			let Some(entry) = ledger.get(name) else {
				continue;
			};
			match self.registry.set_stats(name, entry).await {
				Ok(true) => {}
				Ok(false) => debug!(name = %name, "no registry record for sampled peer"),
				Err(e) => warn!(name = %name, error = %e, "failed to store stats snapshot"),
			}
		}

		info!(
			sampled = touched.len(),
			policy = self.stats.merge_policy.as_str(),
			"ledger refreshed"
		);
		Ok(ledger)
	}

	/// Refresh, then render the ledger in `sort` order (the configured order
	/// when `None`).
	#[instrument(skip(self))]
	pub async fn stats_view(&self, sort: Option<SortBy>) -> Result<Vec<PeerTraffic>> {
		let ledger = self.refresh_stats().await?;
		let now = Utc::now();
		Ok(sorted(&ledger, sort.unwrap_or(self.stats.sort))
			.into_iter()
			.map(|(name, entry)| PeerTraffic::new(name, entry, now))
			.collect())
	}
}
