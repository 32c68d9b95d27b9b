// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Cumulative traffic ledger.
//!
//! A [`TrafficSample`] is one reading of the daemon's counters for a single
//! peer. [`merge`] folds it into a [`LedgerEntry`]: ephemeral fields (endpoint,
//! handshake, allowed IPs) are replaced when the sample carries them, while the
//! byte totals and the daily/weekly/monthly buckets grow by the increment chosen
//! by the [`MergePolicy`].

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::handshake::{format_age, handshake_instant};
use crate::units::to_human_readable;

/// Ledger keyed by peer name.
pub type LedgerMap = BTreeMap<String, LedgerEntry>;

/// One live reading for a peer, as parsed from `wg show`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrafficSample {
	pub public_key: String,
	pub endpoint: Option<String>,
	pub allowed_ips: Option<String>,
	pub latest_handshake: Option<String>,
	pub received_bytes: u64,
	pub sent_bytes: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficStat {
	pub received_bytes: u64,
	pub sent_bytes: u64,
}

impl TrafficStat {
	fn add(&mut self, received: u64, sent: u64) {
		self.received_bytes = self.received_bytes.saturating_add(received);
		self.sent_bytes = self.sent_bytes.saturating_add(sent);
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodizedTraffic {
	#[serde(default)]
	pub daily: BTreeMap<String, TrafficStat>,
	#[serde(default)]
	pub weekly: BTreeMap<String, TrafficStat>,
	#[serde(default)]
	pub monthly: BTreeMap<String, TrafficStat>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
	Daily,
	Weekly,
	Monthly,
}

/// Bucket key for `period` at `now`: `2025-03-14`, `2025-W11` or `2025-03`.
pub fn period_key(period: Period, now: DateTime<Utc>) -> String {
	match period {
		Period::Daily => now.format("%Y-%m-%d").to_string(),
		Period::Weekly => {
			let week = now.iso_week();
			format!("{}-W{:02}", week.year(), week.week())
		}
		Period::Monthly => now.format("%Y-%m").to_string(),
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
	#[serde(default)]
	pub allowed_ips: Option<String>,
	#[serde(default)]
	pub endpoint: Option<String>,
	/// Raw handshake text from the most recent sample that carried one.
	#[serde(default)]
	pub latest_handshake: Option<String>,
	#[serde(default)]
	pub latest_handshake_at: Option<DateTime<Utc>>,
	#[serde(default)]
	pub received_bytes: u64,
	#[serde(default)]
	pub sent_bytes: u64,
	/// Daemon counters seen on the previous merge; only `Delta` reads them.
	#[serde(default)]
	pub last_raw_received: u64,
	#[serde(default)]
	pub last_raw_sent: u64,
	#[serde(default)]
	pub periods: PeriodizedTraffic,
}

impl LedgerEntry {
	pub fn transfer_received(&self) -> String {
		to_human_readable(self.received_bytes)
	}

	pub fn transfer_sent(&self) -> String {
		to_human_readable(self.sent_bytes)
	}
}

/// How a sample's counters are folded into the stored totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
	/// Add the sample's reported totals to the stored totals.
	#[default]
	Additive,
	/// Add only the growth since the previous sample, treating a counter that
	/// went backwards as a daemon restart.
	Delta,
}

impl MergePolicy {
	pub fn as_str(&self) -> &'static str {
		match self {
			MergePolicy::Additive => "additive",
			MergePolicy::Delta => "delta",
		}
	}
}

impl fmt::Display for MergePolicy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for MergePolicy {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"additive" => Ok(MergePolicy::Additive),
			"delta" => Ok(MergePolicy::Delta),
			_ => Err(format!("unknown merge policy: {s}")),
		}
	}
}

fn increments(
	existing: Option<&LedgerEntry>,
	sample: &TrafficSample,
	policy: MergePolicy,
) -> (u64, u64) {
	match (policy, existing) {
		(MergePolicy::Delta, Some(prev)) => (
			sample
				.received_bytes
				.checked_sub(prev.last_raw_received)
				.unwrap_or(sample.received_bytes),
			sample
				.sent_bytes
				.checked_sub(prev.last_raw_sent)
				.unwrap_or(sample.sent_bytes),
		),
		_ => (sample.received_bytes, sample.sent_bytes),
	}
}

/// Fold one sample into an existing entry (or start a new one).
pub fn merge(
	existing: Option<&LedgerEntry>,
	sample: &TrafficSample,
	policy: MergePolicy,
	now: DateTime<Utc>,
) -> LedgerEntry {
	let (received, sent) = increments(existing, sample, policy);
	let mut entry = existing.cloned().unwrap_or_default();

	entry.received_bytes = entry.received_bytes.saturating_add(received);
	entry.sent_bytes = entry.sent_bytes.saturating_add(sent);
	entry.last_raw_received = sample.received_bytes;
	entry.last_raw_sent = sample.sent_bytes;

	for (bucket, period) in [
		(&mut entry.periods.daily, Period::Daily),
		(&mut entry.periods.weekly, Period::Weekly),
		(&mut entry.periods.monthly, Period::Monthly),
	] {
		bucket
			.entry(period_key(period, now))
			.or_default()
			.add(received, sent);
	}

	if let Some(endpoint) = &sample.endpoint {
		entry.endpoint = Some(endpoint.clone());
	}
	if let Some(allowed_ips) = &sample.allowed_ips {
		entry.allowed_ips = Some(allowed_ips.clone());
	}
	if let Some(handshake) = &sample.latest_handshake {
		entry.latest_handshake = Some(handshake.clone());
		if let Some(at) = handshake_instant(handshake, now) {
			entry.latest_handshake_at = Some(at);
		}
	}

	entry
}

/// Merge a batch of named samples into the ledger in place.
pub fn merge_samples<I>(ledger: &mut LedgerMap, samples: I, policy: MergePolicy, now: DateTime<Utc>)
where
	I: IntoIterator<Item = (String, TrafficSample)>,
{
	for (name, sample) in samples {
		let merged = merge(ledger.get(&name), &sample, policy, now);
		ledger.insert(name, merged);
	}
}

/// Usage in the current bucket of `period`.
pub fn period_usage(entry: &LedgerEntry, period: Period, now: DateTime<Utc>) -> TrafficStat {
	let bucket = match period {
		Period::Daily => &entry.periods.daily,
		Period::Weekly => &entry.periods.weekly,
		Period::Monthly => &entry.periods.monthly,
	};
	bucket
		.get(&period_key(period, now))
		.copied()
		.unwrap_or_default()
}

/// Human-readable handshake age, falling back to the raw text or `N/A`.
pub fn format_handshake_age(entry: &LedgerEntry, now: DateTime<Utc>) -> String {
	match (&entry.latest_handshake_at, &entry.latest_handshake) {
		(Some(at), _) => format_age(now.signed_duration_since(*at)),
		(None, Some(raw)) => raw.clone(),
		(None, None) => "N/A".to_string(),
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
	/// Ascending by address; entries without one come first.
	AllowedIps,
	/// Descending by cumulative bytes sent.
	#[default]
	TransferSent,
}

impl FromStr for SortBy {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"allowed_ips" | "allowed-ips" => Ok(SortBy::AllowedIps),
			"transfer_sent" | "transfer-sent" => Ok(SortBy::TransferSent),
			_ => Err(format!("unknown sort order: {s}")),
		}
	}
}

fn entry_address(entry: &LedgerEntry) -> Ipv4Addr {
	entry
		.allowed_ips
		.as_deref()
		.and_then(|ips| ips.split(['/', ',']).next())
		.and_then(|ip| ip.trim().parse().ok())
		.unwrap_or(Ipv4Addr::UNSPECIFIED)
}

pub fn sorted(ledger: &LedgerMap, sort: SortBy) -> Vec<(&String, &LedgerEntry)> {
	let mut rows: Vec<_> = ledger.iter().collect();
	match sort {
		SortBy::AllowedIps => rows.sort_by_key(|(_, entry)| entry_address(entry)),
		SortBy::TransferSent => rows.sort_by_key(|(_, entry)| Reverse(entry.sent_bytes)),
	}
	rows
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::units::from_human_readable;
	use chrono::TimeZone;

	fn now() -> DateTime<Utc> {
		Utc.with_ymd_and_hms(2025, 3, 14, 12, 0, 0).unwrap()
	}

	fn sample(received: &str, sent: &str) -> TrafficSample {
		TrafficSample {
			public_key: "pk-alice".to_string(),
			endpoint: Some("203.0.113.7:51820".to_string()),
			allowed_ips: Some("10.0.0.5/32".to_string()),
			latest_handshake: Some("1 minute, 9 seconds ago".to_string()),
			received_bytes: from_human_readable(received),
			sent_bytes: from_human_readable(sent),
		}
	}

	/// Test: a first sample becomes the entry's totals verbatim.
	///
	/// Why this test is important: this is the reference reconciliation
	/// scenario. `1.50 MiB received, 500.00 KiB sent` with no prior entry must
	/// land as exactly 1572864 and 512000 bytes.
	#[test]
	fn first_sample_becomes_totals() {
		let entry = merge(None, &sample("1.50 MiB", "500.00 KiB"), MergePolicy::Additive, now());

		assert_eq!(entry.received_bytes, 1_572_864);
		assert_eq!(entry.sent_bytes, 512_000);
		assert_eq!(entry.transfer_received(), "1.50 MiB");
		assert_eq!(entry.transfer_sent(), "500.00 KiB");
		assert_eq!(entry.endpoint.as_deref(), Some("203.0.113.7:51820"));
		assert_eq!(
			entry.latest_handshake_at,
			Some(Utc.with_ymd_and_hms(2025, 3, 14, 11, 58, 51).unwrap())
		);
	}

	#[test]
	fn additive_policy_sums_reported_totals() {
		let first = merge(None, &sample("1.00 MiB", "1.00 KiB"), MergePolicy::Additive, now());
		let second = merge(
			Some(&first),
			&sample("2.00 MiB", "1.00 KiB"),
			MergePolicy::Additive,
			now(),
		);

		assert_eq!(second.received_bytes, 3 * 1024 * 1024);
		assert_eq!(second.sent_bytes, 2 * 1024);
	}

	#[test]
	fn delta_policy_counts_growth_only() {
		let first = merge(None, &sample("1.00 MiB", "1.00 KiB"), MergePolicy::Delta, now());
		let second = merge(
			Some(&first),
			&sample("2.00 MiB", "1.00 KiB"),
			MergePolicy::Delta,
			now(),
		);

		assert_eq!(second.received_bytes, 2 * 1024 * 1024);
		assert_eq!(second.sent_bytes, 1024);
	}

	/// Test: a counter that went backwards is treated as a fresh start.
	///
	/// Why this test is important: restarting the daemon zeroes its counters.
	/// Without this rule the subtraction would underflow or discard the
	/// traffic seen since the restart.
	#[test]
	fn delta_policy_survives_daemon_restart() {
		let first = merge(None, &sample("5.00 MiB", "5.00 MiB"), MergePolicy::Delta, now());
		let after_restart = merge(
			Some(&first),
			&sample("1.00 MiB", "2.00 MiB"),
			MergePolicy::Delta,
			now(),
		);

		assert_eq!(after_restart.received_bytes, 6 * 1024 * 1024);
		assert_eq!(after_restart.sent_bytes, 7 * 1024 * 1024);
		assert_eq!(after_restart.last_raw_received, 1024 * 1024);
	}

	#[test]
	fn missing_ephemeral_fields_keep_previous_values() {
		let first = merge(None, &sample("1 B", "1 B"), MergePolicy::Additive, now());
		let bare = TrafficSample {
			public_key: "pk-alice".to_string(),
			..Default::default()
		};
		let second = merge(Some(&first), &bare, MergePolicy::Additive, now());

		assert_eq!(second.endpoint, first.endpoint);
		assert_eq!(second.allowed_ips, first.allowed_ips);
		assert_eq!(second.latest_handshake_at, first.latest_handshake_at);
	}

	#[test]
	fn period_buckets_track_increments() {
		let entry = merge(None, &sample("1.00 KiB", "2.00 KiB"), MergePolicy::Additive, now());

		assert_eq!(period_key(Period::Daily, now()), "2025-03-14");
		assert_eq!(period_key(Period::Weekly, now()), "2025-W11");
		assert_eq!(period_key(Period::Monthly, now()), "2025-03");

		let weekly = period_usage(&entry, Period::Weekly, now());
		assert_eq!(weekly.received_bytes, 1024);
		assert_eq!(weekly.sent_bytes, 2048);

		let next_month = Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap();
		assert_eq!(period_usage(&entry, Period::Monthly, next_month), TrafficStat::default());
	}

	#[test]
	fn iso_week_crosses_calendar_year() {
		let new_year = Utc.with_ymd_and_hms(2024, 12, 30, 8, 0, 0).unwrap();
		assert_eq!(period_key(Period::Weekly, new_year), "2025-W01");
	}

	#[test]
	fn handshake_age_fallbacks() {
		let mut entry = LedgerEntry::default();
		assert_eq!(format_handshake_age(&entry, now()), "N/A");

		entry.latest_handshake = Some("garbled".to_string());
		assert_eq!(format_handshake_age(&entry, now()), "garbled");

		entry.latest_handshake_at = Some(now() - chrono::TimeDelta::seconds(69));
		assert_eq!(format_handshake_age(&entry, now()), "1 minute, 9 seconds ago");
	}

	#[test]
	fn sorts_by_address_and_by_sent_bytes() {
		let mut ledger = LedgerMap::new();
		for (name, ip, sent) in [
			("carol", Some("10.0.0.12/32"), 10),
			("alice", Some("10.0.0.3/32"), 30),
			("bob", None, 20),
		] {
			ledger.insert(
				name.to_string(),
				LedgerEntry {
					allowed_ips: ip.map(str::to_string),
					sent_bytes: sent,
					..Default::default()
				},
			);
		}

		let by_ip: Vec<_> = sorted(&ledger, SortBy::AllowedIps)
			.into_iter()
			.map(|(name, _)| name.as_str())
			.collect();
		assert_eq!(by_ip, ["bob", "alice", "carol"]);

		let by_sent: Vec<_> = sorted(&ledger, SortBy::TransferSent)
			.into_iter()
			.map(|(name, _)| name.as_str())
			.collect();
		assert_eq!(by_sent, ["alice", "bob", "carol"]);
	}

	#[test]
	fn merge_samples_keys_by_name() {
		let mut ledger = LedgerMap::new();
		merge_samples(
			&mut ledger,
			[("alice".to_string(), sample("1.00 KiB", "1.00 KiB"))],
			MergePolicy::Additive,
			now(),
		);
		merge_samples(
			&mut ledger,
			[("alice".to_string(), sample("1.00 KiB", "1.00 KiB"))],
			MergePolicy::Additive,
			now(),
		);

		assert_eq!(ledger.len(), 1);
		assert_eq!(ledger["alice"].received_bytes, 2048);
		assert_eq!(
			period_usage(&ledger["alice"], Period::Daily, now()).received_bytes,
			2048
		);
	}
}
