// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Durable per-peer traffic accounting.
//!
//! The daemon only exposes volatile counters that reset on every restart. This
//! crate keeps the long-lived view:
//! - [`units`] converts between byte counts and the daemon's `1.50 MiB` notation
//! - [`handshake`] turns `1 minute, 9 seconds ago` into an absolute instant
//! - [`ledger`] merges live samples into cumulative totals and period buckets
//! - [`store`] persists the ledger as a JSON document

pub mod error;
pub mod handshake;
pub mod ledger;
pub mod store;
pub mod units;

pub use error::{Result, StatsError};
pub use handshake::{format_age, handshake_instant, parse_handshake_age};
pub use ledger::{
	format_handshake_age, merge, merge_samples, period_key, period_usage, sorted, LedgerEntry,
	LedgerMap, MergePolicy, Period, PeriodizedTraffic, SortBy, TrafficSample, TrafficStat,
};
pub use store::LedgerStore;
pub use units::{from_human_readable, parse_bytes, to_human_readable, ByteUnit};
