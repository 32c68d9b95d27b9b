// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Byte counts in the daemon's binary-unit notation (`500.00 KiB`).
//!
//! Rounding is done in integer hundredths so that formatting and parsing agree
//! exactly: parsing truncates toward zero and formatting rounds half up, which
//! makes `to_human_readable(from_human_readable(s)) == s` hold for every string
//! produced by [`to_human_readable`].

use std::fmt;
use std::str::FromStr;

use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ByteUnit {
	B,
	KiB,
	MiB,
	GiB,
}

impl ByteUnit {
	/// Largest unit first.
	pub const DESCENDING: [ByteUnit; 4] = [ByteUnit::GiB, ByteUnit::MiB, ByteUnit::KiB, ByteUnit::B];

	pub fn factor(self) -> u64 {
		match self {
			ByteUnit::B => 1,
			ByteUnit::KiB => 1024,
			ByteUnit::MiB => 1024 * 1024,
			ByteUnit::GiB => 1024 * 1024 * 1024,
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			ByteUnit::B => "B",
			ByteUnit::KiB => "KiB",
			ByteUnit::MiB => "MiB",
			ByteUnit::GiB => "GiB",
		}
	}
}

impl fmt::Display for ByteUnit {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for ByteUnit {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"B" => Ok(ByteUnit::B),
			"KiB" => Ok(ByteUnit::KiB),
			"MiB" => Ok(ByteUnit::MiB),
			"GiB" => Ok(ByteUnit::GiB),
			_ => Err(format!("unknown byte unit: {s}")),
		}
	}
}

/// Round `bytes / factor` to hundredths, half up.
fn hundredths(bytes: u64, factor: u64) -> u128 {
	let factor = factor as u128;
	(bytes as u128 * 100 + factor / 2) / factor
}

/// Format a byte count using the largest unit whose rounded value is at least 1.
///
/// Values too small for `B` still render in `B` (`0.00 B`); values beyond the
/// `GiB` range stay in `GiB`.
pub fn to_human_readable(bytes: u64) -> String {
	let (unit, value) = ByteUnit::DESCENDING
		.iter()
		.map(|unit| (*unit, hundredths(bytes, unit.factor())))
		.find(|(_, value)| *value >= 100)
		.unwrap_or((ByteUnit::B, hundredths(bytes, 1)));

	format!("{}.{:02} {}", value / 100, value % 100, unit)
}

/// Parse `<number> <unit>` into a byte count.
///
/// Returns `None` for an unknown unit or a malformed number.
pub fn parse_bytes(text: &str) -> Option<u64> {
	let mut parts = text.split_whitespace();
	let number = parts.next()?;
	let unit: ByteUnit = parts.next()?.parse().ok()?;
	if parts.next().is_some() {
		return None;
	}

	let (whole, fraction) = match number.split_once('.') {
		Some((whole, fraction)) => (whole, fraction),
		None => (number, ""),
	};
	if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
		return None;
	}
	if !fraction.bytes().all(|b| b.is_ascii_digit()) {
		return None;
	}

	let factor = unit.factor() as u128;
	let whole: u128 = whole.parse().ok()?;
	let mut bytes = whole.checked_mul(factor)?;

	if !fraction.is_empty() {
		let digits = fraction.len().min(18);
		let numerator: u128 = fraction[..digits].parse().ok()?;
		let denominator = 10u128.pow(digits as u32);
		bytes = bytes.checked_add(numerator * factor / denominator)?;
	}

	u64::try_from(bytes).ok()
}

/// Parse the daemon's transfer notation, failing closed to zero.
pub fn from_human_readable(text: &str) -> u64 {
	match parse_bytes(text.trim()) {
		Some(bytes) => bytes,
		None => {
			warn!(value = %text, "unrecognized transfer value, counting as zero");
			0
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn formats_with_largest_fitting_unit() {
		assert_eq!(to_human_readable(0), "0.00 B");
		assert_eq!(to_human_readable(92), "92.00 B");
		assert_eq!(to_human_readable(512_000), "500.00 KiB");
		assert_eq!(to_human_readable(1_572_864), "1.50 MiB");
		assert_eq!(to_human_readable(6_689_411_563), "6.23 GiB");
	}

	#[test]
	fn values_rounding_up_to_one_move_to_the_larger_unit() {
		assert_eq!(to_human_readable(1_048_575), "1.00 MiB");
		assert_eq!(to_human_readable(1_043_333), "1018.88 KiB");
	}

	#[test]
	fn stays_in_gib_beyond_the_table() {
		assert_eq!(to_human_readable(2048 * ByteUnit::GiB.factor()), "2048.00 GiB");
	}

	#[test]
	fn parses_daemon_transfer_values() {
		assert_eq!(from_human_readable("1.50 MiB"), 1_572_864);
		assert_eq!(from_human_readable("500.00 KiB"), 512_000);
		assert_eq!(from_human_readable("92 B"), 92);
		assert_eq!(from_human_readable(" 6.23 GiB "), 6_689_411_563);
	}

	/// Test: unsupported units and garbage count as zero.
	///
	/// Why this test is important: the ledger must never absorb a guessed
	/// value. A `TiB` reading or a truncated line from the daemon is dropped
	/// rather than mis-scaled into the cumulative totals.
	#[test]
	fn unknown_units_fail_closed() {
		assert_eq!(from_human_readable("1.00 TiB"), 0);
		assert_eq!(from_human_readable("12"), 0);
		assert_eq!(from_human_readable("abc KiB"), 0);
		assert_eq!(from_human_readable("1.2.3 KiB"), 0);
		assert_eq!(from_human_readable(""), 0);
	}

	#[test]
	fn unit_parse_is_case_sensitive() {
		assert!("kib".parse::<ByteUnit>().is_err());
		assert_eq!("KiB".parse::<ByteUnit>(), Ok(ByteUnit::KiB));
	}

	proptest! {
		/// Every canonical string survives a parse and re-format unchanged.
		#[test]
		fn prop_canonical_strings_round_trip(bytes in 0u64..(1u64 << 50)) {
			let canonical = to_human_readable(bytes);
			prop_assert_eq!(to_human_readable(from_human_readable(&canonical)), canonical);
		}

		/// The decoded value is within one display step of the original.
		#[test]
		fn prop_parse_stays_within_display_step(bytes in 0u64..(1u64 << 40)) {
			let decoded = from_human_readable(&to_human_readable(bytes));
			let factor = ByteUnit::DESCENDING
				.iter()
				.find(|u| hundredths(bytes, u.factor()) >= 100)
				.map(|u| u.factor())
				.unwrap_or(1);
			prop_assert!(decoded.abs_diff(bytes) <= factor / 100 + 1);
		}
	}
}
