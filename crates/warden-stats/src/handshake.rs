// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! `latest handshake:` values as printed by `wg show`.

use chrono::{DateTime, TimeDelta, Utc};

fn unit_seconds(unit: &str) -> Option<i64> {
	match unit {
		"second" | "seconds" => Some(1),
		"minute" | "minutes" => Some(60),
		"hour" | "hours" => Some(3_600),
		"day" | "days" => Some(86_400),
		"week" | "weeks" => Some(604_800),
		_ => None,
	}
}

/// Parse an age such as `1 minute, 9 seconds ago` into a duration.
///
/// `Now` yields zero. `never`, `n/a`, empty input and ages too large to
/// represent yield `None`. Chunks that do not look like `<integer> <unit>` are
/// ignored.
pub fn parse_handshake_age(text: &str) -> Option<TimeDelta> {
	let text = text.trim().to_lowercase();
	if text.is_empty() || text == "n/a" || text == "never" || text == "(none)" {
		return None;
	}
	if text == "now" {
		return Some(TimeDelta::zero());
	}

	let text = text.strip_suffix(" ago").unwrap_or(&text);
	let mut total = 0i64;
	for chunk in text.split(',') {
		let mut tokens = chunk.split_whitespace();
		let (Some(value), Some(unit)) = (tokens.next(), tokens.next()) else {
			continue;
		};
		let (Ok(value), Some(seconds)) = (value.parse::<i64>(), unit_seconds(unit)) else {
			continue;
		};
		total = total.saturating_add(value.saturating_mul(seconds));
	}

	TimeDelta::try_seconds(total)
}

/// Resolve a handshake age relative to `now`.
pub fn handshake_instant(text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
	parse_handshake_age(text).and_then(|age| now.checked_sub_signed(age))
}

fn plural(value: i64, unit: &str) -> String {
	if value == 1 {
		format!("{value} {unit}")
	} else {
		format!("{value} {unit}s")
	}
}

/// Render an elapsed duration with at most two components.
pub fn format_age(elapsed: TimeDelta) -> String {
	let mut seconds = elapsed.num_seconds().max(0);
	let mut parts = Vec::with_capacity(2);

	for (size, unit) in [(86_400, "day"), (3_600, "hour"), (60, "minute"), (1, "second")] {
		if seconds >= size {
			let value = seconds / size;
			seconds -= value * size;
			parts.push(plural(value, unit));
		}
		if parts.len() == 2 {
			break;
		}
	}

	if parts.is_empty() {
		parts.push(plural(0, "second"));
	}

	format!("{} ago", parts.join(", "))
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::TimeZone;

	fn fixed_now() -> DateTime<Utc> {
		Utc.with_ymd_and_hms(2025, 3, 14, 12, 0, 0).unwrap()
	}

	#[test]
	fn parses_compound_ages() {
		assert_eq!(
			parse_handshake_age("1 minute, 9 seconds ago"),
			Some(TimeDelta::seconds(69))
		);
		assert_eq!(
			parse_handshake_age("2 days, 3 hours, 1 second ago"),
			Some(TimeDelta::seconds(2 * 86_400 + 3 * 3_600 + 1))
		);
		assert_eq!(parse_handshake_age("1 week ago"), Some(TimeDelta::seconds(604_800)));
	}

	#[test]
	fn now_and_never() {
		assert_eq!(parse_handshake_age("Now"), Some(TimeDelta::zero()));
		assert_eq!(parse_handshake_age("never"), None);
		assert_eq!(parse_handshake_age("N/A"), None);
		assert_eq!(parse_handshake_age("   "), None);
	}

	#[test]
	fn ignores_unknown_chunks() {
		assert_eq!(
			parse_handshake_age("5 fortnights, 10 seconds ago"),
			Some(TimeDelta::seconds(10))
		);
	}

	#[test]
	fn instant_is_relative_to_now() {
		let instant = handshake_instant("1 minute, 9 seconds ago", fixed_now()).unwrap();
		assert_eq!(instant, Utc.with_ymd_and_hms(2025, 3, 14, 11, 58, 51).unwrap());
	}

	#[test]
	fn formats_two_components_at_most() {
		assert_eq!(format_age(TimeDelta::seconds(69)), "1 minute, 9 seconds ago");
		assert_eq!(
			format_age(TimeDelta::seconds(86_400 + 3_600 + 61)),
			"1 day, 1 hour ago"
		);
		assert_eq!(format_age(TimeDelta::seconds(7_200)), "2 hours ago");
		assert_eq!(format_age(TimeDelta::zero()), "0 seconds ago");
		assert_eq!(format_age(TimeDelta::seconds(-5)), "0 seconds ago");
	}
}
