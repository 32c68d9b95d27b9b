// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! PostUp/PostDown firewall rule blocks.
//!
//! The interface section carries exactly one of two variants: the baseline
//! forwarding/NAT pair, or the extended block that additionally drops
//! BitTorrent traffic from the peer subnet. Transitions replace the whole
//! block in one splice; when the expected variant is absent nothing is
//! written.

use std::fmt;
use std::sync::LazyLock;

use ipnet::Ipv4Net;
use regex::Regex;

use crate::error::{Result, WgConfError};

pub const BASELINE_POST_UP: &str = "PostUp = iptables -A FORWARD -i %i -j ACCEPT; iptables -A FORWARD -o %i -j ACCEPT; iptables -t nat -A POSTROUTING -o eth+ -j MASQUERADE";
pub const BASELINE_POST_DOWN: &str = "PostDown = iptables -D FORWARD -i %i -j ACCEPT; iptables -D FORWARD -o %i -j ACCEPT; iptables -t nat -D POSTROUTING -o eth+ -j MASQUERADE";

/// First line of the extended block.
pub const EXTENDED_MARKER: &str = "# Base WireGuard rules";
const BLOCKING_COMMENT: &str = "# Block torrents";
const CLEANUP_COMMENT: &str = "# Cleanup on shutdown";

/// Substrings whose presence means blocking is switched on.
const TELLTALES: [&str; 4] = [
	"--string \"BitTorrent protocol\"",
	"--string \"announce\"",
	"--dport 6881:6999",
	BLOCKING_COMMENT,
];

const POST_UP_PATTERN: &str = r"PostUp\s*=\s*iptables\s+-A\s+FORWARD\s+-i\s+%i\s+-j\s+ACCEPT;\s*iptables\s+-A\s+FORWARD\s+-o\s+%i\s+-j\s+ACCEPT;\s*iptables\s+-t\s+nat\s+-A\s+POSTROUTING\s+-o\s+eth\+\s+-j\s+MASQUERADE";
const POST_DOWN_PATTERN: &str = r"PostDown\s*=\s*iptables\s+-D\s+FORWARD\s+-i\s+%i\s+-j\s+ACCEPT;\s*iptables\s+-D\s+FORWARD\s+-o\s+%i\s+-j\s+ACCEPT;\s*iptables\s+-t\s+nat\s+-D\s+POSTROUTING\s+-o\s+eth\+\s+-j\s+MASQUERADE";

/// Baseline PostUp immediately followed by baseline PostDown.
static BASELINE_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(&format!(r"{POST_UP_PATTERN}[ \t]*\r?\n[ \t]*{POST_DOWN_PATTERN}"))
		.expect("baseline rule pattern is valid")
});

/// From the extended marker through the first baseline PostDown.
static EXTENDED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(&format!(
		r"(?s){}[ \t]*\r?\n.*?{POST_DOWN_PATTERN}",
		regex::escape(EXTENDED_MARKER)
	))
	.expect("extended rule pattern is valid")
});

static DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"(?m)^[ \t]*(PostUp|PostDown)[ \t]*=[ \t]*(.*?)[ \t]*\r?$")
		.expect("rule directive pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleBlock {
	Baseline,
	Extended { subnet: Ipv4Net },
}

impl RuleBlock {
	pub fn name(&self) -> &'static str {
		match self {
			RuleBlock::Baseline => "baseline",
			RuleBlock::Extended { .. } => "extended",
		}
	}

	/// Render the block without a trailing line break.
	pub fn render(&self) -> String {
		match self {
			RuleBlock::Baseline => format!("{BASELINE_POST_UP}\n{BASELINE_POST_DOWN}"),
			RuleBlock::Extended { subnet } => {
				let matches = [
					"-m string --string \"BitTorrent protocol\" --algo bm",
					"-m string --string \"announce\" --algo bm",
					"-p tcp --dport 6881:6999",
					"-p udp --dport 6881:6999",
				];
				let mut lines = vec![
					EXTENDED_MARKER.to_string(),
					BASELINE_POST_UP.to_string(),
					format!("{BLOCKING_COMMENT} for {subnet}"),
				];
				lines.extend(
					matches
						.iter()
						.map(|m| format!("PostUp = iptables -I FORWARD -s {subnet} {m} -j DROP")),
				);
				lines.push(CLEANUP_COMMENT.to_string());
				lines.extend(
					matches
						.iter()
						.map(|m| format!("PostDown = iptables -D FORWARD -s {subnet} {m} -j DROP")),
				);
				lines.push(BASELINE_POST_DOWN.to_string());
				lines.join("\n")
			}
		}
	}

	fn pattern(&self) -> &'static Regex {
		match self {
			RuleBlock::Baseline => &BASELINE_BLOCK,
			RuleBlock::Extended { .. } => &EXTENDED_BLOCK,
		}
	}
}

/// Replace the `from` variant in `text` with `to`.
pub fn swap(text: &str, from: RuleBlock, to: RuleBlock) -> Result<String> {
	let found = from
		.pattern()
		.find(text)
		.ok_or(WgConfError::RuleBlockNotFound(from.name()))?;

	let mut out = String::with_capacity(text.len() + 1024);
	out.push_str(&text[..found.start()]);
	out.push_str(&to.render());
	out.push_str(&text[found.end()..]);
	Ok(out)
}

pub fn enable_class_blocking(text: &str, subnet: Ipv4Net) -> Result<String> {
	swap(text, RuleBlock::Baseline, RuleBlock::Extended { subnet })
}

pub fn disable_class_blocking(text: &str, subnet: Ipv4Net) -> Result<String> {
	swap(text, RuleBlock::Extended { subnet }, RuleBlock::Baseline)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassBlockingState {
	Enabled,
	Disabled,
	/// The file could not be read.
	Unknown,
}

impl ClassBlockingState {
	pub fn as_str(&self) -> &'static str {
		match self {
			ClassBlockingState::Enabled => "enabled",
			ClassBlockingState::Disabled => "disabled",
			ClassBlockingState::Unknown => "unknown",
		}
	}
}

impl fmt::Display for ClassBlockingState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

pub fn detect_state(text: &str) -> ClassBlockingState {
	if TELLTALES.iter().any(|needle| text.contains(needle)) {
		ClassBlockingState::Enabled
	} else {
		ClassBlockingState::Disabled
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleHook {
	PostUp,
	PostDown,
}

impl RuleHook {
	pub fn as_str(&self) -> &'static str {
		match self {
			RuleHook::PostUp => "PostUp",
			RuleHook::PostDown => "PostDown",
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleDirective {
	pub hook: RuleHook,
	pub command: String,
}

/// Every live PostUp/PostDown directive, in file order.
pub fn directives(text: &str) -> Vec<RuleDirective> {
	DIRECTIVE
		.captures_iter(text)
		.map(|caps| RuleDirective {
			hook: if &caps[1] == "PostUp" {
				RuleHook::PostUp
			} else {
				RuleHook::PostDown
			},
			command: caps[2].to_string(),
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn subnet() -> Ipv4Net {
		"10.0.0.0/24".parse().unwrap()
	}

	fn baseline_config() -> String {
		format!(
			"[Interface]\nAddress = 10.0.0.1/24\nListenPort = 51820\n{BASELINE_POST_UP}\n{BASELINE_POST_DOWN}\n\n[Peer]\n# alice\nPublicKey = a\nPresharedKey = b\nAllowedIPs = 10.0.0.2/32\n\n"
		)
	}

	#[test]
	fn extended_block_shape() {
		let rendered = RuleBlock::Extended { subnet: subnet() }.render();
		let lines: Vec<&str> = rendered.lines().collect();

		assert_eq!(lines.len(), 13);
		assert_eq!(lines[0], EXTENDED_MARKER);
		assert_eq!(lines[1], BASELINE_POST_UP);
		assert_eq!(lines[2], "# Block torrents for 10.0.0.0/24");
		assert_eq!(
			lines[3],
			"PostUp = iptables -I FORWARD -s 10.0.0.0/24 -m string --string \"BitTorrent protocol\" --algo bm -j DROP"
		);
		assert_eq!(lines[6], "PostUp = iptables -I FORWARD -s 10.0.0.0/24 -p udp --dport 6881:6999 -j DROP");
		assert_eq!(lines[7], CLEANUP_COMMENT);
		assert_eq!(lines[12], BASELINE_POST_DOWN);
	}

	/// Test: enable followed by disable restores the baseline block exactly.
	///
	/// Why this test is important: the rule swap rewrites the daemon's
	/// interface section. A round trip that drifts (lost newline, duplicated
	/// PostDown) would break NAT for every peer on the next restart.
	#[test]
	fn enable_then_disable_round_trips() {
		let original = baseline_config();

		let enabled = enable_class_blocking(&original, subnet()).unwrap();
		assert_eq!(detect_state(&enabled), ClassBlockingState::Enabled);
		assert!(enabled.contains("[Peer]\n# alice\n"));

		let disabled = disable_class_blocking(&enabled, subnet()).unwrap();
		assert_eq!(disabled, original);
		assert_eq!(detect_state(&disabled), ClassBlockingState::Disabled);
	}

	/// Test: a peer whose name contains a match string does not read as
	/// blocking.
	///
	/// Why this test is important: a false `Enabled` makes enable report
	/// nothing to do while the baseline rules are still in place.
	#[test]
	fn peer_name_is_not_a_telltale() {
		let text = format!(
			"{}[Peer]\n# announcer\nPublicKey = c\nPresharedKey = d\nAllowedIPs = 10.0.0.3/32\n\n",
			baseline_config()
		);
		assert_eq!(detect_state(&text), ClassBlockingState::Disabled);

		let enabled = enable_class_blocking(&text, subnet()).unwrap();
		assert_eq!(detect_state(&enabled), ClassBlockingState::Enabled);
	}

	#[test]
	fn enable_when_already_enabled_is_not_found() {
		let enabled = enable_class_blocking(&baseline_config(), subnet()).unwrap();
		let err = enable_class_blocking(&enabled, subnet()).unwrap_err();
		assert!(matches!(err, WgConfError::RuleBlockNotFound("baseline")));
	}

	#[test]
	fn disable_when_baseline_is_not_found() {
		let err = disable_class_blocking(&baseline_config(), subnet()).unwrap_err();
		assert!(matches!(err, WgConfError::RuleBlockNotFound("extended")));
	}

	#[test]
	fn disable_accepts_hand_edited_extended_block() {
		let text = format!(
			"[Interface]\n{EXTENDED_MARKER}\n{BASELINE_POST_UP}\nPostUp = iptables -I FORWARD -s 10.0.0.0/24 -p tcp --dport 6881:6999 -j DROP\n{BASELINE_POST_DOWN}\n"
		);
		let disabled = disable_class_blocking(&text, subnet()).unwrap();
		assert_eq!(disabled, format!("[Interface]\n{BASELINE_POST_UP}\n{BASELINE_POST_DOWN}\n"));
	}

	#[test]
	fn baseline_match_tolerates_spacing() {
		let text = "PostUp=iptables -A FORWARD -i %i -j ACCEPT;iptables -A FORWARD -o %i -j ACCEPT; iptables -t nat -A POSTROUTING -o eth+ -j MASQUERADE\nPostDown =  iptables -D FORWARD -i %i -j ACCEPT; iptables -D FORWARD -o %i -j ACCEPT; iptables -t nat -D POSTROUTING -o eth+ -j MASQUERADE\n";
		let enabled = enable_class_blocking(text, subnet()).unwrap();
		assert!(enabled.starts_with(EXTENDED_MARKER));
		assert!(enabled.ends_with(&format!("{BASELINE_POST_DOWN}\n")));
	}

	#[test]
	fn lists_directives_in_order() {
		let text = format!("{BASELINE_POST_UP}\n#PostUp = ignored\n{BASELINE_POST_DOWN}\r\n");
		let rules = directives(&text);

		assert_eq!(rules.len(), 2);
		assert_eq!(rules[0].hook, RuleHook::PostUp);
		assert!(rules[0].command.starts_with("iptables -A FORWARD"));
		assert_eq!(rules[1].hook, RuleHook::PostDown);
		assert!(rules[1].command.ends_with("MASQUERADE"));
	}
}
