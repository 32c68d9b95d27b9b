// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The fixed-shape `[Peer]` block.
//!
//! ```text
//! [Peer]                       #[Peer]
//! # alice                      ## alice
//! PublicKey = <pub>            #PublicKey = <pub>
//! PresharedKey = <psk>         #PresharedKey = <psk>
//! AllowedIPs = 10.0.0.5/32     #AllowedIPs = 10.0.0.5/32
//! <blank>                      <blank>
//! ```
//!
//! A suspended block carries one extra `#` at the start of each of its five
//! content lines. The blank separator is never commented. Lines are kept
//! verbatim, including their line endings, so a parsed block renders back to
//! exactly the bytes it came from.

use crate::error::{Result, WgConfError};

const CONTENT_LINES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
	Active,
	Suspended,
}

impl PeerState {
	pub fn as_str(&self) -> &'static str {
		match self {
			PeerState::Active => "active",
			PeerState::Suspended => "suspended",
		}
	}

	pub fn flipped(self) -> Self {
		match self {
			PeerState::Active => PeerState::Suspended,
			PeerState::Suspended => PeerState::Active,
		}
	}
}

/// Strip a trailing `\n` or `\r\n`.
pub(crate) fn strip_eol(line: &str) -> &str {
	let line = line.strip_suffix('\n').unwrap_or(line);
	line.strip_suffix('\r').unwrap_or(line)
}

/// Split `Key = value`, ignoring leading comment markers and whitespace.
pub(crate) fn split_directive(line: &str) -> Option<(&str, &str)> {
	let line = strip_eol(line).trim_start().trim_start_matches('#');
	let (key, value) = line.split_once('=')?;
	Some((key.trim(), value.trim()))
}

fn indent_len(line: &str) -> usize {
	line.len() - line.trim_start_matches([' ', '\t']).len()
}

fn is_marker(line: &str) -> bool {
	strip_eol(line).trim().trim_start_matches('#').trim() == "[Peer]"
}

fn name_of(line: &str) -> Option<&str> {
	let line = strip_eol(line).trim();
	if !line.starts_with('#') {
		return None;
	}
	let name = line.trim_start_matches('#').trim();
	(!name.is_empty()).then_some(name)
}

fn expect_directive<'a>(line: &'a str, key: &str) -> Option<&'a str> {
	match split_directive(line) {
		Some((k, v)) if k == key => Some(v),
		_ => None,
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerBlock {
	name: String,
	public_key: String,
	preshared_key: String,
	allowed_ips: String,
	lines: Vec<String>,
	separator: Option<String>,
}

impl PeerBlock {
	/// Build an active block in canonical form.
	pub fn new(name: &str, public_key: &str, preshared_key: &str, allowed_ips: &str) -> Self {
		Self {
			name: name.to_string(),
			public_key: public_key.to_string(),
			preshared_key: preshared_key.to_string(),
			allowed_ips: allowed_ips.to_string(),
			lines: vec![
				"[Peer]\n".to_string(),
				format!("# {name}\n"),
				format!("PublicKey = {public_key}\n"),
				format!("PresharedKey = {preshared_key}\n"),
				format!("AllowedIPs = {allowed_ips}\n"),
			],
			separator: Some("\n".to_string()),
		}
	}

	/// Try to read a block at the start of `lines`.
	///
	/// Returns the block and the number of lines it spans (six, or five when no
	/// blank separator follows).
	pub(crate) fn parse(lines: &[&str]) -> Option<(Self, usize)> {
		if lines.len() < CONTENT_LINES || !is_marker(lines[0]) {
			return None;
		}

		let name = name_of(lines[1])?;
		let public_key = expect_directive(lines[2], "PublicKey")?;
		let preshared_key = expect_directive(lines[3], "PresharedKey")?;
		let allowed_ips = expect_directive(lines[4], "AllowedIPs")?;

		let separator = lines
			.get(CONTENT_LINES)
			.filter(|line| strip_eol(line).trim().is_empty())
			.map(|line| line.to_string());
		let used = CONTENT_LINES + usize::from(separator.is_some());

		Some((
			Self {
				name: name.to_string(),
				public_key: public_key.to_string(),
				preshared_key: preshared_key.to_string(),
				allowed_ips: allowed_ips.to_string(),
				lines: lines[..CONTENT_LINES].iter().map(|l| l.to_string()).collect(),
				separator,
			},
			used,
		))
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn public_key(&self) -> &str {
		&self.public_key
	}

	pub fn preshared_key(&self) -> &str {
		&self.preshared_key
	}

	pub fn allowed_ips(&self) -> &str {
		&self.allowed_ips
	}

	pub fn marker_commented(&self) -> bool {
		self.lines[0].trim_start().starts_with('#')
	}

	pub fn name_commented(&self) -> bool {
		self.lines[1].trim_start().starts_with("##")
	}

	/// Comment state of the block. The marker and the name line must agree.
	pub fn state(&self) -> Result<PeerState> {
		match (self.marker_commented(), self.name_commented()) {
			(false, false) => Ok(PeerState::Active),
			(true, true) => Ok(PeerState::Suspended),
			(marker, _) => Err(WgConfError::InconsistentState {
				name: self.name.clone(),
				detail: format!(
					"section marker is {} but name line is {}",
					if marker { "commented" } else { "active" },
					if marker { "active" } else { "commented" },
				),
			}),
		}
	}

	/// Move the block to `target`. Returns whether anything changed.
	pub fn set_state(&mut self, target: PeerState) -> Result<bool> {
		if self.state()? == target {
			return Ok(false);
		}

		// The `#` goes after any indentation, where the state checks look.
		for line in &mut self.lines {
			let at = indent_len(line);
			match target {
				PeerState::Suspended => line.insert(at, '#'),
				PeerState::Active => {
					if line[at..].starts_with('#') {
						line.remove(at);
					}
				}
			}
		}

		Ok(true)
	}

	/// Make sure the block ends with a line break so text can follow it.
	pub(crate) fn ensure_trailing_newline(&mut self) {
		let last = match &mut self.separator {
			Some(separator) => separator,
			None => &mut self.lines[CONTENT_LINES - 1],
		};
		if !last.ends_with('\n') {
			last.push('\n');
		}
	}

	pub(crate) fn lines(&self) -> impl Iterator<Item = &str> {
		self.lines.iter().chain(self.separator.iter()).map(String::as_str)
	}

	pub fn render_into(&self, out: &mut String) {
		for line in self.lines() {
			out.push_str(line);
		}
	}

	pub fn render(&self) -> String {
		let mut out = String::new();
		self.render_into(&mut out);
		out
	}
}
