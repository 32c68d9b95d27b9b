// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use regex::Regex;

use crate::error::{PeerError, Result};

/// Which peer names may be created.
#[derive(Debug, Clone)]
pub struct NameRule {
	allowed: Regex,
	pattern: String,
	reserved: Vec<String>,
}

impl NameRule {
	/// `pattern` is a character class body such as `a-zA-Z0-9_`.
	pub fn new(pattern: &str, reserved: &[String]) -> Result<Self> {
		let allowed = Regex::new(&format!("^[{pattern}]+$")).map_err(|e| {
			PeerError::Validation(format!("name pattern [{pattern}] does not compile: {e}"))
		})?;

		Ok(Self {
			allowed,
			pattern: pattern.to_string(),
			reserved: reserved.to_vec(),
		})
	}

	pub fn check(&self, name: &str) -> Result<()> {
		if name.is_empty() {
			return Err(PeerError::Validation("name is empty".to_string()));
		}
		if name.trim() != name {
			return Err(PeerError::Validation(format!(
				"'{name}' has surrounding whitespace"
			)));
		}
		if !self.allowed.is_match(name) {
			return Err(PeerError::Validation(format!(
				"'{name}' may only contain [{}]",
				self.pattern
			)));
		}
		if self.reserved.iter().any(|r| r == name) {
			return Err(PeerError::Validation(format!("'{name}' is reserved")));
		}
		Ok(())
	}
}
