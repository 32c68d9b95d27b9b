// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::fmt;

use serde::Serialize;

use crate::error::Result;

/// What a front end shows for one operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationOutcome {
	pub success: bool,
	pub description: String,
}

impl OperationOutcome {
	pub fn ok(description: impl Into<String>) -> Self {
		Self {
			success: true,
			description: description.into(),
		}
	}

	pub fn failed(description: impl Into<String>) -> Self {
		Self {
			success: false,
			description: description.into(),
		}
	}

	/// Collapse a result, describing the success value with `describe`.
	pub fn from_result<T>(result: Result<T>, describe: impl FnOnce(T) -> String) -> Self {
		match result {
			Ok(value) => Self::ok(describe(value)),
			Err(err) => Self::failed(err.to_string()),
		}
	}
}

impl fmt::Display for OperationOutcome {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let status = if self.success { "ok" } else { "error" };
		write!(f, "[{status}] {}", self.description)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::PeerError;

	#[test]
	fn from_result_uses_error_text() {
		let outcome = OperationOutcome::from_result::<()>(
			Err(PeerError::AlreadyExists("alice".into())),
			|_| unreachable!(),
		);
		assert!(!outcome.success);
		assert_eq!(outcome.description, "peer already exists: alice");
		assert_eq!(outcome.to_string(), "[error] peer already exists: alice");
	}

	#[test]
	fn from_result_describes_value() {
		let outcome = OperationOutcome::from_result(Ok(3), |n| format!("{n} peers"));
		assert_eq!(outcome, OperationOutcome::ok("3 peers"));
	}
}
