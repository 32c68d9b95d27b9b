// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

#[derive(Debug, thiserror::Error)]
pub enum WgCtlError {
	#[error("{0} not found in PATH")]
	NotInstalled(String),

	#[error("{cmd} {args:?} failed (exit {code:?}): {stderr}")]
	CommandFailed {
		cmd: String,
		args: Vec<String>,
		code: Option<i32>,
		stderr: String,
	},

	#[error("{cmd} timed out after {secs}s")]
	Timeout { cmd: String, secs: u64 },

	#[error("{0} produced no output")]
	EmptyOutput(String),

	#[error("empty command line")]
	EmptyCommand,

	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, WgCtlError>;
