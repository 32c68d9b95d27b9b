// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Scripted [`CommandRunner`] for tests that must not touch real tools.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{Result, WgCtlError};
use crate::runner::{CommandOutput, CommandRunner};

type Responder = Box<dyn Fn(Option<&str>) -> CommandOutput + Send + Sync>;

/// Answers commands by argv prefix. Later rules take priority, so a test
/// can start from [`ScriptedRunner::fake_wg`] and override one command.
#[derive(Default)]
pub struct ScriptedRunner {
	rules: Vec<(Vec<String>, Responder)>,
	calls: Mutex<Vec<(Vec<String>, Option<String>)>>,
}

pub fn ok(stdout: impl Into<String>) -> CommandOutput {
	CommandOutput {
		code: Some(0),
		stdout: stdout.into(),
		stderr: String::new(),
	}
}

pub fn failed(code: i32, stderr: impl Into<String>) -> CommandOutput {
	CommandOutput {
		code: Some(code),
		stdout: String::new(),
		stderr: stderr.into(),
	}
}

impl ScriptedRunner {
	pub fn new() -> Self {
		Self::default()
	}

	/// `wg genkey`, `wg pubkey` and `wg genpsk` producing distinct,
	/// deterministic keys. `pubkey` answers `pub-<private key>`.
	pub fn fake_wg() -> Self {
		let counter = Arc::new(AtomicUsize::new(0));
		let genkey = Arc::clone(&counter);
		let genpsk = Arc::clone(&counter);

		Self::new()
			.on(&["wg", "genkey"], move |_| {
				ok(format!("priv{}=\n", genkey.fetch_add(1, Ordering::SeqCst)))
			})
			.on(&["wg", "pubkey"], |stdin| {
				ok(format!("pub-{}\n", stdin.unwrap_or_default().trim()))
			})
			.on(&["wg", "genpsk"], move |_| {
				ok(format!("psk{}=\n", genpsk.fetch_add(1, Ordering::SeqCst)))
			})
	}

	pub fn on<F>(mut self, prefix: &[&str], respond: F) -> Self
	where
		F: Fn(Option<&str>) -> CommandOutput + Send + Sync + 'static,
	{
		let prefix = prefix.iter().map(|s| s.to_string()).collect();
		self.rules.push((prefix, Box::new(respond)));
		self
	}

	pub fn respond(self, prefix: &[&str], output: CommandOutput) -> Self {
		self.on(prefix, move |_| output.clone())
	}

	/// Every invocation so far, with the stdin it was given.
	pub fn calls(&self) -> Vec<(Vec<String>, Option<String>)> {
		self.calls.lock().unwrap().clone()
	}

	pub fn call_count(&self, prefix: &[&str]) -> usize {
		self.calls()
			.iter()
			.filter(|(argv, _)| argv.iter().map(String::as_str).take(prefix.len()).eq(prefix.iter().copied()))
			.count()
	}
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
	async fn run(&self, argv: &[String], stdin: Option<&str>) -> Result<CommandOutput> {
		self.calls
			.lock()
			.unwrap()
			.push((argv.to_vec(), stdin.map(str::to_string)));

		let (_, respond) = self
			.rules
			.iter()
			.rev()
			.find(|(prefix, _)| argv.starts_with(prefix))
			.ok_or_else(|| WgCtlError::NotInstalled(argv.first().cloned().unwrap_or_default()))?;

		Ok(respond(stdin))
	}
}
