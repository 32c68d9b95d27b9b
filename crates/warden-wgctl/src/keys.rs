// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::fmt;
use std::sync::Arc;

use tracing::{debug, instrument};
use zeroize::Zeroizing;

use crate::error::{Result, WgCtlError};
use crate::runner::CommandRunner;

/// A private/public/pre-shared key triple.
///
/// The private and pre-shared keys are wiped from memory on drop and never
/// appear in `Debug` output.
#[derive(Clone)]
pub struct KeyMaterial {
	private_key: Zeroizing<String>,
	public_key: String,
	preshared_key: Zeroizing<String>,
}

impl KeyMaterial {
	pub fn new(private_key: String, public_key: String, preshared_key: String) -> Self {
		Self {
			private_key: Zeroizing::new(private_key),
			public_key,
			preshared_key: Zeroizing::new(preshared_key),
		}
	}

	pub fn private_key(&self) -> &str {
		&self.private_key
	}

	pub fn public_key(&self) -> &str {
		&self.public_key
	}

	pub fn preshared_key(&self) -> &str {
		&self.preshared_key
	}
}

impl fmt::Debug for KeyMaterial {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("KeyMaterial")
			.field("private_key", &"[REDACTED]")
			.field("public_key", &self.public_key)
			.field("preshared_key", &"[REDACTED]")
			.finish()
	}
}

/// Obtains keys from the `wg` tool. No retries.
#[derive(Clone)]
pub struct KeyMaterialGenerator {
	runner: Arc<dyn CommandRunner>,
	wg_binary: String,
}

impl KeyMaterialGenerator {
	pub fn new(runner: Arc<dyn CommandRunner>, wg_binary: impl Into<String>) -> Self {
		Self {
			runner,
			wg_binary: wg_binary.into(),
		}
	}

	async fn wg(&self, subcommand: &str, stdin: Option<&str>) -> Result<String> {
		let argv = [self.wg_binary.clone(), subcommand.to_string()];
		let key = self.runner.run_checked(&argv, stdin).await?;
		if key.is_empty() {
			return Err(WgCtlError::EmptyOutput(format!("{} {subcommand}", self.wg_binary)));
		}
		Ok(key)
	}

	#[instrument(skip(self))]
	pub async fn generate(&self) -> Result<KeyMaterial> {
		let private_key = Zeroizing::new(self.wg("genkey", None).await?);
		let public_key = self.public_key_for(&private_key).await?;
		let preshared_key = self.wg("genpsk", None).await?;

		debug!(public_key = %public_key, "generated key material");
		Ok(KeyMaterial {
			private_key,
			public_key,
			preshared_key: Zeroizing::new(preshared_key),
		})
	}

	/// Derive the public key for `private_key` via `wg pubkey`.
	#[instrument(skip_all)]
	pub async fn public_key_for(&self, private_key: &str) -> Result<String> {
		self.wg("pubkey", Some(&format!("{private_key}\n"))).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::{failed, ok, ScriptedRunner};

	fn generator(runner: ScriptedRunner) -> (Arc<ScriptedRunner>, KeyMaterialGenerator) {
		let runner = Arc::new(runner);
		let generator = KeyMaterialGenerator::new(runner.clone(), "wg");
		(runner, generator)
	}

	#[tokio::test]
	async fn generates_triple_with_pubkey_from_stdin() {
		let (runner, generator) = generator(ScriptedRunner::fake_wg());

		let keys = generator.generate().await.unwrap();
		assert_eq!(keys.private_key(), "priv0=");
		assert_eq!(keys.public_key(), "pub-priv0=");
		assert_eq!(keys.preshared_key(), "psk1=");

		let calls = runner.calls();
		assert_eq!(calls.len(), 3);
		assert_eq!(calls[1].0, ["wg", "pubkey"]);
		assert_eq!(calls[1].1.as_deref(), Some("priv0=\n"));
	}

	#[tokio::test]
	async fn tool_failure_carries_stderr() {
		let (_, generator) =
			generator(ScriptedRunner::fake_wg().respond(&["wg", "genpsk"], failed(1, "entropy exhausted\n")));

		match generator.generate().await.unwrap_err() {
			WgCtlError::CommandFailed { stderr, args, .. } => {
				assert_eq!(stderr, "entropy exhausted");
				assert_eq!(args, ["genpsk"]);
			}
			other => panic!("unexpected error: {other}"),
		}
	}

	#[tokio::test]
	async fn empty_key_is_an_error() {
		let (_, generator) = generator(ScriptedRunner::fake_wg().respond(&["wg", "genkey"], ok("  \n")));
		assert!(matches!(
			generator.generate().await,
			Err(WgCtlError::EmptyOutput(_))
		));
	}

	#[test]
	fn debug_redacts_secrets() {
		let keys = KeyMaterial::new("secret-priv".into(), "public".into(), "secret-psk".into());
		let rendered = format!("{keys:?}");
		assert!(rendered.contains("public"));
		assert!(!rendered.contains("secret"));
	}
}
