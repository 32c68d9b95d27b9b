// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, instrument};

use crate::error::{Result, StatsError};
use crate::ledger::LedgerMap;

/// JSON file holding the [`LedgerMap`].
///
/// Clones share one lock. Anything that writes the file holds it from the
/// `load` through the `save`, so two updates never overwrite each other.
#[derive(Debug, Clone)]
pub struct LedgerStore {
	path: PathBuf,
	lock: Arc<Mutex<()>>,
}

impl LedgerStore {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self {
			path: path.into(),
			lock: Arc::new(Mutex::new(())),
		}
	}

	/// Exclusive access for a read-modify-write cycle.
	pub async fn lock(&self) -> MutexGuard<'_, ()> {
		self.lock.lock().await
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	fn io_error(&self, source: std::io::Error) -> StatsError {
		StatsError::Io {
			path: self.path.clone(),
			source,
		}
	}

	/// Read the ledger. A missing file is an empty ledger.
	#[instrument(skip(self), fields(path = %self.path.display()))]
	pub async fn load(&self) -> Result<LedgerMap> {
		let content = match fs::read_to_string(&self.path).await {
			Ok(content) => content,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				debug!("ledger file not found, starting empty");
				return Ok(LedgerMap::new());
			}
			Err(e) => return Err(self.io_error(e)),
		};

		if content.trim().is_empty() {
			return Ok(LedgerMap::new());
		}

		serde_json::from_str(&content).map_err(|source| StatsError::Corrupt {
			path: self.path.clone(),
			source,
		})
	}

	#[instrument(skip(self, ledger), fields(path = %self.path.display(), entries = ledger.len()))]
	pub async fn save(&self, ledger: &LedgerMap) -> Result<()> {
		if let Some(parent) = self.path.parent() {
			if !parent.as_os_str().is_empty() {
				fs::create_dir_all(parent)
					.await
					.map_err(|e| self.io_error(e))?;
			}
		}

		let content = serde_json::to_string_pretty(ledger)?;
		fs::write(&self.path, content)
			.await
			.map_err(|e| self.io_error(e))?;

		debug!("ledger saved");
		Ok(())
	}

	/// Drop a peer's history. Returns whether an entry existed.
	#[instrument(skip(self), fields(path = %self.path.display()))]
	pub async fn remove_entry(&self, name: &str) -> Result<bool> {
		let _guard = self.lock().await;
		let mut ledger = self.load().await?;
		if ledger.remove(name).is_none() {
			return Ok(false);
		}
		self.save(&ledger).await?;
		Ok(true)
	}
}
