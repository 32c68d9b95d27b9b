// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqliteSynchronous};
use std::str::FromStr;

use crate::error::DbError;

/// Connect to the peer registry at `database_url`, such as
/// `sqlite:/var/lib/warden/warden.db`.
///
/// The file runs in WAL mode and is created when missing. The schema is
/// applied separately by [`crate::migrate`].
#[tracing::instrument(skip(database_url))]
pub async fn create_pool(database_url: &str) -> Result<SqlitePool, DbError> {
	let options = SqliteConnectOptions::from_str(database_url)
		.map_err(|e| DbError::Internal(format!("registry url {database_url} is not usable: {e}")))?
		.journal_mode(SqliteJournalMode::Wal)
		.synchronous(SqliteSynchronous::Normal)
		.create_if_missing(true);

	let pool = SqlitePool::connect_with(options).await?;

	tracing::debug!("peer registry connected");
	Ok(pool)
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	#[tokio::test]
	async fn creates_missing_database_file() {
		let temp = TempDir::new().unwrap();
		let path = temp.path().join("warden.db");
		let url = format!("sqlite:{}", path.display());

		let pool = create_pool(&url).await.unwrap();
		crate::schema::migrate(&pool).await.unwrap();
		assert!(path.exists());
	}
}
