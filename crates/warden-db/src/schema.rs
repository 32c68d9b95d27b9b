// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use sqlx::sqlite::SqlitePool;

use crate::error::Result;

/// Create the registry tables if they do not exist yet.
#[tracing::instrument(skip(pool))]
pub async fn migrate(pool: &SqlitePool) -> Result<()> {
	sqlx::query(
		r#"
		CREATE TABLE IF NOT EXISTS peers (
			name TEXT PRIMARY KEY,
			private_key TEXT NOT NULL,
			public_key TEXT NOT NULL,
			preshared_key TEXT NOT NULL,
			created_at TEXT NOT NULL,
			suspended INTEGER NOT NULL DEFAULT 0,
			stats_json TEXT
		)
		"#,
	)
	.execute(pool)
	.await?;

	tracing::debug!("registry schema ready");
	Ok(())
}
