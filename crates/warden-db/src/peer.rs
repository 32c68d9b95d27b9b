// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Peer registry: one record per peer name, authoritative for keys, creation
//! time, the suspended flag and the last traffic snapshot.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;
use warden_stats::LedgerEntry;

use crate::error::{DbError, Result};

type PeerRow = (
	String,
	String,
	String,
	String,
	DateTime<Utc>,
	bool,
	Option<String>,
);

const SELECT_PEER: &str = "SELECT name, private_key, public_key, preshared_key, created_at, suspended, stats_json FROM peers";

#[derive(Clone, PartialEq)]
pub struct PeerRecord {
	pub name: String,
	pub private_key: String,
	pub public_key: String,
	pub preshared_key: String,
	pub created_at: DateTime<Utc>,
	pub suspended: bool,
	pub stats: Option<LedgerEntry>,
}

impl fmt::Debug for PeerRecord {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("PeerRecord")
			.field("name", &self.name)
			.field("private_key", &"[REDACTED]")
			.field("public_key", &self.public_key)
			.field("preshared_key", &"[REDACTED]")
			.field("created_at", &self.created_at)
			.field("suspended", &self.suspended)
			.field("stats", &self.stats.is_some())
			.finish()
	}
}

fn row_to_record(row: PeerRow) -> Result<PeerRecord> {
	let (name, private_key, public_key, preshared_key, created_at, suspended, stats_json) = row;
	let stats = stats_json
		.as_deref()
		.map(|json| serde_json::from_str::<LedgerEntry>(json))
		.transpose()?;

	Ok(PeerRecord {
		name,
		private_key,
		public_key,
		preshared_key,
		created_at,
		suspended,
		stats,
	})
}

#[derive(Clone)]
pub struct PeerRepository {
	pool: SqlitePool,
}

impl PeerRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Insert a new record. A name that is already registered is a conflict.
	#[tracing::instrument(skip(self, record), fields(name = %record.name))]
	pub async fn insert(&self, record: &PeerRecord) -> Result<()> {
		let stats_json = record
			.stats
			.as_ref()
			.map(serde_json::to_string)
			.transpose()?;

		let result = sqlx::query(
			r#"
            INSERT INTO peers (name, private_key, public_key, preshared_key, created_at, suspended, stats_json)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
		)
		.bind(&record.name)
		.bind(&record.private_key)
		.bind(&record.public_key)
		.bind(&record.preshared_key)
		.bind(record.created_at)
		.bind(record.suspended)
		.bind(stats_json)
		.execute(&self.pool)
		.await;

		match result {
			Ok(_) => Ok(()),
			Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
				Err(DbError::Conflict(record.name.clone()))
			}
			Err(e) => Err(e.into()),
		}
	}

	#[tracing::instrument(skip(self))]
	pub async fn get(&self, name: &str) -> Result<Option<PeerRecord>> {
		let row = sqlx::query_as::<_, PeerRow>(&format!("{SELECT_PEER} WHERE name = ?"))
			.bind(name)
			.fetch_optional(&self.pool)
			.await?;

		row.map(row_to_record).transpose()
	}

	#[tracing::instrument(skip(self))]
	pub async fn exists(&self, name: &str) -> Result<bool> {
		let row = sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM peers WHERE name = ?")
			.bind(name)
			.fetch_one(&self.pool)
			.await?;
		Ok(row.0 > 0)
	}

	/// All records ordered by name.
	#[tracing::instrument(skip(self))]
	pub async fn list(&self) -> Result<Vec<PeerRecord>> {
		let rows = sqlx::query_as::<_, PeerRow>(&format!("{SELECT_PEER} ORDER BY name"))
			.fetch_all(&self.pool)
			.await?;

		rows.into_iter().map(row_to_record).collect()
	}

	/// Returns the number of rows removed.
	#[tracing::instrument(skip(self))]
	pub async fn delete(&self, name: &str) -> Result<u64> {
		let result = sqlx::query("DELETE FROM peers WHERE name = ?")
			.bind(name)
			.execute(&self.pool)
			.await?;

		Ok(result.rows_affected())
	}

	#[tracing::instrument(skip(self))]
	pub async fn set_suspended(&self, name: &str, suspended: bool) -> Result<()> {
		let result = sqlx::query("UPDATE peers SET suspended = ? WHERE name = ?")
			.bind(suspended)
			.bind(name)
			.execute(&self.pool)
			.await?;

		if result.rows_affected() == 0 {
			return Err(DbError::NotFound(name.to_string()));
		}

		Ok(())
	}

	/// Store the latest traffic snapshot. Returns whether a record was updated.
	#[tracing::instrument(skip(self, stats))]
	pub async fn set_stats(&self, name: &str, stats: &LedgerEntry) -> Result<bool> {
		let stats_json = serde_json::to_string(stats)?;
		let result = sqlx::query("UPDATE peers SET stats_json = ? WHERE name = ?")
			.bind(stats_json)
			.bind(name)
			.execute(&self.pool)
			.await?;

		Ok(result.rows_affected() > 0)
	}
}

#[async_trait]
pub trait PeerStore: Send + Sync {
	async fn insert(&self, record: &PeerRecord) -> Result<()>;
	async fn get(&self, name: &str) -> Result<Option<PeerRecord>>;
	async fn exists(&self, name: &str) -> Result<bool>;
	async fn list(&self) -> Result<Vec<PeerRecord>>;
	async fn delete(&self, name: &str) -> Result<u64>;
	async fn set_suspended(&self, name: &str, suspended: bool) -> Result<()>;
	async fn set_stats(&self, name: &str, stats: &LedgerEntry) -> Result<bool>;
}

#[async_trait]
impl PeerStore for PeerRepository {
	async fn insert(&self, record: &PeerRecord) -> Result<()> {
		self.insert(record).await
	}

	async fn get(&self, name: &str) -> Result<Option<PeerRecord>> {
		self.get(name).await
	}

	async fn exists(&self, name: &str) -> Result<bool> {
		self.exists(name).await
	}

	async fn list(&self) -> Result<Vec<PeerRecord>> {
		self.list().await
	}

	async fn delete(&self, name: &str) -> Result<u64> {
		self.delete(name).await
	}

	async fn set_suspended(&self, name: &str, suspended: bool) -> Result<()> {
		self.set_suspended(name, suspended).await
	}

	async fn set_stats(&self, name: &str, stats: &LedgerEntry) -> Result<bool> {
		self.set_stats(name, stats).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::create_test_pool;

	fn make_record(name: &str) -> PeerRecord {
		PeerRecord {
			name: name.to_string(),
			private_key: format!("{name}-priv="),
			public_key: format!("{name}-pub="),
			preshared_key: format!("{name}-psk="),
			created_at: "2025-03-01T12:00:00Z".parse().unwrap(),
			suspended: false,
			stats: None,
		}
	}

	#[tokio::test]
	async fn test_insert_and_get() {
		let repo = PeerRepository::new(create_test_pool().await);
		repo.insert(&make_record("alice")).await.unwrap();

		let retrieved = repo.get("alice").await.unwrap().unwrap();
		assert_eq!(retrieved, make_record("alice"));
		assert!(repo.exists("alice").await.unwrap());
		assert!(repo.get("bob").await.unwrap().is_none());
		assert!(!repo.exists("bob").await.unwrap());
	}

	#[tokio::test]
	async fn test_duplicate_insert_is_conflict() {
		let repo = PeerRepository::new(create_test_pool().await);
		repo.insert(&make_record("alice")).await.unwrap();

		let err = repo.insert(&make_record("alice")).await.unwrap_err();
		assert!(matches!(err, DbError::Conflict(name) if name == "alice"));
	}

	#[tokio::test]
	async fn test_list_is_ordered_by_name() {
		let repo = PeerRepository::new(create_test_pool().await);
		for name in ["carol", "alice", "bob"] {
			repo.insert(&make_record(name)).await.unwrap();
		}

		let names: Vec<String> = repo.list().await.unwrap().into_iter().map(|r| r.name).collect();
		assert_eq!(names, ["alice", "bob", "carol"]);
	}

	#[tokio::test]
	async fn test_set_suspended() {
		let repo = PeerRepository::new(create_test_pool().await);
		repo.insert(&make_record("alice")).await.unwrap();

		repo.set_suspended("alice", true).await.unwrap();
		assert!(repo.get("alice").await.unwrap().unwrap().suspended);

		let err = repo.set_suspended("ghost", true).await.unwrap_err();
		assert!(matches!(err, DbError::NotFound(_)));
	}

	#[tokio::test]
	async fn test_set_stats_round_trips_entry() {
		let repo = PeerRepository::new(create_test_pool().await);
		repo.insert(&make_record("alice")).await.unwrap();

		let entry = LedgerEntry {
			endpoint: Some("198.51.100.7:53211".to_string()),
			received_bytes: 1_572_864,
			sent_bytes: 512_000,
			..Default::default()
		};
		assert!(repo.set_stats("alice", &entry).await.unwrap());
		assert!(!repo.set_stats("ghost", &entry).await.unwrap());

		let stored = repo.get("alice").await.unwrap().unwrap();
		assert_eq!(stored.stats, Some(entry));
	}

	#[tokio::test]
	async fn test_delete_reports_rows() {
		let repo = PeerRepository::new(create_test_pool().await);
		repo.insert(&make_record("alice")).await.unwrap();

		assert_eq!(repo.delete("alice").await.unwrap(), 1);
		assert_eq!(repo.delete("alice").await.unwrap(), 0);
	}

	#[test]
	fn debug_hides_secret_keys() {
		let rendered = format!("{:?}", make_record("alice"));
		assert!(rendered.contains("alice-pub="));
		assert!(!rendered.contains("alice-priv="));
		assert!(!rendered.contains("alice-psk="));
	}
}
