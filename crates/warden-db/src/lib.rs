// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SQLite-backed peer registry.

pub mod error;
pub mod peer;
pub mod pool;
pub mod schema;
pub mod testing;

pub use error::{DbError, Result};
pub use peer::{PeerRecord, PeerRepository, PeerStore};
pub use pool::create_pool;
pub use schema::migrate;
