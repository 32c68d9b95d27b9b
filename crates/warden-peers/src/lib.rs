// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Peer lifecycle for a WireGuard gateway.
//!
//! [`PeerService`] composes the config file editor, the peer registry, the
//! traffic ledger and the `wg` tooling. A peer moves through
//! `absent -> active <-> suspended -> absent`; the config file is always
//! edited before the registry so a failed registry write can be retried.

mod client;
pub mod consistency;
pub mod error;
pub mod name;
pub mod outcome;
pub mod service;
pub mod stats;

pub use consistency::Finding;
pub use error::{PeerError, Result};
pub use name::NameRule;
pub use outcome::OperationOutcome;
pub use service::{PeerListing, PeerService, ProvisionedPeer, RemovalReport, StepOutcome};
pub use stats::PeerTraffic;
