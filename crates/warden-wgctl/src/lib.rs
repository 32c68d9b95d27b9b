// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Subprocess control plane for the tunnel daemon.
//!
//! Every external invocation goes through a [`CommandRunner`]. The production
//! [`ProcessRunner`] applies an optional exec prefix, a concurrency gate and a
//! per-call timeout; [`testing::ScriptedRunner`] replays canned output.

pub mod daemon;
pub mod error;
pub mod keys;
pub mod runner;
pub mod status;
pub mod testing;

pub use daemon::DaemonControl;
pub use error::{Result, WgCtlError};
pub use keys::{KeyMaterial, KeyMaterialGenerator};
pub use runner::{CommandOutput, CommandRunner, ProcessRunner};
pub use status::{parse_status, StatsCollector};
