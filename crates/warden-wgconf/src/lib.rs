// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Editing of the daemon's plaintext WireGuard configuration.
//!
//! The file is parsed into a [`ConfigDocument`], an ordered list of peer blocks
//! and opaque text that renders back byte-for-byte. All structural changes go
//! through [`ConfigFileEditor`], which serializes writers, takes a scratch
//! backup before writing and restores it when the write fails.

pub mod allocator;
pub mod document;
pub mod editor;
pub mod error;
pub mod peer_block;
pub mod rules;

pub use allocator::IpAllocator;
pub use document::{Block, ConfigDocument, PeerSummary};
pub use editor::ConfigFileEditor;
pub use error::{Result, WgConfError};
pub use peer_block::{PeerBlock, PeerState};
pub use rules::{ClassBlockingState, RuleBlock, RuleDirective, RuleHook};
