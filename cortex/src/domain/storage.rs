// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Persistence errors shared by every store that writes to local disk.

use thiserror::Error;

/// Failure while persisting or restoring engine state.
///
/// Disk errors are surfaced as-is; the engine never retries a write.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode {what}: {reason}")]
    Encode { what: &'static str, reason: String },

    #[error("Failed to decode {what}: {reason}")]
    Decode { what: &'static str, reason: String },
}

impl StorageError {
    pub fn encode(what: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Encode { what, reason: err.to_string() }
    }

    pub fn decode(what: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Decode { what, reason: err.to_string() }
    }
}
