// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Client-side error taxonomy.

use thiserror::Error;

/// Errors surfaced by sweep configuration, readiness checks, the TCP client and the
/// sweep orchestrator.
#[derive(Debug, Error)]
pub enum Error {
    /// A required configuration field was missing, or an MMIO-range check failed.
    #[error("configuration error: {0}")]
    Config(String),

    /// More than one (or none) of a mutually-exclusive parameter group was given.
    #[error("ambiguous or missing sweep parameters")]
    AmbiguousParameters,

    /// A sweep mode has a configuration surface but no executable path yet.
    #[error("sweep mode {0:?} is not implemented")]
    Unimplemented(crate::config::SweepMode),

    /// A `run()` was requested while another sweep is already in progress.
    #[error("VNA is currently running a measurement")]
    AlreadyRunning,

    /// Server response violated the wire protocol (wrong length, unexpected status byte).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A readiness check (ping, capability, timing bound) failed.
    #[error("readiness check failed: {0}")]
    Readiness(String),

    /// Underlying socket I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A generator reported a failure performing a requested operation.
    #[error("generator error: {0}")]
    Generator(String),
}
