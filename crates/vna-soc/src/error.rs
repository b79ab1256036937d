// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! SoC-side error taxonomy.

use thiserror::Error;

/// Errors surfaced by the PL interface, DMA pipeline and TCP server.
#[derive(Debug, Error)]
pub enum Error {
    /// A DMA transfer was attempted while the PL is disabled.
    #[error(transparent)]
    Dma(#[from] crate::dma::Error),

    /// An MMIO field write/read failed (unknown command or out-of-range value).
    #[error(transparent)]
    Mmio(#[from] vna_protocol::Error),

    /// `verify_config` found the current MMIO configuration would hang the PL.
    #[error("PL configuration failed verification: {0}")]
    PlVerification(String),

    /// A command's ASCII integer argument could not be parsed off the wire.
    #[error("malformed command argument: {0}")]
    MalformedArgument(String),

    /// Underlying socket I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
