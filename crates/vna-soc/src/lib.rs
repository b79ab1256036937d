// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! SoC-side PL interface, DMA pipeline, bounded point queue and single-client
//! TCP server for the VNA sweep core.

pub mod dma;
pub mod error;
pub mod mmio_adapter;
pub mod pl;
pub mod queue;
pub mod server;
pub mod sysinfo;

pub use dma::{DmaChannel, SimDmaChannel};
pub use error::Error;
pub use mmio_adapter::{MmioAdapter, RegisterFile, SimRegisterFile};
pub use pl::PlInterface;
pub use queue::{Point, PointQueue};
pub use server::Server;
