// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Acquisition orchestrator: TCP client, generator capability interface, sweep
//! configuration, result-dataset assembly and the `run`/`fsweep` state machine for the
//! VNA sweep core's client side.

pub mod config;
pub mod dataset;
pub mod error;
pub mod generator;
pub mod orchestrator;
pub mod tcp_client;

pub use config::{FieldValue, SweepConfig, SweepMode};
pub use dataset::SweepDataset;
pub use error::Error;
pub use generator::{ConnectedGenerator, GeneratorCapabilities, GeneratorHandle, MockGenerator};
pub use orchestrator::{SweepMetadata, SweepOrchestrator};
pub use tcp_client::{Point, TcpClient};
