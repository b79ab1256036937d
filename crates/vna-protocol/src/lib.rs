// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Wire protocol and PL register map shared by the VNA sweep client and SoC server.
//!
//! This crate has no I/O of its own: it only describes the ASCII/binary
//! command protocol (`command`) and the bit-field-packed MMIO register
//! map (`mmio`) that both sides of the wire agree on.

pub mod command;
pub mod mmio;

pub use command::{Command, BYTES_PER_POINT, POINTS_PER_PACKET, RESPONSE_ERR, RESPONSE_OK, TCP_PORT};
pub use mmio::{Error, FieldDescriptor, RegisterIndex, FCLK, RAW_TO_VOLTS};
