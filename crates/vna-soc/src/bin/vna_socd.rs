// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! vna-socd - SoC-side VNA server daemon
//!
//! Owns the programmable logic (register file + DMA channel) and serves
//! exactly one TCP client for its lifetime, per the wire protocol in
//! `vna_protocol::command`.

use clap::Parser;
use vna_protocol::TCP_PORT;
use vna_soc::{PlInterface, Server, SimDmaChannel, SimRegisterFile};

/// VNA SoC server daemon
#[derive(Parser, Debug)]
#[command(name = "vna-socd")]
#[command(version)]
#[command(about = "Serves the wire protocol against the PL's MMIO registers and DMA channel")]
struct Args {
    /// TCP port to listen on
    #[arg(short, long, default_value_t = TCP_PORT)]
    port: u16,

    /// Points fetched per DMA transfer
    #[arg(long, default_value_t = 1)]
    points_per_transfer: usize,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    // Real deployments swap these for a memory-mapped Zynq overlay and DMA engine;
    // this binary only has the in-process simulators available.
    let mut pl = PlInterface::new(SimRegisterFile::new(), SimDmaChannel::new());
    if let Err(e) = pl.set_points_per_transfer(args.points_per_transfer) {
        eprintln!("failed to configure points-per-transfer: {e}");
        std::process::exit(1);
    }

    let server = Server::new(pl, args.port);
    if let Err(e) = server.run() {
        eprintln!("server error: {e}");
        std::process::exit(1);
    }
}
