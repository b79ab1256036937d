// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! vna-sweep - runs one frequency sweep against an SoC server and prints a summary.
//!
//! `--mock` drives the sweep entirely against [`vna_client::MockGenerator`]s, for
//! demonstration without any attached hardware; the SoC address is still required and
//! must point at a running `vna-socd` (see `crates/vna-soc`).

use std::net::SocketAddr;

use clap::Parser;
use vna_client::{GeneratorHandle, MockGenerator, SweepConfig, SweepOrchestrator};

/// Runs a frequency sweep against a VNA SoC server.
#[derive(Parser, Debug)]
#[command(name = "vna-sweep")]
#[command(version)]
struct Args {
    /// SoC server address, e.g. 192.168.1.10:2024
    #[arg(long)]
    soc: SocketAddr,

    /// Load sweep configuration from a TOML file instead of the flags below
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    /// Sweep start frequency, Hz
    #[arg(long)]
    start_freq: Option<f64>,

    /// Sweep stop frequency, Hz
    #[arg(long)]
    stop_freq: Option<f64>,

    /// RF generator power, dBm
    #[arg(long, default_value_t = -5.0)]
    power: f64,

    /// Number of points
    #[arg(long)]
    points: Option<u32>,

    /// Time per point, seconds
    #[arg(long, default_value_t = 5.0e-3)]
    timestep: f64,

    /// Drive the sweep against in-process mock generators instead of real instruments
    #[arg(long)]
    mock: bool,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => match SweepConfig::from_file(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("failed to load config {}: {e}", path.display());
                std::process::exit(1);
            }
        },
        None => SweepConfig::new(args.soc),
    };

    if args.config.is_none() {
        let (Some(start), Some(stop), Some(points)) = (args.start_freq, args.stop_freq, args.points) else {
            eprintln!("--start-freq, --stop-freq and --points are required without --config");
            std::process::exit(2);
        };
        if let Err(e) = config.set_fsweep(start, stop, args.power, None, Some(points), None, Some(args.timestep), None) {
            eprintln!("invalid sweep configuration: {e}");
            std::process::exit(2);
        }
    }

    if !args.mock {
        eprintln!("only --mock is wired up in this demonstration binary; real SCPI drivers are out of scope");
        std::process::exit(2);
    }

    let gen_rf: Box<dyn GeneratorHandle> = Box::new(MockGenerator::new("rf"));
    let gen_lo: Box<dyn GeneratorHandle> = Box::new(MockGenerator::new("lo"));
    let gen_clk: Box<dyn GeneratorHandle> = Box::new(MockGenerator::new("clk"));

    let mut orchestrator = SweepOrchestrator::new(config, gen_rf, gen_lo, Some(gen_clk));
    match orchestrator.run() {
        Ok((dataset, meta)) => {
            let elapsed = meta.stop_time.duration_since(meta.start_time);
            println!(
                "sweep complete: {} points in {elapsed:?} (soc temp {:.1}C -> {:.1}C)",
                dataset.f.len(),
                meta.start_temperature_c,
                meta.stop_temperature_c
            );
            if let (Some(&f0), Some(&s0)) = (dataset.f.first(), dataset.s21_mag_db.first()) {
                println!("first point: f={f0:.3e} Hz, |S21|={s0:.2} dB");
            }
        }
        Err(e) => {
            eprintln!("sweep failed: {e}");
            std::process::exit(1);
        }
    }
}
