// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The sweep orchestrator: readiness checks, the `run`/`fsweep` state machine and result
//! assembly.
//!
//! [`SweepOrchestrator`] owns the generators, the SoC connection factory and the
//! single `running` latch, keeping [`crate::config::SweepConfig`] a plain,
//! serializable value: one owning resource rather than free-floating process
//! globals.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::config::{SweepConfig, SweepMode};
use crate::dataset::{self, SweepDataset};
use crate::error::Error;
use crate::generator::{ConnectedGenerator, GeneratorHandle};
use crate::tcp_client::TcpClient;

/// Generator ping RTT above which readiness is either a warning or a hard failure,
/// depending on [`SweepOrchestrator::fail_on_warning`].
const PING_WARN_THRESHOLD: Duration = Duration::from_millis(20);

/// Timing and CPU-temperature bookkeeping recorded around one sweep.
#[derive(Debug, Clone, Copy)]
pub struct SweepMetadata {
    pub start_time: Instant,
    pub stop_time: Instant,
    pub start_temperature_c: f64,
    pub stop_temperature_c: f64,
}

/// Drives one measurement: sequences generator configuration, triggers and SoC requests,
/// then reassembles the point stream into a dataset.
///
/// Not `Clone`/`Sync`: one orchestrator drives at most one sweep at a time, enforced by
/// [`running`](Self::running) rather than by requiring external mutual exclusion.
pub struct SweepOrchestrator {
    config: SweepConfig,
    gen_rf: Box<dyn GeneratorHandle>,
    gen_lo: Box<dyn GeneratorHandle>,
    gen_clk: Option<Box<dyn GeneratorHandle>>,
    running: AtomicBool,
    /// If `false`, a readiness warning (high ping, missing clock generator) is logged but
    /// does not fail the sweep; if `true`, the same conditions are fatal.
    pub fail_on_warning: bool,
}

impl SweepOrchestrator {
    /// Builds an orchestrator around a configuration and its generator handles.
    ///
    /// `gen_clk` absent means an external clock is assumed; a warning is emitted at
    /// readiness time.
    pub fn new(
        config: SweepConfig,
        gen_rf: Box<dyn GeneratorHandle>,
        gen_lo: Box<dyn GeneratorHandle>,
        gen_clk: Option<Box<dyn GeneratorHandle>>,
    ) -> Self {
        Self {
            config,
            gen_rf,
            gen_lo,
            gen_clk,
            running: AtomicBool::new(false),
            fail_on_warning: true,
        }
    }

    /// True while a `run()` is in progress.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Read-only access to the current configuration. Mutate only while not running; the
    /// invariant that a config is never mutated mid-sweep is enforced at [`run`](Self::run)'s
    /// entry rather than by making the config unreachable while running, since no other
    /// caller can reach `&mut self` concurrently in a single-threaded orchestrator.
    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    /// Runs the configured sweep to completion, blocking the calling thread.
    ///
    /// Fails immediately with [`Error::AlreadyRunning`] if another `run()` is already in
    /// progress on this orchestrator, before any generator or TCP activity occurs.
    /// Dispatches on `sweep_mode`; only [`SweepMode::Frequency`] has an executable path.
    pub fn run(&mut self) -> Result<(SweepDataset, SweepMetadata), Error> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadyRunning);
        }
        let result = self.run_inner();
        self.running.store(false, Ordering::SeqCst);
        result
    }

    fn run_inner(&mut self) -> Result<(SweepDataset, SweepMetadata), Error> {
        let mode = self.config.sweep_mode.ok_or_else(|| Error::Config("sweep_mode not set".into()))?;
        if mode != SweepMode::Frequency {
            return Err(Error::Unimplemented(mode));
        }
        self.ready_checks()?;
        self.fsweep()
    }

    /// Pre-flight validation: required fields, clock-generator warning, ping RTT,
    /// capability checks and the timestep/dead-time/trigger-length bound.
    ///
    /// Does not open any connection; every check here is local or a lightweight ping
    /// probe, so a failed check never leaves a generator or the SoC in a
    /// half-configured state.
    fn ready_checks(&mut self) -> Result<(), Error> {
        let start_freq = self.config.start_freq.ok_or_else(|| Error::Config("start_freq not set".into()))?;
        let stop_freq = self.config.stop_freq.ok_or_else(|| Error::Config("stop_freq not set".into()))?;
        let power = self.config.power.ok_or_else(|| Error::Config("power not set".into()))?;
        let points = self.config.points.ok_or_else(|| Error::Config("points not set".into()))?;
        let timestep = self.config.timestep.ok_or_else(|| Error::Config("timestep not set".into()))?;
        if points == 0 {
            return Err(Error::Config("points must be >= 1".into()));
        }
        let _ = (start_freq, stop_freq, power);

        if self.gen_clk.is_none() {
            log::warn!("[orchestrator] no clock generator configured; assuming an external clock");
        }

        for gen in [self.gen_rf.as_ref(), self.gen_lo.as_ref()] {
            self.check_ping(gen)?;
        }
        if let Some(clk) = &self.gen_clk {
            self.check_ping(clk.as_ref())?;
        }

        let rf_caps = self.gen_rf.capabilities();
        let lo_caps = self.gen_lo.capabilities();
        if !rf_caps.operations.fsweep {
            return Err(Error::Readiness("RF generator does not support fsweep".into()));
        }
        if !lo_caps.operations.fsweep {
            return Err(Error::Readiness("LO generator does not support fsweep".into()));
        }
        if let Some(clk) = &self.gen_clk {
            if !clk.capabilities().operations.continuous_wave {
                return Err(Error::Readiness("clock generator does not support continuous_wave".into()));
            }
        }

        let deadtime = rf_caps.dead_time.max(lo_caps.dead_time);
        let triglen = rf_caps.trigger.length.max(lo_caps.trigger.length);
        if !(timestep > deadtime) {
            return Err(Error::Config(format!(
                "timestep ({timestep}s) must exceed the generators' dead time ({deadtime}s)"
            )));
        }
        if !(timestep > triglen) {
            return Err(Error::Config(format!(
                "timestep ({timestep}s) must exceed the generators' trigger pulse length ({triglen}s)"
            )));
        }

        Ok(())
    }

    fn check_ping(&self, gen: &dyn GeneratorHandle) -> Result<(), Error> {
        let Some(rtt) = gen.network_ping_rtt() else {
            return Ok(());
        };
        if rtt >= PING_WARN_THRESHOLD {
            let msg = format!("{} ping RTT {rtt:?} exceeds {PING_WARN_THRESHOLD:?}", gen.name());
            if self.fail_on_warning {
                return Err(Error::Readiness(msg));
            }
            log::warn!("[orchestrator] {msg}");
        }
        Ok(())
    }

    /// Executes one frequency sweep: programs all three generators, enables outputs in
    /// order, streams points off the SoC into an N×4 matrix, then powers everything down
    /// in reverse order regardless of how the measurement ends.
    ///
    /// Nested scopes guarantee generators and the SoC connection are released on every
    /// exit path, in reverse acquisition order.
    fn fsweep(&mut self) -> Result<(SweepDataset, SweepMetadata), Error> {
        let start_freq = self.config.start_freq.unwrap();
        let stop_freq = self.config.stop_freq.unwrap();
        let power = self.config.power.unwrap();
        let points = self.config.points.unwrap();
        let timestep = self.config.timestep.unwrap();
        let ifreq = self.config.ifreq;
        let lo_power = self.config.lo_power;
        let socclk_freq = self.config.socclk_freq;
        let socclk_power = self.config.socclk_power;
        let addr_soc = self.config.addr_soc;

        let rf_caps = self.gen_rf.capabilities();
        let lo_caps = self.gen_lo.capabilities();
        let deadtime = rf_caps.dead_time.max(lo_caps.dead_time);
        let triglen = rf_caps.trigger.length.max(lo_caps.trigger.length);

        let mut clk_guard = match &mut self.gen_clk {
            Some(clk) => Some(ConnectedGenerator::acquire(clk.as_mut())?),
            None => None,
        };
        let mut lo_guard = ConnectedGenerator::acquire(self.gen_lo.as_mut())?;
        let mut rf_guard = ConnectedGenerator::acquire(self.gen_rf.as_mut())?;

        let outcome = (|| -> Result<(SweepDataset, SweepMetadata), Error> {
            // Programming order: RF -> LO -> clock.
            rf_guard
                .fsweep(start_freq, stop_freq, power, points, timestep)
                .map_err(|e| Error::Generator(format!("RF fsweep: {e}")))?;
            lo_guard
                .fsweep(start_freq + ifreq, stop_freq + ifreq, lo_power, points, timestep)
                .map_err(|e| Error::Generator(format!("LO fsweep: {e}")))?;
            if let Some(clk) = &mut clk_guard {
                clk.continuous_wave(socclk_freq, socclk_power)
                    .map_err(|e| Error::Generator(format!("clock continuous_wave: {e}")))?;
                // Clock must be up before the SoC sees configuration.
                clk.rf_on().map_err(|e| Error::Generator(format!("clock rf_on: {e}")))?;
            }

            let mut soc = TcpClient::connect(addr_soc)?;
            soc.send_tpp(timestep)?;
            soc.send_dead_time(deadtime)?;
            soc.send_trigger_length(triglen)?;
            let rf_trig = rf_caps.trigger;
            let lo_trig = lo_caps.trigger;
            soc.send_trigger_config(0, rf_trig.polarity, rf_trig.fires_at_start, rf_trig.fires_per_point)?;
            soc.send_trigger_config(1, lo_trig.polarity, lo_trig.fires_at_start, lo_trig.fires_per_point)?;

            let mut matrix: Vec<(f64, f64, f64, f64)> = Vec::with_capacity(points as usize);
            let start_temperature = soc.get_server_cpu_temp().unwrap_or(f64::NAN);
            let start_time = Instant::now();

            // Enabling order: RF -> LO -> SoC.
            rf_guard.rf_on().map_err(|e| Error::Generator(format!("RF rf_on: {e}")))?;
            lo_guard.rf_on().map_err(|e| Error::Generator(format!("LO rf_on: {e}")))?;
            soc.start_acquisition()?;

            let run_result = (|| -> Result<(), Error> {
                while matrix.len() < points as usize {
                    let received = soc.request_data()?;
                    let remaining = points as usize - matrix.len();
                    let take = received.len().min(remaining);
                    matrix.extend_from_slice(&received[..take]);
                }
                Ok(())
            })();

            soc.stop_acquisition().ok();
            // Disabling order: reverse of enabling, plus clock last.
            rf_guard.rf_off().map_err(|e| Error::Generator(format!("RF rf_off: {e}")))?;
            lo_guard.rf_off().map_err(|e| Error::Generator(format!("LO rf_off: {e}")))?;
            run_result?;

            let stop_temperature = soc.get_server_cpu_temp().unwrap_or(f64::NAN);
            let stop_time = Instant::now();
            if let Some(clk) = &mut clk_guard {
                clk.rf_off().map_err(|e| Error::Generator(format!("clock rf_off: {e}")))?;
            }

            let t: Vec<f64> = (0..points).map(|k| k as f64 * timestep).collect();
            let f = linspace(start_freq, stop_freq, points as usize);
            let dataset = dataset::expand_data(t, f, &matrix);

            Ok((
                dataset,
                SweepMetadata {
                    start_time,
                    stop_time,
                    start_temperature_c: start_temperature,
                    stop_temperature_c: stop_temperature,
                },
            ))
        })();

        outcome
    }
}

/// `N` points linearly spaced from `start` to `stop` inclusive.
fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    if n <= 1 {
        return vec![start; n];
    }
    let step = (stop - start) / (n - 1) as f64;
    (0..n).map(|k| start + k as f64 * step).collect()
}
