// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Generator capability interface.
//!
//! Models the capability set as a trait plus a plain `GeneratorCapabilities`
//! struct, so real and mock drivers are interchangeable without a closed match.
//! `network_ping_rtt()` is a TCP-connect timing probe against the generator's
//! own resource address rather than an ICMP ping, which would need raw sockets.

use std::net::{SocketAddr, TcpStream};
use std::time::{Duration, Instant};

use crate::error::Error;

/// Which sweep-style operations a generator supports.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeneratorOperations {
    pub continuous_wave: bool,
    pub fsweep: bool,
    pub psweep: bool,
}

/// Characteristics of the trigger pulse a generator emits.
#[derive(Debug, Clone, Copy)]
pub struct TriggerCapabilities {
    /// Pulse length, in seconds.
    pub length: f64,
    /// `true` for active-high, `false` for active-low.
    pub polarity: bool,
    /// Fires once when the sweep starts.
    pub fires_at_start: bool,
    /// Fires once per subsequent point.
    pub fires_per_point: bool,
}

/// A generator's reported capability set, queried once during readiness checks.
#[derive(Debug, Clone, Copy)]
pub struct GeneratorCapabilities {
    pub operations: GeneratorOperations,
    /// Dead time between a frequency/power switch and a usable measurement, in seconds.
    pub dead_time: f64,
    pub trigger: TriggerCapabilities,
}

/// A connected RF, LO or clock signal generator.
///
/// A real deployment backs this with a SCPI-over-VISA or SCPI-over-TCP instrument driver;
/// [`MockGenerator`] stands in for tests and the offline demonstration binary.
pub trait GeneratorHandle: Send {
    /// Identifying name, typically the resource address or a queried `*IDN?`.
    fn name(&self) -> &str;

    /// Network address used for [`network_ping_rtt`](Self::network_ping_rtt)'s default
    /// TCP probe. `None` if this handle isn't network-addressable (e.g. a mock).
    fn resource_addr(&self) -> Option<SocketAddr>;

    fn capabilities(&self) -> GeneratorCapabilities;

    /// Configures a fixed frequency and power.
    fn continuous_wave(&mut self, freq_hz: f64, power_dbm: f64) -> Result<(), Error>;

    /// Configures a hardware frequency sweep.
    fn fsweep(
        &mut self,
        start_freq_hz: f64,
        stop_freq_hz: f64,
        power_dbm: f64,
        points: u32,
        timestep_s: f64,
    ) -> Result<(), Error>;

    /// Configures a hardware power sweep.
    fn psweep(
        &mut self,
        freq_hz: f64,
        start_power_dbm: f64,
        stop_power_dbm: f64,
        points: u32,
        timestep_s: f64,
    ) -> Result<(), Error>;

    /// Sends a raw SCPI query and returns the instrument's response.
    fn query(&mut self, parameter: &str) -> Result<String, Error>;

    /// Turns on RF output and starts the programmed sequence.
    fn rf_on(&mut self) -> Result<(), Error>;

    /// Stops the programmed sequence and turns off RF output.
    fn rf_off(&mut self) -> Result<(), Error>;

    /// Configures external trigger acceptance.
    fn configure_trigger(&mut self, enabled: Option<bool>, on_each_point: Option<bool>) -> Result<(), Error>;

    /// Establishes the connection (called once before any other method).
    fn connect(&mut self) -> Result<(), Error>;

    /// Tears the connection down (called once, even if an earlier method failed).
    fn disconnect(&mut self) -> Result<(), Error>;

    /// Round trip time to [`resource_addr`](Self::resource_addr), if reachable.
    fn network_ping_rtt(&self) -> Option<Duration> {
        let addr = self.resource_addr()?;
        let start = Instant::now();
        TcpStream::connect_timeout(&addr, Duration::from_millis(500)).ok()?;
        Some(start.elapsed())
    }
}

/// Holds a generator handle connected for the lifetime of the guard, disconnecting on drop.
pub struct ConnectedGenerator<'a> {
    handle: &'a mut dyn GeneratorHandle,
}

impl<'a> ConnectedGenerator<'a> {
    pub fn acquire(handle: &'a mut dyn GeneratorHandle) -> Result<Self, Error> {
        handle.connect()?;
        Ok(Self { handle })
    }
}

impl<'a> Drop for ConnectedGenerator<'a> {
    fn drop(&mut self) {
        if let Err(e) = self.handle.disconnect() {
            log::warn!("[generator] {} failed to disconnect cleanly: {e}", self.handle.name());
        }
    }
}

impl<'a> std::ops::Deref for ConnectedGenerator<'a> {
    type Target = dyn GeneratorHandle + 'a;
    fn deref(&self) -> &Self::Target {
        self.handle
    }
}

impl<'a> std::ops::DerefMut for ConnectedGenerator<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.handle
    }
}

/// A trivial generator for tests and the offline demonstration binary: reports full
/// capabilities and a small (but wire-representable) dead time, and every operation is
/// a no-op.
pub struct MockGenerator {
    name: String,
    connected: bool,
}

impl MockGenerator {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            connected: false,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }
}

impl GeneratorHandle for MockGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    fn resource_addr(&self) -> Option<SocketAddr> {
        None
    }

    fn capabilities(&self) -> GeneratorCapabilities {
        GeneratorCapabilities {
            operations: GeneratorOperations {
                continuous_wave: true,
                fsweep: true,
                psweep: true,
            },
            dead_time: 5e-6,
            trigger: TriggerCapabilities {
                length: 10e-6,
                polarity: true,
                fires_at_start: true,
                fires_per_point: true,
            },
        }
    }

    fn continuous_wave(&mut self, _freq_hz: f64, _power_dbm: f64) -> Result<(), Error> {
        Ok(())
    }

    fn fsweep(&mut self, _start_freq_hz: f64, _stop_freq_hz: f64, _power_dbm: f64, _points: u32, _timestep_s: f64) -> Result<(), Error> {
        Ok(())
    }

    fn psweep(&mut self, _freq_hz: f64, _start_power_dbm: f64, _stop_power_dbm: f64, _points: u32, _timestep_s: f64) -> Result<(), Error> {
        Ok(())
    }

    fn query(&mut self, parameter: &str) -> Result<String, Error> {
        Ok(if parameter == "*IDN?" {
            "mocked_generator".to_string()
        } else {
            "-1".to_string()
        })
    }

    fn rf_on(&mut self) -> Result<(), Error> {
        Ok(())
    }

    fn rf_off(&mut self) -> Result<(), Error> {
        Ok(())
    }

    fn configure_trigger(&mut self, _enabled: Option<bool>, _on_each_point: Option<bool>) -> Result<(), Error> {
        Ok(())
    }

    fn connect(&mut self) -> Result<(), Error> {
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), Error> {
        self.connected = false;
        Ok(())
    }

    fn network_ping_rtt(&self) -> Option<Duration> {
        Some(Duration::from_nanos(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_reports_full_capabilities() {
        let gen = MockGenerator::new("bench-rf");
        let caps = gen.capabilities();
        assert!(caps.operations.fsweep);
        assert!(caps.operations.psweep);
        assert!(caps.operations.continuous_wave);
        assert!(caps.dead_time < 1e-5);
    }

    #[test]
    fn mock_ping_is_always_fast() {
        let gen = MockGenerator::new("bench-rf");
        assert!(gen.network_ping_rtt().unwrap() < Duration::from_millis(1));
    }

    #[test]
    fn connected_generator_guard_connects_and_disconnects() {
        let mut gen = MockGenerator::new("bench-rf");
        {
            let guard = ConnectedGenerator::acquire(&mut gen).unwrap();
            assert_eq!(guard.name(), "bench-rf");
        }
        assert!(!gen.is_connected());
    }
}
