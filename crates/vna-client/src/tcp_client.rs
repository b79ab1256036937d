// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Framed TCP client for the SoC wire protocol.
//!
//! The SoC server frames each config argument with a trailing `\n` (see
//! `vna_soc::server::read_decimal_argument`), so this client writes that
//! delimiter explicitly after each command byte and its ASCII argument.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use vna_protocol::{command::trigger_config_bits, Command, BYTES_PER_POINT, POINTS_PER_PACKET, RESPONSE_ERR, RESPONSE_OK};

use crate::error::Error;

/// One acquired point: `(I_dut, Q_dut, I_ref, Q_ref)`, in volts.
pub type Point = (f64, f64, f64, f64);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// A connection to one SoC server, scoped to one measurement.
pub struct TcpClient {
    stream: TcpStream,
}

impl TcpClient {
    /// Connects to `addr` and resets both trigger outputs to a known (disabled) state.
    pub fn connect(addr: SocketAddr) -> Result<Self, Error> {
        let stream = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT)?;
        stream.set_nodelay(true).ok();
        let mut client = Self { stream };
        client.send_trigger_config(0, true, false, false)?;
        client.send_trigger_config(1, true, false, false)?;
        Ok(client)
    }

    fn send_config(&mut self, cmd: Command, value: i64) -> Result<(), Error> {
        self.stream.write_all(&[cmd.byte()])?;
        self.stream.write_all(format!("{value}\n").as_bytes())?;
        self.expect_ok()
    }

    fn expect_ok(&mut self) -> Result<(), Error> {
        let mut resp = [0u8; 1];
        self.stream.read_exact(&mut resp)?;
        match resp[0] {
            RESPONSE_OK => Ok(()),
            RESPONSE_ERR => Err(Error::Protocol("server rejected command".into())),
            other => Err(Error::Protocol(format!("unexpected response byte {other:#x}"))),
        }
    }

    /// `run-PL 1`: starts PL data acquisition.
    pub fn start_acquisition(&mut self) -> Result<(), Error> {
        self.send_config(Command::RunPl, 1)
    }

    /// `run-PL 0`: stops PL data acquisition.
    pub fn stop_acquisition(&mut self) -> Result<(), Error> {
        self.send_config(Command::RunPl, 0)
    }

    /// Sends time-per-point, in seconds.
    pub fn send_tpp(&mut self, seconds: f64) -> Result<(), Error> {
        self.send_config(Command::Tpp, seconds_to_micros(seconds))
    }

    /// Sends generator dead time, in seconds.
    pub fn send_dead_time(&mut self, seconds: f64) -> Result<(), Error> {
        self.send_config(Command::DeadTime, seconds_to_micros(seconds))
    }

    /// Sends trigger pulse length, in seconds.
    pub fn send_trigger_length(&mut self, seconds: f64) -> Result<(), Error> {
        self.send_config(Command::TrigLen, seconds_to_micros(seconds))
    }

    /// Configures output trigger `trig_nr` (0 or 1). `positive` selects active-high
    /// (`true`) vs active-low; `sweep` fires once when the sweep starts; `step` fires
    /// once per subsequent point.
    pub fn send_trigger_config(&mut self, trig_nr: u8, positive: bool, sweep: bool, step: bool) -> Result<(), Error> {
        let cmd = if trig_nr == 0 { Command::Trig0Conf } else { Command::Trig1Conf };
        self.send_config(cmd, trigger_config_bits(positive, sweep, step) as i64)
    }

    /// Sets the IF multiplier (`IF = value * FCLK / 256`).
    pub fn send_if_mult(&mut self, value: u32) -> Result<(), Error> {
        self.send_config(Command::IfMult, value as i64)
    }

    /// Sets the number of points fetched per DMA transfer.
    pub fn send_points_per_transfer(&mut self, value: u32) -> Result<(), Error> {
        self.send_config(Command::Ppt, value as i64)
    }

    /// Requests one data packet and decodes it. A server that reports no data available
    /// (an idle queue) surfaces as a [`Error::Protocol`], same as any other malformed
    /// response.
    pub fn request_data(&mut self) -> Result<Vec<Point>, Error> {
        self.stream.write_all(&[Command::Data.byte()])?;
        let mut buf = vec![0u8; POINTS_PER_PACKET * BYTES_PER_POINT];
        let n = self.stream.read(&mut buf)?;
        if n == 0 || n % BYTES_PER_POINT != 0 {
            return Err(Error::Protocol(format!(
                "expected a non-zero multiple of {BYTES_PER_POINT} bytes, got {n}"
            )));
        }
        Ok(buf[..n]
            .chunks_exact(BYTES_PER_POINT)
            .map(|chunk| {
                let f = |i: usize| f64::from_be_bytes(chunk[i * 8..i * 8 + 8].try_into().unwrap());
                (f(0), f(1), f(2), f(3))
            })
            .collect())
    }

    /// Queries the current queue depth.
    pub fn get_queue_size(&mut self) -> Result<u16, Error> {
        self.stream.write_all(&[Command::QueueSize.byte()])?;
        let mut buf = [0u8; 2];
        self.stream.read_exact(&mut buf)?;
        Ok(u16::from_be_bytes(buf))
    }

    /// Queries the server's CPU temperature, in degrees Celsius.
    pub fn get_server_cpu_temp(&mut self) -> Result<f64, Error> {
        self.stream.write_all(&[Command::CpuTemp.byte()])?;
        let mut buf = [0u8; 8];
        self.stream.read_exact(&mut buf)?;
        Ok(f64::from_be_bytes(buf))
    }

    /// Stops the SoC server entirely. Only intended for debugging/teardown, never called
    /// as part of a normal sweep.
    pub fn stop_server(&mut self) -> Result<(), Error> {
        self.stream.write_all(&[Command::StopServer.byte()])?;
        self.expect_ok()
    }
}

/// Converts seconds to whole microseconds, truncating rather than rounding so the
/// PL-side clock-cycle arithmetic (`micros * FCLK`) never silently rounds a value the
/// caller explicitly chose to round down.
fn seconds_to_micros(seconds: f64) -> i64 {
    (seconds * 1.0e6).trunc() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seconds_to_micros_truncates_not_rounds() {
        assert_eq!(seconds_to_micros(1.0e-3), 1000);
        assert_eq!(seconds_to_micros(100.0e-6), 100);
        assert_eq!(seconds_to_micros(1.9999e-6), 1);
    }
}
