// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Sweep configuration: the semantic parameters of a measurement, independent of which
//! generators or SoC eventually run it.
//!
//! Generator ownership and the readiness/run state machine live on
//! [`crate::orchestrator::SweepOrchestrator`] instead, keeping this type plain,
//! `Serialize`/`Deserialize` data.

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Which kind of sweep a [`SweepConfig`] is set up to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepMode {
    Frequency,
    Power,
    ContinuousWave,
    Time,
    TwoD,
    Table,
}

/// A settable value for [`SweepConfig::set_field`].
#[derive(Debug, Clone, Copy)]
pub enum FieldValue {
    F64(f64),
    U32(u32),
}

/// Hardware and sweep parameters for one measurement.
///
/// Constructed via [`SweepConfig::new`] and one of [`set_fsweep`](Self::set_fsweep),
/// [`set_psweep`](Self::set_psweep) or [`set_cw`](Self::set_cw); each setter validates its
/// mutually-exclusive argument groups eagerly and leaves the config untouched on error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    pub addr_soc: SocketAddr,
    pub sweep_mode: Option<SweepMode>,

    /// [Hz] Start frequency of the RF generator, for a frequency sweep.
    pub start_freq: Option<f64>,
    /// [Hz] Stop frequency of the RF generator, for a frequency sweep.
    pub stop_freq: Option<f64>,
    /// [Hz] Fixed frequency of the RF generator, if sweeping some other parameter.
    pub freq: Option<f64>,

    /// [dBm] Start power of the RF generator, for a power sweep.
    pub start_power: Option<f64>,
    /// [dBm] Stop power of the RF generator, for a power sweep.
    pub stop_power: Option<f64>,
    /// [dBm] Fixed power of the RF generator, if sweeping some other parameter.
    pub power: Option<f64>,

    /// Number of points in a 1D sweep.
    pub points: Option<u32>,
    /// Number of powers to test in a 2D sweep.
    pub power_points: Option<u32>,
    /// [s] Measurement time before switching frequency/power, including dead time.
    pub timestep: Option<f64>,

    /// [Hz] Intermediate frequency used by the VNA.
    #[serde(default = "default_ifreq")]
    pub ifreq: f64,
    /// [dBm] Power of the LO generator.
    #[serde(default = "default_lo_power")]
    pub lo_power: f64,
    /// [Hz] Frequency of the SoC clock.
    #[serde(default = "default_socclk_freq")]
    pub socclk_freq: f64,
    /// [dBm] Power of the SoC clock.
    #[serde(default = "default_socclk_power")]
    pub socclk_power: f64,
}

fn default_ifreq() -> f64 {
    7.8125e6
}
fn default_lo_power() -> f64 {
    23.0
}
fn default_socclk_freq() -> f64 {
    125e6
}
fn default_socclk_power() -> f64 {
    10.0
}

impl SweepConfig {
    /// An unconfigured config pointed at `addr_soc`; call a `set_*` method before running it.
    pub fn new(addr_soc: SocketAddr) -> Self {
        Self {
            addr_soc,
            sweep_mode: None,
            start_freq: None,
            stop_freq: None,
            freq: None,
            start_power: None,
            stop_power: None,
            power: None,
            points: None,
            power_points: None,
            timestep: None,
            ifreq: default_ifreq(),
            lo_power: default_lo_power(),
            socclk_freq: default_socclk_freq(),
            socclk_power: default_socclk_power(),
        }
    }

    /// Reads and validates a config from a TOML file.
    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), Error> {
        if self.sweep_mode.is_none() {
            return Err(Error::Config("sweep_mode not set".into()));
        }
        Ok(())
    }

    /// Sets any configuration field by name, rejecting protected (`_`-prefixed, there are
    /// none on this struct, but the check exists so a future derived field stays
    /// protected) and unknown names rather than allowing a typo'd key silently through.
    pub fn set_field(&mut self, key: &str, value: FieldValue) -> Result<(), Error> {
        if key.starts_with('_') {
            return Err(Error::Config(format!("cannot set protected field `{key}`")));
        }
        match (key, value) {
            ("start_freq", FieldValue::F64(v)) => self.start_freq = Some(v),
            ("stop_freq", FieldValue::F64(v)) => self.stop_freq = Some(v),
            ("freq", FieldValue::F64(v)) => self.freq = Some(v),
            ("start_power", FieldValue::F64(v)) => self.start_power = Some(v),
            ("stop_power", FieldValue::F64(v)) => self.stop_power = Some(v),
            ("power", FieldValue::F64(v)) => self.power = Some(v),
            ("timestep", FieldValue::F64(v)) => self.timestep = Some(v),
            ("ifreq", FieldValue::F64(v)) => self.ifreq = v,
            ("lo_power", FieldValue::F64(v)) => self.lo_power = v,
            ("socclk_freq", FieldValue::F64(v)) => self.socclk_freq = v,
            ("socclk_power", FieldValue::F64(v)) => self.socclk_power = v,
            ("points", FieldValue::U32(v)) => self.points = Some(v),
            ("power_points", FieldValue::U32(v)) => self.power_points = Some(v),
            _ => return Err(Error::Config(format!("unknown or mismatched-type field `{key}`"))),
        }
        Ok(())
    }

    /// Sets up a frequency sweep. Exactly one of (`timestep`, `ifbw`) and exactly one of
    /// (`freqstep`, `points`, `time`) must be given; violating either raises
    /// [`Error::AmbiguousParameters`] and leaves the config unchanged.
    #[allow(clippy::too_many_arguments)]
    pub fn set_fsweep(
        &mut self,
        start_freq: f64,
        mut stop_freq: f64,
        power: f64,
        freqstep: Option<f64>,
        points: Option<u32>,
        time: Option<f64>,
        timestep: Option<f64>,
        ifbw: Option<f64>,
    ) -> Result<(), Error> {
        let timestep = resolve_timestep(timestep, ifbw)?;
        let points = match (freqstep, points, time) {
            (Some(step), None, None) => {
                let points_in_range = (stop_freq - start_freq) / step;
                let n = points_in_range.ceil() as u32;
                if points_in_range.fract() != 0.0 {
                    log::warn!("[config] adjusting stop frequency to fit frequency step evenly");
                    stop_freq = start_freq + n as f64 * step;
                }
                n
            }
            (None, Some(p), None) => p,
            (None, None, Some(t)) => (t / timestep).round() as u32,
            _ => return Err(Error::AmbiguousParameters),
        };

        self.start_freq = Some(start_freq);
        self.stop_freq = Some(stop_freq);
        self.power = Some(power);
        self.sweep_mode = Some(SweepMode::Frequency);
        self.timestep = Some(timestep);
        self.points = Some(points);
        Ok(())
    }

    /// Sets up a power sweep. A frequency/power step argument is deliberately not
    /// offered here: unlike a frequency sweep, a power step makes the point count
    /// ambiguous to round sensibly.
    pub fn set_psweep(
        &mut self,
        freq: f64,
        start_power: f64,
        stop_power: f64,
        points: Option<u32>,
        time: Option<f64>,
        timestep: Option<f64>,
        ifbw: Option<f64>,
    ) -> Result<(), Error> {
        let timestep = resolve_timestep(timestep, ifbw)?;
        let points = resolve_point_count(points, time, timestep)?;

        self.freq = Some(freq);
        self.start_power = Some(start_power);
        self.stop_power = Some(stop_power);
        self.sweep_mode = Some(SweepMode::Power);
        self.timestep = Some(timestep);
        self.points = Some(points);
        Ok(())
    }

    /// Sets up a fixed-frequency, fixed-power continuous wave measurement.
    pub fn set_cw(
        &mut self,
        freq: f64,
        power: f64,
        points: Option<u32>,
        time: Option<f64>,
        timestep: Option<f64>,
        ifbw: Option<f64>,
    ) -> Result<(), Error> {
        let timestep = resolve_timestep(timestep, ifbw)?;
        let points = resolve_point_count(points, time, timestep)?;

        self.freq = Some(freq);
        self.power = Some(power);
        self.sweep_mode = Some(SweepMode::ContinuousWave);
        self.timestep = Some(timestep);
        self.points = Some(points);
        Ok(())
    }
}

fn resolve_timestep(timestep: Option<f64>, ifbw: Option<f64>) -> Result<f64, Error> {
    match (timestep, ifbw) {
        (Some(t), None) => Ok(t),
        (None, Some(bw)) => Ok(1.0 / bw),
        _ => Err(Error::AmbiguousParameters),
    }
}

fn resolve_point_count(points: Option<u32>, time: Option<f64>, timestep: f64) -> Result<u32, Error> {
    match (points, time) {
        (Some(p), None) => Ok(p),
        (None, Some(t)) => Ok((t / timestep).round() as u32),
        _ => Err(Error::AmbiguousParameters),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> SocketAddr {
        "127.0.0.1:2024".parse().unwrap()
    }

    #[test]
    fn fsweep_with_points_sets_exact_count() {
        let mut cfg = SweepConfig::new(addr());
        cfg.set_fsweep(1.0e9, 9.0e9, -5.0, None, Some(50), None, Some(5.0e-3), None)
            .unwrap();
        assert_eq!(cfg.points, Some(50));
        assert_eq!(cfg.sweep_mode, Some(SweepMode::Frequency));
    }

    #[test]
    fn fsweep_rejects_ambiguous_timestep_group() {
        let mut cfg = SweepConfig::new(addr());
        let err = cfg
            .set_fsweep(1.0e9, 9.0e9, -5.0, None, Some(50), None, Some(5.0e-3), Some(1.0e3))
            .unwrap_err();
        assert!(matches!(err, Error::AmbiguousParameters));
    }

    #[test]
    fn fsweep_rejects_ambiguous_point_group() {
        let mut cfg = SweepConfig::new(addr());
        let err = cfg
            .set_fsweep(1.0e9, 9.0e9, -5.0, Some(1.0e6), Some(50), None, Some(5.0e-3), None)
            .unwrap_err();
        assert!(matches!(err, Error::AmbiguousParameters));
    }

    #[test]
    fn fsweep_from_freqstep_adjusts_stop_frequency_when_uneven() {
        let mut cfg = SweepConfig::new(addr());
        cfg.set_fsweep(0.0, 100.0, -5.0, Some(30.0), None, None, Some(1.0e-3), None)
            .unwrap();
        // (100 - 0) / 30 = 3.33.., ceil -> 4 points, stop adjusted to 0 + 4*30 = 120.
        assert_eq!(cfg.points, Some(4));
        assert_eq!(cfg.stop_freq, Some(120.0));
    }

    #[test]
    fn set_field_rejects_protected_names() {
        let mut cfg = SweepConfig::new(addr());
        let err = cfg.set_field("_deadtime", FieldValue::F64(1.0)).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn set_field_rejects_unknown_names() {
        let mut cfg = SweepConfig::new(addr());
        let err = cfg.set_field("not_a_field", FieldValue::F64(1.0)).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn set_field_applies_known_names() {
        let mut cfg = SweepConfig::new(addr());
        cfg.set_field("lo_power", FieldValue::F64(20.0)).unwrap();
        assert_eq!(cfg.lo_power, 20.0);
    }
}
