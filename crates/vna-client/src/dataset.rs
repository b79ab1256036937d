// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Derives phasors, magnitudes and phases from a sweep's raw IQ samples.
//!
//! Returns a plain struct of parallel `Vec<f64>` columns rather than a labelled
//! multi-array dataset. Complex phasor arithmetic is implemented locally rather
//! than via a complex-number crate, since nothing else in this workspace needs
//! one.

use crate::tcp_client::Point;

/// A minimal complex number: just enough arithmetic for phasor division and squaring.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Complex {
    re: f64,
    im: f64,
}

impl Complex {
    fn new(re: f64, im: f64) -> Self {
        Self { re, im }
    }

    fn abs(self) -> f64 {
        self.re.hypot(self.im)
    }

    fn arg(self) -> f64 {
        self.im.atan2(self.re)
    }

    fn div(self, rhs: Complex) -> Complex {
        let denom = rhs.re * rhs.re + rhs.im * rhs.im;
        Complex::new(
            (self.re * rhs.re + self.im * rhs.im) / denom,
            (self.im * rhs.re - self.re * rhs.im) / denom,
        )
    }

    fn squared(self) -> Complex {
        Complex::new(self.re * self.re - self.im * self.im, 2.0 * self.re * self.im)
    }
}

/// Everything derived from one frequency sweep's raw IQ samples.
#[derive(Debug, Clone)]
pub struct SweepDataset {
    pub f: Vec<f64>,
    pub t: Vec<f64>,

    pub dut_re_v: Vec<f64>,
    pub dut_im_v: Vec<f64>,
    pub dut_mag_v: Vec<f64>,
    pub dut_mag_dbm: Vec<f64>,
    pub dut_phase: Vec<f64>,

    pub ref_re_v: Vec<f64>,
    pub ref_im_v: Vec<f64>,
    pub ref_mag_v: Vec<f64>,
    pub ref_mag_dbm: Vec<f64>,
    pub ref_phase: Vec<f64>,

    pub s21_re: Vec<f64>,
    pub s21_im: Vec<f64>,
    pub s21_mag: Vec<f64>,
    pub s21_mag_db: Vec<f64>,
    pub s21_phase: Vec<f64>,
    pub s21_phase_unwrapped: Vec<f64>,
}

/// Builds a [`SweepDataset`] from one point per frequency in `f`/`t`.
///
/// `S_21` is a power ratio while the IQ samples are voltage phasors, so the ratio is
/// squared: `S_21 = (P_dut / P_ref)^2`.
pub fn expand_data(t: Vec<f64>, f: Vec<f64>, points: &[Point]) -> SweepDataset {
    let mut dut = Vec::with_capacity(points.len());
    let mut refr = Vec::with_capacity(points.len());
    let mut s21 = Vec::with_capacity(points.len());
    for &(i_dut, q_dut, i_ref, q_ref) in points {
        let p_dut = Complex::new(i_dut, q_dut);
        let p_ref = Complex::new(i_ref, q_ref);
        s21.push(p_dut.div(p_ref).squared());
        dut.push(p_dut);
        refr.push(p_ref);
    }

    let dut_mag_v: Vec<f64> = dut.iter().map(|c| c.abs()).collect();
    let ref_mag_v: Vec<f64> = refr.iter().map(|c| c.abs()).collect();
    let s21_mag: Vec<f64> = s21.iter().map(|c| c.abs()).collect();
    let s21_phase: Vec<f64> = s21.iter().map(|c| c.arg()).collect();
    let s21_phase_unwrapped = match (f.first(), f.last()) {
        (Some(&first), Some(&last)) => unwrap_phase(&s21_phase, first, last),
        _ => Vec::new(),
    };

    SweepDataset {
        dut_re_v: dut.iter().map(|c| c.re).collect(),
        dut_im_v: dut.iter().map(|c| c.im).collect(),
        dut_mag_dbm: dut_mag_v.iter().map(|m| 20.0 * m.log10() + 10.0).collect(),
        dut_phase: dut.iter().map(|c| c.arg()).collect(),
        dut_mag_v,

        ref_re_v: refr.iter().map(|c| c.re).collect(),
        ref_im_v: refr.iter().map(|c| c.im).collect(),
        ref_mag_dbm: ref_mag_v.iter().map(|m| 20.0 * m.log10() + 10.0).collect(),
        ref_phase: refr.iter().map(|c| c.arg()).collect(),
        ref_mag_v,

        s21_re: s21.iter().map(|c| c.re).collect(),
        s21_im: s21.iter().map(|c| c.im).collect(),
        s21_mag_db: s21_mag.iter().map(|m| 10.0 * m.log10()).collect(),
        s21_mag,
        s21_phase,
        s21_phase_unwrapped,

        t,
        f,
    }
}

/// Unwraps a phase array (radians) and subtracts the endpoint-to-endpoint average
/// slope, so a sweep's linear phase ramp doesn't dominate the plot.
fn unwrap_phase(phase: &[f64], first_freq: f64, last_freq: f64) -> Vec<f64> {
    let unwrapped = numpy_style_unwrap(phase);
    let (Some(&first_ph), Some(&last_ph)) = (unwrapped.first(), unwrapped.last()) else {
        return unwrapped;
    };
    let avg_slope = (last_ph - first_ph) / (last_freq - first_freq);
    let n = unwrapped.len();
    unwrapped
        .iter()
        .enumerate()
        .map(|(i, &ph)| {
            let x = if n > 1 {
                (last_freq - first_freq) * i as f64 / (n - 1) as f64
            } else {
                0.0
            };
            ph - x * avg_slope
        })
        .collect()
}

/// Discrete-difference phase unwrapping, matching `numpy.unwrap`'s default behaviour:
/// each step is wrapped into `(-pi, pi]` and the correction accumulates.
fn numpy_style_unwrap(phase: &[f64]) -> Vec<f64> {
    const TAU: f64 = std::f64::consts::TAU;
    let mut out = Vec::with_capacity(phase.len());
    let Some(&first) = phase.first() else {
        return out;
    };
    out.push(first);
    let mut correction = 0.0;
    for pair in phase.windows(2) {
        let diff = pair[1] - pair[0];
        let wrapped = diff - TAU * (diff / TAU).round();
        correction += wrapped - diff;
        out.push(pair[1] + correction);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_data_computes_magnitudes_and_s21() {
        let points = vec![(1.0, 0.0, 1.0, 0.0), (0.0, 1.0, 1.0, 0.0)];
        let d = expand_data(vec![0.0, 1.0], vec![1.0e9, 2.0e9], &points);
        assert_eq!(d.dut_mag_v, vec![1.0, 1.0]);
        assert_eq!(d.ref_mag_v, vec![1.0, 1.0]);
        // First point: P_dut == P_ref, S_21 = 1^2 = 1.
        assert!((d.s21_mag[0] - 1.0).abs() < 1e-12);
        // Second point: P_dut/P_ref = j, squared = -1.
        assert!((d.s21_re[1] - (-1.0)).abs() < 1e-9);
        assert!(d.s21_im[1].abs() < 1e-9);
    }

    #[test]
    fn unwrap_removes_2pi_discontinuities() {
        let pi = std::f64::consts::PI;
        // A phase ramp that would wrap at +-pi without unwrapping.
        let wrapped = vec![0.0, pi - 0.1, -(pi - 0.1), 0.0];
        let unwrapped = numpy_style_unwrap(&wrapped);
        for pair in unwrapped.windows(2) {
            assert!((pair[1] - pair[0]).abs() < pi);
        }
    }

    #[test]
    fn unwrap_phase_detrends_endpoints_to_equal_value() {
        let phase = vec![0.0, 1.0, 2.0, 3.0];
        let out = unwrap_phase(&phase, 0.0, 3.0);
        assert!((out[0] - out[out.len() - 1]).abs() < 1e-9);
    }
}
