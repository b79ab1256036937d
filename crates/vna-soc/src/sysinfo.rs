// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! SoC CPU temperature query.
//!
//! A real board-specific script would normally be shelled out to; Linux
//! exposes the same reading directly under `/sys/class/thermal`, so this
//! reads that instead of spawning a subprocess.

use std::fs;

const THERMAL_ZONE: &str = "/sys/class/thermal/thermal_zone0/temp";

/// Simulated reading used when no thermal zone is present (off-hardware demo/test runs).
const SIMULATED_TEMP_C: f64 = 45.0;

/// Returns the SoC CPU temperature in degrees Celsius.
pub fn cpu_temp() -> f64 {
    match fs::read_to_string(THERMAL_ZONE) {
        Ok(contents) => match contents.trim().parse::<f64>() {
            Ok(millidegrees) => millidegrees / 1000.0,
            Err(_) => {
                log::debug!("[sysinfo] unparsable thermal zone contents: {contents:?}");
                SIMULATED_TEMP_C
            }
        },
        Err(_) => {
            log::debug!("[sysinfo] no thermal zone at {THERMAL_ZONE}, using simulated reading");
            SIMULATED_TEMP_C
        }
    }
}
