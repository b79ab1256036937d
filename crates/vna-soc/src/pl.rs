// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Combines the MMIO adapter and DMA pipeline into the single hardware
//! resource the server owns: the programmable logic itself.
//!
//! The PL is process-wide hardware shared by register access and DMA buffer
//! management alike, so it is modelled as one owned resource with its own
//! enable/disable state machine rather than free-floating globals.

use std::sync::atomic::{AtomicBool, Ordering};

use vna_protocol::Command;

use crate::dma::{self, DmaChannel, QUIRK_WORDS, WORDS_PER_POINT};
use crate::error::Error;
use crate::mmio_adapter::{MmioAdapter, RegisterFile};

/// Owns the PL's registers, its DMA buffer and the enable/first-transfer state.
pub struct PlInterface<R: RegisterFile, D: DmaChannel> {
    mmio: MmioAdapter<R>,
    channel: D,
    buffer: Vec<u32>,
    points_per_transfer: usize,
    enabled: AtomicBool,
    first_dma: AtomicBool,
}

impl<R: RegisterFile, D: DmaChannel> PlInterface<R, D> {
    /// Creates a new PL interface with one point per DMA transfer by default.
    pub fn new(regs: R, channel: D) -> Self {
        let points_per_transfer = 1;
        Self {
            mmio: MmioAdapter::new(regs),
            channel,
            buffer: vec![0u32; points_per_transfer * WORDS_PER_POINT + QUIRK_WORDS],
            points_per_transfer,
            enabled: AtomicBool::new(false),
            first_dma: AtomicBool::new(false),
        }
    }

    /// Direct access to the register adapter, e.g. for the server's config-write dispatch.
    pub fn mmio(&self) -> &MmioAdapter<R> {
        &self.mmio
    }

    /// Amount of points fetched per DMA transfer.
    pub fn points_per_transfer(&self) -> usize {
        self.points_per_transfer
    }

    /// Changes points-per-transfer: reallocates the buffer and writes the new value
    /// into the PL's `PPT` field.
    pub fn set_points_per_transfer(&mut self, value: usize) -> Result<(), Error> {
        let value = value.max(1);
        self.mmio.write(Command::Ppt, value as f64)?;
        self.buffer = vec![0u32; value * WORDS_PER_POINT + QUIRK_WORDS];
        self.points_per_transfer = value;
        Ok(())
    }

    /// True if the programmable logic is currently enabled.
    pub fn enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Enables or disables PL data acquisition.
    ///
    /// A no-op if already in the requested state, guarding against redundant
    /// register writes. Disabling arms
    /// `first_dma` so the *next* enable's first transfer discards the
    /// leading quirk words instead of the trailing ones.
    pub fn set_enabled(&mut self, value: bool) -> Result<(), Error> {
        if self.enabled.load(Ordering::SeqCst) && value {
            return Ok(());
        }
        self.mmio.write(Command::RunPl, if value { 1.0 } else { 0.0 })?;
        if !value {
            self.first_dma.store(true, Ordering::SeqCst);
        }
        self.enabled.store(value, Ordering::SeqCst);
        if value {
            log::info!("[pl] started programmable logic data acquisition");
        } else {
            log::info!("[pl] stopped programmable logic data acquisition");
        }
        Ok(())
    }

    /// Fetches one DMA block, decoded to volts. Fails with [`dma::Error::DmaNotAllowed`]
    /// if the PL is not currently enabled.
    pub fn get_data(&mut self) -> Result<Vec<f64>, Error> {
        if !self.enabled() {
            return Err(dma::Error::DmaNotAllowed.into());
        }
        let first = self.first_dma.swap(false, Ordering::SeqCst);
        self.channel.transfer(&mut self.buffer);
        self.channel.wait()?;
        let trimmed: &[u32] = if first {
            &self.buffer[QUIRK_WORDS..]
        } else {
            &self.buffer[..self.buffer.len() - QUIRK_WORDS]
        };
        Ok(dma::decode_to_volts(trimmed)?)
    }

    /// Asserts that the current MMIO configuration will not hang the PL on `start_dma`.
    pub fn verify_config(&self) -> Result<(), Error> {
        let ppt = self.mmio.read(Command::Ppt)?;
        let tpp = self.mmio.read(Command::Tpp)?;
        let dead_time = self.mmio.read(Command::DeadTime)?;
        let trig_len = self.mmio.read(Command::TrigLen)?;

        let check = |cond: bool, msg: &str| -> Result<(), Error> {
            if cond {
                Ok(())
            } else {
                Err(Error::PlVerification(msg.to_string()))
            }
        };
        check(ppt > 0.0, "points per transfer should be greater than zero")?;
        check(tpp > 0.0, "time per point should be greater than zero")?;
        check(dead_time > 0.0, "generator dead time should be greater than zero")?;
        check(
            tpp > dead_time,
            "time per point should be longer than generator dead time",
        )?;
        check(
            tpp > trig_len,
            "time per point should be longer than trigger pulse length",
        )?;
        Ok(())
    }

    /// Dumps every register's address and contents, for debugging.
    pub fn mmio_status(&self) -> Vec<(u32, u32)> {
        self.mmio.dump_status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dma::SimDmaChannel;
    use crate::mmio_adapter::SimRegisterFile;

    fn fresh_pl() -> PlInterface<SimRegisterFile, SimDmaChannel> {
        PlInterface::new(SimRegisterFile::new(), SimDmaChannel::new())
    }

    #[test]
    fn get_data_requires_enabled_pl() {
        let mut pl = fresh_pl();
        let err = pl.get_data().unwrap_err();
        assert!(matches!(err, Error::Dma(dma::Error::DmaNotAllowed)));
    }

    #[test]
    fn enabling_then_fetching_yields_decoded_points() {
        let mut pl = fresh_pl();
        pl.set_points_per_transfer(3).unwrap();
        pl.set_enabled(true).unwrap();
        let volts = pl.get_data().unwrap();
        assert_eq!(volts.len() % 4, 0);
        assert!(!volts.is_empty());
    }

    #[test]
    fn verify_config_rejects_zeroed_registers() {
        let pl = fresh_pl();
        assert!(pl.verify_config().is_err());
    }

    #[test]
    fn verify_config_accepts_sane_configuration() {
        let mut pl = fresh_pl();
        pl.set_points_per_transfer(4).unwrap();
        pl.mmio().write(Command::Tpp, 1000.0).unwrap();
        pl.mmio().write(Command::DeadTime, 10.0).unwrap();
        pl.mmio().write(Command::TrigLen, 10.0).unwrap();
        assert!(pl.verify_config().is_ok());
    }

    #[test]
    fn disable_then_enable_cycle_keeps_fetching() {
        let mut pl = fresh_pl();
        // A fresh interface has never been disabled, so its first enable does not
        // treat the transfer as "first".
        pl.set_enabled(true).unwrap();
        assert!(!pl.get_data().unwrap().is_empty());
        pl.set_enabled(false).unwrap();
        // Disabling arms first_dma; the next enable's first transfer strips the
        // leading quirk words instead of the trailing ones.
        pl.set_enabled(true).unwrap();
        assert!(!pl.get_data().unwrap().is_empty());
    }
}
