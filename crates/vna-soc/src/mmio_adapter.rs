// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Scaled read/write access to the PL's bit-field-packed registers.

use std::sync::atomic::{AtomicU32, Ordering};

use vna_protocol::mmio::{self, field_for};
use vna_protocol::{Command, Error, RegisterIndex};

/// Abstraction over the four word-addressed PL registers.
///
/// A real deployment backs this with a memory-mapped Zynq overlay; tests
/// and the demonstration binary use [`SimRegisterFile`] instead.
pub trait RegisterFile: Send + Sync {
    /// Reads the current 32-bit contents of `reg`.
    fn read32(&self, reg: RegisterIndex) -> u32;
    /// Writes `value` as the new 32-bit contents of `reg`.
    fn write32(&self, reg: RegisterIndex, value: u32);
}

/// In-process stand-in for the PL's memory-mapped registers, backing each
/// register with a plain atomic cell instead of a real Zynq overlay.
#[derive(Default)]
pub struct SimRegisterFile {
    dead_time: AtomicU32,
    tpp: AtomicU32,
    trig: AtomicU32,
    general: AtomicU32,
}

impl SimRegisterFile {
    /// Creates a new simulated register file, all registers zeroed.
    pub fn new() -> Self {
        Self::default()
    }

    fn cell(&self, reg: RegisterIndex) -> &AtomicU32 {
        match reg {
            RegisterIndex::DeadTime => &self.dead_time,
            RegisterIndex::Tpp => &self.tpp,
            RegisterIndex::Trig => &self.trig,
            RegisterIndex::General => &self.general,
        }
    }
}

impl RegisterFile for SimRegisterFile {
    fn read32(&self, reg: RegisterIndex) -> u32 {
        self.cell(reg).load(Ordering::SeqCst)
    }

    fn write32(&self, reg: RegisterIndex, value: u32) {
        self.cell(reg).store(value, Ordering::SeqCst);
    }
}

/// Resolves logical command tokens to scaled reads/writes of the underlying [`RegisterFile`].
pub struct MmioAdapter<R: RegisterFile> {
    regs: R,
}

impl<R: RegisterFile> MmioAdapter<R> {
    /// Wraps a register file.
    pub fn new(regs: R) -> Self {
        Self { regs }
    }

    /// Writes a logical value for `cmd`, merging it into the register's existing contents.
    pub fn write(&self, cmd: Command, value: f64) -> Result<(), Error> {
        let fd = field_for(cmd)?;
        let current = self.regs.read32(fd.register);
        let new_word = mmio::pack(cmd, value, current)?;
        self.regs.write32(fd.register, new_word);
        log::debug!(
            "[mmio] wrote 0x{new_word:08x} to 0x{:08x} (command {:?})",
            fd.register.base_address(),
            cmd
        );
        Ok(())
    }

    /// Reads the logical value currently stored for `cmd`.
    pub fn read(&self, cmd: Command) -> Result<f64, Error> {
        let fd = field_for(cmd)?;
        let raw = self.regs.read32(fd.register);
        let value = mmio::unpack(cmd, raw)?;
        log::debug!(
            "[mmio] read {value:.3} from 0x{:08x} (command {:?})",
            fd.register.base_address(),
            cmd
        );
        Ok(value)
    }

    /// Returns a human-readable dump of every register's address and binary contents.
    pub fn dump_status(&self) -> Vec<(u32, u32)> {
        RegisterIndex::all()
            .iter()
            .map(|&reg| (reg.base_address(), self.regs.read32(reg)))
            .collect()
    }

    /// Access to the underlying register file, for the DMA interface to check PL-enable state.
    pub fn registers(&self) -> &R {
        &self.regs
    }
}
