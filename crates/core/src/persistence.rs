// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};

/// Sentinel meaning "do not auto-boot firmware on next start".
pub const STAY_IN_BOOTLOADER_FLAG: u32 = 0x0FC3_5A96;

/// Value the cell holds after a simulated power-on.
pub const POWER_ON_VALUE: u32 = 0;

/// Word of retained RAM holding the stay-in-bootloader flag.
///
/// The cell survives a simulated reset (including the one implied by a jump
/// into firmware) but not a simulated power cycle. Writes are stored
/// verbatim; only [`STAY_IN_BOOTLOADER_FLAG`] reads as "set".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StayInBootloaderFlag {
    value: u32,
}

impl Default for StayInBootloaderFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl StayInBootloaderFlag {
    pub fn new() -> Self {
        Self {
            value: POWER_ON_VALUE,
        }
    }

    pub fn read(&self) -> u32 {
        self.value
    }

    pub fn write(&mut self, value: u32) {
        tracing::debug!("stay_in_bootloader_flag <- {:#010x}", value);
        self.value = value;
    }

    pub fn is_set(&self) -> bool {
        self.value == STAY_IN_BOOTLOADER_FLAG
    }

    /// Requests bootloader mode on the next boot.
    pub fn request(&mut self) {
        self.write(STAY_IN_BOOTLOADER_FLAG);
    }

    pub fn clear(&mut self) {
        self.write(POWER_ON_VALUE);
    }

    /// Reads the flag and clears it if it was set.
    pub fn consume(&mut self) -> bool {
        let set = self.is_set();
        if set {
            self.clear();
        }
        set
    }

    /// Retained RAM loses its contents when power is removed.
    pub(crate) fn power_loss(&mut self) {
        self.value = POWER_ON_VALUE;
    }
}
