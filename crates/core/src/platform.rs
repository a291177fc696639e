// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::{EmuResult, EmulatorError};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Core clock selector accepted by `set_core_clock`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockMode {
    /// Full speed. Numerically `CLOCK_180_MHZ == 0` on the device side.
    #[default]
    #[serde(rename = "clock_180_mhz")]
    Clock180Mhz,
}

impl ClockMode {
    pub fn frequency_hz(&self) -> u32 {
        match self {
            ClockMode::Clock180Mhz => 180_000_000,
        }
    }
}

impl FromStr for ClockMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let v = value.trim().to_ascii_lowercase();
        match v.as_str() {
            "clock_180_mhz" | "180mhz" | "180_mhz" | "full" | "full-speed" | "0" => {
                Ok(Self::Clock180Mhz)
            }
            _ => Err(format!(
                "unsupported core clock '{}'; supported: clock_180_mhz",
                value
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MpuMode {
    /// Protection disabled; the state after reset.
    #[default]
    Off,
    Bootloader,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayEndianness {
    Little,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    pub fn host() -> Self {
        if cfg!(target_endian = "big") {
            ByteOrder::Big
        } else {
            ByteOrder::Little
        }
    }
}

/// Simulated clock / MPU / display configuration.
///
/// Setters never touch host state; they only record what the bootloader
/// asked for so tests can inspect it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlatformState {
    pub clock: Option<ClockMode>,
    pub mpu: MpuMode,
    pub display: Option<DisplayEndianness>,
}

impl PlatformState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_core_clock(&mut self, mode: ClockMode) {
        tracing::debug!(
            "set_core_clock({:?}) -> {} Hz (emulated)",
            mode,
            mode.frequency_hz()
        );
        self.clock = Some(mode);
    }

    pub fn mpu_config_bootloader(&mut self) {
        tracing::debug!("mpu_config_bootloader (emulated)");
        self.mpu = MpuMode::Bootloader;
    }

    pub fn mpu_config_off(&mut self) {
        tracing::debug!("mpu_config_off (emulated)");
        self.mpu = MpuMode::Off;
    }

    pub fn display_set_little_endian(&mut self) {
        tracing::debug!("display_set_little_endian (emulated)");
        self.display = Some(DisplayEndianness::Little);
    }

    pub fn ensure_compatible_settings(&self) -> EmuResult<()> {
        self.ensure_compatible_with(ByteOrder::host())
    }

    /// Checks the emulated settings against a host with the given byte order.
    ///
    /// Display buffers are pushed as little-endian words, so a big-endian
    /// host cannot reproduce the protocol byte-for-byte.
    pub fn ensure_compatible_with(&self, host: ByteOrder) -> EmuResult<()> {
        if host != ByteOrder::Little {
            let msg = format!(
                "host byte order is {:?}, display protocol requires {:?}",
                host,
                DisplayEndianness::Little
            );
            tracing::error!("{}", msg);
            return Err(EmulatorError::IncompatibleHost(msg));
        }
        Ok(())
    }

    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
