// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{Context, Result};
use bootemu_core::{Button, ClockMode, HostEvent, Point, TouchEvent};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const SCHEMA_VERSION: &str = "1.0";

/// Default schema version for YAML configs
fn default_schema_version() -> String {
    SCHEMA_VERSION.to_string()
}

fn default_clock() -> String {
    "clock_180_mhz".to_string()
}

fn default_max_polls() -> u64 {
    1000
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Unsupported schema_version '{0}'. Supported versions: '1.0'")]
    SchemaVersion(String),
    #[error("firmware.base must be non-zero")]
    NullFirmwareBase,
    #[error("firmware.size must be non-zero")]
    EmptyFirmwareRegion,
    #[error("firmware region {base:#x} + {size:#x} overflows the address space")]
    RegionOverflow { base: u64, size: u64 },
    #[error("{0}")]
    Clock(String),
    #[error("event #{index}: {message}")]
    Event { index: usize, message: String },
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct FirmwareRegionConfig {
    /// `FIRMWARE_START`
    pub base: u64,
    /// Reserved size, e.g. "768KB". Defaults to the loaded image length.
    #[serde(default)]
    pub size: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ButtonPress,
    ButtonRelease,
    TouchStart,
    TouchMove,
    TouchEnd,
    Quit,
}

/// A host event released on a given poll of the bootloader's idle loop.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ScheduledEvent {
    pub at_poll: u64,
    pub kind: EventKind,
    #[serde(default)]
    pub button: Option<Button>,
    #[serde(default)]
    pub x: Option<i16>,
    #[serde(default)]
    pub y: Option<i16>,
}

impl ScheduledEvent {
    pub fn to_host_event(&self) -> std::result::Result<HostEvent, String> {
        let touch_point = || -> std::result::Result<Point, String> {
            match (self.x, self.y) {
                (Some(x), Some(y)) => Ok(Point::new(x, y)),
                _ => Err(format!("{:?} requires both 'x' and 'y'", self.kind)),
            }
        };
        let button = || {
            self.button
                .ok_or_else(|| format!("{:?} requires 'button'", self.kind))
        };

        Ok(match self.kind {
            EventKind::ButtonPress => HostEvent::Button {
                button: button()?,
                pressed: true,
            },
            EventKind::ButtonRelease => HostEvent::Button {
                button: button()?,
                pressed: false,
            },
            EventKind::TouchStart => HostEvent::Touch(TouchEvent::TouchStart(touch_point()?)),
            EventKind::TouchMove => HostEvent::Touch(TouchEvent::TouchMove(touch_point()?)),
            EventKind::TouchEnd => HostEvent::Touch(TouchEvent::TouchEnd(touch_point()?)),
            EventKind::Quit => HostEvent::Quit,
        })
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct EmulatorConfig {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    pub firmware: FirmwareRegionConfig,
    #[serde(default = "default_clock")]
    pub clock: String,
    /// Upper bound on idle-loop polls while resident in the bootloader.
    #[serde(default = "default_max_polls")]
    pub max_polls: u64,
    /// JSON file holding retained state between emulator runs.
    #[serde(default)]
    pub retained: Option<PathBuf>,
    #[serde(default)]
    pub events: Vec<ScheduledEvent>,
}

impl EmulatorConfig {
    /// Profile for a raw image loaded at `base` with no scripted input.
    pub fn with_base(base: u64) -> Self {
        Self {
            schema_version: default_schema_version(),
            firmware: FirmwareRegionConfig { base, size: None },
            clock: default_clock(),
            max_polls: default_max_polls(),
            retained: None,
            events: Vec::new(),
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read emulator config at {:?}", path))?;
        let mut config = Self::from_yaml_str(&content)?;

        // Relative retained paths are relative to the config file.
        if let (Some(retained), Some(parent)) = (&config.retained, path.parent()) {
            if retained.is_relative() {
                config.retained = Some(parent.join(retained));
            }
        }
        tracing::debug!("Loaded emulator config from {:?}", path);
        Ok(config)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Self =
            serde_yaml::from_str(content).context("Failed to parse Emulator Config YAML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(ConfigError::SchemaVersion(self.schema_version.clone()).into());
        }
        if self.firmware.base == 0 {
            return Err(ConfigError::NullFirmwareBase.into());
        }
        if let Some(size) = self.reserved_size()? {
            if size == 0 {
                return Err(ConfigError::EmptyFirmwareRegion.into());
            }
            if self.firmware.base.checked_add(size).is_none() {
                return Err(ConfigError::RegionOverflow {
                    base: self.firmware.base,
                    size,
                }
                .into());
            }
        }
        self.clock_mode()?;
        for (index, ev) in self.events.iter().enumerate() {
            ev.to_host_event()
                .map_err(|message| ConfigError::Event { index, message })?;
        }
        Ok(())
    }

    pub fn reserved_size(&self) -> Result<Option<u64>> {
        self.firmware
            .size
            .as_deref()
            .map(parse_size)
            .transpose()
            .context("Invalid firmware.size")
    }

    pub fn clock_mode(&self) -> Result<ClockMode> {
        self.clock
            .parse::<ClockMode>()
            .map_err(|e| ConfigError::Clock(e).into())
    }

    /// Scripted events as `(poll index, event)` pairs, in file order.
    pub fn host_events(&self) -> Result<Vec<(u64, HostEvent)>> {
        self.events
            .iter()
            .enumerate()
            .map(|(index, ev)| {
                ev.to_host_event()
                    .map(|e| (ev.at_poll, e))
                    .map_err(|message| anyhow::Error::from(ConfigError::Event { index, message }))
            })
            .collect()
    }
}

/// Parses a byte count: plain decimal, `0x` hex, or a human size such as
/// "128KB".
pub fn parse_size(size_str: &str) -> Result<u64> {
    use human_size::{Byte, Size, SpecificSize};
    let trimmed = size_str.trim();
    if let Some(hex) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        return u64::from_str_radix(hex, 16)
            .map_err(|e| anyhow::anyhow!("Invalid hex size '{}': {}", size_str, e));
    }
    if let Ok(bytes) = trimmed.parse::<u64>() {
        return Ok(bytes);
    }
    let s: Size = trimmed
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid size format: {}", e))?;
    let bytes: SpecificSize<Byte> = s.into();
    Ok(bytes.value() as u64)
}
