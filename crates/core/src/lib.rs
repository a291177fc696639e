// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Emulation boundary between bootloader logic and the platform it normally
//! runs on.
//!
//! Operations with real hardware side effects (clock tree, MPU regions,
//! branching into a firmware image) are replaced by host-safe stand-ins that
//! keep exactly the behavior bootloader control flow depends on.

pub mod events;
pub mod memory;
pub mod metrics;
pub mod persistence;
pub mod platform;
pub mod session;
pub mod snapshot;
pub mod transfer;


pub use events::{Button, ButtonMask, EventPump, HostEvent, InputState, Point, TouchEvent};
pub use memory::{FirmwareImage, FirmwareRegion, ImageError};
pub use persistence::{StayInBootloaderFlag, STAY_IN_BOOTLOADER_FLAG};
pub use platform::{ByteOrder, ClockMode, DisplayEndianness, MpuMode, PlatformState};
pub use session::{BootSession, Bootloader, Device, SessionEnd, SessionOutcome};
pub use transfer::Transferred;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JumpFault {
    Null,
    OutsideImage,
}

impl std::fmt::Display for JumpFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JumpFault::Null => write!(f, "null address"),
            JumpFault::OutsideImage => write!(f, "outside firmware image"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EmulatorError {
    #[error("Invalid jump target {addr:#x} ({reason}); firmware region is {region}")]
    InvalidJumpTarget {
        addr: u64,
        reason: JumpFault,
        region: FirmwareRegion,
    },
    #[error("Incompatible host environment: {0}")]
    IncompatibleHost(String),
}

pub type EmuResult<T> = Result<T, EmulatorError>;

/// Trait for observing emulated boot sessions.
pub trait SessionObserver: std::fmt::Debug + Send + Sync {
    fn on_boot(&self, _boot_index: u64, _flag: u32) {}
    fn on_poll(&self, _events_processed: usize) {}
    fn on_transfer(&self, _transfer: &Transferred) {}
    fn on_fault(&self, _error: &EmulatorError) {}
    fn on_session_end(&self, _end: &SessionEnd) {}
}
