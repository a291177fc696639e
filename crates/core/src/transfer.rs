// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::memory::{FirmwareImage, FirmwareRegion};
use crate::{EmuResult, EmulatorError, JumpFault};
use serde::Serialize;

/// Proof that control left the bootloader.
///
/// Only [`jump_to`] can build one. A bootloader hands it back to the session
/// driver as `SessionEnd::Transferred`, which is how "never returns" is
/// expressed on the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[must_use = "a transfer ends the session; return it to the session driver"]
pub struct Transferred {
    pub entry: u64,
    /// Initial stack pointer from the vector table at `entry`.
    pub initial_sp: Option<u32>,
    /// Reset handler from the vector table at `entry`.
    pub reset_vector: Option<u32>,
    #[serde(skip)]
    _sealed: (),
}

pub fn validate_jump_target(region: FirmwareRegion, addr: u64) -> EmuResult<()> {
    let reason = if addr == 0 {
        JumpFault::Null
    } else if !region.contains(addr) {
        JumpFault::OutsideImage
    } else {
        return Ok(());
    };

    Err(EmulatorError::InvalidJumpTarget {
        addr,
        reason,
        region,
    })
}

/// Emulated branch into firmware.
///
/// `region` is the range reserved for the image, which may extend past the
/// loaded bytes.
pub fn jump_to(image: &FirmwareImage, region: FirmwareRegion, addr: u64) -> EmuResult<Transferred> {
    validate_jump_target(region, addr)?;

    let initial_sp = image.read_u32(addr);
    let reset_vector = addr.checked_add(4).and_then(|a| image.read_u32(a));
    if initial_sp.is_none() || reset_vector.is_none() {
        tracing::warn!(
            "No vector table readable at {:#x}; image covers {}",
            addr,
            image.region()
        );
    }

    tracing::info!("Jumping to firmware at {:#x}", addr);
    Ok(Transferred {
        entry: addr,
        initial_sp,
        reset_vector,
        _sealed: (),
    })
}
