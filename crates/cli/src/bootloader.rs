// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use bootemu_core::{
    BootSession, Bootloader, Button, ClockMode, EmuResult, InputState, SessionEnd, TouchEvent,
};
use tracing::info;

/// Stand-in for the device bootloader's top-level flow.
///
/// Stays resident when the stay-in-bootloader flag is set or the left button
/// is held at power-on; otherwise hands off to firmware immediately.
#[derive(Debug, Clone)]
pub struct ReferenceBootloader {
    pub clock: ClockMode,
    pub max_polls: u64,
    /// Jump target; `FIRMWARE_START` when unset.
    pub entry: Option<u64>,
}

impl ReferenceBootloader {
    pub fn new(clock: ClockMode, max_polls: u64) -> Self {
        Self {
            clock,
            max_polls,
            entry: None,
        }
    }

    fn hand_off(&self, s: &mut BootSession<'_>) -> EmuResult<SessionEnd> {
        s.mpu_config_off();
        let target = self.entry.unwrap_or_else(|| s.firmware_start());
        Ok(SessionEnd::Transferred(s.jump_to(target)?))
    }
}

fn confirmed(input: &InputState) -> bool {
    input.is_pressed(Button::Right) || matches!(input.last_touch, Some(TouchEvent::TouchEnd(_)))
}

impl Bootloader for ReferenceBootloader {
    fn run(&mut self, s: &mut BootSession<'_>) -> EmuResult<SessionEnd> {
        s.set_core_clock(self.clock);
        s.mpu_config_bootloader();
        s.display_set_little_endian();
        s.ensure_compatible_settings()?;

        let requested = s.stay_in_bootloader_flag_mut().consume();

        // Sample inputs held at power-on
        s.poll_events();
        if s.input().quit_requested {
            return Ok(SessionEnd::Shutdown);
        }
        let held = s.input().is_pressed(Button::Left);

        if !requested && !held {
            return self.hand_off(s);
        }

        info!(
            "Staying in bootloader (flag requested: {}, left button held: {})",
            requested, held
        );
        while s.polls() < self.max_polls {
            s.poll_events();
            let input = *s.input();
            if input.quit_requested {
                return Ok(SessionEnd::Shutdown);
            }
            if confirmed(&input) {
                return self.hand_off(s);
            }
        }
        Ok(SessionEnd::Resident)
    }
}
