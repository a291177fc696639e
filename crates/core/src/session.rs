// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::events::{EventPump, HostEvent, InputState};
use crate::memory::{FirmwareImage, FirmwareRegion};
use crate::persistence::StayInBootloaderFlag;
use crate::platform::{ClockMode, PlatformState};
use crate::snapshot::{DeviceSnapshot, SNAPSHOT_SCHEMA_VERSION};
use crate::transfer::{self, Transferred};
use crate::{EmuResult, SessionObserver};
use serde::Serialize;
use std::sync::Arc;

/// How an emulated run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEnd {
    /// Control was handed to firmware.
    Transferred(Transferred),
    /// The bootloader stayed in charge until it gave up waiting.
    Resident,
    /// The host asked the emulator to stop.
    Shutdown,
}

/// Bootloader logic driven by the emulator.
pub trait Bootloader {
    fn run(&mut self, session: &mut BootSession<'_>) -> EmuResult<SessionEnd>;
}

impl<F> Bootloader for F
where
    F: FnMut(&mut BootSession<'_>) -> EmuResult<SessionEnd>,
{
    fn run(&mut self, session: &mut BootSession<'_>) -> EmuResult<SessionEnd> {
        self(session)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionOutcome {
    pub boot_index: u64,
    /// Flag value observed at the start of the session.
    pub flag_at_boot: u32,
    pub end: SessionEnd,
    pub polls: u64,
    pub events_processed: u64,
    pub platform: PlatformState,
}

impl SessionOutcome {
    pub fn transferred(&self) -> Option<&Transferred> {
        match &self.end {
            SessionEnd::Transferred(t) => Some(t),
            _ => None,
        }
    }
}

/// Platform surface handed to bootloader logic for one emulated boot.
///
/// Clock, MPU and event state are fresh for every session. The
/// stay-in-bootloader flag is borrowed from the owning [`Device`].
pub struct BootSession<'a> {
    flag: &'a mut StayInBootloaderFlag,
    image: &'a FirmwareImage,
    region: FirmwareRegion,
    platform: PlatformState,
    events: EventPump,
    observers: &'a [Arc<dyn SessionObserver>],
}

impl<'a> BootSession<'a> {
    pub fn new(
        flag: &'a mut StayInBootloaderFlag,
        image: &'a FirmwareImage,
        region: FirmwareRegion,
        observers: &'a [Arc<dyn SessionObserver>],
    ) -> Self {
        Self {
            flag,
            image,
            region,
            platform: PlatformState::new(),
            events: EventPump::new(),
            observers,
        }
    }

    pub fn stay_in_bootloader_flag(&self) -> &StayInBootloaderFlag {
        self.flag
    }

    pub fn stay_in_bootloader_flag_mut(&mut self) -> &mut StayInBootloaderFlag {
        self.flag
    }

    /// `FIRMWARE_START`
    pub fn firmware_start(&self) -> u64 {
        self.image.start
    }

    pub fn firmware_region(&self) -> FirmwareRegion {
        self.region
    }

    pub fn platform(&self) -> &PlatformState {
        &self.platform
    }

    pub fn set_core_clock(&mut self, mode: ClockMode) {
        self.platform.set_core_clock(mode);
    }

    pub fn mpu_config_bootloader(&mut self) {
        self.platform.mpu_config_bootloader();
    }

    pub fn mpu_config_off(&mut self) {
        self.platform.mpu_config_off();
    }

    pub fn display_set_little_endian(&mut self) {
        self.platform.display_set_little_endian();
    }

    pub fn ensure_compatible_settings(&self) -> EmuResult<()> {
        self.platform.ensure_compatible_settings()
    }

    pub fn poll_events(&mut self) {
        let n = self.events.poll_events();
        for observer in self.observers {
            observer.on_poll(n);
        }
    }

    pub fn inject(&mut self, event: HostEvent) {
        self.events.inject(event);
    }

    pub fn input(&self) -> &InputState {
        self.events.input()
    }

    pub fn polls(&self) -> u64 {
        self.events.polls()
    }

    pub fn events(&mut self) -> &mut EventPump {
        &mut self.events
    }

    pub fn jump_to(&mut self, addr: u64) -> EmuResult<Transferred> {
        let t = transfer::jump_to(self.image, self.region, addr)?;
        for observer in self.observers {
            observer.on_transfer(&t);
        }
        Ok(t)
    }
}

/// An emulated board: one firmware image plus the state that outlives a
/// reset.
#[derive(Debug)]
pub struct Device {
    flag: StayInBootloaderFlag,
    image: FirmwareImage,
    region: FirmwareRegion,
    observers: Vec<Arc<dyn SessionObserver>>,
    boot_count: u64,
}

impl Device {
    pub fn new(image: FirmwareImage) -> Self {
        let region = image.region();
        Self {
            flag: StayInBootloaderFlag::new(),
            image,
            region,
            observers: Vec::new(),
            boot_count: 0,
        }
    }

    /// Reserves `size` bytes from `FIRMWARE_START` for the image instead of
    /// just the loaded length.
    pub fn with_reserved_size(mut self, size: u64) -> Self {
        self.region = FirmwareRegion::new(self.image.start, size);
        self
    }

    pub fn add_observer(&mut self, observer: Arc<dyn SessionObserver>) {
        self.observers.push(observer);
    }

    pub fn image(&self) -> &FirmwareImage {
        &self.image
    }

    pub fn firmware_region(&self) -> FirmwareRegion {
        self.region
    }

    pub fn boot_count(&self) -> u64 {
        self.boot_count
    }

    pub fn stay_in_bootloader_flag(&self) -> &StayInBootloaderFlag {
        &self.flag
    }

    pub fn stay_in_bootloader_flag_mut(&mut self) -> &mut StayInBootloaderFlag {
        &mut self.flag
    }

    /// Simulated reset. Retained RAM keeps its contents.
    pub fn reset(&mut self) {
        tracing::debug!("Device reset; flag retained ({:#010x})", self.flag.read());
    }

    /// Simulated power cycle. Retained RAM is lost.
    pub fn power_cycle(&mut self) {
        tracing::debug!("Device power cycle; flag cleared");
        self.flag.power_loss();
    }

    /// Runs one emulated boot from reset to transfer, shutdown or fault.
    ///
    /// `events` are scheduled on the session's event pump as
    /// `(poll index, event)` pairs before the bootloader starts.
    pub fn boot<I>(
        &mut self,
        bootloader: &mut dyn Bootloader,
        events: I,
    ) -> EmuResult<SessionOutcome>
    where
        I: IntoIterator<Item = (u64, HostEvent)>,
    {
        let boot_index = self.boot_count;
        self.boot_count += 1;

        let flag_at_boot = self.flag.read();
        tracing::info!(
            "Boot #{} (stay_in_bootloader_flag = {:#010x})",
            boot_index,
            flag_at_boot
        );
        for observer in &self.observers {
            observer.on_boot(boot_index, flag_at_boot);
        }

        let mut session =
            BootSession::new(&mut self.flag, &self.image, self.region, &self.observers);
        for (at_poll, event) in events {
            session.events.schedule(at_poll, event);
        }

        let end = match bootloader.run(&mut session) {
            Ok(end) => end,
            Err(e) => {
                tracing::error!("Boot #{} faulted: {}", boot_index, e);
                for observer in &self.observers {
                    observer.on_fault(&e);
                }
                return Err(e);
            }
        };

        let outcome = SessionOutcome {
            boot_index,
            flag_at_boot,
            polls: session.events.polls(),
            events_processed: session.events.events_processed(),
            platform: session.platform,
            end,
        };

        for observer in &self.observers {
            observer.on_session_end(&outcome.end);
        }
        match &outcome.end {
            SessionEnd::Transferred(t) => {
                tracing::info!("Session ended: transferred to {:#x}", t.entry)
            }
            other => tracing::info!("Session ended: {:?}", other),
        }

        Ok(outcome)
    }

    pub fn snapshot(&self) -> DeviceSnapshot {
        DeviceSnapshot {
            snapshot_schema_version: SNAPSHOT_SCHEMA_VERSION.to_string(),
            stay_in_bootloader_flag: self.flag.read(),
            boot_count: self.boot_count,
        }
    }

    pub fn apply_snapshot(&mut self, snapshot: &DeviceSnapshot) {
        self.flag.write(snapshot.stay_in_bootloader_flag);
        self.boot_count = snapshot.boot_count;
    }
}
