// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::session::SessionEnd;
use crate::transfer::Transferred;
use crate::{EmulatorError, SessionObserver};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct SessionMetrics {
    boots: AtomicU64,
    polls: AtomicU64,
    events: AtomicU64,
    transfers: AtomicU64,
    faults: AtomicU64,
    last_fault: Mutex<Option<String>>,
}

impl SessionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&self) {
        self.boots.store(0, Ordering::SeqCst);
        self.polls.store(0, Ordering::SeqCst);
        self.events.store(0, Ordering::SeqCst);
        self.transfers.store(0, Ordering::SeqCst);
        self.faults.store(0, Ordering::SeqCst);
        if let Ok(mut f) = self.last_fault.lock() {
            *f = None;
        }
    }

    pub fn get_boots(&self) -> u64 {
        self.boots.load(Ordering::SeqCst)
    }

    pub fn get_polls(&self) -> u64 {
        self.polls.load(Ordering::SeqCst)
    }

    pub fn get_events(&self) -> u64 {
        self.events.load(Ordering::SeqCst)
    }

    pub fn get_transfers(&self) -> u64 {
        self.transfers.load(Ordering::SeqCst)
    }

    pub fn get_faults(&self) -> u64 {
        self.faults.load(Ordering::SeqCst)
    }

    pub fn last_fault(&self) -> Option<String> {
        self.last_fault.lock().ok().and_then(|f| f.clone())
    }
}

impl SessionObserver for SessionMetrics {
    fn on_boot(&self, _boot_index: u64, _flag: u32) {
        self.boots.fetch_add(1, Ordering::SeqCst);
    }

    fn on_poll(&self, events_processed: usize) {
        self.polls.fetch_add(1, Ordering::SeqCst);
        self.events
            .fetch_add(events_processed as u64, Ordering::SeqCst);
    }

    fn on_transfer(&self, _transfer: &Transferred) {
        self.transfers.fetch_add(1, Ordering::SeqCst);
    }

    fn on_fault(&self, error: &EmulatorError) {
        self.faults.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut f) = self.last_fault.lock() {
            *f = Some(error.to_string());
        }
    }

    fn on_session_end(&self, _end: &SessionEnd) {}
}
