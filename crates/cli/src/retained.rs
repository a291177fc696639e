// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Retained-state side channel. Keeps the stay-in-bootloader flag alive
//! across separate `bootemu` invocations.

use anyhow::{Context, Result};
use bootemu_core::snapshot::{DeviceSnapshot, SNAPSHOT_SCHEMA_VERSION};
use std::path::Path;

/// Reads a retained-state file. A missing file is a fresh power-on.
pub fn load(path: &Path) -> Result<DeviceSnapshot> {
    if !path.exists() {
        tracing::debug!("No retained state at {:?}; starting from power-on", path);
        return Ok(DeviceSnapshot::default());
    }
    let f = std::fs::File::open(path)
        .with_context(|| format!("Failed to open retained state {:?}", path))?;
    let snapshot: DeviceSnapshot = serde_json::from_reader(f)
        .with_context(|| format!("Failed to parse retained state {:?}", path))?;
    if snapshot.snapshot_schema_version != SNAPSHOT_SCHEMA_VERSION {
        anyhow::bail!(
            "Unsupported retained state version '{}' in {:?}",
            snapshot.snapshot_schema_version,
            path
        );
    }
    Ok(snapshot)
}

pub fn store(path: &Path, snapshot: &DeviceSnapshot) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }
    }
    let f = std::fs::File::create(path)
        .with_context(|| format!("Failed to create retained state {:?}", path))?;
    serde_json::to_writer_pretty(f, snapshot)
        .with_context(|| format!("Failed to write retained state {:?}", path))?;
    Ok(())
}
