// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};

pub const SNAPSHOT_SCHEMA_VERSION: &str = "1.0";

/// State that survives a reset, in a form a host harness can store between
/// process runs.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DeviceSnapshot {
    pub snapshot_schema_version: String,
    pub stay_in_bootloader_flag: u32,
    #[serde(default)]
    pub boot_count: u64,
}

impl Default for DeviceSnapshot {
    fn default() -> Self {
        Self {
            snapshot_schema_version: SNAPSHOT_SCHEMA_VERSION.to_string(),
            stay_in_bootloader_flag: crate::persistence::POWER_ON_VALUE,
            boot_count: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_json_shape() {
        let snap = DeviceSnapshot {
            stay_in_bootloader_flag: 0x0FC3_5A96,
            ..Default::default()
        };
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["snapshot_schema_version"], "1.0");
        assert_eq!(json["stay_in_bootloader_flag"], 264_460_950u64);

        let legacy: DeviceSnapshot = serde_json::from_str(
            r#"{"snapshot_schema_version":"1.0","stay_in_bootloader_flag":7}"#,
        )
        .unwrap();
        assert_eq!(legacy.boot_count, 0);
        assert_eq!(legacy.stay_in_bootloader_flag, 7);
    }
}
