// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

mod bootloader;
mod retained;

use anyhow::{Context, Result};
use bootemu_config::EmulatorConfig;
use bootemu_core::metrics::SessionMetrics;
use bootemu_core::{Device, SessionOutcome, STAY_IN_BOOTLOADER_FLAG};
use clap::{Parser, Subcommand};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info};

use crate::bootloader::ReferenceBootloader;

const EXIT_PASS: u8 = 0;
const EXIT_CONFIG_ERROR: u8 = 2;
const EXIT_RUNTIME_ERROR: u8 = 3;

const RESULT_SCHEMA_VERSION: &str = "1.0";

/// `FIRMWARE_START` for raw images when neither `--base` nor a config says
/// otherwise.
const DEFAULT_FIRMWARE_START: u64 = 0x0804_0000;

fn parse_u64_addr(s: &str) -> Result<u64, String> {
    let trimmed = s.trim();
    if let Some(hex) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        u64::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex address '{}': {}", s, e))
    } else {
        u64::from_str(trimmed).map_err(|e| format!("Invalid address '{}': {}", s, e))
    }
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Bootloader Emulator",
    long_about = None,
    subcommand_negates_reqs = true
)]
struct Cli {
    /// Path to the firmware image (ELF or raw binary)
    #[arg(short, long)]
    firmware: Option<PathBuf>,

    /// Path to the emulator profile (YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// FIRMWARE_START for raw binaries (overrides the profile)
    #[arg(long, value_parser = parse_u64_addr)]
    base: Option<u64>,

    /// Jump target handed to the emulated branch (default: FIRMWARE_START)
    #[arg(long, value_parser = parse_u64_addr)]
    entry: Option<u64>,

    /// Set the stay-in-bootloader flag before booting
    #[arg(long)]
    stay: bool,

    /// Simulate power loss before booting (clears retained state)
    #[arg(long)]
    power_cycle: bool,

    /// Retained-state JSON file carried across runs (overrides the profile)
    #[arg(long)]
    retained: Option<PathBuf>,

    /// Maximum idle-loop polls while resident (overrides the profile)
    #[arg(long)]
    max_polls: Option<u64>,

    /// Write the run result (JSON) to this path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Enable debug logging of every emulated platform call
    #[arg(short, long, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Inspect or edit the retained stay-in-bootloader flag.
    Flag(FlagArgs),
}

#[derive(Parser, Debug)]
struct FlagArgs {
    /// Retained-state JSON file
    #[arg(short, long)]
    retained: PathBuf,

    #[command(subcommand)]
    action: FlagAction,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum FlagAction {
    /// Print the raw flag value
    Show,
    /// Request bootloader mode on the next boot
    Set,
    /// Clear the flag
    Clear,
}

#[derive(Debug, Serialize)]
struct RunConfig {
    firmware: PathBuf,
    config: Option<PathBuf>,
    retained: Option<PathBuf>,
    firmware_start: u64,
    firmware_size: u64,
    max_polls: u64,
}

#[derive(Debug, Serialize)]
struct RunResult {
    result_schema_version: String,
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    outcome: Option<SessionOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    flag_before: u32,
    flag_after: u32,
    boot_count: u64,
    polls: u64,
    events_processed: u64,
    firmware_hash: String,
    config: RunConfig,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing with appropriate level based on --trace flag
    if cli.trace {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .init();
    }

    match cli.command {
        Some(Commands::Flag(args)) => run_flag(args),
        None => run_boot(cli),
    }
}

fn run_flag(args: FlagArgs) -> ExitCode {
    let mut snapshot = match retained::load(&args.retained) {
        Ok(s) => s,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    match args.action {
        FlagAction::Show => {
            println!("{:#010x}", snapshot.stay_in_bootloader_flag);
            return ExitCode::from(EXIT_PASS);
        }
        FlagAction::Set => snapshot.stay_in_bootloader_flag = STAY_IN_BOOTLOADER_FLAG,
        FlagAction::Clear => snapshot.stay_in_bootloader_flag = 0,
    }

    if let Err(e) = retained::store(&args.retained, &snapshot) {
        error!("{:#}", e);
        return ExitCode::from(EXIT_RUNTIME_ERROR);
    }
    info!(
        "stay_in_bootloader_flag = {:#010x} ({:?})",
        snapshot.stay_in_bootloader_flag, args.retained
    );
    ExitCode::from(EXIT_PASS)
}

fn load_config(cli: &Cli) -> Result<EmulatorConfig> {
    let mut config = match &cli.config {
        Some(path) => EmulatorConfig::from_file(path)?,
        None => EmulatorConfig::with_base(DEFAULT_FIRMWARE_START),
    };
    if let Some(base) = cli.base {
        config.firmware.base = base;
    }
    if let Some(max_polls) = cli.max_polls {
        config.max_polls = max_polls;
    }
    if let Some(retained) = &cli.retained {
        config.retained = Some(retained.clone());
    }
    config.validate().context("Invalid emulator configuration")?;
    Ok(config)
}

fn firmware_hash(path: &Path) -> String {
    match std::fs::read(path) {
        Ok(bytes) => {
            let mut hasher = Sha256::new();
            hasher.update(&bytes);
            format!("{:x}", hasher.finalize())
        }
        Err(e) => {
            error!("Failed to read firmware for hash {:?}: {}", path, e);
            String::new()
        }
    }
}

fn write_result(path: &Path, result: &RunResult) {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                error!("Failed to create result parent dir {:?}: {}", parent, e);
                return;
            }
        }
    }
    match std::fs::File::create(path) {
        Ok(f) => {
            if let Err(e) = serde_json::to_writer_pretty(f, result) {
                error!("Failed to write result {:?}: {}", path, e);
            }
        }
        Err(e) => error!("Failed to create result {:?}: {}", path, e),
    }
}

fn run_boot(cli: Cli) -> ExitCode {
    info!("Starting Bootloader Emulator");

    let Some(firmware) = cli.firmware.clone() else {
        error!("Missing required --firmware argument");
        return ExitCode::from(EXIT_CONFIG_ERROR);
    };

    let config = match load_config(&cli) {
        Ok(c) => c,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let (clock, reserved, events) =
        match (config.clock_mode(), config.reserved_size(), config.host_events()) {
            (Ok(c), Ok(r), Ok(e)) => (c, r, e),
            (Err(e), _, _) | (_, Err(e), _) | (_, _, Err(e)) => {
                error!("{:#}", e);
                return ExitCode::from(EXIT_CONFIG_ERROR);
            }
        };

    info!("Loading firmware: {:?}", firmware);
    let image = match bootemu_loader::load_firmware(&firmware, config.firmware.base) {
        Ok(image) => image,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };
    info!(
        "FIRMWARE_START = {:#x} ({} bytes loaded)",
        image.start,
        image.len()
    );

    let mut device = Device::new(image);
    if let Some(size) = reserved {
        device = device.with_reserved_size(size);
    }

    if let Some(path) = &config.retained {
        match retained::load(path) {
            Ok(snapshot) => device.apply_snapshot(&snapshot),
            Err(e) => {
                error!("{:#}", e);
                return ExitCode::from(EXIT_CONFIG_ERROR);
            }
        }
    }
    if cli.power_cycle {
        device.power_cycle();
    }
    if cli.stay {
        device.stay_in_bootloader_flag_mut().request();
    }

    let metrics = Arc::new(SessionMetrics::new());
    device.add_observer(metrics.clone());

    let mut bl = ReferenceBootloader::new(clock, config.max_polls);
    bl.entry = cli.entry;

    let flag_before = device.stay_in_bootloader_flag().read();
    let boot_result = device.boot(&mut bl, events);

    let stored = match &config.retained {
        Some(path) => retained::store(path, &device.snapshot()),
        None => Ok(()),
    };

    let (status, exit, outcome, message) = match (boot_result, stored) {
        (Err(e), stored) => {
            if let Err(store_err) = stored {
                error!("{:#}", store_err);
            }
            error!("Emulated run aborted: {}", e);
            ("fault", EXIT_RUNTIME_ERROR, None, Some(e.to_string()))
        }
        // The next run would boot with a stale flag
        (Ok(outcome), Err(e)) => {
            error!("{:#}", e);
            ("fault", EXIT_RUNTIME_ERROR, Some(outcome), Some(format!("{:#}", e)))
        }
        (Ok(outcome), Ok(())) => ("ok", EXIT_PASS, Some(outcome), None),
    };

    let region = device.firmware_region();
    let result = RunResult {
        result_schema_version: RESULT_SCHEMA_VERSION.to_string(),
        status: status.to_string(),
        outcome,
        message,
        flag_before,
        flag_after: device.stay_in_bootloader_flag().read(),
        boot_count: device.boot_count(),
        polls: metrics.get_polls(),
        events_processed: metrics.get_events(),
        firmware_hash: firmware_hash(&firmware),
        config: RunConfig {
            firmware: firmware.clone(),
            config: cli.config.clone(),
            retained: config.retained.clone(),
            firmware_start: region.start,
            firmware_size: region.size,
            max_polls: config.max_polls,
        },
    };

    info!(
        "Run finished: status={}, polls={}, flag_after={:#010x}",
        result.status, result.polls, result.flag_after
    );

    if let Some(path) = &cli.output {
        write_result(path, &result);
    }

    ExitCode::from(exit)
}
