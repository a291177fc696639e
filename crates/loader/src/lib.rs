// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{anyhow, bail, Context, Result};
use bootemu_core::FirmwareImage;
use goblin::elf::program_header::PT_LOAD;
use goblin::elf::Elf;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

const ELF_MAGIC: &[u8; 4] = b"\x7fELF";

pub fn is_elf(buffer: &[u8]) -> bool {
    buffer.starts_with(ELF_MAGIC)
}

/// Loads a firmware image from disk. ELF files are placed by their segment
/// addresses; anything else is a raw binary placed at `base`.
pub fn load_firmware(path: &Path, base: u64) -> Result<FirmwareImage> {
    let buffer =
        fs::read(path).with_context(|| format!("Failed to read firmware file: {:?}", path))?;
    load_firmware_bytes(&buffer, base)
}

pub fn load_firmware_bytes(buffer: &[u8], base: u64) -> Result<FirmwareImage> {
    if is_elf(buffer) {
        let image = load_elf_bytes(buffer)?;
        if image.start != base {
            warn!(
                "ELF image starts at {:#x}, configured FIRMWARE_START is {:#x}; using ELF layout",
                image.start, base
            );
        }
        Ok(image)
    } else {
        load_raw_bytes(buffer, base)
    }
}

pub fn load_raw_bytes(buffer: &[u8], base: u64) -> Result<FirmwareImage> {
    if buffer.is_empty() {
        bail!("Firmware binary is empty");
    }
    if base.checked_add(buffer.len() as u64).is_none() {
        bail!(
            "Firmware of {} bytes does not fit above {:#x}",
            buffer.len(),
            base
        );
    }
    info!("Raw firmware: {} bytes at {:#x}", buffer.len(), base);
    Ok(FirmwareImage::new(base, buffer.to_vec()))
}

pub fn load_elf_bytes(buffer: &[u8]) -> Result<FirmwareImage> {
    let elf = Elf::parse(buffer).context("Failed to parse ELF binary")?;

    info!("ELF Entry Point: {:#x}", elf.entry);
    if elf.header.e_machine != goblin::elf::header::EM_ARM {
        warn!(
            "ELF machine type {} is not ARM; vector table decoding may be meaningless",
            elf.header.e_machine
        );
    }

    let mut segments = Vec::new();
    for ph in &elf.program_headers {
        if ph.p_type != PT_LOAD {
            continue;
        }
        // Physical address (LMA) is where the bytes sit in flash
        let start_addr = ph.p_paddr;
        let size = ph.p_filesz as usize;
        let offset = ph.p_offset as usize;

        if size == 0 {
            continue;
        }

        debug!(
            "Found Loadable Segment: Addr={:#x}, Size={} bytes, Offset={:#x}",
            start_addr, size, offset
        );

        let end = offset
            .checked_add(size)
            .filter(|end| *end <= buffer.len())
            .ok_or_else(|| anyhow!("Segment out of bounds in ELF file"))?;
        segments.push((start_addr, buffer[offset..end].to_vec()));
    }

    FirmwareImage::from_segments(&segments).context("Failed to lay out ELF segments")
}

#[cfg(test)]
mod tests {
    use super::*;
    use bootemu_core::ImageError;

    /// Builds a little-endian ELF32 ARM executable with one PT_LOAD segment
    /// per `(paddr, bytes)` pair.
    fn build_elf(entry: u32, segments: &[(u32, &[u8])]) -> Vec<u8> {
        const EHSIZE: u32 = 52;
        const PHENTSIZE: u32 = 32;

        let mut out = Vec::new();
        out.extend_from_slice(ELF_MAGIC);
        out.extend_from_slice(&[1, 1, 1, 0]); // ELFCLASS32, LSB, version, SYSV
        out.extend_from_slice(&[0; 8]);
        out.extend_from_slice(&2u16.to_le_bytes()); // ET_EXEC
        out.extend_from_slice(&40u16.to_le_bytes()); // EM_ARM
        out.extend_from_slice(&1u32.to_le_bytes());
        out.extend_from_slice(&entry.to_le_bytes());
        out.extend_from_slice(&EHSIZE.to_le_bytes()); // e_phoff
        out.extend_from_slice(&0u32.to_le_bytes()); // e_shoff
        out.extend_from_slice(&0u32.to_le_bytes()); // e_flags
        out.extend_from_slice(&(EHSIZE as u16).to_le_bytes());
        out.extend_from_slice(&(PHENTSIZE as u16).to_le_bytes());
        out.extend_from_slice(&(segments.len() as u16).to_le_bytes());
        out.extend_from_slice(&40u16.to_le_bytes()); // e_shentsize
        out.extend_from_slice(&0u16.to_le_bytes()); // e_shnum
        out.extend_from_slice(&0u16.to_le_bytes()); // e_shstrndx
        assert_eq!(out.len(), EHSIZE as usize);

        let mut data_offset = EHSIZE + PHENTSIZE * segments.len() as u32;
        for (paddr, bytes) in segments {
            let len = bytes.len() as u32;
            for word in [1, data_offset, *paddr, *paddr, len, len, 5, 4] {
                out.extend_from_slice(&u32::to_le_bytes(word));
            }
            data_offset += len;
        }
        for (_, bytes) in segments {
            out.extend_from_slice(bytes);
        }
        out
    }

    #[test]
    fn test_raw_binary() {
        let image = load_firmware_bytes(&[1, 2, 3, 4], 0x0804_0000).unwrap();
        assert_eq!(image.start, 0x0804_0000);
        assert_eq!(image.data, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_raw_binary_rejects_empty() {
        assert!(load_raw_bytes(&[], 0x1000).is_err());
        assert!(load_raw_bytes(&[0; 16], u64::MAX - 4).is_err());
    }

    #[test]
    fn test_elf_segments() {
        let vectors: &[u8] = &[0x00, 0x00, 0x02, 0x20, 0x01, 0x01, 0x00, 0x08];
        let tail: &[u8] = &[0xAA, 0xBB];
        let elf = build_elf(0x0800_0101, &[(0x0800_0000, vectors), (0x0800_0010, tail)]);
        assert!(is_elf(&elf));

        // Configured base is ignored for ELF images
        let image = load_firmware_bytes(&elf, 0x0900_0000).unwrap();
        assert_eq!(image.start, 0x0800_0000);
        assert_eq!(image.len(), 0x12);
        assert_eq!(image.read_u32(0x0800_0000), Some(0x2002_0000));
        assert_eq!(image.read_u8(0x0800_0008), Some(0xFF));
        assert_eq!(image.read_u8(0x0800_0011), Some(0xBB));
    }

    #[test]
    fn test_elf_without_loadable_segments() {
        let elf = build_elf(0, &[]);
        let err = load_elf_bytes(&elf).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ImageError>(),
            Some(&ImageError::NoSegments)
        );
    }

    #[test]
    fn test_elf_segments_too_far_apart() {
        let flash: &[u8] = &[0x00, 0x00, 0x02, 0x20];
        let ram: &[u8] = &[0xAA; 4];
        let elf = build_elf(0x0800_0001, &[(0x0800_0000, flash), (0x2000_0000, ram)]);

        let err = load_elf_bytes(&elf).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to lay out ELF segments"));
        assert!(matches!(
            err.downcast_ref::<ImageError>(),
            Some(ImageError::SpanTooLarge { .. })
        ));
    }

    /// ELF64 counterpart of `build_elf`, one `PT_LOAD` per segment.
    fn build_elf64(segments: &[(u64, &[u8])]) -> Vec<u8> {
        const EHSIZE: u64 = 64;
        const PHENTSIZE: u64 = 56;

        let mut out = Vec::new();
        out.extend_from_slice(ELF_MAGIC);
        out.extend_from_slice(&[2, 1, 1, 0]); // ELFCLASS64, LSB, version, SYSV
        out.extend_from_slice(&[0; 8]);
        out.extend_from_slice(&2u16.to_le_bytes()); // ET_EXEC
        out.extend_from_slice(&183u16.to_le_bytes()); // EM_AARCH64
        out.extend_from_slice(&1u32.to_le_bytes());
        out.extend_from_slice(&0u64.to_le_bytes()); // e_entry
        out.extend_from_slice(&EHSIZE.to_le_bytes()); // e_phoff
        out.extend_from_slice(&0u64.to_le_bytes()); // e_shoff
        out.extend_from_slice(&0u32.to_le_bytes()); // e_flags
        out.extend_from_slice(&(EHSIZE as u16).to_le_bytes());
        out.extend_from_slice(&(PHENTSIZE as u16).to_le_bytes());
        out.extend_from_slice(&(segments.len() as u16).to_le_bytes());
        out.extend_from_slice(&64u16.to_le_bytes()); // e_shentsize
        out.extend_from_slice(&0u16.to_le_bytes()); // e_shnum
        out.extend_from_slice(&0u16.to_le_bytes()); // e_shstrndx
        assert_eq!(out.len(), EHSIZE as usize);

        let mut data_offset = EHSIZE + PHENTSIZE * segments.len() as u64;
        for (paddr, bytes) in segments {
            let len = bytes.len() as u64;
            out.extend_from_slice(&1u32.to_le_bytes()); // PT_LOAD
            out.extend_from_slice(&5u32.to_le_bytes()); // R+X
            for word in [data_offset, *paddr, *paddr, len, len, 4] {
                out.extend_from_slice(&word.to_le_bytes());
            }
            data_offset += len;
        }
        for (_, bytes) in segments {
            out.extend_from_slice(bytes);
        }
        out
    }

    #[test]
    fn test_elf_segment_past_address_space() {
        let payload: &[u8] = &[1, 2, 3, 4];
        let elf = build_elf64(&[(u64::MAX - 1, payload)]);

        let err = load_elf_bytes(&elf).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ImageError>(),
            Some(&ImageError::AddressOverflow {
                addr: u64::MAX - 1,
                len: 4
            })
        );
    }

    #[test]
    fn test_garbage_with_elf_magic() {
        let mut bytes = ELF_MAGIC.to_vec();
        bytes.extend_from_slice(&[0xFF; 8]);
        assert!(load_firmware_bytes(&bytes, 0x1000).is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = load_firmware(Path::new("does/not/exist.bin"), 0x1000).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to read firmware file"));
    }
}
