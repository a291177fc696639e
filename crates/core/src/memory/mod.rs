// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};

/// Value of erased flash, used to fill gaps between loaded segments.
pub const ERASED_BYTE: u8 = 0xFF;

/// Largest address span a merged image may cover.
pub const MAX_IMAGE_SPAN: u64 = 64 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ImageError {
    #[error("No loadable segments")]
    NoSegments,
    #[error("Segment at {addr:#x} of {len} bytes overflows the address space")]
    AddressOverflow { addr: u64, len: u64 },
    #[error("Segments span {span:#x} bytes from {start:#x}, limit is {limit:#x}")]
    SpanTooLarge { start: u64, span: u64, limit: u64 },
}

/// Address range reserved for a firmware image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirmwareRegion {
    pub start: u64,
    pub size: u64,
}

impl FirmwareRegion {
    pub fn new(start: u64, size: u64) -> Self {
        Self { start, size }
    }

    /// Exclusive end address, saturating at `u64::MAX`.
    pub fn end(&self) -> u64 {
        self.start.saturating_add(self.size)
    }

    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.start && addr < self.end()
    }
}

impl std::fmt::Display for FirmwareRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:#x}, {:#x})", self.start, self.end())
    }
}

/// A loaded firmware blob. `start` is what the bootloader knows as
/// `FIRMWARE_START`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirmwareImage {
    pub start: u64,
    pub data: Vec<u8>,
}

impl FirmwareImage {
    pub fn new(start: u64, data: Vec<u8>) -> Self {
        Self { start, data }
    }

    /// Builds a contiguous image from `(address, bytes)` segments.
    ///
    /// The image starts at the lowest segment address. Holes between
    /// segments read back as erased flash. Later segments win on overlap.
    pub fn from_segments(segments: &[(u64, Vec<u8>)]) -> Result<Self, ImageError> {
        let mut bounds: Option<(u64, u64)> = None;
        for (addr, bytes) in segments.iter().filter(|(_, d)| !d.is_empty()) {
            let len = bytes.len() as u64;
            let end = addr
                .checked_add(len)
                .ok_or(ImageError::AddressOverflow { addr: *addr, len })?;
            bounds = Some(match bounds {
                Some((lo, hi)) => (lo.min(*addr), hi.max(end)),
                None => (*addr, end),
            });
        }
        let (start, end) = bounds.ok_or(ImageError::NoSegments)?;

        let span = end - start;
        if span > MAX_IMAGE_SPAN {
            return Err(ImageError::SpanTooLarge {
                start,
                span,
                limit: MAX_IMAGE_SPAN,
            });
        }

        let mut data = vec![ERASED_BYTE; span as usize];
        for (addr, bytes) in segments {
            if bytes.is_empty() {
                continue;
            }
            let offset = (addr - start) as usize;
            data[offset..offset + bytes.len()].copy_from_slice(bytes);
        }
        Ok(Self { start, data })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn region(&self) -> FirmwareRegion {
        FirmwareRegion::new(self.start, self.data.len() as u64)
    }

    pub fn read_u8(&self, addr: u64) -> Option<u8> {
        if self.region().contains(addr) {
            Some(self.data[(addr - self.start) as usize])
        } else {
            None
        }
    }

    pub fn read_u32(&self, addr: u64) -> Option<u32> {
        let b0 = self.read_u8(addr)? as u32;
        let b1 = self.read_u8(addr.checked_add(1)?)? as u32;
        let b2 = self.read_u8(addr.checked_add(2)?)? as u32;
        let b3 = self.read_u8(addr.checked_add(3)?)? as u32;
        // Little Endian
        Some(b0 | (b1 << 8) | (b2 << 16) | (b3 << 24))
    }
}
