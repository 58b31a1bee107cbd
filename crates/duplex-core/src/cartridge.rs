//! Cartridge images
//!
//! Only the header fields the link-play core needs are decoded. Banking
//! controllers, RTC and battery files are the emulator front end's business.

use crate::{Error, Result};
use std::sync::Arc;

/// Size of ROM up to and including the cartridge header
pub const HEADER_END: usize = 0x150;

pub(crate) const TITLE_START: usize = 0x134;
pub(crate) const TITLE_END: usize = 0x144;
pub(crate) const RAM_SIZE_ADDRESS: usize = 0x149;

/// A cartridge image: ROM plus optional battery-backed RAM contents
///
/// Cheap to clone; the ROM is shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cartridge {
    rom: Arc<[u8]>,
    battery: Option<Arc<[u8]>>,
}

impl Cartridge {
    /// Create a cartridge from a ROM image
    pub fn new(rom: impl Into<Arc<[u8]>>) -> Result<Self> {
        let rom = rom.into();
        if rom.len() < HEADER_END {
            return Err(Error::InvalidCartridge(format!(
                "ROM is {} bytes, header needs at least {}",
                rom.len(),
                HEADER_END
            )));
        }
        Ok(Self { rom, battery: None })
    }

    /// Create a cartridge from a ROM image and saved battery RAM
    pub fn with_battery(rom: impl Into<Arc<[u8]>>, battery: impl Into<Arc<[u8]>>) -> Result<Self> {
        let mut cartridge = Self::new(rom)?;
        cartridge.battery = Some(battery.into());
        Ok(cartridge)
    }

    /// ROM bytes
    pub fn rom(&self) -> &[u8] {
        &self.rom
    }

    /// Battery RAM contents, if any were supplied
    pub fn battery(&self) -> Option<&[u8]> {
        self.battery.as_deref()
    }

    /// Game title from the header, trailing NULs removed
    pub fn title(&self) -> String {
        let raw = &self.rom[TITLE_START..TITLE_END];
        let end = raw.iter().position(|b| *b == 0).unwrap_or(raw.len());
        raw[..end]
            .iter()
            .map(|b| if b.is_ascii_graphic() || *b == b' ' { *b as char } else { '?' })
            .collect::<String>()
            .trim_end()
            .to_string()
    }

    /// External RAM size declared by the header
    pub fn ram_size(&self) -> usize {
        match self.rom[RAM_SIZE_ADDRESS] {
            1 => 0x800,
            2 => 0x2000,
            3 => 0x8000,
            4 => 0x20000,
            5 => 0x10000,
            _ => 0,
        }
    }

    /// Initial cartridge RAM: battery contents padded or cut to `ram_size`
    pub fn initial_ram(&self) -> Vec<u8> {
        let mut ram = vec![0u8; self.ram_size()];
        if let Some(battery) = self.battery() {
            let n = battery.len().min(ram.len());
            ram[..n].copy_from_slice(&battery[..n]);
        }
        ram
    }
}
