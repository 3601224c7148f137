use crate::{crc8, Error};
use core::{
    fmt::{Debug, Display, Formatter, Result as FmtResult},
    ops::Deref,
    str::FromStr,
};

/// 64-bit device ROM code: family code, 48-bit serial number and CRC8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Rom {
    raw: [u8; 8],
}

impl From<[u8; Rom::BYTES]> for Rom {
    fn from(raw: [u8; Rom::BYTES]) -> Self {
        Rom { raw }
    }
}

impl From<Rom> for [u8; Rom::BYTES] {
    fn from(rom: Rom) -> [u8; Rom::BYTES] {
        rom.raw
    }
}

impl Deref for Rom {
    type Target = [u8; Rom::BYTES];

    fn deref(&self) -> &Self::Target {
        &self.raw
    }
}

impl AsRef<[u8]> for Rom {
    fn as_ref(&self) -> &[u8] {
        &self.raw
    }
}

impl Rom {
    /// The length of a ROM code in bytes
    pub const BYTES: usize = 8;

    /// The length of a ROM code in bits
    pub const BITS: usize = Self::BYTES * 8;

    /// Builds a ROM code from its family and serial number, appending the CRC.
    pub fn from_parts(family: u8, serial: [u8; 6]) -> Self {
        let mut raw = [0; Self::BYTES];
        raw[0] = family;
        raw[1..7].copy_from_slice(&serial);
        raw[7] = crc8(&raw[..7]);
        Rom { raw }
    }

    pub fn family_code(&self) -> u8 {
        self.raw[0]
    }

    pub fn serial(&self) -> [u8; 6] {
        let mut serial = [0; 6];
        serial.copy_from_slice(&self.raw[1..7]);
        serial
    }

    pub fn crc(&self) -> u8 {
        self.raw[7]
    }

    pub fn is_valid(&self) -> bool {
        crc8(&self.raw[..7]) == self.crc()
    }

    pub fn ensure_valid<E: Debug>(&self) -> Result<(), Error<E>> {
        let computed = crc8(&self.raw[..7]);
        if computed != self.crc() {
            Err(Error::CrcMismatch {
                computed,
                expected: self.crc(),
            })
        } else {
            Ok(())
        }
    }

    /// Bits in the order they travel over the wire: byte 0 first, LSB first.
    pub fn to_bits(&self) -> [bool; Self::BITS] {
        let mut bits = [false; Self::BITS];
        for (n, bit) in bits.iter_mut().enumerate() {
            *bit = self.raw[n / 8] & (0x01 << (n % 8)) != 0;
        }
        bits
    }

    pub fn from_bits(bits: &[bool; Self::BITS]) -> Self {
        let mut raw = [0; Self::BYTES];
        for (n, _) in bits.iter().enumerate().filter(|(_, bit)| **bit) {
            raw[n / 8] |= 0x01 << (n % 8);
        }
        Rom { raw }
    }
}

/// Error type for parsing ROM codes from text
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RomError {
    #[error("rom code must be 16 hex characters, got {0}")]
    Length(usize),
    #[error("invalid hex character {0:?} in rom code")]
    Invalid(char),
    #[error("rom crc mismatch (computed: {computed:#04x}, expected: {expected:#04x})")]
    Crc { computed: u8, expected: u8 },
}

impl FromStr for Rom {
    type Err = RomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let count = s.chars().count();
        if count != Self::BYTES * 2 {
            return Err(RomError::Length(count));
        }
        let mut raw = [0; Self::BYTES];
        let mut chars = s.chars();
        for byte in raw.iter_mut() {
            for _ in 0..2 {
                // length was checked above
                let c = chars.next().unwrap_or_default();
                let nibble = c.to_digit(16).ok_or(RomError::Invalid(c))?;
                *byte = (*byte << 4) | nibble as u8;
            }
        }
        let rom = Rom { raw };
        let computed = crc8(&raw[..7]);
        if computed != rom.crc() {
            return Err(RomError::Crc {
                computed,
                expected: rom.crc(),
            });
        }
        Ok(rom)
    }
}

impl Display for Rom {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        for byte in self.raw.iter() {
            write!(f, "{:02X}", byte)?;
        }
        Ok(())
    }
}
