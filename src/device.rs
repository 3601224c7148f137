use crate::{Driver, Error, Rom, Uart};
use core::fmt::Debug;

/// How a device is selected before each function command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Addressing {
    /// SKIP ROM; only valid with exactly one device on the bus
    Single,
    /// MATCH ROM with the device's code
    Rom(Rom),
}

impl From<Option<Rom>> for Addressing {
    fn from(rom: Option<Rom>) -> Self {
        rom.map_or(Addressing::Single, Addressing::Rom)
    }
}

impl<E: Debug, U: Uart<Error = E>> Driver<U> {
    /// Resets the bus and selects the device.
    pub fn address(&mut self, addressing: &Addressing) -> Result<(), Error<E>> {
        match addressing {
            Addressing::Single => self.skip(),
            Addressing::Rom(rom) => self.select(rom),
        }
    }

    pub fn address_write_read(
        &mut self,
        addressing: &Addressing,
        write: &[u8],
        read: &mut [u8],
    ) -> Result<(), Error<E>> {
        match addressing {
            Addressing::Single => self.reset_skip_write_read(write, read),
            Addressing::Rom(rom) => self.reset_select_write_read(rom, write, read),
        }
    }
}
