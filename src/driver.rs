use crate::{BusConfig, Command, Error, OpCode, Rom, Uart};
use core::fmt::Debug;
use log::trace;

/// Sent at the reset baud rate: the low nibble is the reset pulse, devices
/// answer by pulling the line low inside the high nibble.
const RESET_PULSE: u8 = 0xF0;
/// Starts a read slot or writes a 1
const SLOT_HIGH: u8 = 0xFF;
/// Writes a 0
const SLOT_LOW: u8 = 0x00;

/// 1-Wire signaling over a UART.
///
/// Every 1-Wire time slot is one UART frame: the byte is transmitted and its
/// echo read back. A driver is only reachable from inside
/// [`Bus::transaction`](crate::Bus::transaction), so all of these primitives
/// run with the bus locked.
pub struct Driver<U: Uart> {
    uart: U,
    config: BusConfig,
}

impl<U: Uart> Driver<U> {
    pub(crate) fn new(uart: U, config: BusConfig) -> Self {
        Driver { uart, config }
    }

    pub(crate) fn into_inner(self) -> U {
        self.uart
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }
}

impl<E: Debug, U: Uart<Error = E>> Driver<U> {
    pub fn reset_write_read(&mut self, write: &[u8], read: &mut [u8]) -> Result<(), Error<E>> {
        self.reset()?;
        self.write_bytes(write)?;
        self.read_bytes(read)?;
        Ok(())
    }

    pub fn reset_select_write_read(
        &mut self,
        rom: &Rom,
        write: &[u8],
        read: &mut [u8],
    ) -> Result<(), Error<E>> {
        self.select(rom)?;
        self.write_bytes(write)?;
        self.read_bytes(read)?;
        Ok(())
    }

    pub fn reset_skip_write_read(&mut self, write: &[u8], read: &mut [u8]) -> Result<(), Error<E>> {
        self.skip()?;
        self.write_bytes(write)?;
        self.read_bytes(read)?;
        Ok(())
    }

    /// READ ROM: reads the code of the only device on the bus.
    ///
    /// With more than one device present the answers collide and the CRC
    /// check fails.
    pub fn read_rom(&mut self) -> Result<Rom, Error<E>> {
        let mut raw = [0u8; Rom::BYTES];
        self.reset_write_read(&[Command::ReadRom.op_code()], &mut raw)?;
        let rom = Rom::from(raw);
        rom.ensure_valid()?;
        Ok(rom)
    }

    /// SKIP ROM: addresses every device on the bus at once.
    pub fn skip(&mut self) -> Result<(), Error<E>> {
        self.reset()?;
        self.write_command(Command::SkipRom)
    }

    /// MATCH ROM: only the device with this code answers until the next reset.
    pub fn select(&mut self, rom: &Rom) -> Result<(), Error<E>> {
        self.reset()?;
        self.write_command(Command::MatchRom)?;
        self.write_bytes(rom.as_ref())
    }

    /// Performs a reset and listens for a presence pulse.
    ///
    /// The UART is switched to the reset baud rate for the pulse and always
    /// switched back afterwards, even if no device answered.
    pub fn reset(&mut self) -> Result<(), Error<E>> {
        self.uart.set_baud_rate(self.config.reset_baud_rate)?;
        let pulse = self.reset_pulse();
        self.uart.set_baud_rate(self.config.baud_rate)?;
        pulse
    }

    /// Like [`reset`](Self::reset), but an empty bus is `Ok(false)`.
    pub fn reset_presence(&mut self) -> Result<bool, Error<E>> {
        self.reset().map(|_| true).or_else(|error| {
            if matches!(error, Error::NoPresence) {
                Ok(false)
            } else {
                Err(error)
            }
        })
    }

    fn reset_pulse(&mut self) -> Result<(), Error<E>> {
        self.clear()?;
        let mut echo = [0u8; 1];
        self.exchange(&[RESET_PULSE], &mut echo)?;
        trace!("reset pulse echo {:#04x}", echo[0]);
        check_presence(echo[0])
    }

    pub fn read_bytes(&mut self, dst: &mut [u8]) -> Result<(), Error<E>> {
        for d in dst {
            *d = self.read_byte()?;
        }
        Ok(())
    }

    /// Reads 8 slots in one go, LSB first.
    pub fn read_byte(&mut self) -> Result<u8, Error<E>> {
        self.clear()?;
        let mut echo = [0u8; 8];
        self.exchange(&[SLOT_HIGH; 8], &mut echo)?;
        let byte = echo
            .iter()
            .enumerate()
            .filter(|(_, slot)| **slot == SLOT_HIGH)
            .fold(0u8, |byte, (n, _)| byte | (0x01 << n));
        Ok(byte)
    }

    /// A device sending 0 pulls the line low during the slot, so any echo
    /// other than `0xFF` reads as 0.
    pub fn read_bit(&mut self) -> Result<bool, Error<E>> {
        self.clear()?;
        let mut echo = [0u8; 1];
        self.exchange(&[SLOT_HIGH], &mut echo)?;
        Ok(echo[0] == SLOT_HIGH)
    }

    pub fn write_command(&mut self, cmd: impl OpCode) -> Result<(), Error<E>> {
        self.write_byte(cmd.op_code())
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), Error<E>> {
        for b in bytes {
            self.write_byte(*b)?;
        }
        Ok(())
    }

    /// Writes 8 slots in one go, LSB first, and checks every echo.
    pub fn write_byte(&mut self, byte: u8) -> Result<(), Error<E>> {
        self.clear()?;
        let mut slots = [SLOT_LOW; 8];
        for (n, slot) in slots.iter_mut().enumerate() {
            if byte & (0x01 << n) != 0 {
                *slot = SLOT_HIGH;
            }
        }
        let mut echo = [0u8; 8];
        self.exchange(&slots, &mut echo)?;
        for (written, echoed) in slots.iter().zip(echo.iter()) {
            if written != echoed {
                return Err(Error::Noise {
                    written: *written,
                    echoed: *echoed,
                });
            }
        }
        Ok(())
    }

    /// The echo must match what was sent, otherwise something else drove
    /// the line during the slot.
    pub fn write_bit(&mut self, high: bool) -> Result<(), Error<E>> {
        self.clear()?;
        let slot = if high { SLOT_HIGH } else { SLOT_LOW };
        let mut echo = [0u8; 1];
        self.exchange(&[slot], &mut echo)?;
        if echo[0] != slot {
            return Err(Error::Noise {
                written: slot,
                echoed: echo[0],
            });
        }
        Ok(())
    }

    fn exchange(&mut self, slots: &[u8], echo: &mut [u8]) -> Result<(), Error<E>> {
        let written = self.uart.write(slots)?;
        if written != slots.len() {
            return Err(Error::ShortTransfer {
                expected: slots.len(),
                actual: written,
            });
        }
        let read = self.uart.read(echo)?;
        if read != echo.len() {
            return Err(Error::ShortTransfer {
                expected: echo.len(),
                actual: read,
            });
        }
        Ok(())
    }

    fn clear(&mut self) -> Result<(), E> {
        self.uart.reset_output_buffer()?;
        self.uart.reset_input_buffer()
    }
}

/// Low nibble set means the frame was misaligned; a high nibble of `0xF`
/// means nothing pulled the line during the presence window.
fn check_presence<E: Debug>(echo: u8) -> Result<(), Error<E>> {
    if echo & 0x0F != 0 {
        Err(Error::ResetPulse(echo))
    } else if echo >> 4 == 0x0F {
        Err(Error::NoPresence)
    } else {
        Ok(())
    }
}
