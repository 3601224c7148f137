//! DS18S20, DS1822 and DS18B20 digital thermometers.

use byteorder::{ByteOrder, LittleEndian};
use embedded_hal::delay::DelayNs;
use log::{debug, warn};
use std::{
    ops::Deref,
    time::{Duration, Instant},
};

use crate::{crc8, Addressing, Bus, Driver, Error, OpCode, Rom, Uart};
use core::fmt::Debug;

#[derive(Clone, Copy, Debug)]
#[repr(u8)]
pub enum Command {
    Convert = 0x44,
    WriteScratchpad = 0x4e,
    ReadScratchpad = 0xBE,
    CopyScratchpad = 0x48,
    RecallE2 = 0xB8,
    ReadPowerSupply = 0xB4,
}

impl OpCode for Command {
    fn op_code(&self) -> u8 {
        *self as _
    }
}

const EEPROM_WRITE_TIME: Duration = Duration::from_millis(10);
const MAX_CONVERSION_TIME: Duration = Duration::from_millis(750);

/// Device family, from the first ROM byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Family {
    /// 0x10, fixed 9-bit reading refined by the count registers
    Ds18s20,
    /// 0x22, programmable resolution
    Ds1822,
    /// 0x28, programmable resolution
    Ds18b20,
    Unidentified(u8),
}

impl Family {
    pub fn from_code(code: u8) -> Self {
        match code {
            0x10 => Family::Ds18s20,
            0x22 => Family::Ds1822,
            0x28 => Family::Ds18b20,
            code => Family::Unidentified(code),
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            Family::Ds18s20 => 0x10,
            Family::Ds1822 => 0x22,
            Family::Ds18b20 => 0x28,
            Family::Unidentified(code) => *code,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Family::Ds18s20 => "DS18S20 - High-precision Digital Thermometer",
            Family::Ds1822 => "DS1822 - Econo Digital Thermometer",
            Family::Ds18b20 => "DS18B20 - Programmable Resolution Digital Thermometer",
            Family::Unidentified(_) => "Unidentified device",
        }
    }

    /// Whether scratchpad byte 4 holds a resolution configuration register.
    pub fn has_configuration(&self) -> bool {
        matches!(self, Family::Ds1822 | Family::Ds18b20)
    }

    /// Resolution at power-up with factory settings.
    pub fn default_resolution(&self) -> Resolution {
        if self.has_configuration() {
            Resolution::Bits12
        } else {
            Resolution::Bits9
        }
    }

    pub fn supports(&self, resolution: Resolution) -> bool {
        match self {
            Family::Ds18s20 => matches!(resolution, Resolution::Bits9 | Resolution::Extended),
            Family::Ds1822 | Family::Ds18b20 => resolution != Resolution::Extended,
            Family::Unidentified(_) => false,
        }
    }

    /// Worst case time to finish a conversion.
    ///
    /// Halves with every bit of resolution dropped: 750 ms at 12 bits down
    /// to 93.75 ms at 9 bits.
    pub fn conversion_time(&self, resolution: Resolution) -> Duration {
        match (self, resolution.code()) {
            (Family::Ds1822 | Family::Ds18b20, Some(code)) => {
                MAX_CONVERSION_TIME / u32::from(8u8 >> code)
            }
            _ => MAX_CONVERSION_TIME,
        }
    }

    /// Temperature in °C × 10 000, `None` for families that aren't thermometers.
    pub fn decode(&self, scratchpad: &Scratchpad, resolution: Resolution) -> Option<i32> {
        let raw = i32::from(scratchpad.temperature_raw());
        match self {
            Family::Ds18s20 => {
                let temperature = raw * 5000;
                let count_per_c = i32::from(scratchpad.count_per_c());
                if resolution != Resolution::Extended || count_per_c == 0 {
                    return Some(temperature);
                }
                let count_remain = i32::from(scratchpad.count_remain());
                Some(temperature - 2500 + 10000 * (count_per_c - count_remain) / count_per_c)
            }
            Family::Ds1822 | Family::Ds18b20 => Some(raw * 10000 / 16),
            Family::Unidentified(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Bits9,
    Bits10,
    Bits11,
    Bits12,
    /// DS18S20 reading refined with COUNT_REMAIN / COUNT_PER_C
    Extended,
}

impl Resolution {
    /// Two bit code stored in configuration register bits 5-6
    pub fn code(&self) -> Option<u8> {
        match self {
            Resolution::Bits9 => Some(0),
            Resolution::Bits10 => Some(1),
            Resolution::Bits11 => Some(2),
            Resolution::Bits12 => Some(3),
            Resolution::Extended => None,
        }
    }

    pub fn from_configuration(configuration: u8) -> Self {
        match (configuration >> 5) & 0b11 {
            0 => Resolution::Bits9,
            1 => Resolution::Bits10,
            2 => Resolution::Bits11,
            _ => Resolution::Bits12,
        }
    }

    /// Configuration register value; the low 5 bits always read as 1.
    pub fn configuration(&self) -> Option<u8> {
        self.code().map(|code| (code << 5) | 0b0001_1111)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Resolution::Bits9 => "9 bits",
            Resolution::Bits10 => "10 bits",
            Resolution::Bits11 => "11 bits",
            Resolution::Bits12 => "12 bits",
            Resolution::Extended => "extended",
        }
    }
}

/// Everything derived from the resolution, replaced as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub resolution: Resolution,
    pub conversion_time: Duration,
    pub eeprom_write_time: Duration,
    pub precision: &'static str,
}

impl Settings {
    fn new(family: Family, resolution: Resolution) -> Self {
        Settings {
            resolution,
            conversion_time: family.conversion_time(resolution),
            eeprom_write_time: EEPROM_WRITE_TIME,
            precision: match family {
                Family::Unidentified(_) => "unknown",
                _ => resolution.label(),
            },
        }
    }
}

/// The 8 data bytes of a scratchpad, CRC already checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scratchpad([u8; 8]);

impl From<[u8; 8]> for Scratchpad {
    fn from(raw: [u8; 8]) -> Self {
        Scratchpad(raw)
    }
}

impl Deref for Scratchpad {
    type Target = [u8; 8];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Scratchpad {
    pub fn temperature_raw(&self) -> i16 {
        LittleEndian::read_i16(&self.0[0..2])
    }

    pub fn alarm_high(&self) -> i8 {
        self.0[2] as i8
    }

    pub fn alarm_low(&self) -> i8 {
        self.0[3] as i8
    }

    pub fn configuration(&self) -> u8 {
        self.0[4]
    }

    pub fn count_remain(&self) -> u8 {
        self.0[6]
    }

    pub fn count_per_c(&self) -> u8 {
        self.0[7]
    }
}

/// A temperature sensor on a shared [`Bus`].
///
/// Every public method runs as one bus transaction.
pub struct TemperatureSensor<'a, U: Uart> {
    bus: &'a Bus<U>,
    addressing: Addressing,
    rom: Option<Rom>,
    family: Family,
    parasitic: bool,
    settings: Settings,
}

impl<'a, E: Debug, U: Uart<Error = E>> TemperatureSensor<'a, U> {
    /// Attaches to a sensor.
    ///
    /// Without a ROM code the sensor must be alone on the bus; its code is
    /// read with READ ROM and all commands use SKIP ROM. With a ROM code the
    /// device is looked up with a search walk and addressed with MATCH ROM.
    ///
    /// If `required` is false a sensor that isn't on the bus is still
    /// returned with factory settings; [`refresh`](Self::refresh) retries the
    /// probe. Any other failure is returned either way.
    pub fn new(bus: &'a Bus<U>, rom: Option<Rom>, required: bool) -> Result<Self, Error<E>> {
        let family = Family::from_code(rom.map_or(0x00, |rom| rom.family_code()));
        let mut sensor = TemperatureSensor {
            bus,
            addressing: Addressing::from(rom),
            rom,
            family,
            parasitic: false,
            settings: Settings::new(family, family.default_resolution()),
        };
        match sensor.refresh() {
            Ok(()) => Ok(sensor),
            Err(error @ Error::SensorNotFound(_)) if !required => {
                warn!("sensor {:?} not ready: {}", sensor.addressing, error);
                Ok(sensor)
            }
            Err(error) => Err(error),
        }
    }

    /// Probes the device: its ROM code in single mode, the power supply and
    /// the resolution stored in the device.
    pub fn refresh(&mut self) -> Result<(), Error<E>> {
        let addressing = self.addressing;
        let current = self.settings.resolution;
        let (rom, parasitic, family, resolution) = self.bus.transaction(|driver| {
            let rom = match addressing {
                Addressing::Single => driver.read_rom().map_err(|error| match error {
                    Error::NoPresence | Error::CrcMismatch { .. } => Error::SensorNotFound(None),
                    error => error,
                })?,
                Addressing::Rom(rom) => {
                    if !driver.is_connected(&rom)? {
                        return Err(Error::SensorNotFound(Some(rom)));
                    }
                    rom
                }
            };
            let parasitic = Self::read_power_supply(driver, &addressing)?;
            let family = Family::from_code(rom.family_code());
            let resolution = if family.has_configuration() {
                let scratchpad = Self::read_scratchpad_with(driver, &addressing)?;
                Resolution::from_configuration(scratchpad.configuration())
            } else if family.supports(current) {
                current
            } else {
                family.default_resolution()
            };
            Ok((rom, parasitic, family, resolution))
        })?;
        debug!(
            "{}: {}, parasitic: {}, resolution: {}",
            rom,
            family.description(),
            parasitic,
            resolution.label()
        );
        self.rom = Some(rom);
        self.family = family;
        self.parasitic = parasitic;
        self.settings = Settings::new(family, resolution);
        Ok(())
    }

    pub fn rom(&self) -> Option<Rom> {
        self.rom
    }

    pub fn addressing(&self) -> Addressing {
        self.addressing
    }

    pub fn family(&self) -> Family {
        self.family
    }

    pub fn description(&self) -> &'static str {
        self.family.description()
    }

    pub fn precision(&self) -> &'static str {
        self.settings.precision
    }

    pub fn is_parasitic(&self) -> bool {
        self.parasitic
    }

    pub fn resolution(&self) -> Resolution {
        self.settings.resolution
    }

    pub fn conversion_time(&self) -> Duration {
        self.settings.conversion_time
    }

    pub fn settings(&self) -> Settings {
        self.settings
    }

    /// Measures the temperature in °C × 10 000.
    pub fn temperature_precise(&self, delay: &mut impl DelayNs) -> Result<i32, Error<E>> {
        if !self.family.supports(self.settings.resolution) {
            return Err(Error::UnsupportedFamily(self.family.code()));
        }
        let scratchpad = self.bus.transaction(|driver| {
            self.convert(driver, delay)?;
            Self::read_scratchpad_with(driver, &self.addressing)
        })?;
        self.family
            .decode(&scratchpad, self.settings.resolution)
            .ok_or(Error::UnsupportedFamily(self.family.code()))
    }

    /// Measures the temperature in hundredths of °C.
    pub fn temperature(&self, delay: &mut impl DelayNs) -> Result<i32, Error<E>> {
        Ok(self.temperature_precise(delay)? / 100)
    }

    /// Measures the temperature in °C.
    pub fn temperature_f32(&self, delay: &mut impl DelayNs) -> Result<f32, Error<E>> {
        Ok(self.temperature(delay)? as f32 / 100.0)
    }

    /// Alarm trip points as `(high, low)`.
    pub fn alarms(&self) -> Result<(i8, i8), Error<E>> {
        let scratchpad = self.read_scratchpad()?;
        Ok((scratchpad.alarm_high(), scratchpad.alarm_low()))
    }

    pub fn set_alarms(&self, high: i8, low: i8) -> Result<(), Error<E>> {
        self.bus.transaction(|driver| {
            let scratchpad = Self::read_scratchpad_with(driver, &self.addressing)?;
            let data = [high as u8, low as u8, scratchpad.configuration()];
            let len = if self.family.has_configuration() { 3 } else { 2 };
            self.write_scratchpad_with(driver, &data[..len])
        })
    }

    /// Changes the resolution.
    ///
    /// DS18S20 only switches between the plain 9-bit reading and the
    /// extended one computed from the count registers; the device itself is
    /// left alone. DS1822 and DS18B20 get their configuration register
    /// rewritten. Use [`save_eeprom`](Self::save_eeprom) to keep it across
    /// power cycles.
    pub fn set_resolution(&mut self, resolution: Resolution) -> Result<(), Error<E>> {
        if !self.family.supports(resolution) {
            return Err(Error::UnsupportedResolution(
                resolution.label(),
                self.family.code(),
            ));
        }
        if let (true, Some(configuration)) =
            (self.family.has_configuration(), resolution.configuration())
        {
            self.bus.transaction(|driver| {
                let scratchpad = Self::read_scratchpad_with(driver, &self.addressing)?;
                let data = [scratchpad[2], scratchpad[3], configuration];
                self.write_scratchpad_with(driver, &data)
            })?;
        }
        self.settings = Settings::new(self.family, resolution);
        Ok(())
    }

    /// COPY SCRATCHPAD: stores alarms and configuration in EEPROM.
    pub fn save_eeprom(&self, delay: &mut impl DelayNs) -> Result<(), Error<E>> {
        self.bus.transaction(|driver| {
            driver.address(&self.addressing)?;
            driver.write_command(Command::CopyScratchpad)?;
            self.wait(driver, delay, self.settings.eeprom_write_time)
        })
    }

    /// RECALL E²: reloads alarms and configuration from EEPROM.
    ///
    /// Does nothing in parasitic mode, where the device can't report
    /// completion.
    pub fn load_eeprom(&self, delay: &mut impl DelayNs) -> Result<(), Error<E>> {
        if self.parasitic {
            debug!("{:?}: recall skipped in parasitic mode", self.addressing);
            return Ok(());
        }
        self.bus.transaction(|driver| {
            driver.address(&self.addressing)?;
            driver.write_command(Command::RecallE2)?;
            self.wait(driver, delay, self.settings.conversion_time)
        })
    }

    pub fn read_scratchpad(&self) -> Result<Scratchpad, Error<E>> {
        self.bus
            .transaction(|driver| Self::read_scratchpad_with(driver, &self.addressing))
    }

    /// WRITE SCRATCHPAD: alarm high, alarm low and, for DS1822/DS18B20, the
    /// configuration register.
    pub fn write_scratchpad(&self, data: &[u8]) -> Result<(), Error<E>> {
        self.bus
            .transaction(|driver| self.write_scratchpad_with(driver, data))
    }

    fn read_power_supply(driver: &mut Driver<U>, addressing: &Addressing) -> Result<bool, Error<E>> {
        driver.address(addressing)?;
        driver.write_command(Command::ReadPowerSupply)?;
        // parasite powered devices pull the line low
        Ok(!driver.read_bit()?)
    }

    fn read_scratchpad_with(
        driver: &mut Driver<U>,
        addressing: &Addressing,
    ) -> Result<Scratchpad, Error<E>> {
        let mut data = [0u8; 9];
        driver.address_write_read(
            addressing,
            &[Command::ReadScratchpad.op_code()],
            &mut data,
        )?;
        let computed = crc8(&data[..8]);
        if computed != data[8] {
            return Err(Error::CrcMismatch {
                computed,
                expected: data[8],
            });
        }
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&data[..8]);
        Ok(Scratchpad(raw))
    }

    /// No reset may happen before all bytes are written.
    fn write_scratchpad_with(&self, driver: &mut Driver<U>, data: &[u8]) -> Result<(), Error<E>> {
        if !(2..=3).contains(&data.len()) {
            return Err(Error::ScratchpadLength(data.len()));
        }
        driver.address(&self.addressing)?;
        driver.write_command(Command::WriteScratchpad)?;
        driver.write_bytes(data)
    }

    fn convert(&self, driver: &mut Driver<U>, delay: &mut impl DelayNs) -> Result<(), Error<E>> {
        driver.address(&self.addressing)?;
        driver.write_command(Command::Convert)?;
        self.wait(driver, delay, self.settings.conversion_time)
    }

    /// Parasite powered devices can't signal completion, so the full
    /// duration is slept. Otherwise the line is polled until the device
    /// releases it. Running past `duration` is logged, not an error.
    fn wait(
        &self,
        driver: &mut Driver<U>,
        delay: &mut impl DelayNs,
        duration: Duration,
    ) -> Result<(), Error<E>> {
        if self.parasitic {
            delay.delay_us(u32::try_from(duration.as_micros()).unwrap_or(u32::MAX));
            return Ok(());
        }
        let started = Instant::now();
        while !driver.read_bit()? {
            if started.elapsed() > duration {
                warn!(
                    "{:?}: still busy after {:?}, data may be stale",
                    self.addressing, duration
                );
                break;
            }
        }
        Ok(())
    }
}
