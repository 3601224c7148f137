//! A simulated 1-Wire line behind a loopback UART.
//!
//! Every byte written at the data baud rate is one time slot. The line level
//! is the AND of the master's slot and whatever the devices drive; the echo
//! reflects it the way a real UART receiver would.

#![allow(dead_code)]

use onewire_uart::{crc8, BusConfig, Rom, Uart};
use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimError(pub &'static str);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    RomCommand { byte: u8, bits: u8 },
    MatchRom { bit: usize, matched: bool },
    Search { bit: usize, step: u8 },
    Function { byte: u8, bits: u8 },
    Transmit { len: usize, bit: usize },
    Receive { byte: u8, bits: u8, index: usize },
    Busy { slots: usize },
    PowerSupply,
}

#[derive(Debug, Clone)]
pub struct SimDevice {
    pub rom: Rom,
    pub parasitic: bool,
    pub alarmed: bool,
    /// Value latched into the scratchpad by the next conversion
    pub temperature: i16,
    pub count_remain: u8,
    pub scratchpad: [u8; 8],
    pub eeprom: [u8; 3],
    /// Read slots answered with 0 after a conversion, copy or recall
    pub busy_slots: usize,
    pub corrupt_crc: bool,
    phase: Phase,
    outgoing: [u8; 9],
}

impl SimDevice {
    pub fn new(family: u8, serial: u8) -> Self {
        let rom = Rom::from_parts(family, [serial, 0x5A, 0xC3, 0x01, 0x00, 0x00]);
        let mut scratchpad = [0x50, 0x05, 0x4B, 0x46, 0x7F, 0xFF, 0x0C, 0x10];
        if family == 0x10 {
            scratchpad = [0xAA, 0x00, 0x4B, 0x46, 0xFF, 0xFF, 0x0C, 0x10];
        }
        SimDevice {
            rom,
            parasitic: false,
            alarmed: false,
            temperature: i16::from_le_bytes([scratchpad[0], scratchpad[1]]),
            count_remain: 0x0C,
            eeprom: [scratchpad[2], scratchpad[3], scratchpad[4]],
            scratchpad,
            busy_slots: 3,
            corrupt_crc: false,
            phase: Phase::Idle,
            outgoing: [0; 9],
        }
    }

    pub fn ds18b20(serial: u8) -> Self {
        Self::new(0x28, serial)
    }

    pub fn ds1822(serial: u8) -> Self {
        Self::new(0x22, serial)
    }

    pub fn ds18s20(serial: u8) -> Self {
        Self::new(0x10, serial)
    }

    pub fn with_temperature(mut self, raw: i16) -> Self {
        self.temperature = raw;
        self
    }

    pub fn with_count_remain(mut self, count_remain: u8) -> Self {
        self.count_remain = count_remain;
        self
    }

    pub fn with_parasitic(mut self) -> Self {
        self.parasitic = true;
        self
    }

    pub fn with_alarm(mut self) -> Self {
        self.alarmed = true;
        self
    }

    fn has_configuration(&self) -> bool {
        self.rom.family_code() != 0x10
    }

    fn rom_bit(&self, bit: usize) -> bool {
        self.rom.to_bits()[bit]
    }

    fn outgoing_bit(&self, bit: usize) -> bool {
        self.outgoing[bit / 8] & (1 << (bit % 8)) != 0
    }

    fn start_transmit(&mut self, data: &[u8]) {
        self.outgoing[..data.len()].copy_from_slice(data);
        self.phase = Phase::Transmit {
            len: data.len() * 8,
            bit: 0,
        };
    }

    fn reset(&mut self) {
        self.phase = Phase::RomCommand { byte: 0, bits: 0 };
    }

    /// Whether the device holds the line low during the coming slot.
    fn pulls_low(&self) -> bool {
        match self.phase {
            Phase::Search { bit, step: 0 } => !self.rom_bit(bit),
            Phase::Search { bit, step: 1 } => self.rom_bit(bit),
            Phase::Transmit { len, bit } => bit < len && !self.outgoing_bit(bit),
            Phase::Busy { slots } => slots > 0,
            Phase::PowerSupply => self.parasitic,
            _ => false,
        }
    }

    fn is_busy(&self) -> bool {
        matches!(self.phase, Phase::Busy { .. })
    }

    fn slot(&mut self, line: bool) {
        let phase = self.phase;
        self.phase = match phase {
            Phase::Idle => Phase::Idle,
            Phase::RomCommand { byte, bits } => {
                let byte = byte | (u8::from(line) << bits);
                if bits < 7 {
                    Phase::RomCommand { byte, bits: bits + 1 }
                } else {
                    self.rom_command(byte)
                }
            }
            Phase::MatchRom { bit, matched } => {
                let matched = matched && line == self.rom_bit(bit);
                match (bit + 1 < Rom::BITS, matched) {
                    (true, _) => Phase::MatchRom { bit: bit + 1, matched },
                    (false, true) => Phase::Function { byte: 0, bits: 0 },
                    (false, false) => Phase::Idle,
                }
            }
            Phase::Search { bit, step } if step < 2 => Phase::Search { bit, step: step + 1 },
            Phase::Search { bit, .. } => {
                if line != self.rom_bit(bit) {
                    Phase::Idle
                } else if bit + 1 < Rom::BITS {
                    Phase::Search { bit: bit + 1, step: 0 }
                } else {
                    Phase::Function { byte: 0, bits: 0 }
                }
            }
            Phase::Function { byte, bits } => {
                let byte = byte | (u8::from(line) << bits);
                if bits < 7 {
                    Phase::Function { byte, bits: bits + 1 }
                } else {
                    self.function_command(byte)
                }
            }
            Phase::Transmit { len, bit } => Phase::Transmit {
                len,
                bit: (bit + 1).min(len),
            },
            Phase::Receive { byte, bits, index } => {
                let byte = byte | (u8::from(line) << bits);
                if bits < 7 {
                    Phase::Receive { byte, bits: bits + 1, index }
                } else {
                    let limit = if self.has_configuration() { 3 } else { 2 };
                    if index < limit {
                        self.scratchpad[2 + index] = byte;
                    }
                    Phase::Receive { byte: 0, bits: 0, index: index + 1 }
                }
            }
            Phase::Busy { slots } => Phase::Busy {
                slots: slots.saturating_sub(1),
            },
            Phase::PowerSupply => Phase::Idle,
        };
    }

    fn rom_command(&mut self, command: u8) -> Phase {
        match command {
            0x33 => {
                let rom = self.rom;
                self.start_transmit(rom.as_ref());
                self.phase
            }
            0x55 => Phase::MatchRom { bit: 0, matched: true },
            0xCC => Phase::Function { byte: 0, bits: 0 },
            0xF0 => Phase::Search { bit: 0, step: 0 },
            0xEC if self.alarmed => Phase::Search { bit: 0, step: 0 },
            _ => Phase::Idle,
        }
    }

    fn function_command(&mut self, command: u8) -> Phase {
        let busy = Phase::Busy {
            slots: self.busy_slots,
        };
        match command {
            0x44 => {
                self.convert();
                busy
            }
            0xBE => {
                let mut data = [0u8; 9];
                data[..8].copy_from_slice(&self.scratchpad);
                data[8] = crc8(&self.scratchpad);
                if self.corrupt_crc {
                    data[8] ^= 0x01;
                }
                self.start_transmit(&data);
                self.phase
            }
            0x4E => Phase::Receive {
                byte: 0,
                bits: 0,
                index: 0,
            },
            0x48 => {
                self.eeprom.copy_from_slice(&self.scratchpad[2..5]);
                busy
            }
            0xB8 => {
                let eeprom = self.eeprom;
                self.scratchpad[2..5].copy_from_slice(&eeprom);
                busy
            }
            0xB4 => Phase::PowerSupply,
            _ => Phase::Idle,
        }
    }

    fn convert(&mut self) {
        let [lsb, msb] = self.temperature.to_le_bytes();
        self.scratchpad[0] = lsb;
        self.scratchpad[1] = msb;
        if !self.has_configuration() {
            self.scratchpad[6] = self.count_remain;
        }
        let degrees = if self.has_configuration() {
            self.temperature >> 4
        } else {
            self.temperature >> 1
        };
        let high = i16::from(self.scratchpad[2] as i8);
        let low = i16::from(self.scratchpad[3] as i8);
        self.alarmed = degrees >= high || degrees <= low;
    }
}

#[derive(Debug, Default)]
pub struct SimState {
    pub devices: Vec<SimDevice>,
    pub baud_rate: u32,
    pub baud_changes: usize,
    /// Echo every high slot as `0xFE`
    pub noise: bool,
    pub broken: bool,
    pub resets: usize,
    /// Slots seen while some device was converting or writing EEPROM
    pub busy_slots: usize,
    echo: VecDeque<u8>,
}

impl SimState {
    fn reset_pulse(&mut self, byte: u8) -> u8 {
        self.resets += 1;
        if byte != 0xF0 {
            return byte;
        }
        for device in &mut self.devices {
            device.reset();
        }
        if self.devices.is_empty() {
            0xF0
        } else {
            0xE0
        }
    }

    fn slot(&mut self, byte: u8) -> u8 {
        if self.devices.iter().any(SimDevice::is_busy) {
            self.busy_slots += 1;
        }
        let master = byte == 0xFF;
        let pulled = self.devices.iter().any(SimDevice::pulls_low);
        let line = master && !pulled;
        for device in &mut self.devices {
            device.slot(line);
        }
        match (master, pulled) {
            (false, _) => byte,
            (true, true) => 0xF8,
            (true, false) if self.noise => 0xFE,
            (true, false) => 0xFF,
        }
    }
}

/// Loopback UART wired to the simulated line. Clones share the line.
#[derive(Debug, Clone, Default)]
pub struct SimBus {
    state: Arc<Mutex<SimState>>,
}

impl SimBus {
    pub fn new(devices: Vec<SimDevice>) -> Self {
        let bus = SimBus::default();
        {
            let mut state = bus.state();
            state.devices = devices;
            state.baud_rate = BusConfig::default().baud_rate;
        }
        bus
    }

    pub fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap()
    }

    pub fn device(&self, rom: &Rom) -> SimDevice {
        self.state()
            .devices
            .iter()
            .find(|device| device.rom == *rom)
            .cloned()
            .unwrap()
    }

    pub fn update(&self, rom: &Rom, f: impl FnOnce(&mut SimDevice)) {
        let mut state = self.state();
        let device = state
            .devices
            .iter_mut()
            .find(|device| device.rom == *rom)
            .unwrap();
        f(device);
    }

    pub fn roms(&self) -> Vec<Rom> {
        self.state().devices.iter().map(|device| device.rom).collect()
    }
}

impl Uart for SimBus {
    type Error = SimError;

    fn write(&mut self, bytes: &[u8]) -> Result<usize, SimError> {
        let mut state = self.state();
        if state.broken {
            return Err(SimError("port closed"));
        }
        let reset = state.baud_rate == BusConfig::default().reset_baud_rate;
        for byte in bytes {
            let echo = if reset {
                state.reset_pulse(*byte)
            } else {
                state.slot(*byte)
            };
            state.echo.push_back(echo);
        }
        Ok(bytes.len())
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<usize, SimError> {
        let mut state = self.state();
        let mut count = 0;
        while count < buffer.len() {
            match state.echo.pop_front() {
                Some(echo) => buffer[count] = echo,
                None => break,
            }
            count += 1;
        }
        Ok(count)
    }

    fn reset_input_buffer(&mut self) -> Result<(), SimError> {
        self.state().echo.clear();
        Ok(())
    }

    fn reset_output_buffer(&mut self) -> Result<(), SimError> {
        Ok(())
    }

    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<(), SimError> {
        let mut state = self.state();
        state.baud_rate = baud_rate;
        state.baud_changes += 1;
        Ok(())
    }
}
