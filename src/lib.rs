#![doc = include_str!("../README.md")]

mod bus;
mod command;
mod config;
mod delay;
mod device;
mod driver;
#[cfg(feature = "ds18x20")]
pub mod ds18x20;
mod result;
mod rom;
mod search;
#[cfg(feature = "serialport")]
mod serial;
mod uart;

pub use bus::Bus;
pub use command::{Command, OpCode, SearchKind};
pub use config::BusConfig;
pub use delay::StdDelay;
pub use device::Addressing;
pub use driver::Driver;
pub use result::Error;
pub use rom::{Rom, RomError};
pub use uart::Uart;

/// Dallas/Maxim CRC8 (x⁸ + x⁵ + x⁴ + 1, LSB first) continued from `crc`.
pub fn compute_partial_crc8(crc: u8, data: &[u8]) -> u8 {
    let mut crc = crc;
    for byte in data.iter() {
        let mut byte = *byte;
        for _ in 0..8 {
            let mix = (crc ^ byte) & 0x01;
            crc >>= 1;
            if mix != 0x00 {
                crc ^= 0x8C;
            }
            byte >>= 1;
        }
    }
    crc
}

/// Dallas/Maxim CRC8 of a whole block.
pub fn crc8(data: &[u8]) -> u8 {
    compute_partial_crc8(0, data)
}
