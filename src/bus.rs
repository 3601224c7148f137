use crate::{BusConfig, Driver, Error, Rom, SearchKind, Uart};
use core::fmt::Debug;
use log::warn;
use std::sync::{Mutex, MutexGuard};

/// A 1-Wire bus behind a UART, shared by everything talking to its devices.
///
/// The line carries one conversation at a time: a reset, a ROM command and
/// the payload that follows must not be interleaved with anybody else's.
/// All access goes through [`transaction`](Self::transaction), which holds
/// the bus lock for the whole sequence.
pub struct Bus<U: Uart> {
    driver: Mutex<Driver<U>>,
}

impl<U: Uart> Bus<U> {
    pub fn new(uart: U) -> Self {
        Self::with_config(uart, BusConfig::default())
    }

    pub fn with_config(uart: U, config: BusConfig) -> Self {
        Bus {
            driver: Mutex::new(Driver::new(uart, config)),
        }
    }

    /// Gives the transport back, e.g. to close it.
    pub fn into_inner(self) -> U {
        self.driver
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .into_inner()
    }

    fn lock(&self) -> MutexGuard<'_, Driver<U>> {
        self.driver.lock().unwrap_or_else(|poisoned| {
            // the next transaction starts with a reset anyway
            warn!("bus lock poisoned, continuing");
            poisoned.into_inner()
        })
    }
}

impl<E: Debug, U: Uart<Error = E>> Bus<U> {
    /// Runs `f` with exclusive access to the bus.
    pub fn transaction<T, F>(&self, f: F) -> Result<T, Error<E>>
    where
        F: FnOnce(&mut Driver<U>) -> Result<T, Error<E>>,
    {
        let mut driver = self.lock();
        f(&mut driver)
    }

    /// ROM code of the only device on the bus.
    pub fn single_rom(&self) -> Result<Rom, Error<E>> {
        self.transaction(|driver| driver.read_rom())
    }

    /// ROM codes of all devices on the bus.
    pub fn connected_roms(&self) -> Result<Vec<Rom>, Error<E>> {
        self.transaction(|driver| driver.search(SearchKind::Normal))
    }

    /// ROM codes of devices with their alarm flag set.
    pub fn alarmed_roms(&self) -> Result<Vec<Rom>, Error<E>> {
        self.transaction(|driver| driver.search(SearchKind::Alarmed))
    }

    pub fn is_connected(&self, rom: &Rom) -> Result<bool, Error<E>> {
        self.transaction(|driver| driver.is_connected(rom))
    }
}
