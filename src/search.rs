use crate::{Command, Driver, Error, Rom, SearchKind, Uart};
use core::fmt::Debug;
use log::{debug, trace};
use std::collections::VecDeque;

/// A walk down the ROM trie: the bits decided so far.
#[derive(Clone, Copy)]
struct Path {
    bits: [bool; Rom::BITS],
    len: usize,
}

impl Path {
    fn new() -> Self {
        Path {
            bits: [false; Rom::BITS],
            len: 0,
        }
    }

    fn push(&mut self, bit: bool) {
        self.bits[self.len] = bit;
        self.len += 1;
    }

    fn fixed(&self) -> &[bool] {
        &self.bits[..self.len]
    }

    fn is_complete(&self) -> bool {
        self.len == Rom::BITS
    }

    /// Same prefix, taking the 1 side at the next position
    fn branch(&self) -> Self {
        let mut branch = *self;
        branch.push(true);
        branch
    }
}

impl<E: Debug, U: Uart<Error = E>> Driver<U> {
    /// SEARCH ROM / ALARM SEARCH: discovers the ROM codes of every device
    /// (or every alarmed device) on the bus.
    ///
    /// Each round walks one branch of the 64-level ROM trie. Whenever both
    /// the bit and its complement read as 0, devices disagree at that
    /// position: the round continues down the 0 side and the 1 side is queued
    /// for a later round. Rounds are replayed in the order their branches
    /// were found, so the search ends after one round per device.
    ///
    /// An empty bus yields no ROM codes.
    pub fn search(&mut self, kind: SearchKind) -> Result<Vec<Rom>, Error<E>> {
        let mut found = Vec::new();
        if !self.reset_presence()? {
            return Ok(found);
        }
        let mut pending = VecDeque::new();
        let mut path = Path::new();
        loop {
            if let Some(rom) = self.search_round(kind, &mut path, &mut pending)? {
                debug!("found {}", rom);
                found.push(rom);
            }
            match pending.pop_front() {
                Some(next) => path = next,
                None => break,
            }
            self.reset()?;
        }
        Ok(found)
    }

    /// Expects the bus to be reset already.
    fn search_round(
        &mut self,
        kind: SearchKind,
        path: &mut Path,
        pending: &mut VecDeque<Path>,
    ) -> Result<Option<Rom>, Error<E>> {
        trace!("search round, {} bits known", path.len);
        self.write_command(kind.command())?;
        for &bit in path.fixed() {
            // every device still answers, the values are already known
            self.read_bit()?;
            self.read_bit()?;
            self.write_bit(bit)?;
        }
        while !path.is_complete() {
            let bit = self.read_bit()?;
            let complement = self.read_bit()?;
            match (bit, complement) {
                (false, false) => {
                    pending.push_back(path.branch());
                    path.push(false);
                    self.write_bit(false)?;
                }
                (true, true) => {
                    return match kind {
                        // no more alarmed devices down this branch
                        SearchKind::Alarmed => Ok(None),
                        SearchKind::Normal => Err(Error::SearchCollision(path.len as u8)),
                    };
                }
                (bit, _) => {
                    path.push(bit);
                    self.write_bit(bit)?;
                }
            }
        }
        let rom = Rom::from_bits(&path.bits);
        rom.ensure_valid()?;
        Ok(Some(rom))
    }

    /// Checks whether a device with this ROM code answers a search.
    ///
    /// The search is walked along the ROM bits only; as soon as no device
    /// answers with the expected bit the device is known to be absent.
    pub fn is_connected(&mut self, rom: &Rom) -> Result<bool, Error<E>> {
        if !self.reset_presence()? {
            return Ok(false);
        }
        self.write_command(Command::SearchRom)?;
        for bit in rom.to_bits() {
            let id = self.read_bit()?;
            let complement = self.read_bit()?;
            match (id, complement) {
                (true, true) => return Ok(false),
                // every remaining device has the other value here
                (id, complement) if id != complement && id != bit => return Ok(false),
                _ => self.write_bit(bit)?,
            }
        }
        Ok(true)
    }
}
