/// Anything that is sent to the bus as a single command byte.
pub trait OpCode {
    fn op_code(&self) -> u8;
}

/// ROM level commands, sent right after a reset to select devices.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    ReadRom = 0x33,
    MatchRom = 0x55,
    SkipRom = 0xCC,
    SearchRom = 0xF0,
    SearchRomAlarmed = 0xEC,
}

impl OpCode for Command {
    fn op_code(&self) -> u8 {
        *self as _
    }
}

/// Which devices take part in a search.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchKind {
    /// Every device on the bus
    Normal,
    /// Only devices with a latched alarm flag
    Alarmed,
}

impl SearchKind {
    pub fn command(&self) -> Command {
        match self {
            SearchKind::Normal => Command::SearchRom,
            SearchKind::Alarmed => Command::SearchRomAlarmed,
        }
    }
}
