use crate::Rom;
use core::fmt::Debug;

/// Error type
///
/// `E` is the error type of the underlying [`Uart`](crate::Uart).
#[derive(Debug, thiserror::Error)]
pub enum Error<E: Sized + Debug> {
    /// Transport failure
    #[error("uart error: {0:?}")]
    PortError(E),
    /// The transport moved fewer bytes than requested
    #[error("short transfer: expected {expected} bytes, got {actual}")]
    ShortTransfer { expected: usize, actual: usize },
    /// No presence pulse after reset
    #[error("no 1-wire device present")]
    NoPresence,
    /// Reset pulse echo is not aligned to the UART frame
    #[error("reset pulse error {0:#04x}")]
    ResetPulse(u8),
    /// Echo of a written time slot differs from what was sent
    #[error("noise detected (got: {echoed:#04x}, expected: {written:#04x})")]
    Noise { written: u8, echoed: u8 },
    /// Both search bits read as 1 during a normal search
    #[error("search got wrong bits (two sequential 1) at bit {0}")]
    SearchCollision(u8),
    #[error("crc mismatch (computed: {computed:#04x}, expected: {expected:#04x})")]
    CrcMismatch { computed: u8, expected: u8 },
    /// The sensor could not be found while constructing it
    #[error("sensor not found (rom: {0:?})")]
    SensorNotFound(Option<Rom>),
    #[error("resolution {0} is not supported by family {1:#04x}")]
    UnsupportedResolution(&'static str, u8),
    #[error("family {0:#04x} is not a supported temperature sensor")]
    UnsupportedFamily(u8),
    #[error("scratchpad write takes 2 or 3 bytes, got {0}")]
    ScratchpadLength(usize),
}

impl<E: Sized + Debug> From<E> for Error<E> {
    fn from(e: E) -> Self {
        Error::PortError(e)
    }
}
