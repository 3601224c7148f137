use core::fmt::Debug;

/// Duplex byte stream the bus master drives.
///
/// The line must be wired so that every transmitted byte is echoed back on
/// the receive side (TX and RX joined on the 1-Wire data line).
pub trait Uart {
    type Error: Debug;

    /// Writes the bytes, returning how many were accepted.
    fn write(&mut self, bytes: &[u8]) -> Result<usize, Self::Error>;

    /// Blocks until `buffer` is full or the read timeout expires, returning
    /// the number of bytes received.
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize, Self::Error>;

    /// Discards any received but unread bytes
    fn reset_input_buffer(&mut self) -> Result<(), Self::Error>;

    /// Discards any bytes not yet transmitted
    fn reset_output_buffer(&mut self) -> Result<(), Self::Error>;

    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<(), Self::Error>;
}

impl<U: Uart + ?Sized> Uart for &mut U {
    type Error = U::Error;

    fn write(&mut self, bytes: &[u8]) -> Result<usize, Self::Error> {
        (**self).write(bytes)
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<usize, Self::Error> {
        (**self).read(buffer)
    }

    fn reset_input_buffer(&mut self) -> Result<(), Self::Error> {
        (**self).reset_input_buffer()
    }

    fn reset_output_buffer(&mut self) -> Result<(), Self::Error> {
        (**self).reset_output_buffer()
    }

    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<(), Self::Error> {
        (**self).set_baud_rate(baud_rate)
    }
}
