use crate::Uart;
use serialport::{ClearBuffer, SerialPort};
use std::io::{ErrorKind, Read, Write};

/// A serial port opened with `serialport::new(path, 115_200)`.
///
/// The port's timeout bounds every echo read.
impl Uart for Box<dyn SerialPort> {
    type Error = serialport::Error;

    fn write(&mut self, bytes: &[u8]) -> Result<usize, Self::Error> {
        self.write_all(bytes)?;
        self.flush()?;
        Ok(bytes.len())
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<usize, Self::Error> {
        let mut count = 0;
        while count < buffer.len() {
            match Read::read(self, &mut buffer[count..]) {
                Ok(0) => break,
                Ok(n) => count += n,
                Err(error) if error.kind() == ErrorKind::TimedOut => break,
                Err(error) if error.kind() == ErrorKind::Interrupted => {}
                Err(error) => return Err(error.into()),
            }
        }
        Ok(count)
    }

    fn reset_input_buffer(&mut self) -> Result<(), Self::Error> {
        self.clear(ClearBuffer::Input)
    }

    fn reset_output_buffer(&mut self) -> Result<(), Self::Error> {
        self.clear(ClearBuffer::Output)
    }

    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<(), Self::Error> {
        (**self).set_baud_rate(baud_rate)
    }
}
