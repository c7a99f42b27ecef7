//! Serial port transport

use std::io::{Read, Write};
use std::time::Duration;

use crate::error::Result;

use super::Transport;

/// Poll interval for the blocking serial read. Kept short so the reader
/// thread notices a shutdown request promptly.
const READ_TIMEOUT: Duration = Duration::from_millis(10);

/// [`Transport`] backed by a real serial port, 8N1 with no flow control
pub struct SerialTransport {
    port: Box<dyn serialport::SerialPort>,
}

impl SerialTransport {
    pub fn open(path: &str, baud_rate: u32) -> Result<Self> {
        let port = serialport::new(path, baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(READ_TIMEOUT)
            .open()?;

        log::info!("SerialTransport: opened {} at {} baud", path, baud_rate);
        Ok(Self { port })
    }
}

impl Transport for SerialTransport {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        match self.port.read(buffer) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        Ok(self.port.write(data)?)
    }

    fn flush(&mut self) -> Result<()> {
        Ok(self.port.flush()?)
    }

    fn available(&self) -> Result<usize> {
        Ok(self.port.bytes_to_read()? as usize)
    }
}
