//! Byte transport abstraction
//!
//! Everything above this layer speaks [`Transport`], so the serial port can
//! be swapped for an in-memory mock in tests. Reads are non-blocking in
//! spirit: a transport returns `Ok(0)` when nothing has arrived yet rather
//! than parking the caller indefinitely.

use crate::error::{Error, Result};

mod mock;
mod serial;

pub use mock::MockTransport;
pub use serial::SerialTransport;

/// Bidirectional byte stream to the peripheral board
pub trait Transport: Send {
    /// Read available bytes into the buffer, returning how many were read.
    /// Returns `Ok(0)` when no data is waiting.
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize>;

    /// Write bytes, returning how many were accepted
    fn write(&mut self, data: &[u8]) -> Result<usize>;

    /// Block until buffered writes have reached the device
    fn flush(&mut self) -> Result<()>;

    /// Bytes currently waiting to be read, if the transport can tell
    fn available(&self) -> Result<usize> {
        Ok(0)
    }

    /// Write the whole buffer, retrying short writes
    fn write_all(&mut self, mut data: &[u8]) -> Result<()> {
        while !data.is_empty() {
            let written = self.write(data)?;
            if written == 0 {
                return Err(Error::Io(std::io::ErrorKind::WriteZero.into()));
            }
            data = &data[written..];
        }
        Ok(())
    }
}
