//! In-memory transport for tests
//!
//! Handles are cheap clones sharing one buffer set, so a test can hold a
//! handle for injecting device responses while the connection owns another.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Error, Result};

use super::Transport;

type Responder = Box<dyn FnMut(&[u8]) -> Vec<u8> + Send>;

#[derive(Default)]
struct Inner {
    read_buffer: VecDeque<u8>,
    write_buffer: Vec<u8>,
    responder: Option<Responder>,
    fail_reads: bool,
}

/// [`Transport`] that reads from and writes to in-memory buffers
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<Inner>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes to be returned by subsequent reads
    pub fn inject_read(&self, data: &[u8]) {
        self.inner.lock().read_buffer.extend(data);
    }

    /// Everything written so far
    pub fn get_written(&self) -> Vec<u8> {
        self.inner.lock().write_buffer.clone()
    }

    pub fn clear_written(&self) {
        self.inner.lock().write_buffer.clear();
    }

    /// Install a device stand-in: called with each write, its return bytes
    /// are queued for reading. Runs under the transport lock, so it must
    /// not call back into this mock directly; a delayed reply should be
    /// injected from a spawned thread via a clone of the handle.
    pub fn set_responder<F>(&self, responder: F)
    where
        F: FnMut(&[u8]) -> Vec<u8> + Send + 'static,
    {
        self.inner.lock().responder = Some(Box::new(responder));
    }

    /// Make every subsequent read fail, simulating an unplugged device
    pub fn set_fail_reads(&self, fail: bool) {
        self.inner.lock().fail_reads = fail;
    }
}

impl Transport for MockTransport {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let mut inner = self.inner.lock();
        if inner.fail_reads {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "mock transport disconnected",
            )));
        }
        let count = buffer.len().min(inner.read_buffer.len());
        for slot in buffer.iter_mut().take(count) {
            *slot = inner.read_buffer.pop_front().unwrap_or(0);
        }
        Ok(count)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let mut inner = self.inner.lock();
        inner.write_buffer.extend_from_slice(data);
        if let Some(mut responder) = inner.responder.take() {
            let reply = responder(data);
            inner.read_buffer.extend(reply);
            inner.responder = Some(responder);
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn available(&self) -> Result<usize> {
        Ok(self.inner.lock().read_buffer.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_write() {
        let mut transport = MockTransport::new();
        transport.inject_read(&[1, 2, 3]);

        let mut buf = [0u8; 8];
        let n = transport.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], &[1, 2, 3]);
        assert_eq!(transport.read(&mut buf).unwrap(), 0);

        transport.write(&[9, 8]).unwrap();
        assert_eq!(transport.get_written(), vec![9, 8]);
    }

    #[test]
    fn test_responder_round_trip() {
        let mut transport = MockTransport::new();
        transport.set_responder(|data| data.iter().rev().copied().collect());

        transport.write(&[1, 2, 3]).unwrap();
        let mut buf = [0u8; 8];
        let n = transport.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], &[3, 2, 1]);
    }

    #[test]
    fn test_clones_share_buffers() {
        let transport = MockTransport::new();
        let handle = transport.clone();
        handle.inject_read(&[7]);

        let mut one = transport;
        let mut buf = [0u8; 1];
        assert_eq!(one.read(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], 7);
    }

    #[test]
    fn test_fail_reads() {
        let mut transport = MockTransport::new();
        transport.set_fail_reads(true);
        let mut buf = [0u8; 4];
        assert!(transport.read(&mut buf).is_err());
    }
}
